pub mod achievements;
pub mod draw;
pub mod grants;
pub mod user;

pub use achievements::achievements_config;
pub use draw::draw_config;
pub use grants::grants_config;
pub use user::user_config;

use crate::error::AppError;
use actix_web::web;

/// 请求体解析失败统一返回 400 + 错误信封
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}
