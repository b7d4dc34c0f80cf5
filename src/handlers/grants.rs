use crate::models::*;
use crate::services::DeferredGrantService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/grants/trigger",
    tag = "grants",
    params(
        ("user_id" = String, Query, description = "用户ID")
    ),
    responses(
        (status = 200, description = "任务已创建", body = GrantTriggerResponse),
        (status = 400, description = "参数错误 / 上一任务未到发放时间", body = ApiError),
        (status = 404, description = "用户不存在", body = ApiError),
        (status = 429, description = "超过每日次数", body = ApiError)
    )
)]
/// 创建延迟免费卡任务，实际发放由后台扫描完成
pub async fn trigger(
    service: web::Data<DeferredGrantService>,
    query: web::Query<GrantTriggerQuery>,
) -> Result<HttpResponse> {
    match service.trigger(&query.user_id, Utc::now()).await {
        Ok(resp) => Ok(HttpResponse::Ok().json(ApiResponse::success(resp))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn grants_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/grants/trigger", web::get().to(trigger));
}
