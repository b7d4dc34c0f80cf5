use crate::models::*;
use crate::services::UserService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/users",
    tag = "user",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "注册成功", body = UserResponse),
        (status = 400, description = "参数错误", body = ApiError),
        (status = 409, description = "用户已存在", body = ApiError)
    )
)]
/// 注册用户（初始卡片数取配置）
pub async fn register(
    service: web::Data<UserService>,
    payload: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    match service.register(&payload.user_id).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiResponse::success(UserResponse::from(user)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/ledger",
    tag = "user",
    params(
        ("user_id" = String, Path, description = "用户ID")
    ),
    responses(
        (status = 200, description = "获取账本成功", body = LedgerResponse),
        (status = 404, description = "用户不存在", body = ApiError)
    )
)]
/// 读取卡片数和余额（缓存优先）
pub async fn get_ledger(
    service: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match service.ledger(&path.into_inner()).await {
        Ok(ledger) => Ok(HttpResponse::Ok().json(ApiResponse::success(ledger))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/cards/purchase",
    tag = "user",
    request_body = PurchaseCardsRequest,
    responses(
        (status = 200, description = "购买成功", body = PurchaseCardsResponse),
        (status = 402, description = "余额不足", body = ApiError),
        (status = 403, description = "超过每日限购", body = ApiError),
        (status = 404, description = "用户或卡包不存在", body = ApiError)
    )
)]
/// 用余额购买卡包
pub async fn purchase_cards(
    service: web::Data<UserService>,
    payload: web::Json<PurchaseCardsRequest>,
) -> Result<HttpResponse> {
    let request = payload.into_inner();
    match service
        .purchase_cards(&request.user_id, &request.card_type, Utc::now())
        .await
    {
        Ok(resp) => Ok(HttpResponse::Ok().json(ApiResponse::success(resp))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::post().to(register))
        .route("/users/{user_id}/ledger", web::get().to(get_ledger))
        .route("/cards/purchase", web::post().to(purchase_cards));
}
