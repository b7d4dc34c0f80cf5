use crate::models::*;
use crate::services::DrawService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/draw",
    tag = "draw",
    request_body = DrawRequest,
    responses(
        (status = 200, description = "抽奖成功", body = DrawOutcome),
        (status = 400, description = "参数错误", body = ApiError),
        (status = 403, description = "卡片不足", body = ApiError),
        (status = 404, description = "用户不存在", body = ApiError),
        (status = 500, description = "无可抽奖品 / 配置错误", body = ApiError)
    )
)]
/// 消耗一张卡进行一次抽奖
pub async fn draw(
    service: web::Data<DrawService>,
    payload: web::Json<DrawRequest>,
) -> Result<HttpResponse> {
    let request = payload.into_inner();
    match service.draw(&request.user_id, &request.play_mode).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(ApiResponse::success(outcome))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn draw_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/draw", web::post().to(draw));
}
