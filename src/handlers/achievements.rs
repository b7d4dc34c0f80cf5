use crate::models::*;
use crate::services::AchievementService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/tasks/share",
    tag = "achievements",
    request_body = ShareTaskRequest,
    responses(
        (status = 200, description = "奖励已发放", body = ShareTaskResponse),
        (status = 400, description = "参数错误 / 未知任务类型", body = ApiError),
        (status = 404, description = "用户不存在", body = ApiError),
        (status = 409, description = "该任务奖励已领取", body = ApiError)
    )
)]
/// 完成分享任务，按任务类型一次性发放余额
pub async fn complete_share_task(
    service: web::Data<AchievementService>,
    request: web::Json<ShareTaskRequest>,
) -> Result<HttpResponse> {
    match service
        .complete_share_task(&request.user_id, &request.task_type)
        .await
    {
        Ok(resp) => Ok(HttpResponse::Ok().json(ApiResponse::success(resp))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn achievements_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/tasks/share", web::post().to(complete_share_task));
}
