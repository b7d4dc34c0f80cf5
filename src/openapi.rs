use actix_web::{HttpResponse, web};
use utoipa::OpenApi;

use crate::handlers;
use crate::models::*;
use crate::services::PrizeType;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::draw::draw,
        handlers::user::register,
        handlers::user::get_ledger,
        handlers::user::purchase_cards,
        handlers::grants::trigger,
        handlers::achievements::complete_share_task,
    ),
    components(
        schemas(
            DrawRequest,
            DrawOutcome,
            PrizeType,
            CreateUserRequest,
            UserResponse,
            LedgerResponse,
            PurchaseCardsRequest,
            PurchaseCardsResponse,
            GrantTriggerResponse,
            ShareTaskRequest,
            ShareTaskResponse,
            ApiError,
        )
    ),
    tags(
        (name = "draw", description = "Reward draw API"),
        (name = "user", description = "User ledger API"),
        (name = "grants", description = "Deferred free card API"),
        (name = "achievements", description = "One-time share task rewards"),
    ),
    info(
        title = "Reward Draw Backend API",
        version = "1.0.0",
        description = "Reward draw, ledger and deferred grant REST API"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

pub fn openapi_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api-docs/openapi.json", web::get().to(openapi_json));
}
