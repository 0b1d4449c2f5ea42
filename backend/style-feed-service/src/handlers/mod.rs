/// Style Feed API Handlers
///
/// Thin HTTP layer over the recommender engine. Engine calls take per-user
/// locks, so they run on actix's blocking pool.
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{CalibrationResult, FeedbackEvent};
use crate::services::{ItemLookup, RecommenderEngine};

const MAX_PULL: i64 = 100;

/// Handler state shared by every worker
pub struct AppState {
    pub engine: Arc<RecommenderEngine>,
}

/// Query parameters for GET /next
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    #[serde(default = "default_user")]
    pub user: String,

    /// Number of entries to return (default: 20, clamped to 1..=100)
    #[serde(default = "default_limit")]
    pub n: i64,
}

/// Request body for POST /calibrate
#[derive(Debug, Deserialize, Validate)]
pub struct CalibrateRequest {
    #[validate(length(min = 1, message = "user is required"))]
    pub user: String,
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
}

/// Query parameters for GET /outfit
#[derive(Debug, Deserialize)]
pub struct OutfitQuery {
    pub pid: String,
    #[serde(default = "default_user")]
    pub user: String,
}

/// Query parameters for GET /debug/item
#[derive(Debug, Deserialize)]
pub struct DebugItemQuery {
    pub pid: Option<String>,
    pub url: Option<String>,
    #[serde(default = "default_user")]
    pub user: String,
}

impl DebugItemQuery {
    fn lookup(&self) -> Option<ItemLookup> {
        let present = |v: &Option<String>| {
            v.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
        };
        present(&self.pid)
            .map(ItemLookup::Id)
            .or_else(|| present(&self.url).map(ItemLookup::Url))
    }
}

fn default_user() -> String {
    "demo".to_string()
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct CalibrateResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub result: CalibrationResult,
}

/// POST /feedback
/// Record one swipe
#[post("/feedback")]
pub async fn post_feedback(
    body: web::Json<FeedbackEvent>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let event = body.into_inner();
    event.validate()?;

    let engine = Arc::clone(&state.engine);
    web::block(move || engine.apply_feedback(&event)).await??;

    Ok(HttpResponse::Ok().json(OkResponse { ok: true }))
}

/// GET /next
/// Next batch of items and outfit suggestions
#[get("/next")]
pub async fn get_next(
    query: web::Query<NextQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let NextQuery { user, n } = query.into_inner();
    let n = n.clamp(1, MAX_PULL) as usize;

    debug!(user_id = %user, n, "Serving next batch");

    let engine = Arc::clone(&state.engine);
    let entries = web::block(move || engine.recommend(&user, n)).await??;

    Ok(HttpResponse::Ok().json(entries))
}

/// POST /calibrate
/// Reset a user towards one product category
#[post("/calibrate")]
pub async fn post_calibrate(
    body: web::Json<CalibrateRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let engine = Arc::clone(&state.engine);
    let result = web::block(move || engine.calibrate(&request.user, &request.category)).await??;

    Ok(HttpResponse::Ok().json(CalibrateResponse { ok: true, result }))
}

/// GET /outfit
/// Best complementary item for a product, without touching any queue
#[get("/outfit")]
pub async fn get_outfit(
    query: web::Query<OutfitQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let OutfitQuery { pid, user } = query.into_inner();

    let engine = Arc::clone(&state.engine);
    let suggestion = web::block(move || engine.get_outfit(&pid, &user)).await??;

    Ok(HttpResponse::Ok().json(suggestion))
}

/// GET /debug/item
/// Attribute preferences and scoring breakdown for one product, by id or url
#[get("/debug/item")]
pub async fn get_debug_item(
    query: web::Query<DebugItemQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let lookup = query
        .lookup()
        .ok_or_else(|| AppError::Validation("pid or url required".to_string()))?;
    let user = query.into_inner().user;

    let engine = Arc::clone(&state.engine);
    let view = web::block(move || engine.debug_item(&user, &lookup)).await??;

    Ok(HttpResponse::Ok().json(view))
}

/// Register every route on an app or scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(|| async { "OK" }))
        .service(post_feedback)
        .service(get_next)
        .service(post_calibrate)
        .service(get_outfit)
        .service(get_debug_item);
}
