use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::pool::PoolStatus;
use crate::startup::TaskCache;
use crate::store::StorePool;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub pool: PoolStatus,
    pub cache_entries: usize,
}

pub async fn health_check(
    store: web::Data<StorePool>,
    task_cache: web::Data<TaskCache>,
) -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        pool: store.status(),
        cache_entries: task_cache.len(),
    })
}
