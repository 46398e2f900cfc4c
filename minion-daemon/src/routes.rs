//! HTTP ingress of a minion.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use minion_core::EventBatch;
use minion_sync::Minion;

use crate::protocol::{HookResponse, ProgressResponse, RecrawlResponse};

/// Delivery batches carry dereferenced records and can be large.
pub const BODY_LIMIT: usize = 50 * 1024 * 1024;

pub fn router(minion: Arc<Minion>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/hook", post(hook))
        .route("/recrawl", post(recrawl))
        .route("/crawlerProgress", get(crawler_progress))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(minion)
}

async fn healthz() -> &'static str {
    "OK"
}

/// Responds only after the batch is processed and acknowledged.
async fn hook(State(minion): State<Arc<Minion>>, Json(batch): Json<EventBatch>) -> Json<HookResponse> {
    let summary = minion.deliver(batch).await;
    Json(HookResponse::received(summary.succeeded, summary.acknowledged))
}

async fn recrawl(State(minion): State<Arc<Minion>>) -> Json<RecrawlResponse> {
    let start = minion.recrawl();
    Json(RecrawlResponse {
        is_success: true,
        is_new_crawler: start.is_new_crawler,
    })
}

async fn crawler_progress(State(minion): State<Arc<Minion>>) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        is_success: true,
        progress: minion.progress(),
    })
}
