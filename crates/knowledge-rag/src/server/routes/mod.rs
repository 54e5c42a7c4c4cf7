//! API routes for the knowledge base server

pub mod rag;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Routes mounted under `{api_prefix}/rag`
pub fn rag_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(rag::upload_documents).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/query", post(rag::query))
        .route("/stats", get(rag::stats))
}
