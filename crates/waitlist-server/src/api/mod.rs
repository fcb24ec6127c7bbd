//! HTTP API for the waitlist service.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::logging_middleware;
pub use types::*;

use crate::waitlist::WaitlistService;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Signup workflow
    pub waitlist: Arc<WaitlistService>,
}

impl AppState {
    /// Create new application state.
    pub fn new(waitlist: WaitlistService) -> Self {
        Self {
            waitlist: Arc::new(waitlist),
        }
    }
}

/// Create the API router.
///
/// Throttling is per client and happens inside the signup workflow, after
/// configuration and client identification.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/waitlist", post(handlers::submit_signup))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
