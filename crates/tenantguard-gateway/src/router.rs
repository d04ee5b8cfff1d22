//! Axum router wiring.
//!
//! Ops routes plus service routes, all behind the governance middleware.
//! Exempt paths (health, metrics) pass through it untouched.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, ops, transport};

/// Router with the built-in routes only.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new().route("/v1/tenant", get(transport::http::current_tenant));
    build_router_with(state, api)
}

/// Mount `api` (a service's own routes) behind tenant governance.
pub fn build_router_with(state: AppState, api: Router<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .merge(api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            transport::http::governance_middleware,
        ))
        .with_state(state)
}
