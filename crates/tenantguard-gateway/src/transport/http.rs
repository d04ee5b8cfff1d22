//! HTTP governance middleware.
//!
//! Responsibilities:
//! - Build `RequestFacts` from the axum request (client address, path, query, headers)
//! - Skip exempt paths entirely; auth paths get admission only
//! - Run admission + tenant gate, then stash the `TenantContext` in request extensions
//! - Map `GovernError` to an HTTP status and a JSON body without leaking internals
//!
//! Permission checks stay with the route, which knows what it requires.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Query, RawPathParams, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;

use tenantguard_core::error::{GovernError, Result};

use crate::app_state::AppState;
use crate::context::{RequestFacts, TenantContext, VerifiedClaims};

/// A governance failure rendered as an HTTP response.
#[derive(Debug)]
pub struct Rejection(pub GovernError);

impl From<GovernError> for Rejection {
    fn from(e: GovernError) -> Self {
        Self(e)
    }
}

pub fn status_for(err: &GovernError) -> StatusCode {
    match err {
        GovernError::MissingTenantContext | GovernError::TenantMismatch => StatusCode::BAD_REQUEST,
        GovernError::TenantNotFound(_) => StatusCode::NOT_FOUND,
        GovernError::TenantInactive(_) | GovernError::PlanNotFound(_) => StatusCode::FORBIDDEN,
        GovernError::NoActiveSubscription(_)
        | GovernError::SubscriptionNotActive { .. }
        | GovernError::SubscriptionExpired(_)
        | GovernError::PlanLimitExceeded { .. }
        | GovernError::FeatureNotLicensed(_) => StatusCode::PAYMENT_REQUIRED,
        GovernError::NotATenantMember(_) | GovernError::PermissionDenied { .. } => {
            StatusCode::FORBIDDEN
        }
        GovernError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        GovernError::MaliciousInputDetected { .. } => StatusCode::BAD_REQUEST,
        GovernError::TenantDirectoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GovernError::NoHandlerRegistered(_)
        | GovernError::HandlerFailed { .. }
        | GovernError::Config(_)
        | GovernError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let err = self.0;
        let mut body = json!({
            "code": err.client_code().as_str(),
            "message": err.client_message(),
        });
        // Upgrade prompts need the numbers.
        match &err {
            GovernError::PlanLimitExceeded { resource, cap, current } => {
                body["resource"] = json!(resource);
                body["cap"] = json!(cap);
                body["current"] = json!(current);
            }
            GovernError::FeatureNotLicensed(feature) => {
                body["feature"] = json!(feature);
            }
            _ => {}
        }

        let mut resp = (status_for(&err), Json(body)).into_response();
        if let GovernError::RateLimitExceeded { retry_after_secs } = err {
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        resp
    }
}

/// Client address used for rate-limit keys.
///
/// With `trust_forwarded_for` the first `x-forwarded-for` hop wins over the
/// socket peer, which is then the reverse proxy.
pub fn client_addr(req: &Request, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let first_hop = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = first_hop {
            return ip;
        }
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

async fn request_facts(app: &AppState, req: Request) -> Result<(RequestFacts, Request)> {
    let client = client_addr(&req, app.cfg().server.trust_forwarded_for);
    let (mut parts, body) = req.into_parts();

    let query = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .map_err(|_| GovernError::MaliciousInputDetected {
            location: "query string".into(),
        })?;

    // Only present when the route declares parameters.
    let path_params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map(|params| {
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let facts = RequestFacts {
        client,
        path: parts.uri.path().to_string(),
        query,
        path_params,
        headers: header_pairs(&parts.headers),
        claims: parts.extensions.get::<VerifiedClaims>().cloned(),
    };

    Ok((facts, Request::from_parts(parts, body)))
}

pub async fn governance_middleware(
    State(app): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if app.cfg().governance.is_exempt(req.uri().path()) {
        return next.run(req).await;
    }

    let (facts, mut req) = match request_facts(&app, req).await {
        Ok(v) => v,
        Err(e) => return Rejection(e).into_response(),
    };

    let governor = app.governor();
    if let Err(e) = governor.admit(&facts) {
        return Rejection(e).into_response();
    }

    // Authentication endpoints run before any tenant is known.
    if governor.admission().is_auth_path(&facts.path) {
        return next.run(req).await;
    }

    match governor.resolve_tenant(&facts).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(e) => Rejection(e).into_response(),
    }
}

/// `GET /v1/tenant`: the resolved context for the calling tenant.
pub async fn current_tenant(Extension(ctx): Extension<Arc<TenantContext>>) -> Json<TenantContext> {
    Json(ctx.as_ref().clone())
}
