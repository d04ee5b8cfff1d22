//! Request-scoped context types shared across governance stages.
//!
//! `RequestFacts` is what the transport hands to the governor; `TenantContext`
//! is what the tenant gate hands back to permission checks and handlers.

pub mod request;
pub mod tenant;

pub use request::{Principal, RequestFacts, VerifiedClaims};
pub use tenant::{extract_tenant_id, PlanCaps, TenantContext};
