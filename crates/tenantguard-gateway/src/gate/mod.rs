//! Tenant Resolution Gate.
//!
//! Turns a tenant identifier into a validated `TenantContext`, backed by a
//! TTL-bounded cache, and enforces plan caps and feature licensing for the call.

pub mod cache;
pub mod limits;
pub mod resolver;

pub use cache::{TenantCache, TenantCacheEntry};
pub use limits::{OperationKind, PlanLimitGuard};
pub use resolver::TenantGate;
