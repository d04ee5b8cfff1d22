//! Observability: audit events for every rejection and in-process metrics.
//!
//! Audit storage and rotation belong to the sink; this crate only produces events.

pub mod audit;
pub mod metrics;

pub use audit::{AuditEvent, AuditKind, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use metrics::GovernanceMetrics;
