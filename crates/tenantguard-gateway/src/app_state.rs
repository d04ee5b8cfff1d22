//! Shared application state for the tenantguard gateway.
//!
//! Holds the single `Governor` for the process. Startup errors are returned,
//! not panicked on.

use std::sync::Arc;

use tenantguard_core::error::Result;

use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::governor::{Collaborators, Governor};
use crate::obs::{AuditSink, GovernanceMetrics, TracingAuditSink};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    governor: Governor,
}

impl AppState {
    /// Production wiring: system clock, audit events on the `audit` log target.
    pub fn new(cfg: GatewayConfig, deps: Collaborators) -> Result<Self> {
        Self::with_parts(
            cfg,
            deps,
            Arc::new(SystemClock),
            Arc::new(TracingAuditSink),
        )
    }

    pub fn with_parts(
        cfg: GatewayConfig,
        deps: Collaborators,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let metrics = Arc::new(GovernanceMetrics::default());
        let governor = Governor::new(&cfg, deps, clock, audit, metrics)?;

        tracing::info!(
            ttl_secs = cfg.tenant.cache_ttl_secs,
            general = cfg.admission.general.max_requests,
            auth = cfg.admission.auth.max_requests,
            tenant = cfg.admission.tenant.max_requests,
            "governor ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, governor }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn governor(&self) -> &Governor {
        &self.inner.governor
    }

    pub fn metrics(&self) -> &GovernanceMetrics {
        self.inner.governor.metrics()
    }
}
