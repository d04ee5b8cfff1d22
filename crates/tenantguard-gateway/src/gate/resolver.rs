use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use tenantguard_core::error::{ErrorCategory, GovernError, Result};

use crate::clock::Clock;
use crate::context::TenantContext;
use crate::directory::TenantDirectory;
use crate::obs::{AuditEvent, AuditKind, AuditSink, GovernanceMetrics};

use super::cache::TenantCache;

/// Resolves and caches tenant contexts.
///
/// Concurrency note: cache hits never wait on anything. Misses take a per-tenant
/// async lock so concurrent misses for one tenant share a single directory
/// lookup, while misses for other tenants proceed independently.
pub struct TenantGate {
    directory: Arc<dyn TenantDirectory>,
    cache: TenantCache,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    lookup_timeout: Duration,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<GovernanceMetrics>,
}

impl TenantGate {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        ttl: Duration,
        lookup_timeout: Duration,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<GovernanceMetrics>,
    ) -> Self {
        Self {
            directory,
            cache: TenantCache::new(ttl),
            inflight: DashMap::new(),
            lookup_timeout,
            clock,
            audit,
            metrics,
        }
    }

    pub fn cache(&self) -> &TenantCache {
        &self.cache
    }

    /// Tenants with a lookup in progress or queued.
    pub fn pending_lookups(&self) -> usize {
        self.inflight.len()
    }

    /// Return a validated context for `tenant_id`, from cache when fresh.
    pub async fn resolve(&self, tenant_id: &str) -> Result<Arc<TenantContext>> {
        if let Some(ctx) = self.cache.get_fresh(tenant_id, self.clock.now()) {
            self.metrics.tenant_resolutions.inc(&[("result", "hit")]);
            tracing::debug!(tenant = %tenant_id, "tenant cache hit");
            return Ok(ctx);
        }

        let slot = InflightSlot::join(&self.inflight, tenant_id);

        let result = {
            let _guard = slot.lock().lock().await;

            // Another waiter may have filled the cache while we queued.
            if let Some(ctx) = self.cache.get_fresh(tenant_id, self.clock.now()) {
                self.metrics.tenant_resolutions.inc(&[("result", "hit")]);
                Ok(ctx)
            } else {
                self.metrics.tenant_resolutions.inc(&[("result", "miss")]);
                tracing::debug!(tenant = %tenant_id, "tenant cache miss");
                self.fetch(tenant_id).await
            }
        };
        drop(slot);

        result.map_err(|e| self.reject(tenant_id, e))
    }

    /// Bounded directory lookup. The cache write happens after the lookup
    /// completes, so a cancelled request leaves no partial entry behind.
    async fn fetch(&self, tenant_id: &str) -> Result<Arc<TenantContext>> {
        match tokio::time::timeout(self.lookup_timeout, self.load(tenant_id)).await {
            Ok(Ok(ctx)) => {
                let ctx = Arc::new(ctx);
                self.cache.put(tenant_id, Arc::clone(&ctx), self.clock.now());
                Ok(ctx)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GovernError::TenantDirectoryUnavailable(format!(
                "lookup for {tenant_id} exceeded {}ms",
                self.lookup_timeout.as_millis()
            ))),
        }
    }

    async fn load(&self, tenant_id: &str) -> Result<TenantContext> {
        let tenant = self
            .directory
            .tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| GovernError::TenantNotFound(tenant_id.to_string()))?;

        // Inactive tenants are rejected before subscription state is even looked at.
        if !tenant.is_active {
            return Err(GovernError::TenantInactive(tenant.id));
        }

        let sub = self
            .directory
            .active_or_trial_subscription(&tenant.id)
            .await?
            .ok_or_else(|| GovernError::NoActiveSubscription(tenant.id.clone()))?;

        if !sub.status.is_usable() {
            return Err(GovernError::SubscriptionNotActive {
                tenant: tenant.id,
                status: sub.status.to_string(),
            });
        }
        if let Some(end) = sub.effective_end() {
            if end < self.clock.wall() {
                return Err(GovernError::SubscriptionExpired(tenant.id));
            }
        }

        let plan = self
            .directory
            .plan_by_id(&sub.plan_id)
            .await?
            .ok_or_else(|| GovernError::PlanNotFound(sub.plan_id.clone()))?;

        Ok(TenantContext::from_records(&tenant, &sub, &plan))
    }

    fn reject(&self, tenant_id: &str, err: GovernError) -> GovernError {
        if err.category() == ErrorCategory::Infrastructure {
            self.metrics.tenant_resolutions.inc(&[("result", "error")]);
            tracing::error!(tenant = %tenant_id, error = %err, "tenant directory failure");
            return err;
        }

        self.metrics.tenant_resolutions.inc(&[("result", "rejected")]);
        tracing::warn!(tenant = %tenant_id, reason = %err, "tenant rejected");
        self.audit.emit(
            AuditEvent::new(AuditKind::TenantRejected, err.to_string(), self.clock.wall())
                .tenant(tenant_id),
        );
        err
    }
}

/// A waiter's share of a tenant's lookup lock. Dropping it, including when the
/// request is cancelled mid-lookup, removes the map entry once nobody else holds it.
struct InflightSlot<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    tenant_id: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InflightSlot<'a> {
    fn join(map: &'a DashMap<String, Arc<Mutex<()>>>, tenant_id: &'a str) -> Self {
        let lock = map
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            map,
            tenant_id,
            lock,
        }
    }

    fn lock(&self) -> &Mutex<()> {
        &self.lock
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        // Clones are taken under the shard lock: a count of 2 is the map plus this slot.
        self.map
            .remove_if(self.tenant_id, |_, m| Arc::strong_count(m) <= 2);
    }
}
