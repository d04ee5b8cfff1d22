use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::context::TenantContext;

/// A resolved context plus the moment it was built.
#[derive(Debug)]
pub struct TenantCacheEntry {
    context: Arc<TenantContext>,
    created_at: Instant,
}

impl TenantCacheEntry {
    pub fn new(context: Arc<TenantContext>, created_at: Instant) -> Self {
        Self {
            context,
            created_at,
        }
    }

    pub fn context(&self) -> &Arc<TenantContext> {
        &self.context
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Fresh while `now - created_at <= ttl`. Age is measured from creation, never from last read.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) <= ttl
    }
}

/// Tenant id -> entry. Entries are swapped whole on refresh, never edited.
pub struct TenantCache {
    entries: DashMap<String, Arc<TenantCacheEntry>>,
    ttl: Duration,
}

impl TenantCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read-only lookup; a stale entry is treated as absent.
    pub fn get_fresh(&self, tenant_id: &str, now: Instant) -> Option<Arc<TenantContext>> {
        let entry = self.entries.get(tenant_id)?;
        if entry.is_fresh(now, self.ttl) {
            Some(Arc::clone(entry.context()))
        } else {
            None
        }
    }

    pub fn put(&self, tenant_id: &str, context: Arc<TenantContext>, now: Instant) {
        self.entries.insert(
            tenant_id.to_string(),
            Arc::new(TenantCacheEntry::new(context, now)),
        );
    }

    pub fn invalidate(&self, tenant_id: &str) -> bool {
        self.entries.remove(tenant_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
