use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use dashmap::DashMap;

use tenantguard_core::error::{GovernError, Result};

use crate::clock::Clock;
use crate::config::{AdmissionSection, BucketConfig};
use crate::context::{extract_tenant_id, RequestFacts};
use crate::obs::{AuditEvent, AuditKind, AuditSink, GovernanceMetrics};

use super::scan::{ScanVerdict, ThreatScanner};
use super::window::RateWindow;

/// Traffic class selecting the bucket a key is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrafficClass {
    General,
    Auth,
    Tenant,
}

impl TrafficClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficClass::General => "general",
            TrafficClass::Auth => "auth",
            TrafficClass::Tenant => "tenant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    pub class: TrafficClass,
    pub client: IpAddr,
    pub tenant: Option<String>,
}

impl WindowKey {
    pub fn general(client: IpAddr) -> Self {
        Self { class: TrafficClass::General, client, tenant: None }
    }

    pub fn auth(client: IpAddr) -> Self {
        Self { class: TrafficClass::Auth, client, tenant: None }
    }

    pub fn tenant(tenant: impl Into<String>, client: IpAddr) -> Self {
        Self { class: TrafficClass::Tenant, client, tenant: Some(tenant.into()) }
    }
}

/// Sliding-window rate limiter plus threat scan, run before any other governance step.
///
/// Concurrency note: each key owns a `Mutex<RateWindow>`. The map guard is released
/// before any window is locked, and a request touching several keys locks them in
/// `WindowKey` order, so two requests can never wait on each other in a cycle. The
/// trim/check/append sequence runs entirely under those locks with no `.await`, so a
/// cancelled request either recorded its hits and was admitted, or recorded nothing.
pub struct AdmissionController {
    general: BucketConfig,
    auth: BucketConfig,
    tenant: BucketConfig,
    auth_paths: Vec<String>,
    tenant_header: String,
    max_tracked_keys: usize,
    windows: DashMap<WindowKey, Arc<Mutex<RateWindow>>>,
    scanner: ThreatScanner,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<GovernanceMetrics>,
}

impl AdmissionController {
    pub fn new(
        cfg: &AdmissionSection,
        tenant_header: &str,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<GovernanceMetrics>,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            general: cfg.general,
            auth: cfg.auth,
            tenant: cfg.tenant,
            auth_paths: cfg.auth_paths.clone(),
            tenant_header: tenant_header.to_ascii_lowercase(),
            max_tracked_keys: cfg.max_tracked_keys,
            windows: DashMap::new(),
            scanner: ThreatScanner::new(&cfg.scan)?,
            clock,
            audit,
            metrics,
        })
    }

    pub fn bucket(&self, class: TrafficClass) -> BucketConfig {
        match class {
            TrafficClass::General => self.general,
            TrafficClass::Auth => self.auth,
            TrafficClass::Tenant => self.tenant,
        }
    }

    pub fn is_auth_path(&self, path: &str) -> bool {
        self.auth_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Keys a request is counted against. Auth endpoints use only the strict
    /// bucket; everything else uses the general bucket plus, when a tenant id is
    /// present, the tenant bucket. All must admit.
    pub fn keys_for(&self, facts: &RequestFacts) -> Vec<WindowKey> {
        if self.is_auth_path(&facts.path) {
            return vec![WindowKey::auth(facts.client)];
        }

        let mut keys = vec![WindowKey::general(facts.client)];
        if let Ok(tenant) = extract_tenant_id(facts.header(&self.tenant_header), facts.tenant_claim()) {
            keys.push(WindowKey::tenant(tenant, facts.client));
        }
        keys
    }

    /// Rate limit, then scan. Hits are recorded only when the scan also passes.
    /// Rejections are logged and audited here.
    pub fn admit(&self, facts: &RequestFacts) -> Result<()> {
        let keys = self.keys_for(facts);
        let mut verdict = ScanVerdict::Clean;
        let recorded = self.record_if(&keys, || {
            verdict = self.scanner.scan(facts);
            !matches!(verdict, ScanVerdict::Reject(_))
        });

        if let Err(e) = recorded {
            let class = keys.first().map(|k| k.class.as_str()).unwrap_or("general");
            self.metrics
                .admission_decisions
                .inc(&[("class", class), ("result", "throttled")]);
            tracing::warn!(client = %facts.client, path = %facts.path, reason = %e, "request throttled");
            self.audit.emit(
                AuditEvent::new(AuditKind::AdmissionRejected, e.to_string(), self.clock.wall())
                    .client(facts.client),
            );
            return Err(e);
        }

        match verdict {
            ScanVerdict::Clean => {}
            ScanVerdict::Advisory(matches) => {
                for m in matches {
                    self.metrics
                        .threat_matches
                        .inc(&[("family", m.family.as_str()), ("action", "logged")]);
                    tracing::warn!(
                        client = %facts.client,
                        family = m.family.as_str(),
                        location = %m.location,
                        "suspicious header content (not rejected)"
                    );
                }
            }
            ScanVerdict::Reject(m) => {
                self.metrics
                    .threat_matches
                    .inc(&[("family", m.family.as_str()), ("action", "rejected")]);
                self.metrics
                    .admission_decisions
                    .inc(&[("class", "scan"), ("result", "rejected")]);
                tracing::error!(
                    client = %facts.client,
                    path = %facts.path,
                    family = m.family.as_str(),
                    location = %m.location,
                    "malicious input detected"
                );
                self.audit.emit(
                    AuditEvent::new(
                        AuditKind::MaliciousInput,
                        format!("{} in {}", m.family.as_str(), m.location),
                        self.clock.wall(),
                    )
                    .client(facts.client),
                );
                return Err(GovernError::MaliciousInputDetected {
                    location: m.location.to_string(),
                });
            }
        }

        self.metrics
            .admission_decisions
            .inc(&[("class", keys[0].class.as_str()), ("result", "admitted")]);
        Ok(())
    }

    /// Check and record `keys` as one step: either every window gains `now`, or none does.
    pub fn check_rate(&self, keys: &[WindowKey]) -> Result<()> {
        self.record_if(keys, || true).map(|_| ())
    }

    /// Under the window locks: trim, fail if any window is full, then ask `accept`
    /// whether to record. Returns whether the hit was recorded.
    fn record_if(&self, keys: &[WindowKey], accept: impl FnOnce() -> bool) -> Result<bool> {
        let now = self.clock.now();

        let mut ordered: Vec<&WindowKey> = keys.iter().collect();
        ordered.sort();
        ordered.dedup();

        // The handle is cloned under the shard lock, so `collect_idle` sees it as in use.
        let handles: Vec<(TrafficClass, Arc<Mutex<RateWindow>>)> = ordered
            .iter()
            .map(|k| {
                let w = self
                    .windows
                    .entry((*k).clone())
                    .or_insert_with(|| Arc::new(Mutex::new(RateWindow::new())))
                    .clone();
                (k.class, w)
            })
            .collect();

        let mut guards: Vec<(BucketConfig, MutexGuard<'_, RateWindow>)> =
            Vec::with_capacity(handles.len());
        for (class, w) in &handles {
            // Poisoned mutex means a logic bug; deny instead of panicking.
            let g = w
                .lock()
                .map_err(|_| GovernError::Internal("rate window lock poisoned".into()))?;
            guards.push((self.bucket(*class), g));
        }

        for (bucket, g) in guards.iter_mut() {
            g.trim(now, bucket.window());
            if g.is_full(bucket.max_requests) {
                return Err(GovernError::RateLimitExceeded {
                    retry_after_secs: g.retry_after(now, bucket.window()),
                });
            }
        }
        if !accept() {
            return Ok(false);
        }
        for (_, g) in guards.iter_mut() {
            g.record(now);
        }
        drop(guards);
        drop(handles);

        if self.windows.len() > self.max_tracked_keys {
            self.collect_idle(now);
        }
        Ok(true)
    }

    /// Forget windows with no hit inside their bucket's window. Windows some
    /// request still holds a handle to are kept, even when empty.
    pub fn collect_idle(&self, now: Instant) {
        let before = self.windows.len();
        self.windows.retain(|k, w| {
            if Arc::strong_count(w) > 1 {
                return true;
            }
            match w.try_lock() {
                Ok(g) => !g.is_idle(now, self.bucket(k.class).window()),
                Err(_) => true,
            }
        });
        tracing::debug!(before, after = self.windows.len(), "idle rate windows collected");
    }

    /// Forget all windows.
    pub fn reset(&self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::obs::MemoryAuditSink;

    fn controller(clock: Arc<ManualClock>) -> AdmissionController {
        AdmissionController::new(
            &AdmissionSection::default(),
            "x-tenant-id",
            clock,
            Arc::new(MemoryAuditSink::new()),
            Arc::new(GovernanceMetrics::default()),
        )
        .unwrap()
    }

    #[test]
    fn window_held_by_a_request_survives_collection() {
        let clock = Arc::new(ManualClock::new());
        let ctrl = controller(clock.clone());
        let key = WindowKey::general(IpAddr::V4(Ipv4Addr::LOCALHOST));

        // A request that fetched its handle but has not locked it yet.
        let held = ctrl
            .windows
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(RateWindow::new())))
            .clone();
        ctrl.collect_idle(clock.now());
        assert_eq!(ctrl.tracked_keys(), 1);

        held.lock().unwrap().record(clock.now());
        drop(held);
        clock.advance(Duration::from_secs(61));
        ctrl.collect_idle(clock.now());
        assert_eq!(ctrl.tracked_keys(), 0);
    }
}
