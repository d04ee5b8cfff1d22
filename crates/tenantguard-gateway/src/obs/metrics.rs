//! In-process metrics rendered in Prometheus text format.
//!
//! Label sets are sorted before use as map keys so `[("a","1"),("b","2")]` and
//! `[("b","2"),("a","1")]` hit the same series. Latency buckets are integer
//! microseconds.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| {
            let v = v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
            format!("{k}=\"{v}\"")
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct LabeledCounter {
    series: DashMap<LabelKey, AtomicU64>,
}

impl LabeledCounter {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.series
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of one series (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.series
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for s in self.series.iter() {
            let value = s.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}{{{}}} {value}", render_labels(s.key()));
        }
    }
}

// 100us .. 1s
const LATENCY_BUCKETS_MICROS: [u64; 8] = [100, 500, 1_000, 5_000, 10_000, 50_000, 250_000, 1_000_000];

#[derive(Default)]
struct Histogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; 8],
}

#[derive(Default)]
pub struct LatencyHistogram {
    series: DashMap<LabelKey, Histogram>,
}

impl LatencyHistogram {
    pub fn observe(&self, labels: &[(&str, &str)], elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let h = self.series.entry(label_key(labels)).or_default();

        h.count.fetch_add(1, Ordering::Relaxed);
        h.sum_micros.fetch_add(micros, Ordering::Relaxed);
        for (slot, bound) in h.buckets.iter().zip(LATENCY_BUCKETS_MICROS) {
            if micros <= bound {
                slot.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.series
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for s in self.series.iter() {
            let labels = render_labels(s.key());
            let sep = if labels.is_empty() { "" } else { "," };
            let h = s.value();
            for (slot, bound) in h.buckets.iter().zip(LATENCY_BUCKETS_MICROS) {
                let _ = writeln!(
                    out,
                    "{name}_bucket{{{labels}{sep}le=\"{bound}\"}} {}",
                    slot.load(Ordering::Relaxed)
                );
            }
            let count = h.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{labels}{sep}le=\"+Inf\"}} {count}");
            let _ = writeln!(out, "{name}_sum{{{labels}}} {}", h.sum_micros.load(Ordering::Relaxed));
            let _ = writeln!(out, "{name}_count{{{labels}}} {count}");
        }
    }
}

/// Counters for every governance stage.
#[derive(Default)]
pub struct GovernanceMetrics {
    pub admission_decisions: LabeledCounter,
    pub threat_matches: LabeledCounter,
    pub tenant_resolutions: LabeledCounter,
    pub plan_checks: LabeledCounter,
    pub permission_decisions: LabeledCounter,
    pub dispatch_outcomes: LabeledCounter,
    pub dispatch_duration: LatencyHistogram,
}

impl GovernanceMetrics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.admission_decisions
            .render("tenantguard_admission_decisions_total", &mut out);
        self.threat_matches
            .render("tenantguard_threat_matches_total", &mut out);
        self.tenant_resolutions
            .render("tenantguard_tenant_resolutions_total", &mut out);
        self.plan_checks.render("tenantguard_plan_checks_total", &mut out);
        self.permission_decisions
            .render("tenantguard_permission_decisions_total", &mut out);
        self.dispatch_outcomes
            .render("tenantguard_dispatch_outcomes_total", &mut out);
        self.dispatch_duration
            .render("tenantguard_dispatch_duration_micros", &mut out);
        out
    }
}
