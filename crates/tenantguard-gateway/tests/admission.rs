#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::{Duration, Instant};

use tenantguard_core::GovernError;
use tenantguard_gateway::admission::{
    RateWindow, ScanLocation, ScanVerdict, ThreatFamily, ThreatScanner, WindowKey,
};
use tenantguard_gateway::config::{self, GatewayConfig, ScanSection};
use tenantguard_gateway::context::RequestFacts;
use tenantguard_gateway::obs::AuditKind;

mod support;
use support::*;

const SQLI: &str = "' OR 1=1 --";

#[test]
fn window_admits_exactly_max_within_window() {
    let window = Duration::from_secs(60);
    let t0 = Instant::now();
    let mut w = RateWindow::new();

    for i in 0..3 {
        let now = t0 + Duration::from_secs(i);
        w.trim(now, window);
        assert!(!w.is_full(3));
        w.record(now);
    }
    let now = t0 + Duration::from_secs(10);
    w.trim(now, window);
    assert!(w.is_full(3));
    // Oldest hit was at t0, so room appears at t0 + 60s.
    assert_eq!(w.retry_after(now, window), 50);

    let later = t0 + Duration::from_secs(61);
    w.trim(later, window);
    assert_eq!(w.len(), 2);
    assert!(!w.is_full(3));
}

#[test]
fn auth_bucket_admits_ten_then_rejects() {
    let w = World::new();
    let g = w.governor(&GatewayConfig::default());
    let facts = RequestFacts::new(ip(1), "/auth/login");

    for _ in 0..10 {
        g.admit(&facts).unwrap();
        w.clock.advance(Duration::from_millis(500));
    }
    let err = g.admit(&facts).unwrap_err();
    assert!(matches!(err, GovernError::RateLimitExceeded { retry_after_secs } if retry_after_secs >= 1));
    assert_eq!(w.audit.count(AuditKind::AdmissionRejected), 1);

    // Another client has its own window.
    g.admit(&RequestFacts::new(ip(2), "/auth/login")).unwrap();

    // Window slides: after 60s the earliest hits have aged out.
    w.clock.advance(Duration::from_secs(60));
    g.admit(&facts).unwrap();
}

#[test]
fn rejected_request_records_nothing() {
    let cfg = config::load_from_str(
        r#"
version: 1
admission:
  general: { max_requests: 5, window_secs: 60 }
  tenant: { max_requests: 2, window_secs: 60 }
"#,
    )
    .unwrap();
    let w = World::new();
    let g = w.governor(&cfg);
    let client = ip(7);
    let with_tenant = RequestFacts::new(client, "/v1/crm/leads").with_header("x-tenant-id", "t1");

    g.admit(&with_tenant).unwrap();
    g.admit(&with_tenant).unwrap();
    // Tenant bucket full; the general hit must not be recorded either.
    assert!(g.admit(&with_tenant).is_err());
    assert!(g.admit(&with_tenant).is_err());

    let plain = RequestFacts::new(client, "/v1/crm/leads");
    for _ in 0..3 {
        g.admit(&plain).unwrap();
    }
    assert!(g.admit(&plain).is_err());
}

#[test]
fn tenant_buckets_are_independent() {
    let cfg = config::load_from_str(
        r#"
version: 1
admission:
  tenant: { max_requests: 1, window_secs: 60 }
"#,
    )
    .unwrap();
    let w = World::new();
    let g = w.governor(&cfg);
    let client = ip(3);

    let a = RequestFacts::new(client, "/v1/crm").with_header("x-tenant-id", "t1");
    let b = RequestFacts::new(client, "/v1/crm").with_header("x-tenant-id", "t2");
    g.admit(&a).unwrap();
    g.admit(&b).unwrap();
    assert!(g.admit(&a).is_err());

    let keys = g.admission().keys_for(&a);
    assert_eq!(keys, vec![WindowKey::general(client), WindowKey::tenant("t1", client)]);
}

#[test]
fn sql_in_query_is_rejected() {
    let w = World::new();
    let g = w.governor(&GatewayConfig::default());
    let facts = RequestFacts::new(ip(4), "/v1/crm/leads")
        .with_header("x-tenant-id", "t1")
        .with_query("q", SQLI);

    let err = g.admit(&facts).unwrap_err();
    assert!(matches!(err, GovernError::MaliciousInputDetected { .. }));
    assert_eq!(err.client_message(), "request rejected");
    assert_eq!(w.audit.count(AuditKind::MaliciousInput), 1);
}

#[test]
fn sql_in_user_agent_is_logged_not_rejected() {
    let w = World::new();
    let g = w.governor(&GatewayConfig::default());
    let facts = RequestFacts::new(ip(5), "/v1/crm/leads")
        .with_header("x-tenant-id", "t1")
        .with_header("User-Agent", SQLI);

    g.admit(&facts).unwrap();
    assert_eq!(w.audit.count(AuditKind::MaliciousInput), 0);
    assert_eq!(
        w.metrics
            .threat_matches
            .get(&[("family", "sql_injection"), ("action", "logged")]),
        1
    );
}

#[test]
fn scanner_families_and_locations() {
    let s = ThreatScanner::new(&ScanSection::default()).unwrap();

    assert_eq!(s.classify(SQLI), Some(ThreatFamily::SqlInjection));
    assert_eq!(s.classify("1 UNION SELECT password"), Some(ThreatFamily::SqlInjection));
    assert_eq!(s.classify("<script>alert(1)</script>"), Some(ThreatFamily::MarkupInjection));
    assert_eq!(s.classify("../../etc/passwd"), Some(ThreatFamily::PathTraversal));
    assert_eq!(s.classify("a\0b"), Some(ThreatFamily::NullByte));
    assert_eq!(s.classify("O'Reilly & Sons"), None);
    assert_eq!(s.classify("union station"), None);

    let facts = RequestFacts::new(ip(6), "/v1/files/{id}").with_path_param("id", "..%2fsecret");
    match s.scan(&facts) {
        ScanVerdict::Reject(m) => {
            assert_eq!(m.family, ThreatFamily::PathTraversal);
            assert_eq!(m.location, ScanLocation::PathParam("id".into()));
        }
        other => panic!("expected reject, got {other:?}"),
    }

    let spoofed = RequestFacts::new(ip(6), "/v1/crm").with_header("x-tenant-id", "t1' OR 1=1 --");
    assert!(matches!(s.scan(&spoofed), ScanVerdict::Reject(_)));
}

#[test]
fn disabled_scanner_passes_everything() {
    let s = ThreatScanner::new(&ScanSection {
        enabled: false,
        ..ScanSection::default()
    })
    .unwrap();
    let facts = RequestFacts::new(ip(1), "/v1/x").with_query("q", SQLI);
    assert_eq!(s.scan(&facts), ScanVerdict::Clean);
}

#[test]
fn idle_windows_are_collected_past_the_key_limit() {
    let cfg = config::load_from_str(
        r#"
version: 1
admission:
  max_tracked_keys: 2
"#,
    )
    .unwrap();
    let w = World::new();
    let g = w.governor(&cfg);

    g.admit(&RequestFacts::new(ip(1), "/v1/a")).unwrap();
    g.admit(&RequestFacts::new(ip(2), "/v1/a")).unwrap();
    assert_eq!(g.admission().tracked_keys(), 2);

    w.clock.advance(Duration::from_secs(120));
    g.admit(&RequestFacts::new(ip(3), "/v1/a")).unwrap();
    assert_eq!(g.admission().tracked_keys(), 1);
}

#[test]
fn malicious_request_consumes_no_rate_budget() {
    let cfg = config::load_from_str(
        r#"
version: 1
admission:
  general: { max_requests: 2, window_secs: 60 }
"#,
    )
    .unwrap();
    let w = World::new();
    let g = w.governor(&cfg);
    let client = ip(8);

    let bad = RequestFacts::new(client, "/v1/crm/leads").with_query("q", SQLI);
    for _ in 0..3 {
        assert!(matches!(
            g.admit(&bad),
            Err(GovernError::MaliciousInputDetected { .. })
        ));
    }

    let good = RequestFacts::new(client, "/v1/crm/leads");
    g.admit(&good).unwrap();
    g.admit(&good).unwrap();
    assert!(matches!(
        g.admit(&good),
        Err(GovernError::RateLimitExceeded { .. })
    ));
    // Once the window is full, floods are throttled before the scan runs.
    assert!(matches!(
        g.admit(&bad),
        Err(GovernError::RateLimitExceeded { .. })
    ));
}
