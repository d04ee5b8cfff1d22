#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use futures_util::future::join_all;

use tenantguard_core::{Action, GovernError, Module, Permission};
use tenantguard_gateway::config::{self, GatewayConfig};
use tenantguard_gateway::context::Principal;
use tenantguard_gateway::directory::{CappedResource, SubscriptionStatus};
use tenantguard_gateway::obs::AuditKind;
use tenantguard_gateway::CallSpec;

mod support;
use support::*;

#[tokio::test]
async fn resolves_active_tenant_and_caches_it() {
    let w = World::new();
    let g = w.governor(&GatewayConfig::default());

    let first = g.gate().resolve("t1").await.unwrap();
    assert_eq!(first.tenant_id(), "t1");
    assert_eq!(first.plan_id(), "basic");
    assert_eq!(first.status(), SubscriptionStatus::Active);
    assert_eq!(first.cap(CappedResource::Users), Some(5));
    assert!(first.has_feature(Module::Crm));

    let second = g.gate().resolve("t1").await.unwrap();
    assert_eq!(*first, *second);
    assert_eq!(
        serde_json::to_vec(&*first).unwrap(),
        serde_json::to_vec(&*second).unwrap()
    );
    assert_eq!(w.directory.tenant_lookups(), 1);
    assert_eq!(g.gate().cache().len(), 1);
}

#[tokio::test]
async fn expired_cache_entry_is_refetched() {
    let w = World::new();
    let g = w.governor(&GatewayConfig::default());

    g.gate().resolve("t1").await.unwrap();
    w.clock.advance(Duration::from_secs(299));
    g.gate().resolve("t1").await.unwrap();
    assert_eq!(w.directory.tenant_lookups(), 1);

    w.clock.advance(Duration::from_secs(2));
    g.gate().resolve("t1").await.unwrap();
    assert_eq!(w.directory.tenant_lookups(), 2);
}

#[tokio::test]
async fn deactivation_is_visible_after_invalidate() {
    let w = World::new();
    let g = w.governor(&GatewayConfig::default());
    g.gate().resolve("t1").await.unwrap();

    w.directory.upsert_tenant(tenant("t1", false));
    // Still served from cache until the TTL runs out or the entry is dropped.
    assert!(g.gate().resolve("t1").await.is_ok());

    assert!(g.gate().cache().invalidate("t1"));
    let err = g.gate().resolve("t1").await.unwrap_err();
    assert_eq!(err, GovernError::TenantInactive("t1".into()));
}

#[tokio::test]
async fn unknown_tenant_is_not_found_and_audited() {
    let w = World::new();
    let g = w.governor(&GatewayConfig::default());

    let err = g.gate().resolve("nope").await.unwrap_err();
    assert_eq!(err, GovernError::TenantNotFound("nope".into()));
    assert_eq!(w.audit.count(AuditKind::TenantRejected), 1);
    assert!(g.gate().cache().is_empty());
}

#[tokio::test]
async fn inactive_tenant_is_rejected_before_subscription() {
    let w = World::new();
    // No subscription at all: the inactive flag still wins.
    w.directory.upsert_tenant(tenant("t2", false));
    let g = w.governor(&GatewayConfig::default());

    let err = g.gate().resolve("t2").await.unwrap_err();
    assert_eq!(err, GovernError::TenantInactive("t2".into()));
}

#[tokio::test]
async fn subscription_states() {
    let w = World::new();
    w.directory.upsert_tenant(tenant("none", true));

    w.directory.upsert_tenant(tenant("cancelled", true));
    w.directory
        .add_subscription(subscription("cancelled", "basic", SubscriptionStatus::Cancelled));

    w.directory.upsert_tenant(tenant("lapsed", true));
    let mut lapsed = subscription("lapsed", "basic", SubscriptionStatus::Active);
    lapsed.ends_at = Some(epoch() - ChronoDuration::days(1));
    w.directory.add_subscription(lapsed);

    w.directory.upsert_tenant(tenant("ghost-plan", true));
    w.directory
        .add_subscription(subscription("ghost-plan", "ghost", SubscriptionStatus::Active));

    let g = w.governor(&GatewayConfig::default());

    assert_eq!(
        g.gate().resolve("none").await.unwrap_err(),
        GovernError::NoActiveSubscription("none".into())
    );
    assert!(matches!(
        g.gate().resolve("cancelled").await.unwrap_err(),
        GovernError::SubscriptionNotActive { status, .. } if status == "cancelled"
    ));
    assert_eq!(
        g.gate().resolve("lapsed").await.unwrap_err(),
        GovernError::SubscriptionExpired("lapsed".into())
    );
    assert_eq!(
        g.gate().resolve("ghost-plan").await.unwrap_err(),
        GovernError::PlanNotFound("ghost".into())
    );
    assert_eq!(w.audit.count(AuditKind::TenantRejected), 4);
}

#[tokio::test]
async fn usable_subscription_is_preferred_over_history() {
    let w = World::new();
    w.directory
        .add_subscription(subscription("t1", "basic", SubscriptionStatus::Cancelled));
    let g = w.governor(&GatewayConfig::default());

    let ctx = g.gate().resolve("t1").await.unwrap();
    assert_eq!(ctx.status(), SubscriptionStatus::Active);
}

#[tokio::test]
async fn trial_ends_at_its_trial_date() {
    let w = World::new();
    w.directory.upsert_tenant(tenant("trial", true));
    let mut sub = subscription("trial", "basic", SubscriptionStatus::Trial);
    sub.trial_ends_at = Some(epoch() + ChronoDuration::days(1));
    w.directory.add_subscription(sub);
    let g = w.governor(&GatewayConfig::default());

    let ctx = g.gate().resolve("trial").await.unwrap();
    assert!(ctx.is_trial());

    w.clock.advance(Duration::from_secs(2 * 24 * 3600));
    assert_eq!(
        g.gate().resolve("trial").await.unwrap_err(),
        GovernError::SubscriptionExpired("trial".into())
    );
}

#[tokio::test]
async fn slow_directory_is_unavailable_not_rejected() {
    let w = World::new();
    let cfg = config::load_from_str(
        r#"
version: 1
tenant:
  directory_timeout_ms: 50
"#,
    )
    .unwrap();
    let g = w.governor(&cfg);
    w.directory.set_latency(Some(Duration::from_millis(300)));

    let err = g.gate().resolve("t1").await.unwrap_err();
    assert!(matches!(err, GovernError::TenantDirectoryUnavailable(_)));
    assert!(err.is_retryable());
    assert!(g.gate().cache().is_empty());
    assert_eq!(w.audit.count(AuditKind::TenantRejected), 0);

    w.directory.set_latency(None);
    assert!(g.gate().resolve("t1").await.is_ok());
}

#[tokio::test]
async fn concurrent_misses_share_one_lookup() {
    let w = World::new();
    w.directory.set_latency(Some(Duration::from_millis(20)));
    let g = w.governor(&GatewayConfig::default());

    let results = join_all((0..16).map(|_| g.gate().resolve("t1"))).await;
    let contexts: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(w.directory.tenant_lookups(), 1);
    assert!(contexts.iter().all(|c| Arc::ptr_eq(c, &contexts[0])));
}

#[tokio::test]
async fn create_at_user_cap_is_rejected_but_listing_passes() {
    let w = World::new();
    w.usage.set("t1", CappedResource::Users, 5);
    w.membership.upsert_grant(member(
        "u1",
        "t1",
        Some(role("t1", "admin", &["users:view", "users:create"])),
    ));
    let g = w.governor(&GatewayConfig::default());
    let ctx = g.gate().resolve("t1").await.unwrap();
    let who = Principal::user("u1");

    let create = CallSpec::permission(Permission::new(Module::Users, Action::Create));
    let err = g.authorize(&ctx, &who, &create).await.unwrap_err();
    assert_eq!(
        err,
        GovernError::PlanLimitExceeded {
            resource: "users".into(),
            cap: 5,
            current: 5
        }
    );
    assert_eq!(w.audit.count(AuditKind::PlanLimitRejected), 1);

    let list = CallSpec::permission(Permission::new(Module::Users, Action::View));
    assert!(g.authorize(&ctx, &who, &list).await.is_ok());

    w.usage.set("t1", CappedResource::Users, 4);
    assert!(g.authorize(&ctx, &who, &create).await.is_ok());
}

#[tokio::test]
async fn gated_module_requires_plan_feature() {
    let w = World::new();
    let mut grant = member("u1", "t1", None);
    grant.owner = true;
    w.membership.upsert_grant(grant);
    let g = w.governor(&GatewayConfig::default());
    let ctx = g.gate().resolve("t1").await.unwrap();

    // Owners are not exempt from licensing; reads are gated too.
    let err = g
        .authorize(&ctx, &Principal::user("u1"), &CallSpec::module(Module::Banking))
        .await
        .unwrap_err();
    assert_eq!(err, GovernError::FeatureNotLicensed("banking".into()));

    // crm is in the plan and not gated anyway.
    assert!(g
        .authorize(&ctx, &Principal::user("u1"), &CallSpec::module(Module::Crm))
        .await
        .is_ok());

    w.directory
        .upsert_plan(plan("basic", Some(5), &["crm", "banking"]));
    g.gate().cache().clear();
    let ctx = g.gate().resolve("t1").await.unwrap();
    assert!(g
        .authorize(&ctx, &Principal::user("u1"), &CallSpec::module(Module::Banking))
        .await
        .is_ok());
}

#[tokio::test]
async fn unlimited_plan_skips_usage() {
    let w = World::new();
    w.directory.upsert_plan(plan("basic", None, &["crm"]));
    w.usage.set("t1", CappedResource::Users, 10_000);
    let mut grant = member("u1", "t1", None);
    grant.owner = true;
    w.membership.upsert_grant(grant);
    let g = w.governor(&GatewayConfig::default());
    let ctx = g.gate().resolve("t1").await.unwrap();

    let create = CallSpec::permission(Permission::new(Module::Users, Action::Create));
    assert!(g.authorize(&ctx, &Principal::user("u1"), &create).await.is_ok());
}

#[tokio::test]
async fn non_member_never_sees_plan_usage() {
    let w = World::new();
    w.usage.set("t1", CappedResource::Users, 5);
    let g = w.governor(&GatewayConfig::default());
    let ctx = g.gate().resolve("t1").await.unwrap();

    let create = CallSpec::permission(Permission::new(Module::Users, Action::Create));
    let err = g
        .authorize(&ctx, &Principal::user("stranger"), &create)
        .await
        .unwrap_err();
    assert_eq!(err, GovernError::NotATenantMember("t1".into()));
    assert!(!err.client_message().contains('5'));
    assert_eq!(w.audit.count(AuditKind::PermissionDenied), 1);
    assert_eq!(w.audit.count(AuditKind::PlanLimitRejected), 0);
}

#[tokio::test]
async fn cancelled_lookup_leaves_no_pending_entry() {
    let w = World::new();
    w.directory.set_latency(Some(Duration::from_millis(200)));
    let g = w.governor(&GatewayConfig::default());

    let abandoned = tokio::time::timeout(Duration::from_millis(20), g.gate().resolve("t1")).await;
    assert!(abandoned.is_err());
    assert_eq!(g.gate().pending_lookups(), 0);
    assert!(g.gate().cache().is_empty());

    w.directory.set_latency(None);
    g.gate().resolve("t1").await.unwrap();
    assert_eq!(g.gate().pending_lookups(), 0);
}
