//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use tenantguard_gateway::clock::ManualClock;
use tenantguard_gateway::config::GatewayConfig;
use tenantguard_gateway::directory::{
    InMemoryDirectory, InMemoryMembership, InMemoryUsage, PlanRecord, RoleRecord,
    SubscriptionRecord, SubscriptionStatus, TenantRecord, UserGrant,
};
use tenantguard_gateway::obs::{GovernanceMetrics, MemoryAuditSink};
use tenantguard_gateway::{Collaborators, Governor};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

pub fn tenant(id: &str, active: bool) -> TenantRecord {
    TenantRecord {
        id: id.into(),
        name: format!("{id} inc"),
        is_active: active,
    }
}

pub fn subscription(tenant_id: &str, plan_id: &str, status: SubscriptionStatus) -> SubscriptionRecord {
    SubscriptionRecord {
        id: format!("sub-{tenant_id}"),
        tenant_id: tenant_id.into(),
        plan_id: plan_id.into(),
        status,
        ends_at: Some(epoch() + ChronoDuration::days(30)),
        trial_ends_at: None,
    }
}

pub fn plan(id: &str, max_users: Option<u64>, features: &[&str]) -> PlanRecord {
    PlanRecord {
        id: id.into(),
        name: id.to_uppercase(),
        max_users,
        max_projects: Some(10),
        features: features.iter().map(|f| f.to_string()).collect(),
    }
}

pub fn role(tenant_id: &str, name: &str, permissions: &[&str]) -> RoleRecord {
    RoleRecord {
        id: format!("role-{name}"),
        tenant_id: tenant_id.into(),
        name: name.into(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        active: true,
    }
}

pub fn member(user_id: &str, tenant_id: &str, role: Option<RoleRecord>) -> UserGrant {
    UserGrant {
        user_id: user_id.into(),
        tenant_id: tenant_id.into(),
        role,
        custom_permissions: Vec::new(),
        active: true,
        owner: false,
        username: None,
        email: None,
    }
}

/// Collaborators plus the observers tests assert on.
pub struct World {
    pub directory: Arc<InMemoryDirectory>,
    pub membership: Arc<InMemoryMembership>,
    pub usage: Arc<InMemoryUsage>,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<MemoryAuditSink>,
    pub metrics: Arc<GovernanceMetrics>,
}

impl World {
    /// One active tenant `t1` on plan `basic` (5 users, crm only).
    pub fn new() -> Self {
        let w = Self {
            directory: Arc::new(InMemoryDirectory::new()),
            membership: Arc::new(InMemoryMembership::new()),
            usage: Arc::new(InMemoryUsage::new()),
            clock: Arc::new(ManualClock::starting_at(epoch())),
            audit: Arc::new(MemoryAuditSink::new()),
            metrics: Arc::new(GovernanceMetrics::default()),
        };
        w.directory.upsert_tenant(tenant("t1", true));
        w.directory.upsert_plan(plan("basic", Some(5), &["crm"]));
        w.directory
            .add_subscription(subscription("t1", "basic", SubscriptionStatus::Active));
        w
    }

    pub fn deps(&self) -> Collaborators {
        Collaborators {
            directory: self.directory.clone(),
            membership: self.membership.clone(),
            usage: self.usage.clone(),
        }
    }

    pub fn governor(&self, cfg: &GatewayConfig) -> Governor {
        Governor::new(
            cfg,
            self.deps(),
            self.clock.clone(),
            self.audit.clone(),
            self.metrics.clone(),
        )
        .unwrap()
    }
}
