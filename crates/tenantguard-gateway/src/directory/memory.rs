//! In-process collaborators backed by `DashMap`.
//!
//! Used by the integration tests and by the binary when `dev_fixtures` is set.

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use tenantguard_core::error::{GovernError, Result};
use tenantguard_core::RoleTemplate;

use super::{
    CappedResource, MembershipStore, PlanRecord, RoleRecord, SubscriptionRecord,
    TenantDirectory, TenantRecord, UsageCounters, UserGrant,
};

#[derive(Default)]
pub struct InMemoryDirectory {
    tenants: DashMap<String, TenantRecord>,
    subscriptions: DashMap<String, Vec<SubscriptionRecord>>,
    plans: DashMap<String, PlanRecord>,
    latency: Mutex<Option<Duration>>,
    tenant_lookups: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_tenant(&self, tenant: TenantRecord) {
        self.tenants.insert(tenant.id.clone(), tenant);
    }

    pub fn add_subscription(&self, sub: SubscriptionRecord) {
        self.subscriptions
            .entry(sub.tenant_id.clone())
            .or_default()
            .push(sub);
    }

    /// Replace every subscription of a tenant with `sub`.
    pub fn set_subscription(&self, sub: SubscriptionRecord) {
        self.subscriptions.insert(sub.tenant_id.clone(), vec![sub]);
    }

    pub fn upsert_plan(&self, plan: PlanRecord) {
        self.plans.insert(plan.id.clone(), plan);
    }

    /// Delay every lookup, simulating a slow backend.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Number of `tenant_by_id` calls served so far.
    pub fn tenant_lookups(&self) -> u64 {
        self.tenant_lookups.load(Ordering::Relaxed)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn tenant_by_id(&self, tenant_id: &str) -> Result<Option<TenantRecord>> {
        self.tenant_lookups.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        Ok(self.tenants.get(tenant_id).map(|t| t.value().clone()))
    }

    /// Prefers a trial/active subscription; otherwise returns the most recent one
    /// so the gate can report *why* it is unusable.
    async fn active_or_trial_subscription(
        &self,
        tenant_id: &str,
    ) -> Result<Option<SubscriptionRecord>> {
        self.simulate_latency().await;
        let Some(subs) = self.subscriptions.get(tenant_id) else {
            return Ok(None);
        };
        let usable = subs.iter().rev().find(|s| s.status.is_usable());
        Ok(usable.or_else(|| subs.last()).cloned())
    }

    async fn plan_by_id(&self, plan_id: &str) -> Result<Option<PlanRecord>> {
        self.simulate_latency().await;
        Ok(self.plans.get(plan_id).map(|p| p.value().clone()))
    }
}

/// Grants keyed by `(tenant_id, user_id)`.
#[derive(Default)]
pub struct InMemoryMembership {
    grants: DashMap<(String, String), UserGrant>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_grant(&self, grant: UserGrant) {
        self.grants
            .insert((grant.tenant_id.clone(), grant.user_id.clone()), grant);
    }

    pub fn remove_grant(&self, tenant_id: &str, user_id: &str) {
        self.grants
            .remove(&(tenant_id.to_string(), user_id.to_string()));
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembership {
    async fn active_grant(&self, user_id: &str, tenant_id: &str) -> Result<Option<UserGrant>> {
        Ok(self
            .grants
            .get(&(tenant_id.to_string(), user_id.to_string()))
            .map(|g| g.value().clone())
            .filter(|g| g.active))
    }

    async fn grants_for_tenant(&self, tenant_id: &str) -> Result<Vec<UserGrant>> {
        Ok(self
            .grants
            .iter()
            .filter(|e| e.key().0 == tenant_id)
            .map(|e| e.value().clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryUsage {
    counts: DashMap<(String, CappedResource), u64>,
}

impl InMemoryUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tenant_id: &str, resource: CappedResource, count: u64) {
        self.counts.insert((tenant_id.to_string(), resource), count);
    }
}

#[async_trait]
impl UsageCounters for InMemoryUsage {
    async fn current_count(&self, tenant_id: &str, resource: CappedResource) -> Result<u64> {
        Ok(self
            .counts
            .get(&(tenant_id.to_string(), resource))
            .map(|c| *c.value())
            .unwrap_or(0))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageFixture {
    pub tenant_id: String,
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub projects: u64,
}

/// A membership as written in a fixture file. The role is either spelled out
/// (`role`) or copied from a template (`role_template: crm_manager`).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantFixture {
    pub user_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub role: Option<RoleRecord>,
    #[serde(default)]
    pub role_template: Option<RoleTemplate>,
    #[serde(default)]
    pub custom_permissions: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl GrantFixture {
    pub fn into_grant(self) -> UserGrant {
        let tenant_id = self.tenant_id;
        let role = self
            .role
            .or_else(|| self.role_template.map(|t| RoleRecord::from_template(&tenant_id, t)));
        UserGrant {
            user_id: self.user_id,
            tenant_id,
            role,
            custom_permissions: self.custom_permissions,
            active: self.active,
            owner: self.owner,
            username: self.username,
            email: self.email,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Seed data for the in-memory collaborators.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixtures {
    #[serde(default)]
    pub tenants: Vec<TenantRecord>,
    #[serde(default)]
    pub plans: Vec<PlanRecord>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
    #[serde(default)]
    pub grants: Vec<GrantFixture>,
    #[serde(default)]
    pub usage: Vec<UsageFixture>,
}

impl Fixtures {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let s = fs::read_to_string(path)
            .map_err(|e| GovernError::Config(format!("read fixtures failed ({path}): {e}")))?;
        Self::load_from_str(&s)
    }

    pub fn load_from_str(s: &str) -> Result<Self> {
        let fixtures: Fixtures = serde_yaml::from_str(s)
            .map_err(|e| GovernError::Config(format!("invalid fixtures yaml: {e}")))?;
        fixtures.validate()?;
        Ok(fixtures)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(g) = self
            .grants
            .iter()
            .find(|g| g.role.is_some() && g.role_template.is_some())
        {
            return Err(GovernError::Config(format!(
                "grant {}@{}: set either role or role_template, not both",
                g.user_id, g.tenant_id
            )));
        }
        Ok(())
    }

    pub fn into_stores(self) -> (InMemoryDirectory, InMemoryMembership, InMemoryUsage) {
        let directory = InMemoryDirectory::new();
        let membership = InMemoryMembership::new();
        let usage = InMemoryUsage::new();

        for t in self.tenants {
            directory.upsert_tenant(t);
        }
        for p in self.plans {
            directory.upsert_plan(p);
        }
        for s in self.subscriptions {
            directory.add_subscription(s);
        }
        for g in self.grants {
            membership.upsert_grant(g.into_grant());
        }
        for u in self.usage {
            usage.set(&u.tenant_id, CappedResource::Users, u.users);
            usage.set(&u.tenant_id, CappedResource::Projects, u.projects);
        }

        (directory, membership, usage)
    }
}
