//! External collaborators consulted by the governance layer.
//!
//! The gateway never owns tenant, membership, or usage data; it reads them
//! through these traits. `memory` provides in-process implementations for
//! tests and local runs.

pub mod memory;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantguard_core::error::Result;
use tenantguard_core::RoleTemplate;

pub use memory::{Fixtures, GrantFixture, InMemoryDirectory, InMemoryMembership, InMemoryUsage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn is_usable(self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: String,
    pub tenant_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    /// The moment this subscription stops being usable, if any.
    /// Trials end at `trial_ends_at` unless an explicit earlier end date exists.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        match (self.status, self.ends_at, self.trial_ends_at) {
            (SubscriptionStatus::Trial, Some(end), Some(trial)) => Some(end.min(trial)),
            (SubscriptionStatus::Trial, None, Some(trial)) => Some(trial),
            (_, end, _) => end,
        }
    }
}

/// Plan caps. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub max_users: Option<u64>,
    #[serde(default)]
    pub max_projects: Option<u64>,
    #[serde(default)]
    pub features: BTreeSet<String>,
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_by_id(&self, tenant_id: &str) -> Result<Option<TenantRecord>>;
    async fn active_or_trial_subscription(
        &self,
        tenant_id: &str,
    ) -> Result<Option<SubscriptionRecord>>;
    async fn plan_by_id(&self, plan_id: &str) -> Result<Option<PlanRecord>>;
}

/// Tenant-scoped named bundle of permission strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl RoleRecord {
    /// Tenant-owned copy of a role template, active and editable.
    pub fn from_template(tenant_id: &str, template: RoleTemplate) -> Self {
        Self {
            id: format!("{tenant_id}:{}", template.name()),
            tenant_id: tenant_id.to_string(),
            name: template.name().to_string(),
            permissions: template
                .permissions()
                .iter()
                .map(|p| p.to_string())
                .collect(),
            active: true,
        }
    }
}

/// The role set a newly provisioned tenant starts with: one role per template.
pub fn default_roles(tenant_id: &str) -> Vec<RoleRecord> {
    RoleTemplate::ALL
        .into_iter()
        .map(|t| RoleRecord::from_template(tenant_id, t))
        .collect()
}

/// Membership of a user in a tenant (at most one active per tenant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrant {
    pub user_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub role: Option<RoleRecord>,
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

impl UserGrant {
    pub fn role_name(&self) -> &str {
        self.role.as_ref().map(|r| r.name.as_str()).unwrap_or("none")
    }
}

fn default_true() -> bool {
    true
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn active_grant(&self, user_id: &str, tenant_id: &str) -> Result<Option<UserGrant>>;
    /// All memberships of a tenant, active or not.
    async fn grants_for_tenant(&self, tenant_id: &str) -> Result<Vec<UserGrant>>;
}

/// Resources with a numeric plan cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CappedResource {
    Users,
    Projects,
}

impl CappedResource {
    pub fn as_str(self) -> &'static str {
        match self {
            CappedResource::Users => "users",
            CappedResource::Projects => "projects",
        }
    }
}

#[async_trait]
pub trait UsageCounters: Send + Sync {
    async fn current_count(&self, tenant_id: &str, resource: CappedResource) -> Result<u64>;
}
