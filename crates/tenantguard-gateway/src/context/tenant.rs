use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tenantguard_core::error::{GovernError, Result};
use tenantguard_core::Module;

use crate::directory::{CappedResource, PlanRecord, SubscriptionRecord, SubscriptionStatus, TenantRecord};

/// Resource caps copied from the plan. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanCaps {
    pub max_users: Option<u64>,
    pub max_projects: Option<u64>,
    pub features: BTreeSet<String>,
}

impl PlanCaps {
    pub fn cap(&self, resource: CappedResource) -> Option<u64> {
        match resource {
            CappedResource::Users => self.max_users,
            CappedResource::Projects => self.max_projects,
        }
    }
}

/// Validated tenant/subscription/plan snapshot for one request.
///
/// Only the tenant gate builds these, and only after the tenant is active and the
/// subscription usable, so holding one is proof that both checks passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    tenant_id: String,
    tenant_name: String,
    status: SubscriptionStatus,
    plan_id: String,
    caps: PlanCaps,
    trial_ends_at: Option<DateTime<Utc>>,
}

impl TenantContext {
    pub(crate) fn from_records(
        tenant: &TenantRecord,
        sub: &SubscriptionRecord,
        plan: &PlanRecord,
    ) -> Self {
        Self {
            tenant_id: tenant.id.clone(),
            tenant_name: tenant.name.clone(),
            status: sub.status,
            plan_id: plan.id.clone(),
            caps: PlanCaps {
                max_users: plan.max_users,
                max_projects: plan.max_projects,
                features: plan.features.clone(),
            },
            trial_ends_at: match sub.status {
                SubscriptionStatus::Trial => sub.trial_ends_at,
                _ => None,
            },
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }
    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }
    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }
    pub fn caps(&self) -> &PlanCaps {
        &self.caps
    }
    pub fn trial_ends_at(&self) -> Option<DateTime<Utc>> {
        self.trial_ends_at
    }
    pub fn is_trial(&self) -> bool {
        self.status == SubscriptionStatus::Trial
    }

    pub fn cap(&self, resource: CappedResource) -> Option<u64> {
        self.caps.cap(resource)
    }

    pub fn has_feature(&self, module: Module) -> bool {
        self.caps.features.contains(module.as_str())
    }
}

/// Pick the tenant identifier from the header or the verified token claim.
///
/// Blank values count as absent. When both are present they must agree.
pub fn extract_tenant_id(header: Option<&str>, claim: Option<&str>) -> Result<String> {
    let header = header.map(str::trim).filter(|s| !s.is_empty());
    let claim = claim.map(str::trim).filter(|s| !s.is_empty());

    match (header, claim) {
        (Some(h), Some(c)) if h != c => Err(GovernError::TenantMismatch),
        (Some(h), _) => Ok(h.to_string()),
        (None, Some(c)) => Ok(c.to_string()),
        (None, None) => Err(GovernError::MissingTenantContext),
    }
}
