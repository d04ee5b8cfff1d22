use std::fmt;
use std::sync::Arc;

use tenantguard_core::error::{GovernError, Result};
use tenantguard_core::{Module, Permission};

use crate::clock::Clock;
use crate::context::Principal;
use crate::directory::{MembershipStore, UserGrant};
use crate::obs::{AuditEvent, AuditKind, AuditSink, GovernanceMetrics};

use super::effective::EffectivePermissionSet;

/// What a protected operation requires. Supplied by the route, never by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Permission(Permission),
    /// Any action within the module.
    Module(Module),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Permission(p) => write!(f, "{p}"),
            Requirement::Module(m) => write!(f, "{m}:*"),
        }
    }
}

/// Why access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantedBy {
    Owner,
    Permissions,
}

/// Identity attribute checked for uniqueness within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Username,
    Email,
}

pub struct PermissionResolver {
    store: Arc<dyn MembershipStore>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<GovernanceMetrics>,
}

impl PermissionResolver {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<GovernanceMetrics>,
    ) -> Self {
        Self {
            store,
            clock,
            audit,
            metrics,
        }
    }

    async fn grant(&self, user_id: &str, tenant_id: &str) -> Result<UserGrant> {
        match self.store.active_grant(user_id, tenant_id).await? {
            Some(g) => Ok(g),
            None => {
                let err = GovernError::NotATenantMember(tenant_id.to_string());
                self.deny(user_id, tenant_id, &err);
                Err(err)
            }
        }
    }

    /// Effective permissions for the user's active membership.
    pub async fn effective_permissions(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<EffectivePermissionSet> {
        let grant = self.grant(user_id, tenant_id).await?;
        Ok(EffectivePermissionSet::from_grant(&grant))
    }

    /// Decide one requirement for `(user, tenant)`.
    pub async fn authorize(
        &self,
        user_id: &str,
        tenant_id: &str,
        requirement: Requirement,
    ) -> Result<GrantedBy> {
        let grant = self.grant(user_id, tenant_id).await?;

        if grant.owner {
            self.metrics
                .permission_decisions
                .inc(&[("result", "granted"), ("via", "owner")]);
            tracing::debug!(tenant = %tenant_id, user = %user_id, required = %requirement, "owner override");
            return Ok(GrantedBy::Owner);
        }

        let effective = EffectivePermissionSet::from_grant(&grant);
        let allowed = match requirement {
            Requirement::Permission(p) => effective.allows(p),
            Requirement::Module(m) => effective.allows_module(m),
        };

        if !allowed {
            let err = GovernError::PermissionDenied {
                required: requirement.to_string(),
                role: grant.role_name().to_string(),
            };
            self.deny(user_id, tenant_id, &err);
            return Err(err);
        }

        self.metrics
            .permission_decisions
            .inc(&[("result", "granted"), ("via", "permissions")]);
        Ok(GrantedBy::Permissions)
    }

    pub async fn check_permission(
        &self,
        user_id: &str,
        tenant_id: &str,
        permission: Permission,
    ) -> Result<GrantedBy> {
        self.authorize(user_id, tenant_id, Requirement::Permission(permission))
            .await
    }

    pub async fn check_module(
        &self,
        user_id: &str,
        tenant_id: &str,
        module: Module,
    ) -> Result<GrantedBy> {
        self.authorize(user_id, tenant_id, Requirement::Module(module))
            .await
    }

    /// True when no active member of the tenant already uses `value`
    /// (case-insensitive). Read-only; used by onboarding flows.
    pub async fn is_identity_available(
        &self,
        tenant_id: &str,
        field: IdentityField,
        value: &str,
    ) -> Result<bool> {
        let wanted = value.trim();
        let taken = self
            .store
            .grants_for_tenant(tenant_id)
            .await?
            .iter()
            .filter(|g| g.active)
            .filter_map(|g| match field {
                IdentityField::Username => g.username.as_deref(),
                IdentityField::Email => g.email.as_deref(),
            })
            .any(|existing| existing.trim().eq_ignore_ascii_case(wanted));
        Ok(!taken)
    }

    fn deny(&self, user_id: &str, tenant_id: &str, err: &GovernError) {
        self.metrics
            .permission_decisions
            .inc(&[("result", "denied"), ("via", "none")]);
        tracing::warn!(tenant = %tenant_id, user = %user_id, reason = %err, "permission denied");
        self.audit.emit(
            AuditEvent::new(AuditKind::PermissionDenied, err.to_string(), self.clock.wall())
                .tenant(tenant_id)
                .user(user_id),
        );
    }
}

/// System-level gate for operations outside any single tenant (provisioning,
/// cross-tenant support). Tenant ownership does not satisfy it, and it does
/// not satisfy tenant permission checks.
pub fn require_super_admin(principal: &Principal) -> Result<()> {
    if principal.super_admin {
        Ok(())
    } else {
        Err(GovernError::PermissionDenied {
            required: "system:super_admin".to_string(),
            role: "none".to_string(),
        })
    }
}
