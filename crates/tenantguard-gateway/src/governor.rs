//! Governance pipeline.
//!
//! Admission -> tenant gate -> permission resolver -> plan check -> dispatch.
//! Each stage returns a typed error and the first failure short-circuits; no
//! stage writes anything on the failure path except its audit event.

use std::sync::Arc;

use tenantguard_core::error::Result;
use tenantguard_core::{Module, Outcome, Permission};

use crate::admission::AdmissionController;
use crate::authz::{GrantedBy, PermissionResolver, Requirement};
use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::context::{extract_tenant_id, Principal, RequestFacts, TenantContext};
use crate::directory::{CappedResource, MembershipStore, TenantDirectory, UsageCounters};
use crate::dispatch::{Dispatcher, Request};
use crate::gate::{OperationKind, PlanLimitGuard, TenantGate};
use crate::obs::{AuditEvent, AuditKind, AuditSink, GovernanceMetrics};

/// Governance requirements of one protected operation, declared by the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSpec {
    pub requirement: Requirement,
    pub kind: OperationKind,
    pub capped: Option<CappedResource>,
}

impl CallSpec {
    /// Single-permission call. Creating users or projects is capped by the plan.
    pub fn permission(permission: Permission) -> Self {
        let kind = OperationKind::from_action(permission.action);
        let capped = match (permission.module, kind) {
            (Module::Users, OperationKind::Create) => Some(CappedResource::Users),
            (Module::Projects, OperationKind::Create) => Some(CappedResource::Projects),
            _ => None,
        };
        Self {
            requirement: Requirement::Permission(permission),
            kind,
            capped,
        }
    }

    /// Module-level read access (any permission within the module).
    pub fn module(module: Module) -> Self {
        Self {
            requirement: Requirement::Module(module),
            kind: OperationKind::Read,
            capped: None,
        }
    }

    /// Count this call against `resource` regardless of its module.
    pub fn capping(mut self, resource: CappedResource) -> Self {
        self.capped = Some(resource);
        self
    }

    pub fn module_name(&self) -> Module {
        match self.requirement {
            Requirement::Permission(p) => p.module,
            Requirement::Module(m) => m,
        }
    }
}

/// Result of a fully governed call: who, where, and why it was allowed.
#[derive(Debug, Clone)]
pub struct GovernedRequest {
    pub tenant: Arc<TenantContext>,
    pub user_id: String,
    pub granted_by: GrantedBy,
}

/// External collaborators the governor reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn TenantDirectory>,
    pub membership: Arc<dyn MembershipStore>,
    pub usage: Arc<dyn UsageCounters>,
}

/// Owns every piece of long-lived governance state (tenant cache, rate windows,
/// handler registry). Build one per process and share it.
pub struct Governor {
    admission: AdmissionController,
    gate: TenantGate,
    limits: PlanLimitGuard,
    resolver: PermissionResolver,
    dispatcher: Dispatcher,
    tenant_header: String,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<GovernanceMetrics>,
}

impl Governor {
    pub fn new(
        cfg: &GatewayConfig,
        deps: Collaborators,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<GovernanceMetrics>,
    ) -> Result<Self> {
        cfg.validate()?;

        let admission = AdmissionController::new(
            &cfg.admission,
            &cfg.tenant.header,
            Arc::clone(&clock),
            Arc::clone(&audit),
            Arc::clone(&metrics),
        )?;
        let gate = TenantGate::new(
            deps.directory,
            cfg.tenant.cache_ttl(),
            cfg.tenant.directory_timeout(),
            Arc::clone(&clock),
            Arc::clone(&audit),
            Arc::clone(&metrics),
        );
        let limits = PlanLimitGuard::new(
            deps.usage,
            cfg.tenant.gated_modules()?,
            Arc::clone(&clock),
            Arc::clone(&audit),
            Arc::clone(&metrics),
        );
        let resolver = PermissionResolver::new(
            deps.membership,
            Arc::clone(&clock),
            Arc::clone(&audit),
            Arc::clone(&metrics),
        );

        Ok(Self {
            admission,
            gate,
            limits,
            resolver,
            dispatcher: Dispatcher::new(Arc::clone(&metrics)),
            tenant_header: cfg.tenant.header.to_ascii_lowercase(),
            clock,
            audit,
            metrics,
        })
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }
    pub fn gate(&self) -> &TenantGate {
        &self.gate
    }
    pub fn limits(&self) -> &PlanLimitGuard {
        &self.limits
    }
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
    pub fn metrics(&self) -> &Arc<GovernanceMetrics> {
        &self.metrics
    }

    /// Stage 1: rate limits and threat scan.
    pub fn admit(&self, facts: &RequestFacts) -> Result<()> {
        self.admission.admit(facts)
    }

    /// Stage 2: tenant identifier extraction and resolution.
    pub async fn resolve_tenant(&self, facts: &RequestFacts) -> Result<Arc<TenantContext>> {
        let tenant_id =
            match extract_tenant_id(facts.header(&self.tenant_header), facts.tenant_claim()) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(client = %facts.client, path = %facts.path, reason = %e, "tenant context rejected");
                    self.audit.emit(
                        AuditEvent::new(AuditKind::TenantRejected, e.to_string(), self.clock.wall())
                            .client(facts.client),
                    );
                    return Err(e);
                }
            };
        self.gate.resolve(&tenant_id).await
    }

    /// Stages 3-4 for an already resolved tenant: membership and permissions
    /// first, so plan usage is only ever reported to members; then the plan
    /// check, which owners are subject to as well.
    pub async fn authorize(
        &self,
        tenant: &TenantContext,
        principal: &Principal,
        call: &CallSpec,
    ) -> Result<GrantedBy> {
        let granted_by = self
            .resolver
            .authorize(&principal.user_id, tenant.tenant_id(), call.requirement)
            .await?;
        self.limits
            .check(tenant, Some(call.module_name()), call.kind, call.capped)
            .await?;
        Ok(granted_by)
    }

    /// Run every governance stage for one inbound call.
    pub async fn govern(
        &self,
        facts: &RequestFacts,
        principal: &Principal,
        call: &CallSpec,
    ) -> Result<GovernedRequest> {
        self.admit(facts)?;
        let tenant = self.resolve_tenant(facts).await?;
        let granted_by = self.authorize(&tenant, principal, call).await?;

        tracing::debug!(
            tenant = %tenant.tenant_id(),
            user = %principal.user_id,
            required = %call.requirement,
            "request governed"
        );

        Ok(GovernedRequest {
            tenant,
            user_id: principal.user_id.clone(),
            granted_by,
        })
    }

    /// Govern, then hand `req` to its registered handler.
    pub async fn execute<R: Request>(
        &self,
        facts: &RequestFacts,
        principal: &Principal,
        call: &CallSpec,
        req: R,
    ) -> Result<Outcome<R::Output>> {
        self.govern(facts, principal, call).await?;
        self.dispatcher.dispatch(req).await
    }
}

impl std::fmt::Debug for Governor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governor")
            .field("tenant_header", &self.tenant_header)
            .field("cached_tenants", &self.gate.cache().len())
            .field("rate_windows", &self.admission.tracked_keys())
            .finish()
    }
}
