use std::collections::BTreeSet;
use std::sync::Arc;

use tenantguard_core::error::{GovernError, Result};
use tenantguard_core::{Action, Module};

use crate::clock::Clock;
use crate::context::TenantContext;
use crate::directory::{CappedResource, UsageCounters};
use crate::obs::{AuditEvent, AuditKind, AuditSink, GovernanceMetrics};

/// What a call does to its resource. Only `Create` is ever capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn from_action(action: Action) -> Self {
        match action {
            Action::View | Action::Export => OperationKind::Read,
            Action::Create => OperationKind::Create,
            Action::Update | Action::Approve | Action::Manage => OperationKind::Update,
            Action::Delete => OperationKind::Delete,
        }
    }

    pub fn is_read_only(self) -> bool {
        self == OperationKind::Read
    }
}

/// Plan-limit check: feature licensing for gated modules, numeric caps for creates.
pub struct PlanLimitGuard {
    usage: Arc<dyn UsageCounters>,
    gated: BTreeSet<Module>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<GovernanceMetrics>,
}

impl PlanLimitGuard {
    pub fn new(
        usage: Arc<dyn UsageCounters>,
        gated: impl IntoIterator<Item = Module>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<GovernanceMetrics>,
    ) -> Self {
        Self {
            usage,
            gated: gated.into_iter().collect(),
            clock,
            audit,
            metrics,
        }
    }

    pub fn is_gated(&self, module: Module) -> bool {
        self.gated.contains(&module)
    }

    /// A gated module missing from `plan.features` fails for reads and writes alike.
    pub fn check_feature(&self, ctx: &TenantContext, module: Module) -> Result<()> {
        if self.is_gated(module) && !ctx.has_feature(module) {
            return Err(self.reject(
                ctx,
                GovernError::FeatureNotLicensed(module.as_str().to_string()),
            ));
        }
        Ok(())
    }

    /// Compare current usage against the plan cap. Reads are never capped and
    /// unlimited caps skip the counter lookup entirely.
    pub async fn check_capacity(
        &self,
        ctx: &TenantContext,
        kind: OperationKind,
        resource: CappedResource,
    ) -> Result<()> {
        if kind != OperationKind::Create {
            return Ok(());
        }
        let Some(cap) = ctx.cap(resource) else {
            return Ok(());
        };

        let current = self.usage.current_count(ctx.tenant_id(), resource).await?;
        if current >= cap {
            return Err(self.reject(
                ctx,
                GovernError::PlanLimitExceeded {
                    resource: resource.as_str().to_string(),
                    cap,
                    current,
                },
            ));
        }

        self.metrics.plan_checks.inc(&[("result", "pass")]);
        Ok(())
    }

    pub async fn check(
        &self,
        ctx: &TenantContext,
        module: Option<Module>,
        kind: OperationKind,
        resource: Option<CappedResource>,
    ) -> Result<()> {
        if let Some(module) = module {
            self.check_feature(ctx, module)?;
        }
        if let Some(resource) = resource {
            self.check_capacity(ctx, kind, resource).await?;
        }
        Ok(())
    }

    fn reject(&self, ctx: &TenantContext, err: GovernError) -> GovernError {
        self.metrics.plan_checks.inc(&[("result", "rejected")]);
        tracing::warn!(tenant = %ctx.tenant_id(), plan = %ctx.plan_id(), reason = %err, "plan check rejected");
        self.audit.emit(
            AuditEvent::new(AuditKind::PlanLimitRejected, err.to_string(), self.clock.wall())
                .tenant(ctx.tenant_id()),
        );
        err
    }
}
