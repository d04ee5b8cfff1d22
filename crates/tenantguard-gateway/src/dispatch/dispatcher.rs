use std::any::{Any, TypeId};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;

use tenantguard_core::error::{GovernError, Result};
use tenantguard_core::Outcome;

use crate::obs::GovernanceMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Command,
    Query,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Command => "command",
            RequestKind::Query => "query",
        }
    }
}

/// An immutable command or query. The concrete type is the routing key.
pub trait Request: Send + 'static {
    type Output: Send + 'static;
    const KIND: RequestKind;
}

/// Business handler for one request type.
///
/// `Ok(Outcome::Failure { .. })` is a handled failure; `Err(_)` is a fault the
/// dispatcher logs and propagates.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, req: R) -> Result<Outcome<R::Output>>;
}

struct Registered {
    name: &'static str,
    // Always an `Arc<dyn Handler<R>>` for the `R` whose TypeId keys this entry.
    handler: Box<dyn Any + Send + Sync>,
}

/// Registry of handlers keyed by request type.
///
/// Populated at startup; registering a type twice replaces the earlier handler.
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<TypeId, Registered>,
    metrics: Arc<GovernanceMetrics>,
}

impl Dispatcher {
    pub fn new(metrics: Arc<GovernanceMetrics>) -> Self {
        Self {
            handlers: DashMap::new(),
            metrics,
        }
    }

    pub fn register<R: Request>(&self, handler: Arc<dyn Handler<R>>) {
        let name = std::any::type_name::<R>();
        let previous = self.handlers.insert(
            TypeId::of::<R>(),
            Registered {
                name,
                handler: Box::new(handler),
            },
        );
        if previous.is_some() {
            tracing::debug!(request = name, "handler replaced");
        }
    }

    pub fn is_registered<R: Request>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<R>())
    }

    pub fn registered(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.iter().map(|e| e.value().name).collect();
        names.sort_unstable();
        names
    }

    /// Route `req` to its handler and return the handler's outcome unchanged.
    ///
    /// A handler panic is logged with the request type and resumed, so it is never
    /// mistaken for a handled failure.
    pub async fn dispatch<R: Request>(&self, req: R) -> Result<Outcome<R::Output>> {
        let name = std::any::type_name::<R>();
        let handler = self.lookup::<R>()?;

        let started = Instant::now();
        let result = AssertUnwindSafe(handler.handle(req)).catch_unwind().await;
        self.metrics
            .dispatch_duration
            .observe(&[("request", name)], started.elapsed());

        match result {
            Ok(Ok(outcome)) => {
                let status = if outcome.is_success() { "success" } else { "failure" };
                self.metrics
                    .dispatch_outcomes
                    .inc(&[("request", name), ("result", status)]);
                Ok(outcome)
            }
            Ok(Err(e)) => {
                self.metrics
                    .dispatch_outcomes
                    .inc(&[("request", name), ("result", "error")]);
                tracing::error!(request = name, kind = R::KIND.as_str(), error = %e, "handler failed");
                Err(e)
            }
            Err(panic) => {
                self.metrics
                    .dispatch_outcomes
                    .inc(&[("request", name), ("result", "panic")]);
                tracing::error!(request = name, kind = R::KIND.as_str(), "handler panicked");
                std::panic::resume_unwind(panic)
            }
        }
    }

    fn lookup<R: Request>(&self) -> Result<Arc<dyn Handler<R>>> {
        let name = std::any::type_name::<R>();
        let entry = self.handlers.get(&TypeId::of::<R>()).ok_or_else(|| {
            self.metrics
                .dispatch_outcomes
                .inc(&[("request", name), ("result", "unregistered")]);
            tracing::error!(request = name, "no handler registered");
            GovernError::NoHandlerRegistered(name)
        })?;

        entry
            .value()
            .handler
            .downcast_ref::<Arc<dyn Handler<R>>>()
            .cloned()
            .ok_or_else(|| GovernError::Internal(format!("handler type mismatch for {name}")))
    }
}
