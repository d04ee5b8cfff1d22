#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;

use tenantguard_core::{Action, GovernError, Module, Outcome, Permission, Result};
use tenantguard_gateway::config::GatewayConfig;
use tenantguard_gateway::context::{Principal, RequestFacts};
use tenantguard_gateway::dispatch::{Dispatcher, Handler, Request, RequestKind};
use tenantguard_gateway::CallSpec;

mod support;
use support::*;

struct CreateLead {
    name: String,
}

impl Request for CreateLead {
    type Output = String;
    const KIND: RequestKind = RequestKind::Command;
}

struct CountLeads;

impl Request for CountLeads {
    type Output = u64;
    const KIND: RequestKind = RequestKind::Query;
}

struct Tagged(&'static str);

#[async_trait]
impl Handler<CreateLead> for Tagged {
    async fn handle(&self, req: CreateLead) -> Result<Outcome<String>> {
        if req.name.trim().is_empty() {
            return Ok(Outcome::failure_with(
                "validation failed",
                vec!["name: required".into()],
            ));
        }
        Ok(Outcome::success(format!("{}:{}", self.0, req.name)))
    }
}

struct Broken;

#[async_trait]
impl Handler<CountLeads> for Broken {
    async fn handle(&self, _req: CountLeads) -> Result<Outcome<u64>> {
        Err(GovernError::HandlerFailed {
            request: "CountLeads",
            reason: "store offline".into(),
        })
    }
}

struct Panicky;

#[async_trait]
impl Handler<CountLeads> for Panicky {
    async fn handle(&self, _req: CountLeads) -> Result<Outcome<u64>> {
        panic!("boom");
    }
}

#[tokio::test]
async fn routes_by_request_type_and_last_registration_wins() {
    let d = Dispatcher::default();
    d.register::<CreateLead>(Arc::new(Tagged("first")));
    d.register::<CreateLead>(Arc::new(Tagged("second")));

    assert!(d.is_registered::<CreateLead>());
    assert!(!d.is_registered::<CountLeads>());
    assert_eq!(d.registered().len(), 1);

    let out = d.dispatch(CreateLead { name: "acme".into() }).await.unwrap();
    assert_eq!(out.value().map(String::as_str), Some("second:acme"));
}

#[tokio::test]
async fn unregistered_request_is_an_error() {
    let d = Dispatcher::default();
    let err = d.dispatch(CountLeads).await.unwrap_err();
    assert!(matches!(err, GovernError::NoHandlerRegistered(name) if name.ends_with("CountLeads")));
}

#[tokio::test]
async fn handled_failure_is_returned_unchanged() {
    let d = Dispatcher::default();
    d.register::<CreateLead>(Arc::new(Tagged("h")));

    let out = d.dispatch(CreateLead { name: " ".into() }).await.unwrap();
    assert!(out.is_failure());
    assert_eq!(out.sub_errors(), ["name: required".to_string()]);
}

#[tokio::test]
async fn handler_error_propagates() {
    let d = Dispatcher::default();
    d.register::<CountLeads>(Arc::new(Broken));
    assert!(matches!(
        d.dispatch(CountLeads).await,
        Err(GovernError::HandlerFailed { .. })
    ));
}

#[tokio::test]
async fn handler_panic_is_reraised() {
    let d = Arc::new(Dispatcher::default());
    d.register::<CountLeads>(Arc::new(Panicky));

    let task = {
        let d = Arc::clone(&d);
        tokio::spawn(async move { d.dispatch(CountLeads).await })
    };
    let joined = task.await;
    assert!(joined.unwrap_err().is_panic());
}

#[tokio::test]
async fn execute_governs_before_dispatch() {
    let w = World::new();
    w.membership.upsert_grant(member(
        "u1",
        "t1",
        Some(role("t1", "sales", &["crm:view", "crm:create"])),
    ));
    let g = w.governor(&GatewayConfig::default());
    g.dispatcher().register::<CreateLead>(Arc::new(Tagged("crm")));

    let facts = RequestFacts::new(ip(9), "/v1/crm/leads").with_header("x-tenant-id", "t1");
    let create = CallSpec::permission(Permission::new(Module::Crm, Action::Create));

    let out = g
        .execute(&facts, &Principal::user("u1"), &create, CreateLead { name: "acme".into() })
        .await
        .unwrap();
    assert_eq!(out.value().map(String::as_str), Some("crm:acme"));

    let delete = CallSpec::permission(Permission::new(Module::Crm, Action::Delete));
    let err = g
        .execute(&facts, &Principal::user("u1"), &delete, CreateLead { name: "acme".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, GovernError::PermissionDenied { .. }));

    let no_tenant = RequestFacts::new(ip(9), "/v1/crm/leads");
    let err = g
        .execute(&no_tenant, &Principal::user("u1"), &create, CreateLead { name: "x".into() })
        .await
        .unwrap_err();
    assert_eq!(err, GovernError::MissingTenantContext);

    assert_eq!(
        w.metrics
            .dispatch_outcomes
            .get(&[("request", std::any::type_name::<CreateLead>()), ("result", "success")]),
        1
    );
}
