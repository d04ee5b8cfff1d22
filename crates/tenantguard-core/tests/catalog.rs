//! Permission catalog and role template tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeSet;

use tenantguard_core::{Action, Module, Permission, RoleTemplate};

#[test]
fn permission_parses_module_action() {
    let p: Permission = "crm:view".parse().unwrap();
    assert_eq!(p, Permission::new(Module::Crm, Action::View));
    assert_eq!(p.to_string(), "crm:view");
}

#[test]
fn permission_rejects_unknown_parts() {
    assert!("crm".parse::<Permission>().is_err());
    assert!("crm:fly".parse::<Permission>().is_err());
    assert!("casino:view".parse::<Permission>().is_err());
    assert!("CRM:view".parse::<Permission>().is_err());
}

#[test]
fn catalog_is_module_times_action() {
    let all = Permission::all();
    assert_eq!(all.len(), Module::ALL.len() * Action::ALL.len());
    let unique: BTreeSet<Permission> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len());
}

#[test]
fn permission_serializes_as_string() {
    let p = Permission::new(Module::Hrm, Action::Approve);
    let s = serde_json::to_string(&p).unwrap();
    assert_eq!(s, "\"hrm:approve\"");
    let back: Permission = serde_json::from_str(&s).unwrap();
    assert_eq!(back, p);

    let bad = serde_json::from_str::<Permission>("\"hrm:teleport\"");
    assert!(bad.is_err());
}

#[test]
fn read_only_actions() {
    assert!(Action::View.is_read_only());
    assert!(Action::Export.is_read_only());
    assert!(!Action::Create.is_read_only());
    assert!(!Action::Delete.is_read_only());
}

#[test]
fn admin_template_grants_everything() {
    let perms: BTreeSet<Permission> = RoleTemplate::Admin.permissions().into_iter().collect();
    assert_eq!(perms.len(), Permission::all().len());
}

#[test]
fn crm_manager_template_is_crm_plus_report_view() {
    let perms: BTreeSet<String> = RoleTemplate::CrmManager
        .permissions()
        .into_iter()
        .map(|p| p.to_string())
        .collect();

    for a in Action::ALL {
        assert!(perms.contains(&format!("crm:{a}")), "missing crm:{a}");
    }
    assert!(perms.contains("reports:view"));
    assert!(!perms.contains("erp:view"));
    assert!(!perms.contains("reports:export"));
}

#[test]
fn viewer_template_is_read_only() {
    let perms = RoleTemplate::Viewer.permissions();
    assert!(!perms.is_empty());
    assert!(perms.iter().all(|p| p.action == Action::View));
}

#[test]
fn template_names_round_trip() {
    for t in RoleTemplate::ALL {
        assert_eq!(RoleTemplate::from_name(t.name()), Some(t));
    }
    assert_eq!(RoleTemplate::from_name("crm_manager"), Some(RoleTemplate::CrmManager));
    assert_eq!(RoleTemplate::from_name("owner"), None);
}
