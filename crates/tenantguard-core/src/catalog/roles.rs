//! Role templates used to seed a tenant's default role set at provisioning.

use serde::{Deserialize, Serialize};

use super::permission::{Action, Module, Permission};

/// Named starting point for a tenant role. Tenants may edit the copies freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTemplate {
    Admin,
    Manager,
    CrmManager,
    HrManager,
    Accountant,
    Employee,
    Viewer,
}

impl RoleTemplate {
    pub const ALL: [RoleTemplate; 7] = [
        RoleTemplate::Admin,
        RoleTemplate::Manager,
        RoleTemplate::CrmManager,
        RoleTemplate::HrManager,
        RoleTemplate::Accountant,
        RoleTemplate::Employee,
        RoleTemplate::Viewer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RoleTemplate::Admin => "admin",
            RoleTemplate::Manager => "manager",
            RoleTemplate::CrmManager => "crm_manager",
            RoleTemplate::HrManager => "hr_manager",
            RoleTemplate::Accountant => "accountant",
            RoleTemplate::Employee => "employee",
            RoleTemplate::Viewer => "viewer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn permissions(self) -> Vec<Permission> {
        use Action::*;
        use Module::*;

        match self {
            RoleTemplate::Admin => Permission::all(),
            RoleTemplate::Manager => [Crm, Erp, Hrm, Projects, Reports]
                .into_iter()
                .flat_map(|m| {
                    [View, Create, Update, Approve, Export]
                        .into_iter()
                        .map(move |a| Permission::new(m, a))
                })
                .chain([Permission::new(Users, View)])
                .collect(),
            RoleTemplate::CrmManager => Permission::for_module(Crm)
                .into_iter()
                .chain([Permission::new(Reports, View)])
                .collect(),
            RoleTemplate::HrManager => Permission::for_module(Hrm)
                .into_iter()
                .chain([Permission::new(Users, View), Permission::new(Reports, View)])
                .collect(),
            RoleTemplate::Accountant => Permission::for_module(Erp)
                .into_iter()
                .chain([
                    Permission::new(Billing, View),
                    Permission::new(Reports, View),
                    Permission::new(Reports, Export),
                ])
                .collect(),
            RoleTemplate::Employee => vec![
                Permission::new(Crm, View),
                Permission::new(Crm, Create),
                Permission::new(Projects, View),
                Permission::new(Projects, Update),
            ],
            RoleTemplate::Viewer => Module::ALL
                .into_iter()
                .filter(|m| !matches!(m, Billing | Settings))
                .map(|m| Permission::new(m, View))
                .collect(),
        }
    }
}
