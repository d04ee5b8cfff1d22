use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GovernError, Result};

/// Separator between module and action in the string form (`crm:view`).
pub const SEPARATOR: char = ':';

/// Business module a permission is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    Crm,
    Erp,
    Hrm,
    Healthcare,
    Banking,
    Projects,
    Users,
    Billing,
    Reports,
    Settings,
}

impl Module {
    pub const ALL: [Module; 10] = [
        Module::Crm,
        Module::Erp,
        Module::Hrm,
        Module::Healthcare,
        Module::Banking,
        Module::Projects,
        Module::Users,
        Module::Billing,
        Module::Reports,
        Module::Settings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Crm => "crm",
            Module::Erp => "erp",
            Module::Hrm => "hrm",
            Module::Healthcare => "healthcare",
            Module::Banking => "banking",
            Module::Projects => "projects",
            Module::Users => "users",
            Module::Billing => "billing",
            Module::Reports => "reports",
            Module::Settings => "settings",
        }
    }
}

impl FromStr for Module {
    type Err = GovernError;

    fn from_str(s: &str) -> Result<Self> {
        Module::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| GovernError::Internal(format!("unknown module: {s}")))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation performed within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    Export,
    Approve,
    Manage,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Export,
        Action::Approve,
        Action::Manage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Approve => "approve",
            Action::Manage => "manage",
        }
    }

    /// Read-only actions are never subject to plan caps.
    pub fn is_read_only(self) -> bool {
        matches!(self, Action::View | Action::Export)
    }
}

impl FromStr for Action {
    type Err = GovernError;

    fn from_str(s: &str) -> Result<Self> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| GovernError::Internal(format!("unknown action: {s}")))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(module, action)` grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    pub module: Module,
    pub action: Action,
}

impl Permission {
    pub const fn new(module: Module, action: Action) -> Self {
        Self { module, action }
    }

    /// Every permission the catalog knows about, module-major.
    pub fn all() -> Vec<Permission> {
        Module::ALL
            .into_iter()
            .flat_map(|m| Action::ALL.into_iter().map(move |a| Permission::new(m, a)))
            .collect()
    }

    /// All actions within one module.
    pub fn for_module(module: Module) -> Vec<Permission> {
        Action::ALL.into_iter().map(|a| Permission::new(module, a)).collect()
    }
}

impl FromStr for Permission {
    type Err = GovernError;

    fn from_str(s: &str) -> Result<Self> {
        // format: "module:action"
        let (module, action) = s.split_once(SEPARATOR).ok_or_else(|| {
            GovernError::Internal(format!("invalid permission: {s} (expected module:action)"))
        })?;
        Ok(Permission::new(module.parse()?, action.parse()?))
    }
}

impl TryFrom<String> for Permission {
    type Error = GovernError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.module, SEPARATOR, self.action)
    }
}
