use std::collections::BTreeSet;

use tenantguard_core::{Module, Permission};

use crate::directory::UserGrant;

/// What a membership is allowed to do inside its tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePermissionSet {
    /// Owner override: every permission, including ones no role lists.
    All,
    Set(BTreeSet<Permission>),
}

impl EffectivePermissionSet {
    /// Owner -> `All`; otherwise the union of active role permissions and custom grants.
    ///
    /// Strings outside the catalog are skipped with a warning; they never widen access.
    pub fn from_grant(grant: &UserGrant) -> Self {
        if grant.owner {
            return EffectivePermissionSet::All;
        }

        let role_perms = grant
            .role
            .iter()
            .filter(|r| r.active)
            .flat_map(|r| r.permissions.iter());

        let mut set = BTreeSet::new();
        for raw in role_perms.chain(grant.custom_permissions.iter()) {
            match raw.parse::<Permission>() {
                Ok(p) => {
                    set.insert(p);
                }
                Err(_) => tracing::warn!(
                    tenant = %grant.tenant_id,
                    user = %grant.user_id,
                    permission = %raw,
                    "ignoring unknown permission string"
                ),
            }
        }
        EffectivePermissionSet::Set(set)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, EffectivePermissionSet::All)
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match self {
            EffectivePermissionSet::All => true,
            EffectivePermissionSet::Set(set) => set.contains(&permission),
        }
    }

    /// At least one action granted within `module`.
    pub fn allows_module(&self, module: Module) -> bool {
        match self {
            EffectivePermissionSet::All => true,
            EffectivePermissionSet::Set(set) => set.iter().any(|p| p.module == module),
        }
    }

    /// Sorted `module:action` strings, for diagnostics.
    pub fn sorted(&self) -> Vec<String> {
        match self {
            EffectivePermissionSet::All => vec!["*".to_string()],
            EffectivePermissionSet::Set(set) => set.iter().map(|p| p.to_string()).collect(),
        }
    }
}
