//! Permission Resolver.
//!
//! Resolution is recomputed from the membership store on every call: role and
//! grant edits take effect on the very next request.

pub mod effective;
pub mod resolver;

pub use effective::EffectivePermissionSet;
pub use resolver::{
    require_super_admin, GrantedBy, IdentityField, PermissionResolver, Requirement,
};
