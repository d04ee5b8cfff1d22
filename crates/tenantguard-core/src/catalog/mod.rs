//! Permission catalog.
//!
//! Permissions are typed `(module, action)` pairs at every boundary; the
//! `module:action` string form only exists for storage and display.

pub mod permission;
pub mod roles;

pub use permission::{Action, Module, Permission};
pub use roles::RoleTemplate;
