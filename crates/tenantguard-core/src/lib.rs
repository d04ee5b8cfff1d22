//! tenantguard core: transport-agnostic governance primitives.
//!
//! This crate defines the error taxonomy, the uniform result envelope, and the
//! static permission catalog shared by the gateway runtime and by business
//! handlers. It carries no runtime or storage dependencies so it can be reused
//! by any service that sits behind the gateway.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `GovernError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod catalog;
pub mod error;
pub mod outcome;

pub use catalog::{Action, Module, Permission, RoleTemplate};
/// Shared result type.
pub use error::{GovernError, Result};
pub use outcome::Outcome;
