//! tenantguard gateway library entry.
//!
//! This crate wires admission control, tenant resolution, plan checks,
//! permission resolution, and request dispatch into one governance pipeline
//! that runs in front of every business-module call. It is intended to be
//! consumed by the binary (`main.rs`), by services embedding the router, and
//! by integration tests.

pub mod admission;
pub mod app_state;
pub mod authz;
pub mod clock;
pub mod config;
pub mod context;
pub mod directory;
pub mod dispatch;
pub mod gate;
pub mod governor;
pub mod obs;
pub mod ops;
pub mod router;
pub mod transport;

pub use governor::{CallSpec, Collaborators, GovernedRequest, Governor};
