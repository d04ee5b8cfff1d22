//! Top-level facade crate for tenantguard.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use tenantguard_core::*;
}

pub mod gateway {
    pub use tenantguard_gateway::*;
}
