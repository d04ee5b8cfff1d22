//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use tenantguard_core::error::{GovernError, Result};

pub use schema::{
    AdmissionSection, BucketConfig, GatewayConfig, GovernanceSection, ScanSection, ServerSection,
    TenantSection,
};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "TENANTGUARD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "tenantguard.yaml";

/// Config path from `TENANTGUARD_CONFIG`, falling back to `tenantguard.yaml`.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| GovernError::Config(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig =
        serde_yaml::from_str(s).map_err(|e| GovernError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
