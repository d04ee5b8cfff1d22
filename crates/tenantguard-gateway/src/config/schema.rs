use std::time::Duration;

use serde::Deserialize;
use tenantguard_core::error::{GovernError, Result};
use tenantguard_core::Module;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub tenant: TenantSection,

    #[serde(default)]
    pub admission: AdmissionSection,

    #[serde(default)]
    pub governance: GovernanceSection,

    /// Optional YAML file seeding the in-memory collaborators (local/dev only).
    #[serde(default)]
    pub dev_fixtures: Option<String>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GovernError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.tenant.validate()?;
        self.admission.validate()?;

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            tenant: TenantSection::default(),
            admission: AdmissionSection::default(),
            governance: GovernanceSection::default(),
            dev_fixtures: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Use the first `x-forwarded-for` hop as client address when no socket address is known.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            trust_forwarded_for: false,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantSection {
    #[serde(default = "default_tenant_header")]
    pub header: String,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_directory_timeout_ms")]
    pub directory_timeout_ms: u64,

    /// Modules that must appear in `plan.features` to be reachable at all.
    #[serde(default = "default_feature_gated_modules")]
    pub feature_gated_modules: Vec<String>,
}

impl Default for TenantSection {
    fn default() -> Self {
        Self {
            header: default_tenant_header(),
            cache_ttl_secs: default_cache_ttl_secs(),
            directory_timeout_ms: default_directory_timeout_ms(),
            feature_gated_modules: default_feature_gated_modules(),
        }
    }
}

impl TenantSection {
    pub fn validate(&self) -> Result<()> {
        if self.header.trim().is_empty() {
            return Err(GovernError::Config("tenant.header must not be empty".into()));
        }
        if !(1..=86_400).contains(&self.cache_ttl_secs) {
            return Err(GovernError::Config(
                "tenant.cache_ttl_secs must be between 1 and 86400".into(),
            ));
        }
        if !(50..=30_000).contains(&self.directory_timeout_ms) {
            return Err(GovernError::Config(
                "tenant.directory_timeout_ms must be between 50 and 30000".into(),
            ));
        }
        self.gated_modules()?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }

    pub fn gated_modules(&self) -> Result<Vec<Module>> {
        self.feature_gated_modules
            .iter()
            .map(|m| {
                m.parse::<Module>().map_err(|_| {
                    GovernError::Config(format!("tenant.feature_gated_modules: unknown module {m}"))
                })
            })
            .collect()
    }
}

fn default_tenant_header() -> String {
    "x-tenant-id".into()
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_directory_timeout_ms() -> u64 {
    2000
}
fn default_feature_gated_modules() -> Vec<String> {
    vec!["healthcare".into(), "banking".into()]
}

/// `max_requests` per trailing `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl BucketConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.max_requests == 0 {
            return Err(GovernError::Config(format!(
                "admission.{name}.max_requests must be greater than 0"
            )));
        }
        if self.window_secs == 0 {
            return Err(GovernError::Config(format!(
                "admission.{name}.window_secs must be greater than 0"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionSection {
    #[serde(default = "default_general_bucket")]
    pub general: BucketConfig,

    #[serde(default = "default_auth_bucket")]
    pub auth: BucketConfig,

    #[serde(default = "default_tenant_bucket")]
    pub tenant: BucketConfig,

    /// Path prefixes served by the stricter authentication bucket.
    #[serde(default = "default_auth_paths")]
    pub auth_paths: Vec<String>,

    /// Above this many windows, idle ones are collected on the next request.
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,

    #[serde(default)]
    pub scan: ScanSection,
}

impl Default for AdmissionSection {
    fn default() -> Self {
        Self {
            general: default_general_bucket(),
            auth: default_auth_bucket(),
            tenant: default_tenant_bucket(),
            auth_paths: default_auth_paths(),
            max_tracked_keys: default_max_tracked_keys(),
            scan: ScanSection::default(),
        }
    }
}

impl AdmissionSection {
    pub fn validate(&self) -> Result<()> {
        self.general.validate("general")?;
        self.auth.validate("auth")?;
        self.tenant.validate("tenant")?;
        if self.max_tracked_keys == 0 {
            return Err(GovernError::Config(
                "admission.max_tracked_keys must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_general_bucket() -> BucketConfig {
    BucketConfig::new(100, 60)
}
fn default_auth_bucket() -> BucketConfig {
    BucketConfig::new(10, 60)
}
fn default_tenant_bucket() -> BucketConfig {
    BucketConfig::new(500, 60)
}
fn default_auth_paths() -> Vec<String> {
    vec!["/auth/".into()]
}
fn default_max_tracked_keys() -> usize {
    100_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Headers whose matches reject the request like a query parameter would.
    #[serde(default = "default_structural_headers")]
    pub structural_headers: Vec<String>,

    /// Free-form browser headers: matches are logged only.
    #[serde(default = "default_advisory_headers")]
    pub advisory_headers: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            enabled: true,
            structural_headers: default_structural_headers(),
            advisory_headers: default_advisory_headers(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_structural_headers() -> Vec<String> {
    vec!["x-tenant-id".into()]
}
fn default_advisory_headers() -> Vec<String> {
    vec!["user-agent".into(), "referer".into(), "origin".into()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceSection {
    /// Path prefixes that bypass admission and tenant governance entirely.
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
}

impl Default for GovernanceSection {
    fn default() -> Self {
        Self {
            exempt_paths: default_exempt_paths(),
        }
    }
}

impl GovernanceSection {
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

fn default_exempt_paths() -> Vec<String> {
    vec![
        "/healthz".into(),
        "/readyz".into(),
        "/metrics".into(),
        "/public/plans".into(),
    ]
}
