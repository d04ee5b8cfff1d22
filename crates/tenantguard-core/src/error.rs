//! Shared error type across tenantguard crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// No tenant identifier on a tenant-scoped call.
    TenantRequired,
    /// Tenant unknown, inactive, or without a usable subscription.
    TenantRejected,
    /// Plan cap reached.
    PlanLimit,
    /// Module not part of the tenant's plan.
    FeatureNotLicensed,
    /// Caller lacks the permission or membership.
    Forbidden,
    /// Throttled.
    RateLimited,
    /// Invalid input / rejected payload.
    BadRequest,
    /// Upstream collaborator unavailable; safe to retry.
    Unavailable,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::TenantRequired => "TENANT_REQUIRED",
            ClientCode::TenantRejected => "TENANT_REJECTED",
            ClientCode::PlanLimit => "PLAN_LIMIT",
            ClientCode::FeatureNotLicensed => "FEATURE_NOT_LICENSED",
            ClientCode::Forbidden => "FORBIDDEN",
            ClientCode::RateLimited => "RATE_LIMITED",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Broad family an error belongs to. Drives log severity and response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    BusinessRule,
    Authorization,
    Admission,
    Infrastructure,
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GovernError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernError {
    #[error("missing tenant context")]
    MissingTenantContext,
    #[error("tenant header and token claim disagree")]
    TenantMismatch,
    #[error("tenant not found: {0}")]
    TenantNotFound(String),
    #[error("tenant inactive: {0}")]
    TenantInactive(String),
    #[error("no active subscription for tenant {0}")]
    NoActiveSubscription(String),
    #[error("subscription not active for tenant {tenant}: {status}")]
    SubscriptionNotActive { tenant: String, status: String },
    #[error("subscription expired for tenant {0}")]
    SubscriptionExpired(String),
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("plan limit exceeded for {resource}: {current}/{cap}")]
    PlanLimitExceeded { resource: String, cap: u64, current: u64 },
    #[error("feature not licensed: {0}")]
    FeatureNotLicensed(String),

    #[error("user is not a member of tenant {0}")]
    NotATenantMember(String),
    #[error("permission denied: requires {required} (role: {role})")]
    PermissionDenied { required: String, role: String },

    #[error("rate limit exceeded (retry after {retry_after_secs}s)")]
    RateLimitExceeded { retry_after_secs: u64 },
    #[error("malicious input detected in {location}")]
    MaliciousInputDetected { location: String },

    #[error("tenant directory unavailable: {0}")]
    TenantDirectoryUnavailable(String),
    #[error("no handler registered for {0}")]
    NoHandlerRegistered(&'static str),
    #[error("handler for {request} failed: {reason}")]
    HandlerFailed { request: &'static str, reason: String },
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl GovernError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            GovernError::MissingTenantContext => ClientCode::TenantRequired,
            GovernError::TenantMismatch
            | GovernError::TenantNotFound(_)
            | GovernError::TenantInactive(_)
            | GovernError::NoActiveSubscription(_)
            | GovernError::SubscriptionNotActive { .. }
            | GovernError::SubscriptionExpired(_)
            | GovernError::PlanNotFound(_) => ClientCode::TenantRejected,
            GovernError::PlanLimitExceeded { .. } => ClientCode::PlanLimit,
            GovernError::FeatureNotLicensed(_) => ClientCode::FeatureNotLicensed,
            GovernError::NotATenantMember(_) | GovernError::PermissionDenied { .. } => {
                ClientCode::Forbidden
            }
            GovernError::RateLimitExceeded { .. } => ClientCode::RateLimited,
            GovernError::MaliciousInputDetected { .. } => ClientCode::BadRequest,
            GovernError::TenantDirectoryUnavailable(_) => ClientCode::Unavailable,
            GovernError::NoHandlerRegistered(_)
            | GovernError::HandlerFailed { .. }
            | GovernError::Config(_)
            | GovernError::Internal(_) => ClientCode::Internal,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GovernError::MissingTenantContext
            | GovernError::TenantMismatch
            | GovernError::TenantNotFound(_)
            | GovernError::TenantInactive(_)
            | GovernError::NoActiveSubscription(_)
            | GovernError::SubscriptionNotActive { .. }
            | GovernError::SubscriptionExpired(_)
            | GovernError::PlanNotFound(_) => ErrorCategory::Client,
            GovernError::PlanLimitExceeded { .. } | GovernError::FeatureNotLicensed(_) => {
                ErrorCategory::BusinessRule
            }
            GovernError::NotATenantMember(_) | GovernError::PermissionDenied { .. } => {
                ErrorCategory::Authorization
            }
            GovernError::RateLimitExceeded { .. } | GovernError::MaliciousInputDetected { .. } => {
                ErrorCategory::Admission
            }
            GovernError::TenantDirectoryUnavailable(_)
            | GovernError::NoHandlerRegistered(_)
            | GovernError::HandlerFailed { .. }
            | GovernError::Config(_)
            | GovernError::Internal(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Only directory outages are worth retrying; everything else is a final answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GovernError::TenantDirectoryUnavailable(_))
    }

    /// Text safe to return to the caller.
    ///
    /// Admission and infrastructure errors collapse to generic messages so pattern
    /// details and internal state never reach the client.
    pub fn client_message(&self) -> String {
        match self.category() {
            ErrorCategory::Admission => match self {
                GovernError::RateLimitExceeded { .. } => "too many requests".to_string(),
                _ => "request rejected".to_string(),
            },
            ErrorCategory::Infrastructure => match self {
                GovernError::TenantDirectoryUnavailable(_) => {
                    "service temporarily unavailable".to_string()
                }
                _ => "internal error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}
