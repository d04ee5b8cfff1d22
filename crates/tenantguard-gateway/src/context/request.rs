use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Claims of an access token that an upstream layer already verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedClaims {
    pub sub: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub super_admin: bool,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    /// System-level operator flag. Never consulted for tenant permissions.
    pub super_admin: bool,
}

impl Principal {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            super_admin: false,
        }
    }

    pub fn super_admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            super_admin: true,
        }
    }
}

impl From<&VerifiedClaims> for Principal {
    fn from(claims: &VerifiedClaims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            super_admin: claims.super_admin,
        }
    }
}

/// Transport-neutral description of an inbound call.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub client: IpAddr,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub path_params: Vec<(String, String)>,
    /// Header names are stored lowercase.
    pub headers: Vec<(String, String)>,
    pub claims: Option<VerifiedClaims>,
}

impl RequestFacts {
    pub fn new(client: IpAddr, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            query: Vec::new(),
            path_params: Vec::new(),
            headers: Vec::new(),
            claims: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_claims(mut self, claims: VerifiedClaims) -> Self {
        self.claims = Some(claims);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn tenant_claim(&self) -> Option<&str> {
        self.claims.as_ref().and_then(|c| c.tenant_id.as_deref())
    }
}
