//! Lightweight threat-pattern scanner.
//!
//! Not a WAF: it catches crude injection payloads in structural request
//! parameters. Free-form browser headers are only reported, since legitimate
//! clients put odd strings there.

use std::fmt;

use regex::RegexSet;

use tenantguard_core::error::{GovernError, Result};

use crate::config::ScanSection;
use crate::context::RequestFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatFamily {
    SqlInjection,
    MarkupInjection,
    NullByte,
    PathTraversal,
}

impl ThreatFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreatFamily::SqlInjection => "sql_injection",
            ThreatFamily::MarkupInjection => "markup_injection",
            ThreatFamily::NullByte => "null_byte",
            ThreatFamily::PathTraversal => "path_traversal",
        }
    }
}

const SQL_PATTERNS: &[&str] = &[
    r#"(?i)['"`]\s*(or|and)\s+[\w'"]+\s*(=|<|>|\blike\b)"#,
    r"(?i)\bor\s+1\s*=\s*1\b",
    r"(?i)\bunion\b(\s+all)?\s+select\b",
    r"(?i);\s*(drop|delete|insert|update|alter|truncate|create|exec)\b",
    r"(?i)\b(drop|alter|truncate)\s+(table|database)\b",
    r#"(?i)['"]\s*;?\s*(--|#|/\*)"#,
    r"(?i)\b(sleep|benchmark|pg_sleep)\s*\(|\bwaitfor\s+delay\b",
];

const MARKUP_PATTERNS: &[&str] = &[
    r"(?i)<\s*/?\s*script\b",
    r"(?i)javascript\s*:",
    r"(?i)<[^>]*\bon[a-z]+\s*=",
    r"(?i)<\s*(iframe|object|embed|svg)\b",
    r"(?i)document\.cookie|\beval\s*\(",
];

const NULL_BYTE_PATTERNS: &[&str] = &[r"\x00", r"%00"];

const TRAVERSAL_PATTERNS: &[&str] = &[
    r"\.\.[/\\]",
    r"(?i)%2e%2e(%2f|%5c|/|\\)",
    r"(?i)\.\.(%2f|%5c)",
    r"(?i)%252e%252e",
];

/// Where in the request a match was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanLocation {
    Path,
    Query(String),
    PathParam(String),
    Header(String),
}

impl fmt::Display for ScanLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanLocation::Path => f.write_str("path"),
            ScanLocation::Query(k) => write!(f, "query parameter '{k}'"),
            ScanLocation::PathParam(k) => write!(f, "path parameter '{k}'"),
            ScanLocation::Header(k) => write!(f, "header '{k}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatMatch {
    pub family: ThreatFamily,
    pub location: ScanLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    /// Matches only in advisory headers: log, do not reject.
    Advisory(Vec<ThreatMatch>),
    Reject(ThreatMatch),
}

pub struct ThreatScanner {
    enabled: bool,
    families: Vec<(ThreatFamily, RegexSet)>,
    structural_headers: Vec<String>,
    advisory_headers: Vec<String>,
}

impl ThreatScanner {
    pub fn new(cfg: &ScanSection) -> Result<Self> {
        let compile = |family: ThreatFamily, patterns: &[&str]| {
            RegexSet::new(patterns).map(|set| (family, set)).map_err(|e| {
                GovernError::Config(format!("threat pattern compile failed ({}): {e}", family.as_str()))
            })
        };

        Ok(Self {
            enabled: cfg.enabled,
            families: vec![
                compile(ThreatFamily::SqlInjection, SQL_PATTERNS)?,
                compile(ThreatFamily::MarkupInjection, MARKUP_PATTERNS)?,
                compile(ThreatFamily::NullByte, NULL_BYTE_PATTERNS)?,
                compile(ThreatFamily::PathTraversal, TRAVERSAL_PATTERNS)?,
            ],
            structural_headers: lowercase(&cfg.structural_headers),
            advisory_headers: lowercase(&cfg.advisory_headers),
        })
    }

    pub fn classify(&self, value: &str) -> Option<ThreatFamily> {
        self.families
            .iter()
            .find(|(_, set)| set.is_match(value))
            .map(|(family, _)| *family)
    }

    /// Structural locations are checked first; the first hit there rejects.
    pub fn scan(&self, facts: &RequestFacts) -> ScanVerdict {
        if !self.enabled {
            return ScanVerdict::Clean;
        }

        let structural = std::iter::once((ScanLocation::Path, facts.path.as_str()))
            .chain(
                facts
                    .query
                    .iter()
                    .map(|(k, v)| (ScanLocation::Query(k.clone()), v.as_str())),
            )
            .chain(
                facts
                    .path_params
                    .iter()
                    .map(|(k, v)| (ScanLocation::PathParam(k.clone()), v.as_str())),
            )
            .chain(
                facts
                    .headers
                    .iter()
                    .filter(|(k, _)| self.structural_headers.contains(k))
                    .map(|(k, v)| (ScanLocation::Header(k.clone()), v.as_str())),
            );

        for (location, value) in structural {
            if let Some(family) = self.classify(value) {
                return ScanVerdict::Reject(ThreatMatch { family, location });
            }
        }

        let advisory: Vec<ThreatMatch> = facts
            .headers
            .iter()
            .filter(|(k, _)| self.advisory_headers.contains(k))
            .filter_map(|(k, v)| {
                self.classify(v).map(|family| ThreatMatch {
                    family,
                    location: ScanLocation::Header(k.clone()),
                })
            })
            .collect();

        if advisory.is_empty() {
            ScanVerdict::Clean
        } else {
            ScanVerdict::Advisory(advisory)
        }
    }
}

fn lowercase(names: &[String]) -> Vec<String> {
    names.iter().map(|n| n.to_ascii_lowercase()).collect()
}
