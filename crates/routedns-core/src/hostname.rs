//! Hostname normalization and domain-suffix matching
//!
//! Hostnames coming from proxy rules and from the state file are compared in
//! a canonical form: lower-case, no surrounding whitespace, no trailing dot.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical form of a hostname, or `None` if nothing is left after trimming
pub fn normalize(raw: &str) -> Option<String> {
    let name = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if name.is_empty() { None } else { Some(name) }
}

/// Validate that a string is a usable DNS name
///
/// Basic RFC 1035 checks: total length, label length, characters, hyphen
/// placement. Not exhaustive, but catches configuration mistakes.
pub fn validate(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// The single domain suffix under management
///
/// Matching is label-aligned: `a.example.com` and `example.com` match the
/// suffix `example.com`, `badexample.com` does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainSuffix(String);

impl DomainSuffix {
    /// Parse and validate a suffix
    pub fn new(raw: &str) -> Result<Self> {
        let name = normalize(raw).ok_or_else(|| Error::config("Domain suffix cannot be empty"))?;
        validate(&name)?;
        Ok(Self(name))
    }

    /// The suffix as a string (no trailing dot)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an already-normalized hostname falls under this suffix
    pub fn matches(&self, hostname: &str) -> bool {
        match hostname.strip_suffix(self.0.as_str()) {
            Some("") => true,
            Some(prefix) => prefix.ends_with('.'),
            None => false,
        }
    }
}

impl fmt::Display for DomainSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DomainSuffix {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<DomainSuffix> for String {
    fn from(value: DomainSuffix) -> Self {
        value.0
    }
}
