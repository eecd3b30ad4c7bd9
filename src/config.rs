//! Runtime configuration from environment variables.
//!
//! DESIGN
//! ======
//! Two knobs: the listen port and the websocket origin allow-list. Origins
//! are matched either exactly (`http://localhost:4200`) or by host suffix
//! (`*.railboard.app` admits any https origin whose host ends with
//! `.railboard.app`). Requests without an Origin header — non-browser
//! clients, health probes, tests — are admitted; the gate is a boundary
//! convenience, not an authentication layer.

use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
}

// =============================================================================
// ORIGIN PATTERNS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    /// Full origin match, scheme included.
    Exact(String),
    /// Host suffix match, written as `*.example.com` in configuration.
    Suffix(String),
}

impl OriginPattern {
    /// Parse one allow-list entry. Empty entries yield `None`.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        if let Some(suffix) = entry.strip_prefix("*.") {
            return Some(Self::Suffix(format!(".{suffix}")));
        }
        Some(Self::Exact(entry.to_string()))
    }

    #[must_use]
    fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Exact(exact) => origin == exact,
            Self::Suffix(suffix) => origin_host(origin).is_some_and(|host| host.ends_with(suffix.as_str())),
        }
    }
}

/// Extract the host portion of an origin string (`https://a.b.c:443` -> `a.b.c`).
fn origin_host(origin: &str) -> Option<&str> {
    let rest = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let host = rest.split('/').next()?.split(':').next()?;
    if host.is_empty() { None } else { Some(host) }
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_origins: Vec<OriginPattern>,
}

impl Default for Config {
    fn default() -> Self {
        Self { port: 3000, allowed_origins: default_origins() }
    }
}

/// Local development hosts plus the production domain suffix.
fn default_origins() -> Vec<OriginPattern> {
    [
        "http://localhost:4200",
        "http://127.0.0.1:4200",
        "http://localhost:3000",
        "*.railboard.app",
    ]
    .iter()
    .filter_map(|entry| OriginPattern::parse(entry))
    .collect()
}

impl Config {
    /// Read configuration from `PORT` and `ALLOWED_ORIGINS` (comma-separated
    /// allow-list entries). Missing variables fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPort` if `PORT` is set but not a u16.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => 3000,
        };

        let allowed_origins = match env::var("ALLOWED_ORIGINS") {
            Ok(raw) => raw.split(',').filter_map(OriginPattern::parse).collect(),
            Err(_) => default_origins(),
        };

        Ok(Self { port, allowed_origins })
    }

    /// True if a browser Origin header value is acceptable. Absent origins
    /// (`None`) are admitted.
    #[must_use]
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        self.allowed_origins.iter().any(|pattern| pattern.matches(origin))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
