//! Environment-driven service configuration.
//!
//! Every knob has a default so a bare `usergate` starts on port 8080. Parsing is
//! done against an arbitrary lookup function so tests never touch the process
//! environment.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// Longest accepted signed-token lifetime (one year).
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    Signed,
    Placeholder,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: expected {expected}, got '{value}'")]
    Invalid { key: &'static str, expected: &'static str, value: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub http_port: u16,
    pub trusted_proxies: Vec<IpAddr>,
    pub token_scheme: TokenScheme,
    /// `None` means a random per-process key is generated at startup.
    pub token_secret: Option<String>,
    pub token_ttl: Duration,
    pub admin_username: String,
    pub admin_email: String,
    /// Bootstrap admin is only seeded when this is set.
    pub admin_password: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("http_port", &self.http_port)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("token_scheme", &self.token_scheme)
            .field("token_secret", &self.token_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl", &self.token_ttl)
            .field("admin_username", &self.admin_username)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            http_port: 8080,
            trusted_proxies: vec![IpAddr::from([192, 168, 1, 2])],
            token_scheme: TokenScheme::Signed,
            token_secret: None,
            token_ttl: Duration::from_secs(3600),
            admin_username: "admin".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from `lookup`; empty values count as unset.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Config::default();

        if let Some(v) = get("BIND_ADDR") {
            cfg.bind_addr = v.parse().map_err(|_| invalid("BIND_ADDR", "an IP address", &v))?;
        }
        if let Some(v) = get("PORT") {
            cfg.http_port = v.parse().map_err(|_| invalid("PORT", "a port number", &v))?;
        }
        if let Some(v) = lookup("TRUSTED_PROXIES") {
            // Explicitly empty disables forwarding headers altogether
            cfg.trusted_proxies = v.split(',').map(|s| s.trim()).filter(|s| !s.is_empty())
                .map(|s| s.parse::<IpAddr>().map_err(|_| invalid("TRUSTED_PROXIES", "comma-separated IP addresses", s)))
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(v) = get("TOKEN_SCHEME") {
            cfg.token_scheme = match v.to_ascii_lowercase().as_str() {
                "signed" => TokenScheme::Signed,
                "placeholder" => TokenScheme::Placeholder,
                _ => return Err(invalid("TOKEN_SCHEME", "'signed' or 'placeholder'", &v)),
            };
        }
        cfg.token_secret = get("TOKEN_SECRET");
        if let Some(v) = get("TOKEN_TTL_SECS") {
            let secs: u64 = v.parse().ok().filter(|s| (1..=MAX_TOKEN_TTL_SECS).contains(s))
                .ok_or_else(|| invalid("TOKEN_TTL_SECS", "between 1 and 31536000 seconds", &v))?;
            cfg.token_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = get("ADMIN_USERNAME") { cfg.admin_username = v; }
        if let Some(v) = get("ADMIN_EMAIL") { cfg.admin_email = v; }
        cfg.admin_password = get("ADMIN_PASSWORD");
        Ok(cfg)
    }
}

fn invalid(key: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid { key, expected, value: value.to_string() }
}
