//! Environment-driven configuration shared by the login and proxy handlers.

use std::{env, time::Duration};

use crate::{error::ConfigError, routes::RouteTable};

pub const DEFAULT_TOKEN_LIFETIME_HOURS: u32 = 24;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Deployment configuration resolved once at cold start.
///
/// The users table and signing secret stay optional here: a function
/// deployed without them still starts, and answers the affected requests
/// with a configuration error instead.
#[derive(Debug, Clone)]
pub struct Settings {
    pub users_table: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_lifetime_hours: u32,
    pub upstream_timeout: Duration,
    pub routes: RouteTable,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token_lifetime_hours =
            parse_positive("JWT_EXPIRATION_HOURS", lookup("JWT_EXPIRATION_HOURS"))?
                .unwrap_or(DEFAULT_TOKEN_LIFETIME_HOURS);
        let upstream_timeout =
            parse_positive("PROXY_TIMEOUT_SECONDS", lookup("PROXY_TIMEOUT_SECONDS"))?
                .map_or(DEFAULT_UPSTREAM_TIMEOUT, |secs| Duration::from_secs(u64::from(secs)));

        Ok(Self {
            users_table: lookup("USERS_TABLE"),
            jwt_secret: lookup("JWT_SECRET"),
            token_lifetime_hours,
            upstream_timeout,
            routes: RouteTable::from_lookup(lookup),
        })
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }
}

fn parse_positive(name: &'static str, raw: Option<String>) -> Result<Option<u32>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}
