//! Application-scoped context shared across request handlers.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{config::Settings, store::UserStore};

/// Source of "now" for token issuance and expiry checks, in UNIX seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// Holds the clients and configuration built once per cold start.
#[derive(Clone)]
pub struct AppContext {
    store: Option<Arc<dyn UserStore>>,
    http: reqwest::Client,
    settings: Settings,
    clock: Arc<dyn Clock>,
}

impl AppContext {
    /// `store` is `None` when no users table is configured; login requests
    /// then fail with a configuration error.
    pub fn new(
        store: Option<Arc<dyn UserStore>>,
        http: reqwest::Client,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            http,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> Option<&dyn UserStore> {
        self.store.as_deref()
    }

    /// Borrow the outbound HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Symmetric signing secret used for issuing and validating JWTs.
    pub fn jwt_secret(&self) -> Option<&str> {
        self.settings.jwt_secret.as_deref()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}
