//! Multi-credential failover with a persisted "known-good" credential.
//!
//! Each remote capability (text, speech) owns one [`CredentialFailover`]: an
//! ordered pool of API keys plus the key that last worked. The known-good key
//! is tried first; when it fails it is forgotten and the pool is walked from
//! the position right after it. Keys before that position are not retried in
//! the same pass.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::alerts::Alerter;
use crate::store::KeyValueStore;

/// Every credential in the pool failed (or the pool is empty).
#[derive(Debug, Clone, Error)]
#[error("all {attempts} {provider} credential attempts failed: {last_error}")]
pub struct CredentialsExhausted {
    pub provider: String,
    pub attempts: usize,
    pub last_error: String,
}

/// The known-good credential for one provider, mirrored into a
/// [`KeyValueStore`] so it survives restarts.
pub struct CredentialCache {
    provider: String,
    store: Arc<dyn KeyValueStore>,
    known_good: Mutex<Option<String>>,
}

impl CredentialCache {
    /// Loads the persisted value, dropping it unless it is one of `pool`.
    pub fn load(provider: &str, store: Arc<dyn KeyValueStore>, pool: &[String]) -> Self {
        let cache = Self {
            provider: provider.to_string(),
            known_good: Mutex::new(None),
            store,
        };
        match cache.store.get(&cache.store_key()) {
            Some(key) if pool.contains(&key) => cache.set_memory(Some(key)),
            Some(_) => cache.clear(),
            None => {}
        }
        cache
    }

    pub fn get(&self) -> Option<String> {
        self.known_good
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, key: &str) {
        if self.get().as_deref() == Some(key) {
            return;
        }
        self.set_memory(Some(key.to_string()));
        if let Err(e) = self.store.set(&self.store_key(), key) {
            tracing::warn!(provider = %self.provider, "Failed to persist known-good credential: {e:#}");
        }
    }

    pub fn clear(&self) {
        self.set_memory(None);
        if let Err(e) = self.store.remove(&self.store_key()) {
            tracing::warn!(provider = %self.provider, "Failed to clear known-good credential: {e:#}");
        }
    }

    fn set_memory(&self, value: Option<String>) {
        *self
            .known_good
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = value;
    }

    fn store_key(&self) -> String {
        format!("known_good.{}", self.provider)
    }
}

/// Runs operations against a credential pool.
pub struct CredentialFailover {
    provider: String,
    pool: Vec<String>,
    cache: CredentialCache,
    alerter: Arc<dyn Alerter>,
}

impl CredentialFailover {
    pub fn new(
        provider: &str,
        pool: Vec<String>,
        store: Arc<dyn KeyValueStore>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        let cache = CredentialCache::load(provider, store, &pool);
        Self {
            provider: provider.to_string(),
            pool,
            cache,
            alerter,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn known_good(&self) -> Option<String> {
        self.cache.get()
    }

    /// Runs `op` with one credential after another until it succeeds.
    ///
    /// The successful credential becomes the known-good one. Every failure
    /// and the final exhaustion are reported to the alerter.
    ///
    /// # Errors
    /// Returns [`CredentialsExhausted`] when no attempted credential works.
    pub async fn request<T, E, F, Fut>(&self, mut op: F) -> Result<T, CredentialsExhausted>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut start = 0;
        let mut attempts = 0;
        let mut last_error = String::from("no credentials configured");

        if let Some(known) = self.cache.get() {
            match self.pool.iter().position(|key| *key == known) {
                Some(index) => {
                    attempts += 1;
                    match op(known).await {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            last_error = e.to_string();
                            self.report_failure(index, &last_error);
                            self.cache.clear();
                            start = index + 1;
                        }
                    }
                }
                None => self.cache.clear(),
            }
        }

        for (index, key) in self.pool.iter().enumerate().skip(start) {
            attempts += 1;
            match op(key.clone()).await {
                Ok(value) => {
                    self.cache.set(key);
                    return Ok(value);
                }
                Err(e) => {
                    last_error = e.to_string();
                    self.report_failure(index, &last_error);
                }
            }
        }

        let exhausted = CredentialsExhausted {
            provider: self.provider.clone(),
            attempts,
            last_error,
        };
        tracing::error!(provider = %self.provider, attempts, "Credentials exhausted");
        self.alerter.alert(
            &format!("{} credentials exhausted", self.provider),
            &exhausted.to_string(),
        );
        Err(exhausted)
    }

    fn report_failure(&self, index: usize, error: &str) {
        tracing::warn!(provider = %self.provider, credential = index + 1, "Credential failed: {error}");
        self.alerter.alert(
            &format!("{} credential failed", self.provider),
            &format!("credential #{} of {}: {error}", index + 1, self.pool.len()),
        );
    }
}
