//! Token acquisition side-service used by the scraping-API backend.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::classify::{ErrorKind, ExtractionError};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    fetched_at: Instant,
}

/// Client for the external token provider, with a TTL-bounded cache.
pub struct TokenProvider {
    client: reqwest::Client,
    base_url: String,
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(base_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Return a cached token or fetch a fresh one.
    pub async fn get_token(&self) -> Result<String, ExtractionError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.token.clone());
            }
        }

        tracing::debug!(provider = %self.base_url, "fetching fresh provider token");
        let token = self.fetch_token().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            fetched_at: Instant::now(),
        });
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub async fn invalidate_cache(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
    }

    /// Probe the provider without touching the cache.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!(provider = %self.base_url, error = %err, "token provider health check failed");
                false
            }
        }
    }

    async fn fetch_token(&self) -> Result<String, ExtractionError> {
        let url = format!("{}/token", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await.map_err(|err| {
            ExtractionError::new(
                ErrorKind::ProviderTokenError,
                format!("token provider request failed: {}", err),
            )
        })?;

        if !response.status().is_success() {
            return Err(ExtractionError::new(
                ErrorKind::ProviderTokenError,
                format!("token provider returned HTTP {}", response.status()),
            ));
        }

        let body: TokenResponse = response.json().await.map_err(|err| {
            ExtractionError::new(
                ErrorKind::ProviderTokenError,
                format!("token provider sent malformed response: {}", err),
            )
        })?;

        if body.token.is_empty() {
            return Err(ExtractionError::new(
                ErrorKind::ProviderTokenError,
                "token provider returned an empty token",
            ));
        }

        Ok(body.token)
    }
}
