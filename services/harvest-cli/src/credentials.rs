//! Sentinel Hub OAuth tokens.
//!
//! Tokens are fetched once per client identity and reused for the rest of the
//! run. Concurrent build tasks asking for the same identity wait on a single
//! fetch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, instrument};

use harvest_common::{HarvestError, HarvestResult};
use harvester::CredentialProvider;

pub const DEFAULT_TOKEN_URL: &str = "https://services.sentinel-hub.com/oauth/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials token provider with a process-wide cache.
pub struct SentinelHubCredentials {
    client: Client,
    token_url: String,
    client_secret: Option<String>,
    tokens: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl SentinelHubCredentials {
    pub fn new(client: Client, token_url: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_secret,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Secret from `SH_CLIENT_SECRET`, token endpoint from `SH_TOKEN_URL` when set.
    pub fn from_env(client: Client) -> Self {
        let token_url =
            std::env::var("SH_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string());
        let secret = std::env::var("SH_CLIENT_SECRET").ok().filter(|s| !s.is_empty());
        Self::new(client, token_url, secret)
    }

    async fn cell(&self, client_id: &str) -> Arc<OnceCell<String>> {
        let mut tokens = self.tokens.lock().await;
        tokens
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    #[instrument(skip(self, secret))]
    async fn fetch_token(&self, client_id: &str, secret: &str) -> HarvestResult<String> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", secret),
        ];
        let response: TokenResponse = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HarvestError::provider_fetch("Sentinel Hub OAuth", &self.token_url, e))?
            .json()
            .await
            .map_err(|e| HarvestError::provider_fetch("Sentinel Hub OAuth", &self.token_url, e))?;

        info!("Obtained Sentinel Hub token");
        Ok(response.access_token)
    }
}

#[async_trait]
impl CredentialProvider for SentinelHubCredentials {
    async fn bearer_token(&self, client_id: &str) -> HarvestResult<String> {
        if client_id.is_empty() {
            return Err(HarvestError::configuration(
                "Sentinel Hub credentials",
                "SH_CLIENT_ID is not set",
            ));
        }
        let secret = self.client_secret.as_deref().ok_or_else(|| {
            HarvestError::configuration("Sentinel Hub credentials", "SH_CLIENT_SECRET is not set")
        })?;

        let cell = self.cell(client_id).await;
        let token = cell
            .get_or_try_init(|| self.fetch_token(client_id, secret))
            .await?;
        Ok(token.clone())
    }
}
