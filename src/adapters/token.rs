use crate::domain::ports::TokenProvider;
use crate::utils::error::{CanvasError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

/// Fixed personal access token, typically read from the environment.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(CanvasError::MissingConfig {
                field: "api_token".to_string(),
            });
        }
        Ok(self.token.clone())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Client-credentials token exchange with in-process caching. The cached
/// token is refreshed one minute before the server-reported expiry.
pub struct ExchangeTokenProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ExchangeTokenProvider {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(CanvasError::api(
                format!("Token exchange failed: {}", status),
                Some(status.as_u16()),
                Some(text),
                self.token_url.clone(),
            ));
        }

        let parsed: TokenResponse = serde_json::from_str(&text)?;
        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for ExchangeTokenProvider {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() + Duration::seconds(60) < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("Exchanging client credentials for a fresh access token");
        let fresh = self.exchange().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_provider_returns_token() {
        let provider = StaticTokenProvider::new("abc123");
        assert_eq!(provider.token().await.unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_static_provider_rejects_empty_token() {
        let provider = StaticTokenProvider::new("   ");
        assert!(provider.token().await.is_err());
    }

    #[tokio::test]
    async fn test_exchange_provider_caches_until_expiry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .json_body(json!({"access_token": "tok-1", "expires_in": 3600}));
        });

        let provider =
            ExchangeTokenProvider::new(server.url("/oauth/token"), "client", "secret");
        assert_eq!(provider.token().await.unwrap(), "tok-1");
        assert_eq!(provider.token().await.unwrap(), "tok-1");
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_exchange_failure_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(401).body("{\"error\":\"invalid_client\"}");
        });

        let provider =
            ExchangeTokenProvider::new(server.url("/oauth/token"), "client", "wrong");
        let err = provider.token().await.unwrap_err();
        assert!(err.is_auth());
    }
}
