use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::ClientError;

/// Source of bearer tokens for API calls. Every call asks for a token first;
/// a failure here aborts the call before any request is sent.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ClientError>;
}

/// A fixed token, e.g. for scripts and tests.
#[derive(Debug, Clone)]
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
    async fn access_token(&self) -> Result<String, ClientError> {
        if self.token.is_empty() {
            return Err(ClientError::Token("no access token configured".into()));
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    refresh_token: String,
    valid_until: Instant,
}

/// OAuth refresh-token grant against the identity provider's token endpoint,
/// requesting the portal API audience. Tokens are reused until shortly before expiry.
pub struct RefreshTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    audience: String,
    scope: String,
    state: Mutex<CachedToken>,
}

const EXPIRY_MARGIN: Duration = Duration::from_secs(30);
const DEFAULT_LIFETIME: Duration = Duration::from_secs(300);
const MAX_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Instant until which a token issued at `now` is reused; `expires_in` is capped at a day.
fn reuse_until(now: Instant, expires_in: Option<u64>) -> Instant {
    let lifetime = expires_in
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_LIFETIME)
        .min(MAX_LIFETIME);
    now + lifetime.saturating_sub(EXPIRY_MARGIN)
}

impl RefreshTokenProvider {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        refresh_token: impl Into<String>,
        audience: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            audience: audience.into(),
            scope: scope.into(),
            state: Mutex::new(CachedToken {
                access_token: String::new(),
                refresh_token: refresh_token.into(),
                valid_until: Instant::now(),
            }),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn access_token(&self) -> Result<String, ClientError> {
        let mut cached = self.state.lock().await;
        if !cached.access_token.is_empty() && Instant::now() < cached.valid_until {
            return Ok(cached.access_token.clone());
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", cached.refresh_token.as_str()),
            ("audience", self.audience.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ClientError::Token(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "token refresh failed");
            return Err(ClientError::Token(format!("token endpoint returned {}: {}", status, body)));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Token(e.to_string()))?;

        cached.valid_until = reuse_until(Instant::now(), token.expires_in);
        if let Some(rotated) = token.refresh_token {
            cached.refresh_token = rotated;
        }
        cached.access_token = token.access_token;
        Ok(cached.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_refreshed_before_they_expire() {
        let now = Instant::now();
        assert_eq!(reuse_until(now, Some(3600)), now + Duration::from_secs(3570));
        assert_eq!(reuse_until(now, None), now + Duration::from_secs(270));
        assert_eq!(reuse_until(now, Some(10)), now);
    }

    #[test]
    fn huge_lifetimes_are_capped() {
        let now = Instant::now();
        assert_eq!(reuse_until(now, Some(u64::MAX)), now + MAX_LIFETIME - EXPIRY_MARGIN);
    }

    #[tokio::test]
    async fn empty_static_token_is_an_error() {
        let result = StaticTokenProvider::new("").access_token().await;
        assert!(matches!(result, Err(ClientError::Token(_))));
    }
}
