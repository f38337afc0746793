//! Access tokens for the Google Sheets API.
//!
//! A token either comes from configuration as-is, from a service-account key
//! exchanged at Google's token endpoint, or from the instance metadata server
//! available to workloads running on Google Cloud. Fetched tokens are cached
//! until shortly before they expire.

use chrono::Utc;
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::service_account::{ServiceAccountKey, JWT_BEARER_GRANT};
use super::SinkError;

/// Default token endpoint of the GCE metadata server
pub const METADATA_TOKEN_URL: &str = "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token?scopes=https://www.googleapis.com/auth/spreadsheets";

/// A cached token is replaced this long before it actually expires.
pub const FRESHNESS_MARGIN: Duration = Duration::from_secs(60);

/// Where access tokens come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Fixed token, never refreshed
    Static(String),
    /// Service-account key, exchanged for tokens at its `token_uri`
    ServiceAccount(ServiceAccountKey),
    /// Metadata server endpoint answering `{access_token, expires_in}`
    Metadata { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// `None` for tokens without a known lifetime
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    /// True while the token is valid for at least [`FRESHNESS_MARGIN`] more.
    pub fn is_fresh(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now + FRESHNESS_MARGIN < expires_at,
            None => true,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Token cache shared by all requests of one Sheets ledger
pub struct SheetsSession {
    client: reqwest::Client,
    source: TokenSource,
    cached: Mutex<Option<AccessToken>>,
}

impl SheetsSession {
    pub fn new(client: reqwest::Client, source: TokenSource) -> Self {
        Self {
            client,
            source,
            cached: Mutex::new(None),
        }
    }

    /// Current token, fetching a new one when the cached token is stale.
    pub async fn token(&self) -> Result<String, SinkError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token and fetch a new one, e.g. after a 401.
    pub async fn reacquire(&self) -> Result<String, SinkError> {
        let mut cached = self.cached.lock().await;
        *cached = None;

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch(&self) -> Result<AccessToken, SinkError> {
        match &self.source {
            TokenSource::Static(value) => Ok(AccessToken {
                value: value.clone(),
                expires_at: None,
            }),
            TokenSource::ServiceAccount(key) => {
                debug!(account = %key.client_email, uri = %key.token_uri, "Exchanging service account assertion");
                let assertion = key.assertion(Utc::now().timestamp())?;
                let request = self.client.post(&key.token_uri).form(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ]);
                request_token(request).await
            }
            TokenSource::Metadata { url } => {
                debug!(%url, "Requesting access token from metadata server");
                let request = self.client.get(url).header("Metadata-Flavor", "Google");
                request_token(request).await
            }
        }
    }
}

async fn request_token(request: RequestBuilder) -> Result<AccessToken, SinkError> {
    let response = request
        .send()
        .await
        .map_err(|e| SinkError::Connectivity(format!("token endpoint: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SinkError::Unauthorized(format!(
            "token endpoint answered {status}"
        )));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| SinkError::Unauthorized(format!("token response: {e}")))?;

    info!(expires_in = body.expires_in, "Obtained Sheets access token");
    Ok(AccessToken {
        value: body.access_token,
        expires_at: Some(Instant::now() + Duration::from_secs(body.expires_in)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_margin() {
        let now = Instant::now();
        let token = |secs| AccessToken {
            value: "t".to_string(),
            expires_at: Some(now + Duration::from_secs(secs)),
        };

        assert!(token(3600).is_fresh(now));
        assert!(!token(30).is_fresh(now));
        assert!(!token(60).is_fresh(now));
        assert!(AccessToken {
            value: "t".to_string(),
            expires_at: None
        }
        .is_fresh(now));
    }

    #[tokio::test]
    async fn test_static_token() {
        let session = SheetsSession::new(
            reqwest::Client::new(),
            TokenSource::Static("abc".to_string()),
        );
        assert_eq!(session.token().await.unwrap(), "abc");
        assert_eq!(session.reacquire().await.unwrap(), "abc");
    }
}
