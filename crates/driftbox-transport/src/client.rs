//! Authenticated JSON request/response client with retry and backoff.

use driftbox_core::config::TransportConfig;
use driftbox_core::error::DriftboxError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Envelope every JSON endpoint responds with.
#[derive(Debug, serde::Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// A thin, connection-pooled wrapper around [`reqwest::Client`] carrying the
/// retry/backoff policy so callers never have to re-implement it.
#[derive(Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    config: TransportConfig,
}

impl TransportClient {
    pub fn new(config: TransportConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// POST a JSON body to an authenticated API endpoint, retrying network
    /// failures and HTTP 5xx per the configured backoff schedule. HTTP 4xx
    /// surfaces immediately without retry.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        api_key: Option<&str>,
        body: &B,
    ) -> Result<T, DriftboxError> {
        let url = format!("{}{}", self.config.api_base, path);
        let mut attempt: u32 = 0;

        loop {
            let mut req = self.http.post(&url).json(body);
            if let Some(key) = api_key {
                req = req.bearer_auth(key);
            }

            let outcome = req.send().await;
            match outcome {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() {
                        if attempt < self.config.retry_attempts {
                            self.back_off(attempt).await;
                            attempt += 1;
                            tracing::warn!(path, attempt, status = %status, "retrying after server error");
                            continue;
                        }
                        return Err(DriftboxError::HttpStatus {
                            status: status.as_u16(),
                            message: "server error after retries exhausted".into(),
                        });
                    }
                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DriftboxError::AuthMissing);
                    }
                    if status.is_client_error() {
                        let text = resp.text().await.unwrap_or_default();
                        return Err(DriftboxError::HttpStatus {
                            status: status.as_u16(),
                            message: text,
                        });
                    }

                    let envelope: ApiEnvelope<T> = resp
                        .json()
                        .await
                        .map_err(|e| DriftboxError::Network(format!("invalid JSON response: {e}")))?;

                    if !envelope.status {
                        if let Some(code) = envelope.code.as_deref() {
                            if code == "enter_2fa" || code == "wrong_2fa" {
                                return Err(DriftboxError::AuthChallenge(code.to_string()));
                            }
                        }
                        return Err(DriftboxError::HttpStatus {
                            status: 200,
                            message: envelope.message.unwrap_or_else(|| "request failed".into()),
                        });
                    }

                    return envelope
                        .data
                        .ok_or_else(|| DriftboxError::Network("response carried no data".into()));
                }
                Err(e) => {
                    if attempt < self.config.retry_attempts {
                        self.back_off(attempt).await;
                        attempt += 1;
                        tracing::warn!(path, attempt, error = %e, "retrying after network error");
                        continue;
                    }
                    return Err(DriftboxError::Network(e.to_string()));
                }
            }
        }
    }

    async fn back_off(&self, attempt: u32) {
        let delay_ms = self
            .config
            .retry_backoff_ms
            .get(attempt as usize)
            .copied()
            .unwrap_or(4000);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_defaults() {
        let client = TransportClient::new(TransportConfig::default());
        assert!(client.is_ok());
    }
}
