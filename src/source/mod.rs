//! Adapters that fetch the upstream datasets and hand back parsed payloads.
//!
//! - [`telemetry`] — WhoTracks.me site/tracker CSV tables.
//! - [`taxonomy`] — the tracker database SQL dump, loaded into in-memory SQLite.
//! - [`policy`] — the PrivacySpy product catalog.
//! - [`review`] — the ToS;DR search, detail and listing endpoints.
//!
//! Every network call goes through [`Fetcher`], which applies the configured
//! timeout, classifies HTTP 429 separately from other failures, and races the
//! request against a [`CancelSignal`].

pub mod policy;
pub mod review;
pub mod taxonomy;
pub mod telemetry;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::SourcesConfig;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,
    #[error("request timed out")]
    Timeout,
    #[error("upstream answered HTTP {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("taxonomy database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

/// Cooperative cancellation shared by every in-flight request.
///
/// Cloning is cheap; all clones observe the same trip.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        CancelSignal {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so `wait_for` only errors if it is dropped.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: std::time::Duration) -> Result<(), SourceError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(SourceError::Cancelled),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Thin wrapper over a [`reqwest::Client`] that speaks [`SourceError`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    user_agent: String,
    cancel: CancelSignal,
}

impl Fetcher {
    pub fn new(config: &SourcesConfig, cancel: CancelSignal) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Fetcher {
            client,
            user_agent: config.user_agent.clone(),
            cancel,
        })
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        if self.cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        tracing::debug!(url, "GET");
        let request = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json, text/csv, text/plain, */*")
            .send();

        let response = tokio::select! {
            response = request => response?,
            _ = self.cancel.cancelled() => return Err(SourceError::Cancelled),
        };

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!(url, "upstream rate limit hit");
                Err(SourceError::RateLimited)
            }
            status if !status.is_success() => Err(SourceError::Status(status.as_u16())),
            _ => Ok(response),
        }
    }

    /// Fetch a body as text.
    pub async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self.send(url).await?;
        tokio::select! {
            body = response.text() => Ok(body?),
            _ = self.cancel.cancelled() => Err(SourceError::Cancelled),
        }
    }

    /// Fetch and deserialize a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self.send(url).await?;
        tokio::select! {
            body = response.json::<T>() => Ok(body?),
            _ = self.cancel.cancelled() => Err(SourceError::Cancelled),
        }
    }

    /// `true` when `url` answers with HTTP 200.
    pub async fn probe(&self, url: &str) -> bool {
        match self.send(url).await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                tracing::debug!(url, error = %err, "probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_signal_trips_all_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        signal.cancel();
        assert!(clone.is_cancelled());
        // Must resolve immediately once tripped.
        clone.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancelled_fetcher_short_circuits() {
        let signal = CancelSignal::new();
        let fetcher = Fetcher::new(&SourcesConfig::default(), signal.clone()).unwrap();
        signal.cancel();
        let err = fetcher.get_text("http://127.0.0.1:9/never").await.unwrap_err();
        assert!(matches!(err, SourceError::Cancelled));

        let err = fetcher
            .get_json::<serde_json::Value>("http://127.0.0.1:9/never")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Cancelled));
    }

    #[tokio::test]
    async fn test_sleep_returns_early_on_cancel() {
        let signal = CancelSignal::new();
        assert!(signal.sleep(std::time::Duration::ZERO).await.is_ok());

        signal.cancel();
        let slept = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            signal.sleep(std::time::Duration::from_secs(3_600)),
        )
        .await
        .expect("sleep should end on cancel");
        assert!(matches!(slept, Err(SourceError::Cancelled)));
    }
}
