//! HTTP callback used when no in-process handler is installed.

use std::time::Duration;

use cadence_protocols::TaskPayload;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SchedulerError;

/// POSTs the task payload as JSON to a fixed URL.
#[derive(Clone)]
pub struct HttpCallback {
    client: reqwest::Client,
    url: String,
}

impl HttpCallback {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, SchedulerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::CallbackRequest(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver `payload`. Anything but `200 OK` is a failure.
    pub async fn notify(
        &self,
        payload: &TaskPayload,
        cancel: &CancellationToken,
    ) -> Result<(), SchedulerError> {
        let request = self.client.post(&self.url).json(payload).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(SchedulerError::CallbackRequest("cancelled".to_string()));
            }
            response = request => response.map_err(|e| SchedulerError::CallbackRequest(e.to_string()))?,
        };

        let status = response.status();
        debug!(url = %self.url, identity = %payload.identity, status = %status, "Callback delivered");
        if status != StatusCode::OK {
            return Err(SchedulerError::CallbackFailed {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
