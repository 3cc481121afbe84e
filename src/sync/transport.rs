use super::{SyncConfig, SyncPayload};
use crate::error::SyncError;
use std::time::Duration;

/// Sends a batch upstream and reports the HTTP status.
///
/// `Err` means no status was received at all.
pub trait SyncTransport: Send + Sync {
    fn post(&self, payload: &SyncPayload) -> Result<u16, SyncError>;
}

/// JSON-over-HTTP transport with an optional bearer credential.
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_timeout(config.endpoint.clone(), config.api_key.clone(), config.timeout)
    }

    pub fn with_timeout(endpoint: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint,
            api_key,
        }
    }
}

impl SyncTransport for HttpTransport {
    fn post(&self, payload: &SyncPayload) -> Result<u16, SyncError> {
        let body = serde_json::to_string(payload)?;

        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        match request.send_string(&body) {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(status, _)) => Ok(status),
            Err(e) => Err(SyncError::Transport(e.to_string())),
        }
    }
}
