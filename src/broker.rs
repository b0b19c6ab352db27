use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::error::SessionError;
use crate::types::credential::EphemeralCredential;

/// Issues one short-lived credential per realtime session.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn issue(&self) -> Result<EphemeralCredential>;
}

/// Broker reached over HTTP, e.g. a serverless function wrapping
/// `/v1/realtime/client_secrets`.
pub struct HttpCredentialBroker {
    client: Client,
    url: String,
    functions_key: Option<SecretString>,
}

impl HttpCredentialBroker {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            functions_key: None,
        }
    }

    pub fn with_functions_key(mut self, key: &SecretString) -> Self {
        self.functions_key = Some(SecretString::from(key.expose_secret().to_string()));
        self
    }
}

#[async_trait]
impl CredentialBroker for HttpCredentialBroker {
    async fn issue(&self) -> Result<EphemeralCredential> {
        let mut request = self.client.post(&self.url).json(&serde_json::json!({}));
        if let Some(key) = &self.functions_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("broker returned {}: {}", status.as_u16(), body);
        }
        Ok(response.json::<EphemeralCredential>().await?)
    }
}

/// Asks the broker for a credential, bounded by `limit`.
///
/// Running out of time is reported separately from every other failure.
pub(crate) async fn request_token(
    broker: &dyn CredentialBroker,
    limit: Duration,
) -> Result<SecretString, SessionError> {
    let credential = tokio::time::timeout(limit, broker.issue())
        .await
        .map_err(|_| SessionError::SignalingTimeout(limit))?
        .map_err(|e| SessionError::Credential(e.to_string()))?;

    match credential.token() {
        Some(token) => {
            tracing::debug!("received credential, expires_at={:?}", credential.expires_at());
            Ok(SecretString::from(token.to_string()))
        }
        None => Err(SessionError::Credential(
            "broker response carried no token".to_string(),
        )),
    }
}
