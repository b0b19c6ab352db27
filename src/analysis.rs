use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::types::analysis::{AnalysisEnvelope, AnalysisRequest, AnalysisResult};

/// Scores the conversation on the functioning domains.
///
/// One request, one response. Callers never retry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DomainClassifier: Send + Sync {
    async fn classify(&self, request: AnalysisRequest) -> Result<AnalysisResult>;
}

pub struct HttpDomainClassifier {
    client: Client,
    url: String,
    functions_key: Option<SecretString>,
}

impl HttpDomainClassifier {
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
impl DomainClassifier for HttpDomainClassifier {
    async fn classify(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.functions_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("classifier returned {}: {}", status.as_u16(), body);
        }

        // Hosted functions wrap their payload in `{"data": ...}`; plain ones don't.
        let envelope = response.json::<AnalysisEnvelope>().await?;
        Ok(envelope.into_result())
    }
}
