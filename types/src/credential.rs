//! Ephemeral credential payloads handed out by the credential broker.

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClientSecret {
    value: Option<String>,
    expires_at: Option<i64>,
}

/// Broker response. The token shows up either as top-level `value` (the
/// `client_secrets` endpoint) or nested as `client_secret.value` (the older
/// `sessions` endpoint); both shapes are accepted.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EphemeralCredential {
    value: Option<String>,
    expires_at: Option<i64>,
    client_secret: Option<ClientSecret>,
}

impl EphemeralCredential {
    pub fn new(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::default()
        }
    }

    /// The bearer token, if the payload carries a usable one.
    pub fn token(&self) -> Option<&str> {
        let nested = self.client_secret.as_ref().and_then(|s| s.value.as_deref());
        [self.value.as_deref(), nested]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())
    }

    /// Unix timestamp after which the token stops working.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
            .or_else(|| self.client_secret.as_ref().and_then(|s| s.expires_at))
    }
}
