use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::consts::SESSION_ID_PREFIX;

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one conversation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{SESSION_ID_PREFIX}_{millis}_{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of the session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
    Stopping,
}

/// Human-readable phase of the session, emitted on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    RequestingCredential,
    OpeningLink,
    Negotiating,
    Connected,
    SessionStarted,
    Listening,
    Processing,
    ReadyToListen,
    Error(String),
    ChannelClosed,
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::RequestingCredential => f.write_str("requesting session credential"),
            Status::OpeningLink => f.write_str("opening connection"),
            Status::Negotiating => f.write_str("connecting"),
            Status::Connected => f.write_str("connected, speak now"),
            Status::SessionStarted => f.write_str("session started"),
            Status::Listening => f.write_str("listening"),
            Status::Processing => f.write_str("processing"),
            Status::ReadyToListen => f.write_str("ready to listen"),
            Status::Error(message) => write!(f, "error: {message}"),
            Status::ChannelClosed => f.write_str("data channel closed"),
            Status::Stopped => f.write_str("session stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("aproof_"));
    }

    #[test]
    fn status_messages() {
        assert_eq!(Status::SessionStarted.to_string(), "session started");
        assert_eq!(Status::ReadyToListen.to_string(), "ready to listen");
        assert_eq!(
            Status::Error("rate limited".to_string()).to_string(),
            "error: rate limited"
        );
    }
}
