use std::time::Duration;

/// Failures of the SDP exchange with the realtime service.
#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("signaling rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed session description answer")]
    MalformedAnswer,
    #[error("signaling transport failed: {0}")]
    Transport(String),
    #[error("peer connection failed: {0}")]
    Peer(String),
}

/// Everything that can end a session early.
///
/// None of these is fatal to the host. Each one stops the session and is
/// reported through a status message.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no usable session credential: {0}")]
    Credential(String),
    #[error("microphone unavailable: {0}")]
    MediaAccess(String),
    #[error(transparent)]
    Signaling(#[from] SignalingError),
    #[error("credential request timed out after {0:?}")]
    SignalingTimeout(Duration),
    #[error("event channel closed unexpectedly")]
    Channel,
    #[error("domain analysis failed: {0}")]
    Classifier(String),
    #[error("session stopped during negotiation")]
    Cancelled,
}

/// The session manager task is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session manager is not running")]
pub struct ManagerGone;
