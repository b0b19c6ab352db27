pub mod analysis;
pub mod broker;
pub mod config;
mod consts;
pub mod domains;
pub mod error;
pub mod inbound;
pub mod media;
pub mod peer;
pub mod scheduler;
pub mod session;
pub mod signaling;
pub mod transcript;

pub use aproof_realtime_types as types;
pub use config::{Config, ConfigBuilder, ConfigError};
pub use error::{ManagerGone, SessionError, SignalingError};
pub use session::{
    Collaborators, SessionEvent, SessionHandle, SessionId, SessionManager, SessionState, Status,
};
pub use transcript::{Speaker, Transcript, Turn};

#[cfg(feature = "utils")]
pub use aproof_realtime_utils as utils;
