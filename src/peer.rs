//! The media link to the realtime service.
//!
//! The WebRTC stack itself belongs to the host. This module only describes the
//! handful of operations the session needs from it, plus the sink through
//! which the host reports asynchronous link events back to the session.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::session::{Inbox, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States after which the link is gone for good.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::Closed
        )
    }
}

/// One outbound audio track. Frames are mono PCM16 at the capture rate.
#[derive(Debug)]
pub struct LocalAudioTrack {
    id: String,
    frames: Option<mpsc::Receiver<Vec<i16>>>,
}

impl LocalAudioTrack {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            frames: None,
        }
    }

    pub fn with_frames(mut self, frames: mpsc::Receiver<Vec<i16>>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<Vec<i16>>> {
        self.frames.take()
    }
}

/// Remote media stream announced by the link.
#[derive(Debug)]
pub struct RemoteStream {
    id: String,
    frames: Option<mpsc::Receiver<Vec<i16>>>,
}

impl RemoteStream {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            frames: None,
        }
    }

    pub fn with_frames(mut self, frames: mpsc::Receiver<Vec<i16>>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<Vec<i16>>> {
        self.frames.take()
    }
}

#[derive(Debug)]
pub enum PeerEvent {
    ChannelOpen,
    /// One text frame from the event channel.
    ChannelMessage(String),
    ChannelClosed,
    ConnectionState(ConnectionState),
    RemoteTrack(RemoteStream),
}

/// Hands link events to the session that created the link.
///
/// Events are tagged with the session id, so a link that outlives its session
/// cannot disturb the next one.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    session: SessionId,
    inbox: mpsc::UnboundedSender<Inbox>,
}

impl PeerEventSink {
    pub(crate) fn new(session: SessionId, inbox: mpsc::UnboundedSender<Inbox>) -> Self {
        Self { session, inbox }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session
    }

    /// Returns false once the session manager is gone.
    pub fn emit(&self, event: PeerEvent) -> bool {
        self.inbox
            .send(Inbox::Peer {
                session: self.session.clone(),
                event,
            })
            .is_ok()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Creates a fresh, unconnected link. Link events go to `events`.
    async fn connect(&self, events: PeerEventSink) -> anyhow::Result<Box<dyn PeerConnection>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PeerConnection: Send {
    async fn add_track(&mut self, track: LocalAudioTrack) -> anyhow::Result<()>;

    /// Must be called before [`PeerConnection::create_offer`] so the channel is
    /// part of the offer.
    async fn create_data_channel(&mut self, label: &str) -> anyhow::Result<Box<dyn DataChannel>>;

    /// Creates the local offer, applies it as the local description and
    /// returns its SDP.
    async fn create_offer(&mut self) -> anyhow::Result<String>;

    async fn set_remote_answer(&mut self, sdp: &str) -> anyhow::Result<()>;

    /// Safe to call in any state, including before negotiation finished.
    async fn close(&mut self);
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataChannel: Send {
    async fn send(&mut self, text: String) -> anyhow::Result<()>;

    /// Safe to call before the channel ever opened.
    async fn close(&mut self);
}
