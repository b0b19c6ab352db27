use crate::media::CaptureStream;
use crate::peer::{DataChannel, PeerConnection};
use crate::types::events::SessionUpdateEvent;
use crate::types::{ClientEvent, Session};

/// The event channel, typed by whether it has opened yet.
///
/// Only [`OpenChannel`] can send, and it is only handed out once, on the
/// transition out of `Pending`.
pub(crate) enum ChannelSlot {
    Pending(Box<dyn DataChannel>),
    Open(OpenChannel),
    Closed,
}

pub(crate) struct OpenChannel {
    channel: Box<dyn DataChannel>,
}

impl OpenChannel {
    pub(crate) async fn send(&mut self, event: &ClientEvent) -> anyhow::Result<()> {
        let text = serde_json::to_string(event)?;
        self.channel.send(text).await
    }

    pub(crate) async fn update_session(&mut self, session: Session) -> anyhow::Result<()> {
        self.send(&ClientEvent::SessionUpdate(SessionUpdateEvent::new(session)))
            .await
    }
}

impl ChannelSlot {
    /// Marks the channel open. Yields the sender only the first time.
    pub(crate) fn open(&mut self) -> Option<&mut OpenChannel> {
        if !matches!(self, ChannelSlot::Pending(_)) {
            return None;
        }
        if let ChannelSlot::Pending(channel) = std::mem::replace(self, ChannelSlot::Closed) {
            *self = ChannelSlot::Open(OpenChannel { channel });
        }
        match self {
            ChannelSlot::Open(open) => Some(open),
            _ => None,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        matches!(self, ChannelSlot::Open(_))
    }

    pub(crate) async fn close(&mut self) {
        match std::mem::replace(self, ChannelSlot::Closed) {
            ChannelSlot::Pending(mut channel) => channel.close().await,
            ChannelSlot::Open(mut open) => open.channel.close().await,
            ChannelSlot::Closed => {}
        }
    }
}

/// Handles owned by a negotiated session.
pub(crate) struct Link {
    pub(crate) peer: Box<dyn PeerConnection>,
    pub(crate) channel: ChannelSlot,
    pub(crate) capture: Box<dyn CaptureStream>,
}

impl Link {
    /// Channel first, then the link, then the microphone.
    pub(crate) async fn release(&mut self) {
        self.channel.close().await;
        self.peer.close().await;
        self.capture.stop();
    }
}

/// Whatever part of a [`Link`] got built before negotiation stopped.
#[derive(Default)]
pub(crate) struct PartialLink {
    pub(crate) peer: Option<Box<dyn PeerConnection>>,
    pub(crate) channel: Option<Box<dyn DataChannel>>,
    pub(crate) capture: Option<Box<dyn CaptureStream>>,
}

impl PartialLink {
    pub(crate) fn complete(self) -> Result<Link, PartialLink> {
        match self {
            PartialLink {
                peer: Some(peer),
                channel: Some(channel),
                capture: Some(capture),
            } => Ok(Link {
                peer,
                channel: ChannelSlot::Pending(channel),
                capture,
            }),
            partial => Err(partial),
        }
    }

    pub(crate) async fn release(mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
        if let Some(mut peer) = self.peer.take() {
            peer.close().await;
        }
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }
}
