//! The session state machine.
//!
//! One actor task owns the session slot. Host commands, link events, the
//! negotiation result and analysis timers all arrive on its inbox and are
//! handled one at a time, in arrival order.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::analysis::{DomainClassifier, HttpDomainClassifier};
use crate::broker::{CredentialBroker, HttpCredentialBroker};
use crate::config::Config;
use crate::consts::{COMMAND_CAPACITY, EVENT_CAPACITY};
use crate::error::{ManagerGone, SessionError, SignalingError};
use crate::inbound::{self, Effect};
use crate::media::{AudioConstraints, AudioOutput, AudioPlayback, MediaCapture};
use crate::peer::{PeerConnector, PeerEvent, PeerEventSink, RemoteStream};
use crate::scheduler::AnalysisScheduler;
use crate::signaling::{self, HttpSignalingEndpoint, Negotiation, SignalingEndpoint};
use crate::transcript::{Transcript, Turn};
use crate::types::analysis::AnalysisResult;
use crate::types::Session;

pub(crate) mod link;
mod state;

use link::Link;
pub use state::{SessionId, SessionState, Status};

/// The outside services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub broker: Arc<dyn CredentialBroker>,
    pub classifier: Arc<dyn DomainClassifier>,
    pub connector: Arc<dyn PeerConnector>,
    pub signaling: Arc<dyn SignalingEndpoint>,
    pub capture: Arc<dyn MediaCapture>,
    pub playback: Arc<dyn AudioPlayback>,
}

impl Collaborators {
    /// HTTP broker, classifier and SDP endpoint built from `config`; the
    /// link, microphone and playback come from the host.
    pub fn http(
        config: &Config,
        connector: Arc<dyn PeerConnector>,
        capture: Arc<dyn MediaCapture>,
        playback: Arc<dyn AudioPlayback>,
    ) -> Self {
        let mut broker = HttpCredentialBroker::new(config.broker_url());
        let mut classifier = HttpDomainClassifier::new(config.classifier_url());
        if let Some(key) = config.functions_key() {
            broker = broker.with_functions_key(key);
            classifier = classifier.with_functions_key(key);
        }
        Self {
            broker: Arc::new(broker),
            classifier: Arc::new(classifier),
            connector,
            signaling: Arc::new(HttpSignalingEndpoint::new(config.calls_url())),
            capture,
            playback,
        }
    }
}

/// What the host hears about.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StatusChanged(Status),
    TurnAppended(Turn),
    AnalysisAvailable(AnalysisResult),
}

pub(crate) enum Inbox {
    Progress {
        session: SessionId,
        status: Status,
    },
    /// The negotiation task of `session` is done; its result is in the task.
    Negotiated {
        session: SessionId,
    },
    Peer {
        session: SessionId,
        event: PeerEvent,
    },
    AnalysisDue {
        session: SessionId,
        generation: u64,
    },
}

enum Command {
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

/// The host's side of a running [`SessionManager`].
///
/// Dropping the last handle stops any live session and ends the manager.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Starts a session unless one is already connecting or active.
    ///
    /// Returns once the session is connecting, not once it is connected.
    pub async fn start(&self) -> Result<(), ManagerGone> {
        self.request(Command::Start).await
    }

    /// Stops the current session, if any. Returns once everything is released.
    pub async fn stop(&self) -> Result<(), ManagerGone> {
        self.request(Command::Stop).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    async fn request(&self, command: fn(oneshot::Sender<()>) -> Command) -> Result<(), ManagerGone> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(command(ack))
            .await
            .map_err(|_| ManagerGone)?;
        done.await.map_err(|_| ManagerGone)
    }
}

/// The one session slot and everything it owns.
struct ActiveSession {
    id: SessionId,
    started_at: SystemTime,
    negotiation: Option<PendingNegotiation>,
    link: Option<Link>,
    /// The channel reported open before negotiation handed over the link.
    open_pending: bool,
    output: Option<Box<dyn AudioOutput>>,
}

impl ActiveSession {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            started_at: SystemTime::now(),
            negotiation: None,
            link: None,
            open_pending: false,
            output: None,
        }
    }
}

/// A running [`signaling::establish`] and the means to abandon it.
struct PendingNegotiation {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<Result<Link, SessionError>>,
}

impl PendingNegotiation {
    async fn join(task: JoinHandle<Result<Link, SessionError>>) -> Result<Link, SessionError> {
        match task.await {
            Ok(result) => result,
            Err(e) => Err(SignalingError::Peer(format!("negotiation task failed: {e}")).into()),
        }
    }

    async fn finish(self) -> Result<Link, SessionError> {
        Self::join(self.task).await
    }

    /// Stops the negotiation and waits until it has released what it built.
    /// Yields the link if negotiation completed before the cancel landed.
    async fn abandon(self) -> Option<Link> {
        let _ = self.cancel.send(());
        match Self::join(self.task).await {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::debug!("negotiation ended: {}", e);
                None
            }
        }
    }
}

pub struct SessionManager {
    parts: Collaborators,
    negotiation: Negotiation,
    session_config: Session,
    inbox: mpsc::UnboundedSender<Inbox>,
    events: broadcast::Sender<SessionEvent>,
    state: watch::Sender<SessionState>,
    slot: Option<ActiveSession>,
    transcript: Transcript,
    scheduler: AnalysisScheduler,
}

impl SessionManager {
    /// Runs a manager on the current tokio runtime.
    pub fn spawn(config: Config, parts: Collaborators) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let manager = SessionManager {
            parts,
            negotiation: Negotiation {
                channel_label: config.data_channel_label().to_string(),
                broker_timeout: config.broker_timeout(),
                constraints: AudioConstraints::default(),
            },
            session_config: config.session(),
            inbox: inbox_tx,
            events: events.clone(),
            state: state_tx,
            slot: None,
            transcript: Transcript::new(),
            scheduler: AnalysisScheduler::new(config.quiet_period(), config.recent_window()),
        };
        tokio::spawn(manager.run(commands_rx, inbox_rx));

        SessionHandle {
            commands: commands_tx,
            events,
            state: state_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inbox: mpsc::UnboundedReceiver<Inbox>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start(ack)) => {
                        self.start();
                        let _ = ack.send(());
                    }
                    Some(Command::Stop(ack)) => {
                        self.stop().await;
                        let _ = ack.send(());
                    }
                    None => {
                        tracing::info!("session handles dropped, shutting down");
                        self.stop().await;
                        break;
                    }
                },
                Some(message) = inbox.recv() => self.dispatch(message).await,
            }
        }
    }

    fn start(&mut self) {
        let state = *self.state.borrow();
        if state != SessionState::Idle {
            tracing::debug!("start ignored while {:?}", state);
            return;
        }

        let id = SessionId::generate();
        tracing::info!("starting session {}", id);
        self.transcript.clear();
        self.scheduler.reset();
        self.slot = Some(ActiveSession::new(id.clone()));
        self.set_state(SessionState::Connecting);

        let parts = self.parts.clone();
        let params = self.negotiation.clone();
        let inbox = self.inbox.clone();
        let sink = PeerEventSink::new(id.clone(), inbox.clone());
        let progress_inbox = inbox.clone();
        let progress_id = id.clone();
        let (cancel, cancelled) = oneshot::channel();
        let task = tokio::spawn(async move {
            let progress = move |status: Status| {
                let _ = progress_inbox.send(Inbox::Progress {
                    session: progress_id.clone(),
                    status,
                });
            };
            let result = signaling::establish(&parts, &params, sink, &progress, cancelled).await;
            let _ = inbox.send(Inbox::Negotiated { session: id });
            result
        });
        if let Some(slot) = self.slot.as_mut() {
            slot.negotiation = Some(PendingNegotiation { cancel, task });
        }
    }

    /// Tears down the slot: timer, channel, link, microphone, playback.
    async fn stop(&mut self) {
        let Some(mut slot) = self.slot.take() else {
            tracing::debug!("stop ignored, no session");
            return;
        };
        tracing::info!("stopping session {}", slot.id);
        self.set_state(SessionState::Stopping);

        self.scheduler.cancel();
        if let Some(pending) = slot.negotiation.take() {
            tracing::debug!("abandoning negotiation of session {}", slot.id);
            if let Some(link) = pending.abandon().await {
                slot.link = Some(link);
            }
        }
        if let Some(mut link) = slot.link.take() {
            tracing::debug!("releasing link, channel open: {}", link.channel.is_open());
            link.release().await;
        }
        if let Some(mut output) = slot.output.take() {
            output.remove();
        }
        self.transcript.clear();

        self.set_state(SessionState::Idle);
        self.emit_status(Status::Stopped);
        tracing::info!(
            "session {} stopped after {:?}",
            slot.id,
            slot.started_at.elapsed().unwrap_or_default()
        );
    }

    async fn dispatch(&mut self, message: Inbox) {
        match message {
            Inbox::Progress { session, status } => {
                if self.is_current(&session) {
                    self.emit_status(status);
                }
            }
            Inbox::Negotiated { session } => self.on_negotiated(session).await,
            Inbox::Peer { session, event } => {
                if self.is_current(&session) {
                    self.on_peer_event(event).await;
                } else {
                    tracing::debug!("ignoring link event of ended session {}", session);
                }
            }
            Inbox::AnalysisDue {
                session,
                generation,
            } => {
                if self.is_current(&session) {
                    self.on_analysis_due(generation);
                }
            }
        }
    }

    async fn on_negotiated(&mut self, session: SessionId) {
        // A stopped session's negotiation was already joined by stop().
        let Some(pending) = self
            .slot
            .as_mut()
            .filter(|slot| slot.id == session)
            .and_then(|slot| slot.negotiation.take())
        else {
            tracing::debug!("ignoring negotiation result of ended session {}", session);
            return;
        };

        match pending.finish().await {
            Ok(link) => {
                let mut open_pending = false;
                if let Some(slot) = self.slot.as_mut() {
                    slot.link = Some(link);
                    open_pending = std::mem::take(&mut slot.open_pending);
                }
                self.emit_status(Status::Negotiating);
                if open_pending {
                    self.on_channel_open().await;
                }
            }
            Err(e) => {
                tracing::error!("failed to establish session {}: {}", session, e);
                self.emit_status(Status::Error(e.to_string()));
                self.stop().await;
            }
        }
    }

    async fn on_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::ChannelOpen => self.on_channel_open().await,
            PeerEvent::ChannelMessage(text) => self.on_channel_message(&text),
            PeerEvent::ChannelClosed => {
                tracing::error!("{}", SessionError::Channel);
                self.emit_status(Status::ChannelClosed);
                self.stop().await;
            }
            PeerEvent::ConnectionState(state) => {
                tracing::info!("connection state: {:?}", state);
                if state.is_terminal() {
                    self.stop().await;
                }
            }
            PeerEvent::RemoteTrack(stream) => self.on_remote_track(stream),
        }
    }

    async fn on_channel_open(&mut self) {
        let Some(slot) = self.slot.as_mut() else {
            return;
        };
        let Some(mut link) = slot.link.take() else {
            slot.open_pending = true;
            return;
        };
        let id = slot.id.clone();

        let sent = match link.channel.open() {
            Some(channel) => {
                self.set_state(SessionState::Active);
                tracing::info!("session {} active", id);
                self.emit_status(Status::Connected);
                Some(channel.update_session(self.session_config.clone()).await)
            }
            None => {
                tracing::debug!("event channel already open");
                None
            }
        };
        if let Some(slot) = self.slot.as_mut() {
            slot.link = Some(link);
        }

        if let Some(Err(e)) = sent {
            tracing::error!("failed to send session configuration: {}", e);
            self.emit_status(Status::Error(e.to_string()));
            self.stop().await;
        }
    }

    fn on_channel_message(&mut self, text: &str) {
        let Some(event) = inbound::parse(text) else {
            return;
        };
        for effect in inbound::classify(&event) {
            match effect {
                Effect::Status(status) => self.emit_status(status),
                Effect::Append {
                    speaker,
                    text,
                    utterance,
                } => {
                    let Some(turn) = self.transcript.append(speaker, &text, utterance.as_deref())
                    else {
                        continue;
                    };
                    let turn = turn.clone();
                    tracing::debug!("turn {} ({})", turn.position(), turn.speaker());
                    let _ = self.events.send(SessionEvent::TurnAppended(turn));
                    self.arm_analysis();
                }
            }
        }
    }

    fn on_remote_track(&mut self, stream: RemoteStream) {
        let Some(slot) = self.slot.as_mut() else {
            return;
        };
        if slot.output.is_none() {
            match self.parts.playback.create_output() {
                Ok(output) => slot.output = Some(output),
                Err(e) => {
                    tracing::warn!("no audio output for remote stream {}: {}", stream.id(), e);
                    return;
                }
            }
        }
        if let Some(output) = slot.output.as_mut() {
            output.attach(stream);
        }
    }

    fn arm_analysis(&mut self) {
        let Some(slot) = self.slot.as_ref() else {
            return;
        };
        let inbox = self.inbox.clone();
        let session = slot.id.clone();
        self.scheduler.arm(move |generation| {
            let _ = inbox.send(Inbox::AnalysisDue {
                session,
                generation,
            });
        });
    }

    fn on_analysis_due(&mut self, generation: u64) {
        let Some(request) = self.scheduler.take_due(generation, &self.transcript) else {
            return;
        };
        tracing::info!(
            "requesting domain analysis over {} turns",
            self.transcript.len()
        );

        let classifier = self.parts.classifier.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match classifier.classify(request).await {
                Ok(result) => {
                    let _ = events.send(SessionEvent::AnalysisAvailable(result));
                }
                Err(e) => tracing::warn!("{}", SessionError::Classifier(e.to_string())),
            }
        });
    }

    fn is_current(&self, session: &SessionId) -> bool {
        self.slot.as_ref().is_some_and(|slot| &slot.id == session)
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!("session state -> {:?}", state);
        self.state.send_replace(state);
    }

    fn emit_status(&self, status: Status) {
        tracing::info!("status: {}", status);
        let _ = self.events.send(SessionEvent::StatusChanged(status));
    }
}
