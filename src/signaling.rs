//! Negotiates the media link and event channel with the realtime service.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::oneshot;

use crate::broker;
use crate::consts::{CONTENT_TYPE_HEADER, SDP_CONTENT_TYPE};
use crate::error::{SessionError, SignalingError};
use crate::media::AudioConstraints;
use crate::peer::PeerEventSink;
use crate::session::link::{Link, PartialLink};
use crate::session::{Collaborators, Status};

/// Trades a local offer for the remote answer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignalingEndpoint: Send + Sync {
    async fn exchange(&self, offer: &str, token: &SecretString) -> Result<String, SignalingError>;
}

/// POSTs the offer to the realtime `calls` endpoint.
pub struct HttpSignalingEndpoint {
    client: Client,
    calls_url: String,
}

impl HttpSignalingEndpoint {
    pub fn new(calls_url: &str) -> Self {
        Self {
            client: Client::new(),
            calls_url: calls_url.to_string(),
        }
    }
}

#[async_trait]
impl SignalingEndpoint for HttpSignalingEndpoint {
    async fn exchange(&self, offer: &str, token: &SecretString) -> Result<String, SignalingError> {
        let response = self
            .client
            .post(&self.calls_url)
            .bearer_auth(token.expose_secret())
            .header(CONTENT_TYPE_HEADER, SDP_CONTENT_TYPE)
            .body(offer.to_string())
            .send()
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(SignalingError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Settings for one negotiation.
#[derive(Debug, Clone)]
pub(crate) struct Negotiation {
    pub(crate) channel_label: String,
    pub(crate) broker_timeout: Duration,
    pub(crate) constraints: AudioConstraints,
}

/// Builds a [`Link`]: credential, link, microphone, event channel, offer, answer.
///
/// A message on `cancel`, or dropping its sender, abandons the negotiation
/// at the next await point. On failure or cancellation everything built so
/// far is released before returning.
pub(crate) async fn establish(
    parts: &Collaborators,
    params: &Negotiation,
    events: PeerEventSink,
    progress: &(dyn Fn(Status) + Send + Sync),
    mut cancel: oneshot::Receiver<()>,
) -> Result<Link, SessionError> {
    progress(Status::RequestingCredential);
    let token = tokio::select! {
        token = broker::request_token(parts.broker.as_ref(), params.broker_timeout) => token?,
        _ = &mut cancel => return Err(SessionError::Cancelled),
    };

    progress(Status::OpeningLink);
    let mut partial = PartialLink::default();
    let negotiated = tokio::select! {
        negotiated = negotiate(&mut partial, parts, params, events, &token) => negotiated,
        _ = &mut cancel => Err(SessionError::Cancelled),
    };
    if let Err(e) = negotiated {
        tracing::debug!("negotiation abandoned: {}", e);
        partial.release().await;
        return Err(e);
    }
    match partial.complete() {
        Ok(link) => Ok(link),
        Err(partial) => {
            partial.release().await;
            Err(SignalingError::Peer("link incomplete after negotiation".to_string()).into())
        }
    }
}

async fn negotiate(
    partial: &mut PartialLink,
    parts: &Collaborators,
    params: &Negotiation,
    events: PeerEventSink,
    token: &SecretString,
) -> Result<(), SessionError> {
    let peer = parts.connector.connect(events).await.map_err(peer_error)?;
    let peer = partial.peer.insert(peer);

    let capture = parts
        .capture
        .open(&params.constraints)
        .await
        .map_err(|e| SessionError::MediaAccess(e.to_string()))?;
    let capture = partial.capture.insert(capture);
    for track in capture.take_tracks() {
        tracing::debug!("adding local track {}", track.id());
        peer.add_track(track).await.map_err(peer_error)?;
    }

    // The channel has to exist before the offer so it is negotiated with it.
    let channel = peer
        .create_data_channel(&params.channel_label)
        .await
        .map_err(peer_error)?;
    partial.channel = Some(channel);

    let offer = peer.create_offer().await.map_err(peer_error)?;
    let answer = parts.signaling.exchange(&offer, token).await?;
    if !answer.trim_start().starts_with("v=") {
        return Err(SignalingError::MalformedAnswer.into());
    }
    peer.set_remote_answer(&answer).await.map_err(peer_error)?;
    tracing::info!("remote answer applied, waiting for the event channel");
    Ok(())
}

fn peer_error(e: anyhow::Error) -> SessionError {
    SignalingError::Peer(e.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MockDomainClassifier;
    use crate::broker::MockCredentialBroker;
    use crate::media::{MockAudioPlayback, MockCaptureStream, MockMediaCapture};
    use crate::peer::{LocalAudioTrack, MockDataChannel, MockPeerConnection, MockPeerConnector};
    use crate::session::SessionId;
    use crate::types::credential::EphemeralCredential;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use mockall::Sequence;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{mpsc, Notify};

    const ANSWER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n";

    fn params() -> Negotiation {
        Negotiation {
            channel_label: "oai-events".to_string(),
            broker_timeout: Duration::from_secs(12),
            constraints: AudioConstraints::default(),
        }
    }

    fn sink() -> PeerEventSink {
        let (tx, _rx) = mpsc::unbounded_channel();
        PeerEventSink::new(SessionId::generate(), tx)
    }

    fn broker_with_token() -> MockCredentialBroker {
        let mut broker = MockCredentialBroker::new();
        broker
            .expect_issue()
            .returning(|| Ok(EphemeralCredential::new("ek_test")));
        broker
    }

    fn capture_with_track(stop_calls: Arc<Mutex<u32>>) -> MockMediaCapture {
        let mut capture = MockMediaCapture::new();
        capture.expect_open().times(1).returning(move |_| {
            let mut stream = MockCaptureStream::new();
            stream
                .expect_take_tracks()
                .returning(|| vec![LocalAudioTrack::new("mic")]);
            let stops = stop_calls.clone();
            stream.expect_stop().returning(move || *stops.lock().unwrap() += 1);
            Ok(Box::new(stream))
        });
        capture
    }

    fn parts(
        broker: MockCredentialBroker,
        connector: MockPeerConnector,
        signaling: MockSignalingEndpoint,
        capture: MockMediaCapture,
    ) -> Collaborators {
        Collaborators {
            broker: Arc::new(broker),
            classifier: Arc::new(MockDomainClassifier::new()),
            connector: Arc::new(connector),
            signaling: Arc::new(signaling),
            capture: Arc::new(capture),
            playback: Arc::new(MockAudioPlayback::new()),
        }
    }

    #[tokio::test]
    async fn negotiates_in_order() {
        let mut seq = Sequence::new();
        let mut peer = MockPeerConnection::new();
        peer.expect_add_track()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        peer.expect_create_data_channel()
            .withf(|label| label == "oai-events")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Box::new(MockDataChannel::new())));
        peer.expect_create_offer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok("v=0 offer".to_string()));
        peer.expect_set_remote_answer()
            .withf(|sdp| sdp == ANSWER)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut connector = MockPeerConnector::new();
        let mut peer = Some(peer);
        connector.expect_connect().times(1).returning(move |_| {
            let peer = peer.take().unwrap();
            Ok(Box::new(peer))
        });

        let mut signaling = MockSignalingEndpoint::new();
        signaling
            .expect_exchange()
            .withf(|offer, token| offer == "v=0 offer" && token.expose_secret() == "ek_test")
            .times(1)
            .returning(|_, _| Ok(ANSWER.to_string()));

        let stops = Arc::new(Mutex::new(0));
        let parts = parts(
            broker_with_token(),
            connector,
            signaling,
            capture_with_track(stops.clone()),
        );

        let seen = Mutex::new(Vec::new());
        let progress = |status: Status| seen.lock().unwrap().push(status);
        let (_cancel, cancelled) = oneshot::channel();
        let link = establish(&parts, &params(), sink(), &progress, cancelled).await;

        assert!(link.is_ok());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Status::RequestingCredential, Status::OpeningLink]
        );
        assert_eq!(*stops.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn rejected_answer_releases_everything_built() {
        let mut peer = MockPeerConnection::new();
        peer.expect_add_track().returning(|_| Ok(()));
        peer.expect_create_data_channel().returning(|_| {
            let mut channel = MockDataChannel::new();
            channel.expect_close().times(1).returning(|| ());
            Ok(Box::new(channel))
        });
        peer.expect_create_offer().returning(|| Ok("v=0 offer".to_string()));
        peer.expect_set_remote_answer().never();
        peer.expect_close().times(1).returning(|| ());

        let mut connector = MockPeerConnector::new();
        let mut peer = Some(peer);
        connector
            .expect_connect()
            .returning(move |_| Ok(Box::new(peer.take().unwrap())));

        let mut signaling = MockSignalingEndpoint::new();
        signaling.expect_exchange().returning(|_, _| {
            Err(SignalingError::Rejected {
                status: 401,
                body: "bad token".to_string(),
            })
        });

        let stops = Arc::new(Mutex::new(0));
        let parts = parts(
            broker_with_token(),
            connector,
            signaling,
            capture_with_track(stops.clone()),
        );

        let (_cancel, cancelled) = oneshot::channel();
        let err = establish(&parts, &params(), sink(), &|_: Status| {}, cancelled)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SessionError::Signaling(SignalingError::Rejected { status: 401, .. })
        ));
        assert_eq!(*stops.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn denied_microphone_closes_the_link() {
        let mut peer = MockPeerConnection::new();
        peer.expect_close().times(1).returning(|| ());
        let mut connector = MockPeerConnector::new();
        let mut peer = Some(peer);
        connector
            .expect_connect()
            .returning(move |_| Ok(Box::new(peer.take().unwrap())));

        let mut capture = MockMediaCapture::new();
        capture
            .expect_open()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let parts = parts(
            broker_with_token(),
            connector,
            MockSignalingEndpoint::new(),
            capture,
        );

        let (_cancel, cancelled) = oneshot::channel();
        let err = establish(&parts, &params(), sink(), &|_: Status| {}, cancelled)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::MediaAccess(msg) if msg.contains("permission denied")));
    }

    #[tokio::test]
    async fn missing_token_never_touches_the_link() {
        let mut broker = MockCredentialBroker::new();
        broker
            .expect_issue()
            .returning(|| Ok(EphemeralCredential::default()));
        let mut connector = MockPeerConnector::new();
        connector.expect_connect().never();

        let parts = parts(
            broker,
            connector,
            MockSignalingEndpoint::new(),
            MockMediaCapture::new(),
        );
        let (_cancel, cancelled) = oneshot::channel();
        let err = establish(&parts, &params(), sink(), &|_: Status| {}, cancelled)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Credential(_)));
    }

    #[tokio::test]
    async fn empty_answer_is_malformed() {
        let mut peer = MockPeerConnection::new();
        peer.expect_add_track().returning(|_| Ok(()));
        peer.expect_create_data_channel().returning(|_| {
            let mut channel = MockDataChannel::new();
            channel.expect_close().returning(|| ());
            Ok(Box::new(channel))
        });
        peer.expect_create_offer().returning(|| Ok("v=0 offer".to_string()));
        peer.expect_close().returning(|| ());
        let mut connector = MockPeerConnector::new();
        let mut peer = Some(peer);
        connector
            .expect_connect()
            .returning(move |_| Ok(Box::new(peer.take().unwrap())));

        let mut signaling = MockSignalingEndpoint::new();
        signaling
            .expect_exchange()
            .returning(|_, _| Ok("  ".to_string()));

        let parts = parts(
            broker_with_token(),
            connector,
            signaling,
            capture_with_track(Arc::new(Mutex::new(0))),
        );
        let (_cancel, cancelled) = oneshot::channel();
        let err = establish(&parts, &params(), sink(), &|_: Status| {}, cancelled)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SessionError::Signaling(SignalingError::MalformedAnswer)
        ));
    }

    struct StalledSignaling {
        entered: Notify,
    }

    #[async_trait]
    impl SignalingEndpoint for StalledSignaling {
        async fn exchange(&self, _offer: &str, _token: &SecretString) -> Result<String, SignalingError> {
            self.entered.notify_one();
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancel_during_exchange_releases_everything_built() {
        let mut peer = MockPeerConnection::new();
        peer.expect_add_track().returning(|_| Ok(()));
        peer.expect_create_data_channel().returning(|_| {
            let mut channel = MockDataChannel::new();
            channel.expect_close().times(1).returning(|| ());
            Ok(Box::new(channel))
        });
        peer.expect_create_offer().returning(|| Ok("v=0 offer".to_string()));
        peer.expect_set_remote_answer().never();
        peer.expect_close().times(1).returning(|| ());
        let mut connector = MockPeerConnector::new();
        let mut peer = Some(peer);
        connector
            .expect_connect()
            .returning(move |_| Ok(Box::new(peer.take().unwrap())));

        let stops = Arc::new(Mutex::new(0));
        let mut parts = parts(
            broker_with_token(),
            connector,
            MockSignalingEndpoint::new(),
            capture_with_track(stops.clone()),
        );
        let stalled = Arc::new(StalledSignaling {
            entered: Notify::new(),
        });
        parts.signaling = stalled.clone();

        let (cancel, cancelled) = oneshot::channel();
        let params = params();
        let (result, ()) = tokio::join!(
            establish(&parts, &params, sink(), &|_: Status| {}, cancelled),
            async move {
                stalled.entered.notified().await;
                let _ = cancel.send(());
            }
        );

        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert_eq!(*stops.lock().unwrap(), 1);
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/realtime/calls")
    }

    #[tokio::test]
    async fn http_exchange_posts_sdp_with_bearer() {
        let router = Router::new().route(
            "/v1/realtime/calls",
            post(|headers: HeaderMap, body: String| async move {
                let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
                if auth != Some("Bearer ek_test") || content_type != Some("application/sdp") {
                    return (StatusCode::UNAUTHORIZED, "bad request headers".to_string());
                }
                assert_eq!(body, "v=0 offer");
                (StatusCode::CREATED, ANSWER.to_string())
            }),
        );
        let url = serve(router).await;

        let answer = HttpSignalingEndpoint::new(&url)
            .exchange("v=0 offer", &SecretString::from("ek_test".to_string()))
            .await
            .unwrap();
        assert_eq!(answer, ANSWER);
    }

    #[tokio::test]
    async fn http_exchange_reports_status_and_body() {
        let router = Router::new().route(
            "/v1/realtime/calls",
            post(|| async { (StatusCode::BAD_REQUEST, "invalid sdp") }),
        );
        let url = serve(router).await;

        let err = HttpSignalingEndpoint::new(&url)
            .exchange("v=0 offer", &SecretString::from("ek_test".to_string()))
            .await
            .unwrap_err();
        match err {
            SignalingError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid sdp");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
