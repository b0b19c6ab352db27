//! Parsing and routing of messages from the event channel.

use crate::session::Status;
use crate::transcript::Speaker;
use crate::types::{MessageRole, ServerEvent};

/// What the session should do in response to one server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Status(Status),
    /// Append a turn. `utterance` identifies the conversation item, if known.
    Append {
        speaker: Speaker,
        text: String,
        utterance: Option<String>,
    },
}

/// Parses one channel message. Malformed input is logged and dropped.
pub fn parse(text: &str) -> Option<ServerEvent> {
    let json = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("dropping unparseable message: {}, text=> {:?}", e, text);
            return None;
        }
    };
    let event_type = json.get("type").and_then(|v| v.as_str()).map(str::to_string);
    let event_id = json
        .get("event_id")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    match serde_json::from_value::<ServerEvent>(json) {
        Ok(event) => {
            tracing::debug!(
                "received message: {}, id={}",
                event.kind(),
                event_id.as_deref().unwrap_or("unknown")
            );
            if matches!(event, ServerEvent::Unknown) {
                tracing::trace!("unhandled event type {:?}", event_type);
            }
            Some(event)
        }
        Err(e) => {
            tracing::warn!("dropping malformed event: {}, type=> {:?}", e, event_type);
            None
        }
    }
}

pub fn classify(event: &ServerEvent) -> Vec<Effect> {
    match event {
        ServerEvent::SessionCreated(_) => vec![Effect::Status(Status::SessionStarted)],
        ServerEvent::SessionUpdated(_) => vec![],
        ServerEvent::InputAudioBufferSpeechStarted(_) => vec![Effect::Status(Status::Listening)],
        ServerEvent::InputAudioBufferSpeechStopped(_) => vec![Effect::Status(Status::Processing)],
        ServerEvent::ResponseAudioTranscriptDone(done) => {
            let mut effects = Vec::with_capacity(2);
            if let Some(text) = done.transcript().and_then(clean) {
                effects.push(Effect::Append {
                    speaker: Speaker::Assistant,
                    text,
                    utterance: done.item_id().map(str::to_string),
                });
            }
            effects.push(Effect::Status(Status::ReadyToListen));
            effects
        }
        ServerEvent::ConversationItemInputAudioTranscriptionCompleted(completed) => {
            let text = completed.transcript().and_then(clean).or_else(|| {
                completed
                    .item()
                    .filter(|item| item.role() == Some(MessageRole::User))
                    .and_then(|item| item.first_text())
            });
            let utterance = completed
                .item_id()
                .or_else(|| completed.item().and_then(|item| item.id()))
                .map(str::to_string);
            user_turn(text, utterance)
        }
        ServerEvent::ConversationItemCreated(created) => {
            let item = created.item();
            if item.role() != Some(MessageRole::User) {
                return vec![];
            }
            user_turn(item.first_text(), item.id().map(str::to_string))
        }
        ServerEvent::ResponseDone(_) => vec![Effect::Status(Status::ReadyToListen)],
        ServerEvent::Error(error) => {
            tracing::error!("realtime service error: {:?}", error.error());
            let message = error.message().unwrap_or("unknown").to_string();
            vec![Effect::Status(Status::Error(message))]
        }
        ServerEvent::Unknown => vec![],
    }
}

fn user_turn(text: Option<String>, utterance: Option<String>) -> Vec<Effect> {
    match text {
        Some(text) => vec![Effect::Append {
            speaker: Speaker::User,
            text,
            utterance,
        }],
        None => vec![],
    }
}

fn clean(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
