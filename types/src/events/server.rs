mod error;

pub use error::ErrorDetails;

use crate::content::items::ItemResource;

/// `error` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ErrorEvent {
    event_id: Option<String>,

    /// Details about the error
    error: Option<ErrorDetails>,
}

impl ErrorEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorDetails> {
        self.error.as_ref()
    }

    /// The human readable message, if the server sent one.
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(ErrorDetails::message)
            .filter(|m| !m.trim().is_empty())
    }
}

/// The session resource carried by `session.created` / `session.updated`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionResource {
    id: Option<String>,
    model: Option<String>,
}

impl SessionResource {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// `session.created` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionCreatedEvent {
    event_id: Option<String>,
    session: SessionResource,
}

impl SessionCreatedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn session(&self) -> &SessionResource {
        &self.session
    }
}

/// `session.updated` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionUpdatedEvent {
    event_id: Option<String>,
    session: SessionResource,
}

impl SessionUpdatedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn session(&self) -> &SessionResource {
        &self.session
    }
}

/// `input_audio_buffer.speech_started` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InputAudioBufferSpeechStartedEvent {
    event_id: Option<String>,

    /// Milliseconds since the session started when speech was detected
    audio_start_ms: Option<u64>,

    /// The ID of the user message item that will be created when speech stops
    item_id: Option<String>,
}

impl InputAudioBufferSpeechStartedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn audio_start_ms(&self) -> Option<u64> {
        self.audio_start_ms
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }
}

/// `input_audio_buffer.speech_stopped` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InputAudioBufferSpeechStoppedEvent {
    event_id: Option<String>,

    /// Milliseconds since the session started when speech stopped
    audio_end_ms: Option<u64>,

    item_id: Option<String>,
}

impl InputAudioBufferSpeechStoppedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn audio_end_ms(&self) -> Option<u64> {
        self.audio_end_ms
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }
}

/// `conversation.item.created` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConversationItemCreatedEvent {
    event_id: Option<String>,

    /// The ID of the preceding item
    previous_item_id: Option<String>,

    /// The item that was created
    item: ItemResource,
}

impl ConversationItemCreatedEvent {
    pub fn new(item: ItemResource) -> Self {
        Self {
            event_id: None,
            previous_item_id: None,
            item,
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn previous_item_id(&self) -> Option<&str> {
        self.previous_item_id.as_deref()
    }

    pub fn item(&self) -> &ItemResource {
        &self.item
    }
}

/// `conversation.item.input_audio_transcription.completed` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConversationItemInputAudioTranscriptionCompletedEvent {
    event_id: Option<String>,

    /// The ID of the user message item
    item_id: Option<String>,

    content_index: Option<u32>,

    /// The transcribed text
    transcript: Option<String>,

    /// Some deployments attach the item instead of a flat transcript
    item: Option<ItemResource>,
}

impl ConversationItemInputAudioTranscriptionCompletedEvent {
    pub fn new(item_id: Option<&str>, transcript: Option<&str>) -> Self {
        Self {
            event_id: None,
            item_id: item_id.map(str::to_string),
            content_index: None,
            transcript: transcript.map(str::to_string),
            item: None,
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn content_index(&self) -> Option<u32> {
        self.content_index
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn item(&self) -> Option<&ItemResource> {
        self.item.as_ref()
    }
}

/// `response.audio_transcript.done` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResponseAudioTranscriptDoneEvent {
    event_id: Option<String>,
    response_id: Option<String>,
    item_id: Option<String>,
    output_index: Option<u32>,
    content_index: Option<u32>,

    /// The final transcript of the audio
    transcript: Option<String>,
}

impl ResponseAudioTranscriptDoneEvent {
    pub fn new(item_id: Option<&str>, transcript: Option<&str>) -> Self {
        Self {
            item_id: item_id.map(str::to_string),
            transcript: transcript.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResponseResource {
    id: Option<String>,

    /// "completed", "cancelled", "failed", "incomplete"
    status: Option<String>,
}

impl ResponseResource {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// `response.done` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResponseDoneEvent {
    event_id: Option<String>,
    response: ResponseResource,
}

impl ResponseDoneEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn response(&self) -> &ResponseResource {
        &self.response
    }
}
