//! Session configuration.
//!
//! Built either through [`Config::builder`] or loaded from the environment
//! with [`Config::from_env`].

use std::time::Duration;

use secrecy::SecretString;

use crate::consts;
use crate::types::audio::{
    AudioFormat, InputAudioTranscription, ServerVadTurnDetection, TranscriptionModel,
    TurnDetection, Voice,
};
use crate::types::session::{MaxOutputTokens, ToolChoice};
use crate::types::Session;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug)]
pub struct Config {
    broker_url: String,
    classifier_url: String,
    functions_key: Option<SecretString>,
    calls_url: String,
    voice: Voice,
    instructions: String,
    quiet_period: Duration,
    broker_timeout: Duration,
    recent_window: usize,
    data_channel_label: String,
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_broker_url(mut self, url: &str) -> Self {
        self.config.broker_url = url.to_string();
        self
    }

    pub fn with_classifier_url(mut self, url: &str) -> Self {
        self.config.classifier_url = url.to_string();
        self
    }

    pub fn with_functions_key(mut self, key: &str) -> Self {
        self.config.functions_key = Some(SecretString::from(key.to_string()));
        self
    }

    pub fn with_calls_url(mut self, url: &str) -> Self {
        self.config.calls_url = url.to_string();
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.config.voice = voice;
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.config.instructions = instructions.to_string();
        self
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.config.quiet_period = quiet_period;
        self
    }

    pub fn with_broker_timeout(mut self, timeout: Duration) -> Self {
        self.config.broker_timeout = timeout;
        self
    }

    pub fn with_recent_window(mut self, lines: usize) -> Self {
        self.config.recent_window = lines;
        self
    }

    pub fn with_data_channel_label(mut self, label: &str) -> Self {
        self.config.data_channel_label = label.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Defaults for everything except the two collaborator URLs, which are left empty.
    pub fn new() -> Self {
        Self {
            broker_url: String::new(),
            classifier_url: String::new(),
            functions_key: None,
            calls_url: consts::DEFAULT_CALLS_URL.to_string(),
            voice: Voice::Alloy,
            instructions: consts::INTERVIEWER_INSTRUCTIONS.to_string(),
            quiet_period: Duration::from_millis(consts::DEFAULT_QUIET_PERIOD_MS),
            broker_timeout: Duration::from_millis(consts::DEFAULT_BROKER_TIMEOUT_MS),
            recent_window: consts::DEFAULT_RECENT_WINDOW,
            data_channel_label: consts::DATA_CHANNEL_LABEL.to_string(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Loads configuration from environment variables.
    ///
    /// *   `APROOF_BROKER_URL`: Endpoint issuing ephemeral realtime credentials. Required.
    /// *   `APROOF_CLASSIFIER_URL`: Endpoint of the domain classifier. Required.
    /// *   `APROOF_FUNCTIONS_KEY`: (Optional) Bearer token for both endpoints above.
    /// *   `OPENAI_REALTIME_CALLS_URL`: (Optional) SDP exchange endpoint.
    /// *   `OPENAI_REALTIME_VOICE`: (Optional) Interviewer voice. Defaults to "alloy".
    /// *   `APROOF_QUIET_PERIOD_MS`: (Optional) Analysis debounce. Defaults to 3000.
    /// *   `APROOF_BROKER_TIMEOUT_MS`: (Optional) Credential request bound. Defaults to 12000.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
        };
        let millis = |name: &str, default: u64| -> Result<Duration, ConfigError> {
            match lookup(name) {
                None => Ok(Duration::from_millis(default)),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidValue {
                        name: name.to_string(),
                        value,
                    }),
            }
        };

        let mut builder = Config::builder()
            .with_broker_url(&required("APROOF_BROKER_URL")?)
            .with_classifier_url(&required("APROOF_CLASSIFIER_URL")?)
            .with_quiet_period(millis(
                "APROOF_QUIET_PERIOD_MS",
                consts::DEFAULT_QUIET_PERIOD_MS,
            )?)
            .with_broker_timeout(millis(
                "APROOF_BROKER_TIMEOUT_MS",
                consts::DEFAULT_BROKER_TIMEOUT_MS,
            )?);

        if let Some(key) = lookup("APROOF_FUNCTIONS_KEY").filter(|k| !k.is_empty()) {
            builder = builder.with_functions_key(&key);
        }
        if let Some(url) = lookup("OPENAI_REALTIME_CALLS_URL") {
            builder = builder.with_calls_url(&url);
        }
        if let Some(voice) = lookup("OPENAI_REALTIME_VOICE") {
            let Ok(voice) = voice.parse::<Voice>();
            builder = builder.with_voice(voice);
        }

        Ok(builder.build())
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    pub fn classifier_url(&self) -> &str {
        &self.classifier_url
    }

    pub fn functions_key(&self) -> Option<&SecretString> {
        self.functions_key.as_ref()
    }

    pub fn calls_url(&self) -> &str {
        &self.calls_url
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn broker_timeout(&self) -> Duration {
        self.broker_timeout
    }

    pub fn recent_window(&self) -> usize {
        self.recent_window
    }

    pub fn data_channel_label(&self) -> &str {
        &self.data_channel_label
    }

    /// The `session.update` payload sent once the event channel opens.
    pub fn session(&self) -> Session {
        Session::new()
            .with_session_type(consts::SESSION_TYPE)
            .with_instructions(&self.instructions)
            .with_voice(self.voice.clone())
            .with_input_audio_format(AudioFormat::Pcm16)
            .with_output_audio_format(AudioFormat::Pcm16)
            .with_input_audio_transcription(
                InputAudioTranscription::new().with_model(TranscriptionModel::Whisper),
            )
            .with_turn_detection_enable(TurnDetection::ServerVad(
                ServerVadTurnDetection::default()
                    .with_threshold(consts::VAD_THRESHOLD)
                    .with_prefix_padding_ms(consts::VAD_PREFIX_PADDING_MS)
                    .with_silence_duration_ms(consts::VAD_SILENCE_DURATION_MS),
            ))
            .with_tools(vec![])
            .with_tool_choice(ToolChoice::None)
            .with_temperature(consts::DEFAULT_TEMPERATURE)
            .with_max_response_output_tokens(MaxOutputTokens::Number(
                consts::DEFAULT_MAX_OUTPUT_TOKENS,
            ))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn loads_required_urls_and_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("APROOF_BROKER_URL", "http://localhost:9000/session"),
            ("APROOF_CLASSIFIER_URL", "http://localhost:9000/analyze"),
        ]))
        .unwrap();

        assert_eq!(config.broker_url(), "http://localhost:9000/session");
        assert_eq!(config.classifier_url(), "http://localhost:9000/analyze");
        assert!(config.functions_key().is_none());
        assert_eq!(config.calls_url(), consts::DEFAULT_CALLS_URL);
        assert_eq!(config.voice(), &Voice::Alloy);
        assert_eq!(config.quiet_period(), Duration::from_secs(3));
        assert_eq!(config.broker_timeout(), Duration::from_secs(12));
        assert_eq!(config.recent_window(), 4);
        assert_eq!(config.data_channel_label(), "oai-events");
    }

    #[test]
    fn missing_broker_url_is_reported() {
        let err = Config::from_lookup(lookup_from(&[(
            "APROOF_CLASSIFIER_URL",
            "http://localhost:9000/analyze",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(name) if name == "APROOF_BROKER_URL"));
    }

    #[test]
    fn invalid_quiet_period_is_reported() {
        let err = Config::from_lookup(lookup_from(&[
            ("APROOF_BROKER_URL", "http://b"),
            ("APROOF_CLASSIFIER_URL", "http://c"),
            ("APROOF_QUIET_PERIOD_MS", "soon"),
        ]))
        .unwrap_err();
        match err {
            ConfigError::InvalidValue { name, value } => {
                assert_eq!(name, "APROOF_QUIET_PERIOD_MS");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn optional_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("APROOF_BROKER_URL", "http://b"),
            ("APROOF_CLASSIFIER_URL", "http://c"),
            ("APROOF_FUNCTIONS_KEY", "fn-key"),
            ("OPENAI_REALTIME_VOICE", "verse"),
            ("APROOF_BROKER_TIMEOUT_MS", "500"),
        ]))
        .unwrap();
        assert_eq!(config.functions_key().unwrap().expose_secret(), "fn-key");
        assert_eq!(config.voice(), &Voice::Verse);
        assert_eq!(config.broker_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn session_payload_matches_interviewer_defaults() {
        let json = serde_json::to_value(Config::new().session()).unwrap();
        assert_eq!(json["type"], "realtime");
        assert_eq!(json["voice"], "alloy");
        assert_eq!(json["input_audio_format"], "pcm16");
        assert_eq!(json["output_audio_format"], "pcm16");
        assert_eq!(json["input_audio_transcription"]["model"], "whisper-1");
        assert_eq!(json["turn_detection"]["type"], "server_vad");
        assert_eq!(json["turn_detection"]["prefix_padding_ms"], 300);
        assert_eq!(json["turn_detection"]["silence_duration_ms"], 1200);
        assert_eq!(json["tool_choice"], "none");
        assert_eq!(json["max_response_output_tokens"], 2048);
        assert!(json["instructions"]
            .as_str()
            .unwrap()
            .contains("A-PROOF ICF-domeinen"));
    }
}
