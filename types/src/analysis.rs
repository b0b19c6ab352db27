//! Payloads exchanged with the domain classification service.

/// Input of one classifier call.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisRequest {
    /// The whole conversation so far, one speaker-labelled line per turn.
    #[serde(rename = "conversationText")]
    conversation_text: String,

    /// The last few lines of `conversation_text`.
    #[serde(rename = "recentTranscript")]
    recent_transcript: String,
}

impl AnalysisRequest {
    pub fn new(conversation_text: String, recent_transcript: String) -> Self {
        Self {
            conversation_text,
            recent_transcript,
        }
    }

    pub fn conversation_text(&self) -> &str {
        &self.conversation_text
    }

    pub fn recent_transcript(&self) -> &str {
        &self.recent_transcript
    }
}

/// Output of one classifier call.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    domains: Vec<DomainFinding>,
    summary: String,
    keywords_found: Vec<String>,
}

impl AnalysisResult {
    pub fn new(domains: Vec<DomainFinding>, summary: &str) -> Self {
        Self {
            domains,
            summary: summary.to_string(),
            keywords_found: vec![],
        }
    }

    pub fn domains(&self) -> &[DomainFinding] {
        &self.domains
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn keywords_found(&self) -> &[String] {
        &self.keywords_found
    }
}

/// The classifier's verdict for a single functioning domain.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DomainFinding {
    /// ICF code, e.g. "b1300" or "d450"
    code: String,
    name: String,
    level: Option<f64>,
    max_level: Option<f64>,
    /// 0.0 to 1.0
    confidence: Option<f64>,
    evidence: Vec<String>,
    reasoning: Option<String>,
}

impl DomainFinding {
    pub fn new(code: &str, level: f64) -> Self {
        Self {
            code: code.to_string(),
            level: Some(level),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_max_level(mut self, max_level: f64) -> Self {
        self.max_level = Some(max_level);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_reasoning(mut self, reasoning: &str) -> Self {
        self.reasoning = Some(reasoning.to_string());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Option<f64> {
        self.level
    }

    pub fn max_level(&self) -> Option<f64> {
        self.max_level
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }
}

/// Hosted functions answer either with the result itself or wrapped as `{"data": ...}`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum AnalysisEnvelope {
    Wrapped { data: AnalysisResult },
    Bare(AnalysisResult),
}

impl AnalysisEnvelope {
    pub fn into_result(self) -> AnalysisResult {
        match self {
            AnalysisEnvelope::Wrapped { data } => data,
            AnalysisEnvelope::Bare(result) => result,
        }
    }
}
