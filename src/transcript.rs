use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Label used in the text handed to the classifier.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "Patient",
            Speaker::Assistant => "Assistent",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Turn {
    speaker: Speaker,
    text: String,
    position: usize,
    #[serde(skip)]
    utterance: Option<String>,
}

impl Turn {
    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Insertion index within the session, starting at 0.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Append-only, speaker-tagged record of one session's conversation.
///
/// User text can arrive twice for the same utterance, once from the
/// transcription and once from the item creation. The first delivery wins:
/// a turn is dropped if its item id was already seen, or if it repeats the
/// last user turn while one of the two lacks an item id.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    seen: HashSet<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn unless the text is blank or a repeat delivery.
    pub fn append(
        &mut self,
        speaker: Speaker,
        text: &str,
        utterance: Option<&str>,
    ) -> Option<&Turn> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(id) = utterance {
            if self.seen.contains(id) {
                tracing::debug!("suppressing repeat delivery of item {}", id);
                return None;
            }
        }
        if speaker == Speaker::User && self.repeats_last_user_turn(text, utterance) {
            tracing::debug!("suppressing repeated user text");
            return None;
        }

        if let Some(id) = utterance {
            self.seen.insert(id.to_string());
        }
        let position = self.turns.len();
        self.turns.push(Turn {
            speaker,
            text: text.to_string(),
            position,
            utterance: utterance.map(str::to_string),
        });
        self.turns.last()
    }

    fn repeats_last_user_turn(&self, text: &str, utterance: Option<&str>) -> bool {
        match self.turns.last() {
            Some(last) if last.speaker == Speaker::User && last.text == text => {
                utterance.is_none() || last.utterance.is_none()
            }
            _ => false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.seen.clear();
    }

    /// All turns as `Label: text`, one per line.
    pub fn snapshot(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker.label(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The last `lines` lines of [`Transcript::snapshot`].
    pub fn recent_window(&self, lines: usize) -> String {
        let snapshot = self.snapshot();
        let all: Vec<&str> = snapshot.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_positions() {
        let mut transcript = Transcript::new();
        transcript.append(Speaker::Assistant, "Hoe gaat het?", Some("a1"));
        transcript.append(Speaker::User, " Ik ben moe ", Some("u1"));
        transcript.append(Speaker::Assistant, "Dat klinkt vervelend", Some("a2"));

        let turns = transcript.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].speaker(), Speaker::User);
        assert_eq!(turns[1].text(), "Ik ben moe");
        assert_eq!(
            turns.iter().map(Turn::position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn blank_text_is_not_a_turn() {
        let mut transcript = Transcript::new();
        assert!(transcript.append(Speaker::User, "  \n", None).is_none());
        assert!(transcript.is_empty());
    }

    #[test]
    fn same_item_is_counted_once() {
        let mut transcript = Transcript::new();
        assert!(transcript.append(Speaker::User, "Ik ben moe", Some("u1")).is_some());
        assert!(transcript.append(Speaker::User, "Ik ben moe", Some("u1")).is_none());
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn repeat_without_item_id_is_suppressed() {
        let mut transcript = Transcript::new();
        transcript.append(Speaker::User, "Ik ben moe", None);
        assert!(transcript.append(Speaker::User, "Ik ben moe", Some("u1")).is_none());
        assert!(transcript.append(Speaker::User, "Ik ben moe", None).is_none());
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn distinct_utterances_with_same_text_are_kept() {
        let mut transcript = Transcript::new();
        transcript.append(Speaker::User, "Ja", Some("u1"));
        transcript.append(Speaker::User, "Ja", Some("u2"));
        transcript.append(Speaker::Assistant, "Goed", None);
        transcript.append(Speaker::User, "Ja", None);
        assert_eq!(transcript.len(), 4);
    }

    #[test]
    fn snapshot_and_recent_window() {
        let mut transcript = Transcript::new();
        for (i, text) in ["een", "twee", "drie", "vier", "vijf"].iter().enumerate() {
            let speaker = if i % 2 == 0 { Speaker::User } else { Speaker::Assistant };
            transcript.append(speaker, text, None);
        }
        assert_eq!(
            transcript.snapshot(),
            "Patient: een\nAssistent: twee\nPatient: drie\nAssistent: vier\nPatient: vijf"
        );
        assert_eq!(
            transcript.recent_window(4),
            "Assistent: twee\nPatient: drie\nAssistent: vier\nPatient: vijf"
        );
        assert_eq!(transcript.recent_window(10), transcript.snapshot());

        transcript.clear();
        assert_eq!(transcript.snapshot(), "");
        assert_eq!(transcript.recent_window(4), "");
    }
}
