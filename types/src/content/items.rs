use crate::content::message::MessageRole;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum ItemStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "incomplete")]
    Incomplete,
}

/// A conversation item as reported by the server.
///
/// Every field is optional: the server sends partial items (audio items
/// without a transcript yet, function calls without a role) and a missing
/// field must never make the whole event unreadable.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(default)]
pub struct ItemResource {
    /// The unique ID of the item
    id: Option<String>,

    /// "message", "function_call", "function_call_output"
    #[serde(rename = "type")]
    item_type: Option<String>,

    status: Option<ItemStatus>,

    role: Option<MessageRole>,

    content: Vec<ItemContent>,
}

impl ItemResource {
    pub fn new(id: Option<&str>, role: MessageRole, content: Vec<ItemContent>) -> Self {
        Self {
            id: id.map(str::to_string),
            item_type: Some("message".to_string()),
            status: None,
            role: Some(role),
            content,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn item_type(&self) -> Option<&str> {
        self.item_type.as_deref()
    }

    pub fn status(&self) -> Option<&ItemStatus> {
        self.status.as_ref()
    }

    pub fn role(&self) -> Option<MessageRole> {
        self.role
    }

    pub fn content(&self) -> &[ItemContent] {
        &self.content
    }

    /// First non-blank `text` or `transcript` in content order, trimmed.
    ///
    /// Within one block `text` wins over `transcript`.
    pub fn first_text(&self) -> Option<String> {
        self.content.iter().find_map(ItemContent::text_or_transcript)
    }
}

/// One content block of an item: `input_text`, `input_audio`, `text`, `audio`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(default)]
pub struct ItemContent {
    #[serde(rename = "type")]
    content_type: Option<String>,

    text: Option<String>,

    transcript: Option<String>,
}

impl ItemContent {
    pub fn text(text: &str) -> Self {
        Self {
            content_type: Some("input_text".to_string()),
            text: Some(text.to_string()),
            transcript: None,
        }
    }

    pub fn transcript(transcript: &str) -> Self {
        Self {
            content_type: Some("input_audio".to_string()),
            text: None,
            transcript: Some(transcript.to_string()),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn text_or_transcript(&self) -> Option<String> {
        [self.text.as_deref(), self.transcript.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_skips_blank_blocks() {
        let item: ItemResource = serde_json::from_str(
            r#"{
                "id": "item_1",
                "type": "message",
                "role": "user",
                "content": [
                    {"type": "input_audio", "transcript": null},
                    {"type": "input_text", "text": "   "},
                    {"type": "input_audio", "transcript": "  Ik slaap slecht  "}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(item.role(), Some(MessageRole::User));
        assert_eq!(item.first_text().as_deref(), Some("Ik slaap slecht"));
    }

    #[test]
    fn tolerates_unknown_roles_and_missing_content() {
        let item: ItemResource =
            serde_json::from_str(r#"{"id": "x", "type": "function_call", "role": "tool"}"#).unwrap();
        assert_eq!(item.role(), Some(MessageRole::Other));
        assert_eq!(item.first_text(), None);
    }
}
