use serde::{Deserialize, Serialize};

/// A role-tagged unit of a request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Content {
    /// `user` or `model`; absent on system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// The ordered parts of this content.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create user content from parts.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// Create model content from parts.
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts,
        }
    }

    /// Create role-less content holding one text part.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenate the text of every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// One piece of content: text or inline bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Inline binary payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,

    /// Set on parts that carry model reasoning rather than answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create an inline data part from already-encoded base64.
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
            ..Self::default()
        }
    }
}

/// Base64-encoded bytes with their media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// The IANA media type, e.g. `image/png`.
    pub mime_type: String,

    /// Standard base64 of the bytes.
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_part_serialization() {
        let content = Content::user(vec![
            Part::inline("image/png", "aGVsbG8="),
            Part::text("what is this?"),
        ]);
        let json = serde_json::to_string(&content).unwrap();
        assert_eq!(
            json,
            r#"{"role":"user","parts":[{"inlineData":{"mimeType":"image/png","data":"aGVsbG8="}},{"text":"what is this?"}]}"#
        );
    }

    #[test]
    fn instruction_has_no_role() {
        let json = serde_json::to_string(&Content::instruction("be nice")).unwrap();
        assert_eq!(json, r#"{"parts":[{"text":"be nice"}]}"#);
    }

    #[test]
    fn text_concatenates_parts() {
        let content = Content::model(vec![
            Part::text("Hi"),
            Part::inline("image/png", ""),
            Part::text(" there"),
        ]);
        assert_eq!(content.text(), "Hi there");
    }
}
