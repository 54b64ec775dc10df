use std::fmt;

use serde::{Deserialize, Serialize};

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageRole {
    /// Text typed by the user.
    User,

    /// Text generated by the model.
    Model,

    /// Notices produced by the client itself, never sent to the model.
    System,
}

impl fmt::Display for ChatMessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMessageRole::User => write!(f, "user"),
            ChatMessageRole::Model => write!(f, "model"),
            ChatMessageRole::System => write!(f, "system"),
        }
    }
}

/// One entry of a conversation.
///
/// `images` holds references to the images attached to a user turn, in the
/// order they were attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author of this entry.
    pub role: ChatMessageRole,

    /// The entry's text.
    pub text: String,

    /// References to attached images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    /// Create a message without images.
    pub fn new(role: ChatMessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            images: Vec::new(),
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::User, text)
    }

    /// Create a model message.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::Model, text)
    }

    /// Create a system notice.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::System, text)
    }

    /// Attach image references to this message.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_are_omitted_when_empty() {
        let json = serde_json::to_string(&ChatMessage::user("Hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","text":"Hello"}"#);
    }

    #[test]
    fn images_are_kept_in_order() {
        let message = ChatMessage::user("look")
            .with_images(vec!["a.png".to_string(), "b.jpg".to_string()]);
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"role":"user","text":"look","images":["a.png","b.jpg"]}"#
        );
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn missing_images_deserialize_empty() {
        let message: ChatMessage =
            serde_json::from_str(r#"{"role":"model","text":"Hi there!"}"#).unwrap();
        assert_eq!(message, ChatMessage::model("Hi there!"));
    }
}
