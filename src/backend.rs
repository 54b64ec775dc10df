//! The seam between the conversation and whatever produces replies.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::types::{ChatMessage, ChatMessageRole, Content, GenerateContentRequest, Model, Part};

/// Text chunks of a reply, in the order they were produced.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Everything needed to ask for one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// The model to ask.
    pub model: Model,
    /// Instruction applied to the whole conversation.
    pub system_instruction: Option<String>,
    /// The conversation, oldest first, ending with the new user turn.
    pub contents: Vec<Content>,
}

impl ModelRequest {
    /// Create a request without a system instruction.
    pub fn new(model: Model, contents: Vec<Content>) -> Self {
        Self {
            model,
            system_instruction: None,
            contents,
        }
    }

    /// Set the system instruction.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// The body sent to the API.
    pub fn to_generate_request(&self) -> GenerateContentRequest {
        let request = GenerateContentRequest::new(self.contents.clone());
        match &self.system_instruction {
            Some(instruction) if !instruction.trim().is_empty() => {
                request.with_system_instruction(instruction.clone())
            }
            _ => request,
        }
    }
}

/// Something that streams replies to a conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a reply.  Errors before the first chunk are returned here; later
    /// errors are items of the stream.
    async fn stream_reply(&self, request: ModelRequest) -> Result<ChunkStream>;
}

#[async_trait]
impl<B: ChatBackend + ?Sized> ChatBackend for Arc<B> {
    async fn stream_reply(&self, request: ModelRequest) -> Result<ChunkStream> {
        (**self).stream_reply(request).await
    }
}

#[async_trait]
impl<B: ChatBackend + ?Sized> ChatBackend for Box<B> {
    async fn stream_reply(&self, request: ModelRequest) -> Result<ChunkStream> {
        (**self).stream_reply(request).await
    }
}

/// Convert the conversation into API contents.
///
/// SYSTEM entries are client-side notices and are dropped.  Only the last
/// entry, which must be the new user turn, carries `current_images`; they are
/// placed before its text.  Images on earlier turns are not re-sent.
pub fn history_contents(history: &[ChatMessage], current_images: Vec<Part>) -> Vec<Content> {
    let last = history.len().saturating_sub(1);
    let mut current_images = Some(current_images);
    let mut contents = Vec::with_capacity(history.len());
    for (idx, message) in history.iter().enumerate() {
        let mut parts = Vec::new();
        if idx == last
            && message.role == ChatMessageRole::User
            && let Some(images) = current_images.take()
        {
            parts.extend(images);
        }
        parts.push(Part::text(message.text.clone()));
        match message.role {
            ChatMessageRole::User => contents.push(Content::user(parts)),
            ChatMessageRole::Model => contents.push(Content::model(parts)),
            ChatMessageRole::System => {}
        }
    }
    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn history_drops_system_and_orders_images_first() {
        let history = vec![
            ChatMessage::user("look").with_images(vec!["old.png".to_string()]),
            ChatMessage::model("a cat"),
            ChatMessage::system("There was an error communicating with the AI. Please try again."),
            ChatMessage::user("and this?"),
        ];
        let contents = history_contents(&history, vec![Part::inline("image/png", "AA==")]);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[0].parts, vec![Part::text("look")]);
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(
            contents[2].parts,
            vec![Part::inline("image/png", "AA=="), Part::text("and this?")]
        );
    }

    #[test]
    fn request_body_skips_blank_instruction() {
        let contents = vec![Content::user(vec![Part::text("hi")])];
        let request = ModelRequest::new(Model::Known(KnownModel::Gemini25Flash), contents.clone());
        assert_eq!(request.to_generate_request().system_instruction, None);
        let request = request.with_system_instruction("Be brief.");
        let body = request.to_generate_request();
        assert_eq!(body.contents, contents);
        assert_eq!(
            body.system_instruction.map(|c| c.text()),
            Some("Be brief.".to_string())
        );
        let request = ModelRequest::new(Model::Known(KnownModel::Gemini25Flash), contents)
            .with_system_instruction("  ");
        assert_eq!(request.to_generate_request().system_instruction, None);
    }
}
