// Public modules
pub mod chat_message;
pub mod content;
pub mod generate_content_request;
pub mod generate_content_response;
pub mod model;
pub mod user;

// Re-exports
pub use chat_message::{ChatMessage, ChatMessageRole};
pub use content::{Content, InlineData, Part};
pub use generate_content_request::{GenerateContentRequest, GenerationConfig};
pub use generate_content_response::{
    Candidate, ErrorBody, ErrorResponse, FinishReason, GenerateContentResponse, PromptFeedback,
    UsageMetadata,
};
pub use model::{KnownModel, Model};
pub use user::{User, UserTier};
