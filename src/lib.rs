// Public modules
pub mod account;
pub mod attachment;
pub mod backend;
pub mod chat;
pub mod client;
pub mod entitlement;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports
pub use account::{AccountAuthority, Credentials, SimulatedAuthority};
pub use attachment::{Attachment, AttachmentKind, ImageMediaType, TransientRefs};
pub use backend::{ChatBackend, ChunkStream, ModelRequest};
pub use client::Gemini;
pub use entitlement::AttachmentLimit;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::*;
