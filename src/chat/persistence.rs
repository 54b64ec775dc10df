//! Durable session state: the current user and one saved conversation.

use crate::error::Result;
use crate::storage::{KeyValueStore, decode_snapshot, encode_snapshot};
use crate::types::{ChatMessage, User};

/// Key under which the current user is stored.
pub const USER_KEY: &str = "lexaai_user";

/// Key under which the saved conversation is stored.
pub const CONVERSATION_KEY: &str = "lexaai_saved_chat";

/// Reads and writes session state to a [`KeyValueStore`].
///
/// Every write replaces the prior value whole.
#[derive(Debug)]
pub struct SessionPersistence<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> SessionPersistence<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the stored user.
    ///
    /// Anything other than a readable, well-formed user yields the guest user.
    pub fn restore(&self) -> User {
        let raw = match self.store.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return User::guest(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored user; starting as guest");
                return User::guest();
            }
        };
        match decode_snapshot::<User>(&raw) {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(error = %err, "stored user is unreadable; starting as guest");
                User::guest()
            }
        }
    }

    /// Store the current user.
    pub fn persist(&self, user: &User) -> Result<()> {
        let raw = encode_snapshot(user)?;
        self.store.set(USER_KEY, &raw)
    }

    /// Remove the stored user.
    pub fn clear_user(&self) -> Result<()> {
        self.store.remove(USER_KEY)
    }

    /// Replace the saved conversation.
    pub fn save_conversation(&self, messages: &[ChatMessage]) -> Result<()> {
        let raw = encode_snapshot(&messages)?;
        self.store.set(CONVERSATION_KEY, &raw)?;
        tracing::debug!(messages = messages.len(), "saved conversation");
        Ok(())
    }

    /// Read the saved conversation, or `None` if nothing was saved.
    pub fn load_conversation(&self) -> Result<Option<Vec<ChatMessage>>> {
        let Some(raw) = self.store.get(CONVERSATION_KEY)? else {
            return Ok(None);
        };
        let messages = decode_snapshot::<Vec<ChatMessage>>(&raw)?;
        Ok(Some(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use crate::types::UserTier;

    #[test]
    fn restore_defaults_to_guest() {
        let persistence = SessionPersistence::new(MemoryStore::new());
        assert_eq!(persistence.restore(), User::guest());
    }

    #[test]
    fn persist_then_restore() {
        let persistence = SessionPersistence::new(MemoryStore::new());
        persistence.persist(&User::logged_in(UserTier::Pro)).unwrap();
        assert_eq!(persistence.restore(), User::logged_in(UserTier::Pro));
        persistence.clear_user().unwrap();
        assert_eq!(persistence.restore(), User::guest());
    }

    #[test]
    fn restore_reads_unversioned_user() {
        let store = MemoryStore::new();
        store
            .set(USER_KEY, r#"{"isLoggedIn":true,"tier":"free"}"#)
            .unwrap();
        let persistence = SessionPersistence::new(store);
        assert_eq!(persistence.restore(), User::logged_in(UserTier::Free));
    }

    #[test]
    fn restore_fails_open() {
        for raw in [
            "not json",
            r#"{"isLoggedIn":true,"tier":"platinum"}"#,
            r#"{"version":9,"saved_at":"2026-01-01T00:00:00Z","value":{}}"#,
        ] {
            let store = MemoryStore::new();
            store.set(USER_KEY, raw).unwrap();
            let persistence = SessionPersistence::new(store);
            assert_eq!(persistence.restore(), User::guest(), "{raw}");
        }
    }

    #[test]
    fn conversation_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = SessionPersistence::new(FileStore::new(dir.path()));
        assert_eq!(persistence.load_conversation().unwrap(), None);
        let messages = vec![
            ChatMessage::user("Hello").with_images(vec!["/tmp/cat.png".to_string()]),
            ChatMessage::model("Hi there!"),
            ChatMessage::system("Response cancelled."),
        ];
        persistence.save_conversation(&messages).unwrap();
        assert_eq!(persistence.load_conversation().unwrap(), Some(messages));
        persistence.save_conversation(&[]).unwrap();
        assert_eq!(persistence.load_conversation().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn corrupted_conversation_is_an_error() {
        let store = MemoryStore::new();
        store.set(CONVERSATION_KEY, "[{\"role\":").unwrap();
        let persistence = SessionPersistence::new(store);
        let err = persistence.load_conversation().unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn full_store_is_reported() {
        let persistence = SessionPersistence::new(MemoryStore::with_quota(64));
        let messages = vec![ChatMessage::user("x".repeat(200))];
        assert!(persistence.save_conversation(&messages).unwrap_err().is_persistence());
        assert_eq!(persistence.load_conversation().unwrap(), None);
    }
}
