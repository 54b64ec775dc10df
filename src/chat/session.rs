//! Core chat session management.
//!
//! `ChatSession` owns the conversation, the pending attachments and the
//! current user, and runs one streamed turn at a time against a
//! [`ChatBackend`].

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::account::{AccountAuthority, Credentials, SimulatedAuthority};
use crate::attachment::{Attachment, RefLease, TransientRefs, document_note};
use crate::backend::{ChatBackend, ModelRequest, history_contents};
use crate::chat::config::ChatConfig;
use crate::chat::persistence::SessionPersistence;
use crate::entitlement::{self, AttachmentLimit};
use crate::error::{Error, Result};
use crate::observability::{
    CHAT_REJECTED, CHAT_TURN_DURATION, CHAT_TURNS, CHAT_TURNS_CANCELLED, CHAT_TURNS_FAILED,
    STREAM_TTFC,
};
use crate::render::Renderer;
use crate::storage::KeyValueStore;
use crate::types::{ChatMessage, ChatMessageRole, Model, Part, User};

/// Text of the reply while waiting for the first chunk.
pub const PLACEHOLDER_TEXT: &str = "Thinking...";

/// Notice that replaces a reply that failed.
pub const ERROR_TEXT: &str = "There was an error communicating with the AI. Please try again.";

/// Notice that replaces a reply the user cancelled.
pub const CANCELLED_TEXT: &str = "Response cancelled.";

/// How often a pending request or chunk read checks for an interrupt.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Where the session is in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Ready for a new submission.
    Idle,
    /// Building the user turn from text and attachments.
    Composing,
    /// The request is out and the placeholder is showing.
    AwaitingFirstChunk,
    /// At least one chunk has arrived.
    Streaming,
}

/// How a submission ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Nothing to send; the conversation is unchanged.
    Ignored,
    /// The reply streamed to completion.
    Completed {
        /// The full reply.
        text: String,
        /// Number of chunks received.
        chunks: usize,
    },
    /// The reply was replaced by an error notice.
    Failed(Error),
    /// The reply was replaced by a cancellation notice.
    Cancelled,
}

impl TurnOutcome {
    /// True for [`TurnOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }
}

/// Result of [`ChatSession::save_chat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The conversation was saved.
    Saved {
        /// Number of messages written.
        messages: usize,
    },
    /// The conversation was empty.
    NothingToSave,
}

/// Result of [`ChatSession::load_chat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The saved conversation replaced the current one.
    Loaded {
        /// Number of messages read.
        messages: usize,
    },
    /// No conversation had been saved.
    NothingSaved,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The current user.
    pub user: User,
    /// The model the next turn will use.
    pub model: Model,
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Attachments waiting for the next turn.
    pub pending_attachments: usize,
    /// How many attachments the user may have pending.
    pub attachment_limit: AttachmentLimit,
    /// Turns that streamed to completion.
    pub turns_completed: u64,
    /// Turns that ended in an error notice.
    pub turns_failed: u64,
    /// Turns the user cancelled.
    pub turns_cancelled: u64,
    /// Chunks received across all turns.
    pub chunks_received: u64,
}

/// A chat session that manages conversation state and model interactions.
pub struct ChatSession<B: ChatBackend, S: KeyValueStore, A: AccountAuthority = SimulatedAuthority>
{
    backend: B,
    persistence: SessionPersistence<S>,
    authority: A,
    config: ChatConfig,
    user: User,
    messages: Vec<ChatMessage>,
    attachments: Vec<Attachment>,
    refs: TransientRefs,
    phase: TurnPhase,
    turns_completed: u64,
    turns_failed: u64,
    turns_cancelled: u64,
    chunks_received: u64,
}

impl<B: ChatBackend, S: KeyValueStore> ChatSession<B, S> {
    /// Opens a session with the simulated account authority.
    pub async fn open(backend: B, store: S, config: ChatConfig) -> Self {
        Self::open_with_authority(backend, store, SimulatedAuthority::new(), config).await
    }
}

impl<B: ChatBackend, S: KeyValueStore, A: AccountAuthority> ChatSession<B, S, A> {
    /// Opens a session, restoring the stored user and confirming it with the
    /// authority.
    ///
    /// A user the authority cannot confirm starts as a guest.
    pub async fn open_with_authority(backend: B, store: S, authority: A, config: ChatConfig) -> Self {
        let persistence = SessionPersistence::new(store);
        let cached = persistence.restore();
        let user = match authority.revalidate(&cached).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(error = %err, "could not confirm stored user; starting as guest");
                User::guest()
            }
        };
        if user != cached
            && let Err(err) = persistence.persist(&user)
        {
            tracing::warn!(error = %err, "could not store confirmed user");
        }
        tracing::debug!(%user, "session opened");
        Self {
            backend,
            persistence,
            authority,
            config,
            user,
            messages: Vec::new(),
            attachments: Vec::new(),
            refs: TransientRefs::new(),
            phase: TurnPhase::Idle,
            turns_completed: 0,
            turns_failed: 0,
            turns_cancelled: 0,
            chunks_received: 0,
        }
    }

    /// Submits the text and pending attachments and streams the reply.
    ///
    /// On return the session is idle again.  The conversation grows by two
    /// entries for every outcome except [`TurnOutcome::Ignored`]: the user
    /// turn, then either the reply or a client-side notice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if a turn is already in flight.  Model and
    /// transport failures are reported as [`TurnOutcome::Failed`].
    pub async fn send(&mut self, input: &str, renderer: &mut dyn Renderer) -> Result<TurnOutcome> {
        self.ensure_idle()?;
        let text = input.trim();
        if text.is_empty() && self.attachments.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        CHAT_TURNS.click();
        let started = Instant::now();

        self.phase = TurnPhase::Composing;
        let attachments = std::mem::take(&mut self.attachments);
        let mut lease = self.refs.lease();
        let user_message = compose_user_message(text, &attachments);
        let images = register_images(&attachments, &mut lease);

        let history_len = self.messages.len() + 1;
        self.messages.push(user_message);
        self.messages.push(ChatMessage::model(PLACEHOLDER_TEXT));
        self.phase = TurnPhase::AwaitingFirstChunk;
        renderer.render_conversation(&self.messages);

        let outcome = match images {
            Ok(references) => {
                self.stream_turn(history_len, &references, renderer, started)
                    .await
            }
            Err(err) => TurnOutcome::Failed(err),
        };
        Ok(self.finish_turn(outcome, lease, started, renderer))
    }

    async fn stream_turn(
        &mut self,
        history_len: usize,
        references: &[String],
        renderer: &mut dyn Renderer,
        started: Instant,
    ) -> TurnOutcome {
        let images = references
            .iter()
            .filter_map(|reference| self.refs.resolve(reference))
            .map(|data| Part::inline(data.mime_type, data.data))
            .collect();
        let model = self.config.model_for(self.user.tier);
        let mut request = ModelRequest::new(
            model.clone(),
            history_contents(&self.messages[..history_len], images),
        );
        if let Some(instruction) = &self.config.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }
        renderer.start_response(&model, PLACEHOLDER_TEXT);
        tracing::debug!(%model, history = history_len, images = references.len(), "requesting reply");

        let mut stream = match interruptible(self.backend.stream_reply(request), &*renderer).await
        {
            None => return TurnOutcome::Cancelled,
            Some(Err(err)) => return TurnOutcome::Failed(err),
            Some(Ok(stream)) => stream,
        };

        let mut text = String::new();
        let mut chunks = 0;
        loop {
            let next = match interruptible(stream.next(), &*renderer).await {
                None => return TurnOutcome::Cancelled,
                Some(next) => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    if chunks == 0 {
                        STREAM_TTFC.add(started.elapsed().as_secs_f64());
                        self.phase = TurnPhase::Streaming;
                    }
                    chunks += 1;
                    self.chunks_received += 1;
                    text.push_str(&chunk);
                    self.replace_reply(ChatMessage::model(text.clone()));
                    if !chunk.is_empty() {
                        renderer.print_text(&chunk);
                        renderer.render_conversation(&self.messages);
                    }
                }
                Some(Err(err)) => return TurnOutcome::Failed(err),
                None => break,
            }
        }
        if chunks == 0 {
            self.replace_reply(ChatMessage::model(String::new()));
        }
        TurnOutcome::Completed { text, chunks }
    }

    fn finish_turn(
        &mut self,
        outcome: TurnOutcome,
        mut lease: RefLease,
        started: Instant,
        renderer: &mut dyn Renderer,
    ) -> TurnOutcome {
        lease.revoke_all();
        match &outcome {
            TurnOutcome::Completed { chunks, .. } => {
                self.turns_completed += 1;
                tracing::debug!(chunks, "turn completed");
                renderer.finish_response();
            }
            TurnOutcome::Failed(err) => {
                CHAT_TURNS_FAILED.click();
                self.turns_failed += 1;
                tracing::warn!(error = %err, "turn failed");
                self.replace_reply(ChatMessage::system(ERROR_TEXT));
                renderer.print_notice(ERROR_TEXT);
            }
            TurnOutcome::Cancelled => {
                CHAT_TURNS_CANCELLED.click();
                self.turns_cancelled += 1;
                tracing::debug!("turn cancelled");
                self.replace_reply(ChatMessage::system(CANCELLED_TEXT));
                renderer.print_interrupted();
                renderer.print_notice(CANCELLED_TEXT);
            }
            TurnOutcome::Ignored => {}
        }
        CHAT_TURN_DURATION.add(started.elapsed().as_secs_f64());
        self.phase = TurnPhase::Idle;
        renderer.render_conversation(&self.messages);
        outcome
    }

    /// Replace the in-flight reply, which is always the last entry.
    fn replace_reply(&mut self, message: ChatMessage) {
        match self.messages.last_mut() {
            Some(last) if last.role == ChatMessageRole::Model => *last = message,
            _ => self.messages.push(message),
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.phase == TurnPhase::Idle {
            Ok(())
        } else {
            CHAT_REJECTED.click();
            Err(Error::busy("a response is still streaming"))
        }
    }

    fn ensure_history_allowed(&self, action: &str) -> Result<()> {
        if entitlement::can_manage_history(&self.user) {
            Ok(())
        } else {
            CHAT_REJECTED.click();
            Err(Error::permission(format!("Log in to {action}.")))
        }
    }

    /// Adds files to the next turn.
    ///
    /// Either every file is added or none is.
    pub fn add_attachments<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize> {
        self.ensure_idle()?;
        if !entitlement::can_attach(&self.user) {
            CHAT_REJECTED.click();
            return Err(Error::permission("Log in to upload files."));
        }
        let added = paths
            .iter()
            .map(Attachment::from_path)
            .collect::<Result<Vec<_>>>()?;
        let limit = entitlement::max_attachments(self.user.tier);
        if !limit.admits(self.attachments.len() + added.len()) {
            CHAT_REJECTED.click();
            return Err(Error::validation(
                format!("You can only upload a maximum of {limit} files."),
                None,
            ));
        }
        self.attachments.extend(added);
        Ok(self.attachments.len())
    }

    /// Removes the pending attachment at `index`.
    pub fn remove_attachment(&mut self, index: usize) -> Result<Attachment> {
        self.ensure_idle()?;
        if index >= self.attachments.len() {
            return Err(Error::validation(
                format!(
                    "no attachment {} (there are {})",
                    index + 1,
                    self.attachments.len()
                ),
                Some("index".to_string()),
            ));
        }
        Ok(self.attachments.remove(index))
    }

    /// The attachments waiting for the next turn.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Starts a new, empty conversation.
    pub fn new_chat(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.ensure_history_allowed("start a new chat")?;
        self.messages.clear();
        Ok(())
    }

    /// Logs in or signs up.
    ///
    /// Rejected while a user is logged in.  The in-memory user changes even if
    /// storing it fails.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<User> {
        self.ensure_idle()?;
        if self.user.is_logged_in {
            CHAT_REJECTED.click();
            return Err(Error::validation("You are already logged in.", None));
        }
        let user = self.authority.login(credentials).await?;
        self.user = user;
        self.persistence.persist(&self.user)?;
        Ok(user)
    }

    /// Upgrades the current user to PRO.
    pub async fn upgrade(&mut self) -> Result<User> {
        self.ensure_idle()?;
        let user = self.authority.upgrade(&self.user).await?;
        self.user = user;
        self.persistence.persist(&self.user)?;
        Ok(user)
    }

    /// Logs out, discarding the conversation and pending attachments.
    pub fn logout(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.user = User::guest();
        self.messages.clear();
        self.attachments.clear();
        self.persistence.persist(&self.user)
    }

    /// Saves the conversation, replacing any earlier save.
    pub fn save_chat(&mut self) -> Result<SaveOutcome> {
        self.ensure_idle()?;
        self.ensure_history_allowed("save chats")?;
        if self.messages.is_empty() {
            return Ok(SaveOutcome::NothingToSave);
        }
        self.persistence.save_conversation(&self.messages)?;
        Ok(SaveOutcome::Saved {
            messages: self.messages.len(),
        })
    }

    /// Replaces the conversation with the saved one.
    ///
    /// The conversation is unchanged if nothing was saved or the save cannot
    /// be read.
    pub fn load_chat(&mut self) -> Result<LoadOutcome> {
        self.ensure_idle()?;
        self.ensure_history_allowed("load chats")?;
        match self.persistence.load_conversation()? {
            Some(messages) => {
                self.messages = messages;
                Ok(LoadOutcome::Loaded {
                    messages: self.messages.len(),
                })
            }
            None => Ok(LoadOutcome::NothingSaved),
        }
    }

    /// The conversation, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The current user.
    pub fn user(&self) -> User {
        self.user
    }

    /// Where the session is in a turn.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            user: self.user,
            model: self.config.model_for(self.user.tier),
            message_count: self.messages.len(),
            pending_attachments: self.attachments.len(),
            attachment_limit: entitlement::max_attachments(self.user.tier),
            turns_completed: self.turns_completed,
            turns_failed: self.turns_failed,
            turns_cancelled: self.turns_cancelled,
            chunks_received: self.chunks_received,
        }
    }
}

/// The user turn as recorded in the conversation.
fn compose_user_message(text: &str, attachments: &[Attachment]) -> ChatMessage {
    let images = attachments
        .iter()
        .filter(|attachment| attachment.is_image())
        .map(Attachment::reference)
        .collect();
    ChatMessage::user(format!("{text}{}", document_note(attachments))).with_images(images)
}

/// Read every image and register it for the duration of the turn.
fn register_images(attachments: &[Attachment], lease: &mut RefLease) -> Result<Vec<String>> {
    let mut references = Vec::new();
    for attachment in attachments.iter().filter(|attachment| attachment.is_image()) {
        references.push(lease.register(attachment.read_inline()?));
    }
    Ok(references)
}

/// Drive `future` to completion unless the renderer asks to stop first.
async fn interruptible<F: Future>(future: F, renderer: &dyn Renderer) -> Option<F::Output> {
    tokio::pin!(future);
    loop {
        if renderer.should_interrupt() {
            return None;
        }
        if let Ok(output) = tokio::time::timeout(INTERRUPT_POLL, &mut future).await {
            return Some(output);
        }
    }
}
