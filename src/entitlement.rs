//! What each tier is allowed to do.
//!
//! Everything here is a pure function of the user's login state and tier.
//! The gate never fails: anything it does not recognize gets the most
//! conservative answer.

use std::fmt;

use crate::types::{KnownModel, Model, User, UserTier};

/// Files a Free user may have pending at once.
pub const FREE_ATTACHMENT_LIMIT: usize = 5;

/// How many attachments a turn may carry.
///
/// Variants are ordered so that `Limited(0) < Limited(5) < Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttachmentLimit {
    /// At most this many.
    Limited(usize),

    /// No limit.
    Unbounded,
}

impl AttachmentLimit {
    /// True if `count` attachments fit under this limit.
    pub fn admits(&self, count: usize) -> bool {
        match self {
            AttachmentLimit::Limited(max) => count <= *max,
            AttachmentLimit::Unbounded => true,
        }
    }
}

impl fmt::Display for AttachmentLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentLimit::Limited(max) => write!(f, "{max}"),
            AttachmentLimit::Unbounded => write!(f, "unlimited"),
        }
    }
}

/// The attachment limit of a tier.
pub fn max_attachments(tier: UserTier) -> AttachmentLimit {
    match tier {
        UserTier::Guest => AttachmentLimit::Limited(0),
        UserTier::Free => AttachmentLimit::Limited(FREE_ATTACHMENT_LIMIT),
        UserTier::Pro => AttachmentLimit::Unbounded,
    }
}

/// The attachment limit of a tier given by name; unknown names get zero.
pub fn max_attachments_for_name(tier: &str) -> AttachmentLimit {
    tier.parse::<UserTier>()
        .map(max_attachments)
        .unwrap_or(AttachmentLimit::Limited(0))
}

/// Whether the user may attach files at all.
pub fn can_attach(user: &User) -> bool {
    user.is_logged_in
}

/// Whether the user may upgrade; guests must log in first and Pro is final.
pub fn can_upgrade(user: &User) -> bool {
    user.is_logged_in && user.tier != UserTier::Pro
}

/// Whether the user may start, save, or load chats.
pub fn can_manage_history(user: &User) -> bool {
    user.is_logged_in
}

/// The model that answers for a tier.
pub fn model_for(tier: UserTier) -> Model {
    match tier {
        UserTier::Pro => Model::Known(KnownModel::Gemini25Pro),
        UserTier::Guest | UserTier::Free => Model::Known(KnownModel::Gemini25Flash),
    }
}
