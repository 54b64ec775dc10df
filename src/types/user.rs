use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Entitlement level of a user.
///
/// The tier decides how many files may be attached to a turn and which model
/// answers.  It is issued by the account authority; the copy held by the
/// client is a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    /// Not logged in.
    #[default]
    Guest,

    /// Logged in without an upgrade.
    Free,

    /// Logged in and upgraded.
    Pro,
}

impl UserTier {
    /// The lowercase name used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::Guest => "guest",
            UserTier::Free => "free",
            UserTier::Pro => "pro",
        }
    }
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "guest" => Ok(UserTier::Guest),
            "free" => Ok(UserTier::Free),
            "pro" => Ok(UserTier::Pro),
            _ => Err(format!("unknown tier: {s}")),
        }
    }
}

/// The current user's login state and tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Whether the user has logged in.
    pub is_logged_in: bool,

    /// The user's entitlement tier.
    pub tier: UserTier,
}

impl User {
    /// The user every session starts as.
    pub fn guest() -> Self {
        Self {
            is_logged_in: false,
            tier: UserTier::Guest,
        }
    }

    /// A logged-in user on the given tier.
    pub fn logged_in(tier: UserTier) -> Self {
        Self {
            is_logged_in: true,
            tier,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_logged_in {
            write!(f, "logged in ({})", self.tier)
        } else {
            write!(f, "not logged in ({})", self.tier)
        }
    }
}
