//! Account authority: who decides what tier a user is on.
//!
//! The shipped authority is simulated.  It accepts any complete set of
//! credentials, grants the FREE tier, and upgrades to PRO on request without
//! contacting anything.  A real authority plugs in behind the same trait.

use async_trait::async_trait;

use crate::entitlement;
use crate::error::{Error, Result};
use crate::types::{User, UserTier};

/// Credentials collected by the login and sign-up forms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    /// An existing account.
    Login {
        /// The account's email address.
        email: String,
        /// The account's password.
        password: String,
    },
    /// A new account.
    SignUp {
        /// Given name.
        first_name: String,
        /// Family name.
        last_name: String,
        /// Date of birth as entered, e.g. `1990-04-01`.
        date_of_birth: String,
        /// The account's email address.
        email: String,
        /// The account's password.
        password: String,
    },
}

impl Credentials {
    /// Credentials for an existing account.
    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Login {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Credentials for a new account.
    pub fn sign_up(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credentials::SignUp {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: date_of_birth.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// The email address on either form.
    pub fn email(&self) -> &str {
        match self {
            Credentials::Login { email, .. } | Credentials::SignUp { email, .. } => email,
        }
    }

    /// Fail unless every field is filled in.
    pub fn validate(&self) -> Result<()> {
        let complete = match self {
            Credentials::Login { email, password } => {
                !email.trim().is_empty() && !password.is_empty()
            }
            Credentials::SignUp {
                first_name,
                last_name,
                date_of_birth,
                email,
                password,
            } => {
                [first_name, last_name, date_of_birth, email]
                    .iter()
                    .all(|field| !field.trim().is_empty())
                    && !password.is_empty()
            }
        };
        if complete {
            Ok(())
        } else {
            Err(Error::validation("Please fill in all fields.", None))
        }
    }
}

/// The source of truth for a user's tier.
#[async_trait]
pub trait AccountAuthority: Send + Sync {
    /// Log in or sign up, returning the logged-in user.
    async fn login(&self, credentials: &Credentials) -> Result<User>;

    /// Upgrade a logged-in user to PRO.
    async fn upgrade(&self, user: &User) -> Result<User>;

    /// Confirm a user restored from local storage.
    ///
    /// The authority's answer replaces whatever was cached locally.
    async fn revalidate(&self, cached: &User) -> Result<User>;
}

/// An authority that approves everything locally.
#[derive(Clone, Debug, Default)]
pub struct SimulatedAuthority;

impl SimulatedAuthority {
    /// Create a new simulated authority.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AccountAuthority for SimulatedAuthority {
    async fn login(&self, credentials: &Credentials) -> Result<User> {
        credentials.validate()?;
        tracing::info!(email = credentials.email(), "simulated login");
        Ok(User::logged_in(UserTier::Free))
    }

    async fn upgrade(&self, user: &User) -> Result<User> {
        if !user.is_logged_in {
            return Err(Error::permission("Log in before upgrading."));
        }
        if !entitlement::can_upgrade(user) {
            return Err(Error::validation("You are already on PRO.", None));
        }
        Ok(User::logged_in(UserTier::Pro))
    }

    async fn revalidate(&self, cached: &User) -> Result<User> {
        // Logged-out guests and logged-in users must agree with their tier.
        let user = match (cached.is_logged_in, cached.tier) {
            (false, _) | (true, UserTier::Guest) => User::guest(),
            (true, tier) => User::logged_in(tier),
        };
        Ok(user)
    }
}
