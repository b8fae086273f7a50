//! Opaque credential carrier handed to Test Units.

use std::fmt;

/// Transient credentials for a run.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    UsernamePassword { username: String, password: String },

    /// Key into an external credential store.
    StoreReference(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::StoreReference(key) => {
                f.debug_tuple("StoreReference").field(key).finish()
            }
        }
    }
}

/// Passed through unmodified from the caller to every Test Unit.
///
/// The engine and retry policy never look inside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    credentials: Option<Credentials>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}
