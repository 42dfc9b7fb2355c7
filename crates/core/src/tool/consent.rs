use std::fmt::{self, Display};

use async_trait::async_trait;

/// The user's decision on a consent request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consent {
    /// Whether the user approved the invocation.
    pub approved: bool,
}

/// An error raised by the consent provider itself.
///
/// This is distinct from a denial: a denial is a normal branch of the
/// protocol, a provider error ends the turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentError {
    message: String,
}

impl ConsentError {
    /// Creates a new error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for ConsentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConsentError {}

/// Asks the user to approve a consent-gated tool invocation.
///
/// The wait is unbounded; it resolves whenever the user interacts with
/// whatever surface the host app presents.
#[async_trait]
pub trait ConsentProvider: Send + Sync {
    /// Requests consent for one tool invocation.
    async fn request_consent(&self) -> Result<Consent, ConsentError>;
}

/// Best-effort lifecycle hooks run around a tool's side effect.
///
/// The host app typically hides its own window in `before_action` and
/// restores it in `after_action`, so a capture tool does not capture
/// the overlay itself. Hook failures are logged and ignored; they never
/// block producing a tool result.
#[async_trait]
pub trait ActionHooks: Send + Sync {
    /// Runs before the tool's side effect.
    async fn before_action(&self) -> Result<(), String>;

    /// Runs after the tool's side effect, on success and failure alike.
    async fn after_action(&self) -> Result<(), String>;
}
