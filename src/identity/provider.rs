use async_trait::async_trait;
use tokio::sync::watch;

/// Error reported by the identity provider, surfaced verbatim to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityError {
    pub message: String,
}

impl IdentityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Point-in-time view of authentication state
///
/// A snapshot is terminal once `error` is set or `is_loading` is false;
/// before that the handshake is still in flight and the authenticated flag
/// must not be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub is_loading: bool,
    pub error: Option<IdentityError>,
    pub is_authenticated: bool,
}

impl IdentitySnapshot {
    /// The handshake has concluded, successfully or not
    pub fn is_terminal(&self) -> bool {
        self.error.is_some() || !self.is_loading
    }
}

impl Default for IdentitySnapshot {
    fn default() -> Self {
        // Until the provider reports in, the session counts as loading
        Self {
            is_loading: true,
            error: None,
            is_authenticated: false,
        }
    }
}

/// Source of authentication state and bearer tokens
///
/// Passed into the bootstrap controller explicitly so tests can substitute
/// a fake; production wiring uses [`super::OidcIdentityProvider`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Observe authentication state updates; the current snapshot is always
    /// available via `borrow` on the returned receiver
    fn subscribe(&self) -> watch::Receiver<IdentitySnapshot>;

    /// Obtain a bearer token without user interaction
    ///
    /// `Ok(None)` means the session is not in a position to produce a token
    /// (e.g. unauthenticated); `Err` means the attempt itself failed. Callers
    /// treat both as "token unavailable".
    async fn get_access_token_silently(&self) -> anyhow::Result<Option<String>>;
}
