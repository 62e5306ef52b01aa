//! Identity provider integration
//!
//! The identity provider owns authentication state for the app session and
//! hands out bearer tokens for downstream services.
//!
//! ## Structure
//!
//! - `provider`: the `IdentityProvider` trait and the snapshot type it publishes
//! - `oidc`: OAuth2/OIDC implementation backed by the `oauth2` crate
//!
//! ## Lifecycle
//!
//! 1. App starts → provider publishes `is_loading = true`
//! 2. Provider completes its handshake → publishes a terminal snapshot
//!    (either `error` set, or `is_loading = false` with the authenticated flag)
//! 3. Snapshot consumers (the bootstrap controller) react to updates over a
//!    `tokio::sync::watch` channel; the provider is the only writer.

pub mod oidc;
pub mod provider;

pub use oidc::OidcIdentityProvider;
pub use provider::{IdentityError, IdentityProvider, IdentitySnapshot};
