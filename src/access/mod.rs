//! Access map integration
//!
//! The access map is the authorization surface for the whole app: a mapping
//! from resource paths to per-method display state, produced by the
//! policy-decision service. This module owns the map's wire shape and the
//! provider seam; policy evaluation itself happens service-side.
//!
//! Absence of a map (`Option::None`) is distinct from an empty map: the
//! former means "not loaded (yet, or failed)", the latter means "loaded, and
//! the user is authorized for nothing".

pub mod http;

pub use http::HttpAccessMapProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Per-method authorization verdict for one resource path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub enabled: bool,
}

/// Authorization map: resource path -> HTTP method -> display state
///
/// Lookups are fail-safe: anything the map does not mention is neither
/// visible nor enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMap(BTreeMap<String, BTreeMap<String, DisplayState>>);

impl AccessMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn state(&self, method: &str, path: &str) -> Option<&DisplayState> {
        self.0.get(path)?.get(&method.to_uppercase())
    }

    pub fn visible(&self, method: &str, path: &str) -> bool {
        self.state(method, path).is_some_and(|s| s.visible)
    }

    pub fn enabled(&self, method: &str, path: &str) -> bool {
        self.state(method, path).is_some_and(|s| s.enabled)
    }
}

/// Provider-published state: loading flag plus the map once loaded
#[derive(Debug, Clone, Default)]
pub struct AccessMapState {
    pub loading: bool,
    pub access_map: Option<AccessMap>,
}

/// Parameters for an access-map load
#[derive(Debug, Clone)]
pub struct InitParams {
    pub service_url: String,
    pub access_token: String,
}

/// Source of the authorization access map
///
/// `init` is fire-and-observe: completion is reported through the published
/// state (`loading` drops to false; `access_map` is populated on success and
/// left unset on failure). The underlying failure cause is logged, never
/// surfaced to callers.
#[async_trait]
pub trait AccessMapProvider: Send + Sync {
    /// Observe loading/map state; the current state is always available via
    /// `borrow` on the returned receiver
    fn subscribe(&self) -> watch::Receiver<AccessMapState>;

    /// Fetch the access map for the given service using the given bearer token
    async fn init(&self, params: InitParams);
}
