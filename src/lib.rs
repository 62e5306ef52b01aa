//! Atrium application shell
//!
//! Authenticates the session against a third-party identity provider, loads
//! an authorization access map from a policy-decision service, and serves
//! routed views gated on a single bootstrap verdict.

#![deny(dead_code)]

pub mod access;
pub mod bootstrap;
pub mod config;
pub mod identity;
pub mod web;

use access::{AccessMap, AccessMapState};
use bootstrap::Verdict;
use config::Config;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    verdict_rx: watch::Receiver<Verdict>,
    access_rx: watch::Receiver<AccessMapState>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        verdict_rx: watch::Receiver<Verdict>,
        access_rx: watch::Receiver<AccessMapState>,
    ) -> Self {
        Self {
            config,
            verdict_rx,
            access_rx,
        }
    }

    /// Current bootstrap verdict
    pub fn verdict(&self) -> Verdict {
        self.verdict_rx.borrow().clone()
    }

    /// Current access map; `None` until loaded (distinct from an empty map)
    pub fn access_map(&self) -> Option<AccessMap> {
        self.access_rx.borrow().access_map.clone()
    }
}
