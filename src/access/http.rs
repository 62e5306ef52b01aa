//! HTTP access-map provider
//!
//! Fetches the access map from the policy-decision service's
//! `/__accessmap` endpoint with a bearer token.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use super::{AccessMap, AccessMapProvider, AccessMapState, InitParams};
use crate::config::Config;

pub struct HttpAccessMapProvider {
    client: reqwest::Client,
    state_tx: watch::Sender<AccessMapState>,
    // Sequence number of the most recently started init; a completion from
    // an older init must not overwrite the published state
    init_seq: AtomicU64,
}

impl HttpAccessMapProvider {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.http_connect_timeout_secs))
            .timeout(Duration::from_secs(config.http_request_timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client for access map: {}", e))?;

        Ok(Self {
            client,
            state_tx: watch::Sender::new(AccessMapState::default()),
            init_seq: AtomicU64::new(0),
        })
    }

    /// Start a load: publish the loading state and claim a sequence number
    fn begin_init(&self) -> u64 {
        let seq = self.init_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state_tx.send_replace(AccessMapState {
            loading: true,
            access_map: None,
        });
        seq
    }

    /// Publish a load's outcome unless a newer init has since started
    fn finish_init(&self, seq: u64, access_map: Option<AccessMap>) {
        if self.init_seq.load(Ordering::SeqCst) != seq {
            tracing::debug!(seq, "Discarding superseded access-map completion");
            return;
        }
        self.state_tx.send_replace(AccessMapState {
            loading: false,
            access_map,
        });
    }

    async fn fetch(&self, params: &InitParams) -> anyhow::Result<AccessMap> {
        let url = format!(
            "{}/__accessmap",
            params.service_url.trim_end_matches('/')
        );

        tracing::info!(url = %url, "Fetching access map");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&params.access_token)
            .send()
            .await?
            .error_for_status()?;

        let map: AccessMap = response.json().await?;

        tracing::info!(entries = map.len(), "Access map fetched successfully");

        Ok(map)
    }
}

#[async_trait]
impl AccessMapProvider for HttpAccessMapProvider {
    fn subscribe(&self) -> watch::Receiver<AccessMapState> {
        self.state_tx.subscribe()
    }

    async fn init(&self, params: InitParams) {
        let seq = self.begin_init();

        // Failure cause stays here; callers only see the unset map
        let access_map = match self.fetch(&params).await {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!(error = %e, "Access map load failed");
                None
            }
        };

        self.finish_init(seq, access_map);
    }
}
