//! OAuth2/OIDC identity provider
//!
//! Performs a client-credentials exchange against the identity provider's
//! token endpoint. The first exchange doubles as the startup handshake: its
//! outcome decides whether the session counts as authenticated, and later
//! silent token requests are served from the cached token when possible.

use anyhow::Result;
use async_trait::async_trait;
use oauth2::basic::{BasicErrorResponseType, BasicTokenType};
use oauth2::{
    ClientId, ClientSecret, EmptyExtraTokenFields, EndpointNotSet, EndpointSet,
    RequestTokenError, StandardErrorResponse, StandardRevocableToken,
    StandardTokenIntrospectionResponse, StandardTokenResponse, TokenResponse, TokenUrl,
};
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use super::provider::{IdentityError, IdentityProvider, IdentitySnapshot};
use crate::config::Config;

/// Type alias for our configured OAuth client (token endpoint only)
type ConfiguredOAuthClient = oauth2::Client<
    StandardErrorResponse<BasicErrorResponseType>,
    StandardTokenResponse<EmptyExtraTokenFields, BasicTokenType>,
    StandardTokenIntrospectionResponse<EmptyExtraTokenFields, BasicTokenType>,
    StandardRevocableToken,
    StandardErrorResponse<oauth2::RevocationErrorResponseType>,
    EndpointNotSet, // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Why a token probe came back empty-handed
#[derive(Debug)]
enum ProbeFailure {
    /// The provider answered and said no (bad credentials, bad audience)
    Rejected(String),
    /// The provider could not be reached or returned garbage
    Transport(String),
}

/// Map a probe outcome to the terminal snapshot the handshake publishes
fn handshake_snapshot(outcome: &Result<String, ProbeFailure>) -> IdentitySnapshot {
    match outcome {
        Ok(_) => IdentitySnapshot {
            is_loading: false,
            error: None,
            is_authenticated: true,
        },
        Err(ProbeFailure::Rejected(_)) => IdentitySnapshot {
            is_loading: false,
            error: None,
            is_authenticated: false,
        },
        Err(ProbeFailure::Transport(message)) => IdentitySnapshot {
            is_loading: false,
            error: Some(IdentityError::new(message.clone())),
            is_authenticated: false,
        },
    }
}

pub struct OidcIdentityProvider {
    token_url: String,
    audience: String,
    client_id: String,
    client_secret: String,
    http_client: reqwest::Client,
    state_tx: watch::Sender<IdentitySnapshot>,
    cached_token: RwLock<Option<String>>,
}

impl OidcIdentityProvider {
    pub fn new(config: &Config) -> Result<Self> {
        // Normalize to prevent double-slash issues in the token URL
        let token_url = format!(
            "{}/oauth/token",
            config.identity_url.trim_end_matches('/')
        );

        // Security: timeouts prevent a stalled provider from hanging the handshake
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.http_connect_timeout_secs))
            .timeout(Duration::from_secs(config.http_request_timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client for identity: {}", e))?;

        tracing::info!(
            token_url = %token_url,
            audience = %config.identity_audience,
            "Identity provider initialized"
        );

        Ok(Self {
            token_url,
            audience: config.identity_audience.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            http_client,
            state_tx: watch::Sender::new(IdentitySnapshot::default()),
            cached_token: RwLock::new(None),
        })
    }

    /// Run the startup handshake and publish the terminal snapshot
    ///
    /// Call once after construction; consumers subscribed before this runs
    /// observe the loading state first, then the terminal state.
    pub async fn handshake(&self) {
        tracing::info!("Starting identity handshake");

        let outcome = self.request_token().await;
        let snapshot = handshake_snapshot(&outcome);

        match &outcome {
            Ok(token) => {
                let mut cached = self.cached_token.write().await;
                *cached = Some(token.clone());
                tracing::info!("Identity handshake complete, session authenticated");
            }
            Err(ProbeFailure::Rejected(desc)) => {
                tracing::warn!(
                    reason = %desc,
                    "Identity provider rejected credentials, session unauthenticated"
                );
            }
            Err(ProbeFailure::Transport(msg)) => {
                tracing::error!(error = %msg, "Identity handshake failed");
            }
        }

        self.state_tx.send_replace(snapshot);
    }

    fn create_oauth_client(&self) -> Result<ConfiguredOAuthClient, String> {
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| format!("Invalid token URL: {}", e))?;

        let client = oauth2::Client::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(token_url);

        Ok(client)
    }

    async fn request_token(&self) -> Result<String, ProbeFailure> {
        let oauth_client = self
            .create_oauth_client()
            .map_err(ProbeFailure::Transport)?;

        let token_result = oauth_client
            .exchange_client_credentials()
            .add_extra_param("audience", &self.audience)
            .request_async(&self.http_client)
            .await;

        match token_result {
            Ok(response) => Ok(response.access_token().secret().clone()),
            Err(RequestTokenError::ServerResponse(err)) => {
                Err(ProbeFailure::Rejected(err.to_string()))
            }
            Err(e) => Err(ProbeFailure::Transport(e.to_string())),
        }
    }
}

#[async_trait]
impl IdentityProvider for OidcIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
        self.state_tx.subscribe()
    }

    async fn get_access_token_silently(&self) -> Result<Option<String>> {
        // Cache-first: the handshake already paid for a token
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                tracing::debug!("Serving access token from cache");
                return Ok(Some(token.clone()));
            }
        }

        match self.request_token().await {
            Ok(token) => {
                let mut cached = self.cached_token.write().await;
                *cached = Some(token.clone());
                Ok(Some(token))
            }
            Err(ProbeFailure::Rejected(desc)) => {
                tracing::warn!(reason = %desc, "Silent token request rejected");
                Ok(None)
            }
            Err(ProbeFailure::Transport(msg)) => {
                Err(anyhow::anyhow!("Silent token request failed: {}", msg))
            }
        }
    }
}
