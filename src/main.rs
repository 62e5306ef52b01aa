use anyhow::Result;
use atrium::access::{AccessMapProvider, HttpAccessMapProvider};
use atrium::bootstrap::BootstrapController;
use atrium::identity::{IdentityProvider, OidcIdentityProvider};
use atrium::{config::Config, web, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting atrium shell");

    // Load configuration from environment
    let config = Config::load()?;
    tracing::info!(
        environment = ?config.environment,
        api_origin = %config.api_origin,
        identity_url = %config.identity_url,
        "Configuration loaded"
    );

    let identity = Arc::new(OidcIdentityProvider::new(&config)?);
    let access = Arc::new(HttpAccessMapProvider::new(&config)?);

    let controller = Arc::new(BootstrapController::new(
        Arc::clone(&identity) as Arc<dyn IdentityProvider>,
        Arc::clone(&access) as Arc<dyn AccessMapProvider>,
        config.api_origin.clone(),
    ));
    let verdict_rx = controller.subscribe();
    let access_rx = access.subscribe();

    // Controller starts first so it observes the handshake from its initial
    // loading state; the handshake then drives it to a terminal verdict
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run().await });
    }
    {
        let identity = Arc::clone(&identity);
        tokio::spawn(async move { identity.handshake().await });
    }

    // Create shared application state
    let state = AppState::new(Arc::new(config.clone()), verdict_rx, access_rx);
    let app = web::create_router(state);

    // Bind and serve
    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Atrium listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
