use std::env;

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Environment configuration
    pub environment: Environment,

    // Server configuration
    pub server_host: String,
    pub server_port: u16,

    // Policy-decision service origin (access map source)
    pub api_origin: String,

    // Identity provider configuration
    pub identity_url: String,
    pub identity_audience: String,
    pub client_id: String,
    pub client_secret: String,

    // HTTP client timeout configuration (in seconds)
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables using std::env::var
    pub fn load() -> anyhow::Result<Self> {
        // Parse environment type
        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // Required variables
        let identity_url = env::var("IDENTITY_URL")
            .map_err(|_| anyhow::anyhow!("IDENTITY_URL environment variable is required"))?;

        let identity_audience = env::var("IDENTITY_AUDIENCE")
            .map_err(|_| anyhow::anyhow!("IDENTITY_AUDIENCE environment variable is required"))?;

        let client_id = env::var("CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("CLIENT_ID environment variable is required"))?;

        let client_secret = env::var("CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("CLIENT_SECRET environment variable is required"))?;

        // Optional variables with defaults
        let api_origin =
            env::var("API_ORIGIN").unwrap_or_else(|_| "http://localhost:3001".to_string());

        // Reject unparseable origins at startup rather than at the first fetch
        url::Url::parse(&api_origin)
            .map_err(|e| anyhow::anyhow!("API_ORIGIN is not a valid URL: {}", e))?;
        url::Url::parse(&identity_url)
            .map_err(|e| anyhow::anyhow!("IDENTITY_URL is not a valid URL: {}", e))?;

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(3000);

        let http_connect_timeout_secs = env::var("HTTP_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        let http_request_timeout_secs = env::var("HTTP_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Config {
            environment,
            server_host,
            server_port,
            api_origin,
            identity_url,
            identity_audience,
            client_id,
            client_secret,
            http_connect_timeout_secs,
            http_request_timeout_secs,
        })
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get bind address for server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
