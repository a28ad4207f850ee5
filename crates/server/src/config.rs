use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Which face provider backs the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// AWS Rekognition through the default credential chain.
    #[default]
    Rekognition,
    /// Process-local provider for development without cloud credentials.
    Memory,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment; `production` tightens CORS and error payloads
    #[serde(default = "default_node_env")]
    pub node_env: String,

    /// Allowed CORS origins in production; `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Shared secret expected in `x-api-key`; empty disables the check
    #[serde(default)]
    pub api_key: String,

    /// Provider region
    #[serde(default = "default_aws_region")]
    pub aws_region: String,

    /// Collection used when a request does not name one
    #[serde(default = "default_collection_id", alias = "rekognition_collection_id")]
    pub collection_id: String,

    /// Ceiling for a decoded image in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Ceiling for a request body (JSON or multipart) in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Rate limit: requests per minute per client
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Identify clients by the last `X-Forwarded-For` hop. Only turn this on
    /// behind a proxy that sets the header; otherwise clients pick their own
    /// rate-limit key.
    #[serde(default)]
    pub trust_proxy: bool,

    /// Log level / tracing filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Face provider backend
    #[serde(default)]
    pub provider: ProviderKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            node_env: default_node_env(),
            cors_origins: default_cors_origins(),
            api_key: String::new(),
            aws_region: default_aws_region(),
            collection_id: default_collection_id(),
            max_image_bytes: default_max_image_bytes(),
            max_body_bytes: default_max_body_bytes(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            trust_proxy: false,
            log_level: default_log_level(),
            provider: ProviderKind::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional `facegate` config file and
    /// environment variables (`PORT`, `NODE_ENV`, `CORS_ORIGINS`, `API_KEY`,
    /// `AWS_REGION`, `REKOGNITION_COLLECTION_ID`, ...). Environment wins.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("facegate").required(false))
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            );

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.cors_origins = self
            .cors_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        if self.cors_origins.is_empty() {
            self.cors_origins = default_cors_origins();
        }
        self.api_key = self.api_key.trim().to_string();
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rate_limit_per_minute == 0 {
            anyhow::bail!("rate_limit_per_minute must be greater than zero");
        }
        if self.max_image_bytes == 0 {
            anyhow::bail!("max_image_bytes must be greater than zero");
        }
        if self.max_image_bytes > self.max_body_bytes {
            anyhow::bail!(
                "max_image_bytes ({}) exceeds max_body_bytes ({})",
                self.max_image_bytes,
                self.max_body_bytes
            );
        }
        if self.collection_id.trim().is_empty() {
            anyhow::bail!("collection_id must not be empty");
        }
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        Ok(addr_str.parse()?)
    }

    pub fn is_production(&self) -> bool {
        self.node_env.eq_ignore_ascii_case("production")
    }

    /// Whether any origin may call the API.
    pub fn cors_allows_any(&self) -> bool {
        !self.is_production() || self.cors_origins.iter().any(|o| o == "*")
    }

    pub fn api_key_required(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Fixed rate-limit window.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(60)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_node_env() -> String {
    "development".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_collection_id() -> String {
    "constructora-faces".to_string()
}

fn default_max_image_bytes() -> usize {
    facegate::DEFAULT_MAX_IMAGE_BYTES
}

fn default_max_body_bytes() -> usize {
    7 * 1024 * 1024
}

fn default_rate_limit_per_minute() -> u32 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.node_env, "development");
        assert_eq!(cfg.cors_origins, vec!["*"]);
        assert_eq!(cfg.aws_region, "us-east-1");
        assert_eq!(cfg.collection_id, "constructora-faces");
        assert_eq!(cfg.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.max_body_bytes, 7 * 1024 * 1024);
        assert_eq!(cfg.rate_limit_per_minute, 120);
        assert_eq!(cfg.provider, ProviderKind::Rekognition);
        assert!(!cfg.trust_proxy);
        assert!(!cfg.api_key_required());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 3000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_cors_policy() {
        let mut cfg = ServerConfig {
            cors_origins: vec!["https://app.example.com".into()],
            ..Default::default()
        };
        assert!(cfg.cors_allows_any(), "development allows any origin");

        cfg.node_env = "production".into();
        assert!(cfg.is_production());
        assert!(!cfg.cors_allows_any());

        cfg.cors_origins = vec!["*".into()];
        assert!(cfg.cors_allows_any());
    }

    #[test]
    fn test_normalize_trims_origins_and_key() {
        let mut cfg = ServerConfig {
            cors_origins: vec![" https://a.example ".into(), "".into(), "https://b.example".into()],
            api_key: "  secret \n".into(),
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(cfg.api_key, "secret");

        let mut blank = ServerConfig {
            cors_origins: vec![" ".into()],
            ..Default::default()
        };
        blank.normalize();
        assert_eq!(blank.cors_origins, vec!["*"]);
    }

    #[test]
    fn test_validate_rejects_inconsistent_limits() {
        let cfg = ServerConfig {
            max_image_bytes: 8 * 1024 * 1024,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ServerConfig {
            rate_limit_per_minute: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ServerConfig {
            collection_id: "  ".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_provider_kind_parses_lowercase() {
        let kind: ProviderKind = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(kind, ProviderKind::Memory);
    }
}
