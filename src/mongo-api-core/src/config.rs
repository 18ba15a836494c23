use serde::{Deserialize, Serialize};

use crate::query::{DEFAULT_COLLECTION, DEFAULT_DATABASE};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Sent as the `api_key` header on every request when set
    #[serde(default)]
    pub api_key: Option<String>,

    // Target used until the caller picks another database/collection
    #[serde(default = "default_database")]
    pub default_database: String,
    #[serde(default = "default_collection")]
    pub default_collection: String,

    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Directory for JSON log files, console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9875
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// `{scheme}://{host}:{port}`, no trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            scheme: default_scheme(),
            api_key: None,
            default_database: default_database(),
            default_collection: default_collection(),
            insecure_skip_verify: false,
            log_dir: None,
        }
    }
}
