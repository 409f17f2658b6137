use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub zapi_base_url: String,
    /// Externally reachable URL of this service, used to build the webhook
    /// URLs registered with the vendor.
    pub public_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub status_poll_interval_secs: u64,
    pub status_poll_max_attempts: u32,
    pub webhook_dedup_ttl_secs: u64,
    /// Hex-encoded 32-byte AES-256-GCM key for stored channel credentials.
    pub channel_encryption_key: String,
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    zapi_base_url: Option<String>,
    public_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    status_poll_interval_secs: Option<u64>,
    status_poll_max_attempts: Option<u32>,
    webhook_dedup_ttl_secs: Option<u64>,
    channel_encryption_key: Option<String>,
    log_dir: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_zapi_base_url() -> String {
    "https://api.z-api.io".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_status_poll_interval_secs() -> u64 {
    10
}

fn default_status_poll_max_attempts() -> u32 {
    30
}

fn default_webhook_dedup_ttl_secs() -> u64 {
    600
}

pub(crate) const DEV_CHANNEL_ENCRYPTION_KEY: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

fn default_channel_encryption_key() -> String {
    // Development only. Override through CHANNEL_ENCRYPTION_KEY in production.
    DEV_CHANNEL_ENCRYPTION_KEY.to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::merge(PartialServerConfig::default(), PartialServerConfig::default())
    }
}

impl ServerConfig {
    /// Loads the configuration from an optional TOML file and the environment.
    /// Environment variables take precedence over the file.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => Self::read_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        let config = Self::merge(env_config, file_config);
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<PartialServerConfig, String> {
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    fn merge(primary: PartialServerConfig, fallback: PartialServerConfig) -> Self {
        ServerConfig {
            listen_addr: primary
                .listen_addr
                .or(fallback.listen_addr)
                .unwrap_or_else(default_listen_addr),
            zapi_base_url: primary
                .zapi_base_url
                .or(fallback.zapi_base_url)
                .unwrap_or_else(default_zapi_base_url),
            public_base_url: primary.public_base_url.or(fallback.public_base_url),
            request_timeout_secs: primary
                .request_timeout_secs
                .or(fallback.request_timeout_secs)
                .unwrap_or_else(default_request_timeout_secs),
            status_poll_interval_secs: primary
                .status_poll_interval_secs
                .or(fallback.status_poll_interval_secs)
                .unwrap_or_else(default_status_poll_interval_secs),
            status_poll_max_attempts: primary
                .status_poll_max_attempts
                .or(fallback.status_poll_max_attempts)
                .unwrap_or_else(default_status_poll_max_attempts),
            webhook_dedup_ttl_secs: primary
                .webhook_dedup_ttl_secs
                .or(fallback.webhook_dedup_ttl_secs)
                .unwrap_or_else(default_webhook_dedup_ttl_secs),
            channel_encryption_key: primary
                .channel_encryption_key
                .or(fallback.channel_encryption_key)
                .unwrap_or_else(default_channel_encryption_key),
            log_dir: primary
                .log_dir
                .or(fallback.log_dir)
                .unwrap_or_else(default_log_dir),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT_SECS must be greater than zero".to_string());
        }
        if self.status_poll_interval_secs == 0 {
            return Err("STATUS_POLL_INTERVAL_SECS must be greater than zero".to_string());
        }
        if self.channel_encryption_key.len() != 64 {
            return Err("CHANNEL_ENCRYPTION_KEY must be 64 hex characters (32 bytes)".to_string());
        }
        Ok(())
    }

    pub fn uses_development_key(&self) -> bool {
        self.channel_encryption_key == DEV_CHANNEL_ENCRYPTION_KEY
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_secs)
    }

    pub fn webhook_dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.webhook_dedup_ttl_secs)
    }
}
