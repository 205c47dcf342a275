use crate::error::{RelayError, Result};
use serde::Deserialize;
use std::env;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub relay: RelaySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// May be empty; requests are then answered with a configuration error.
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    /// Connect timeout only. The body of a stream is not time-bounded here.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.openai.com".to_string(),
            model: "text-davinci-003".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Default sampling parameters sent with every completion request
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub n: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            n: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Ceiling for bytes held while waiting for a record delimiter
    pub max_pending_bytes: usize,
    /// Depth of the bounded outbound queue
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_pending_bytes: 64 * 1024,
            channel_capacity: 16,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let listen_addr =
            env::var("RELAY_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

        let defaults = UpstreamConfig::default();
        let api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let endpoint = env::var("OPENAI_ENDPOINT").unwrap_or(defaults.endpoint);
        let model = env::var("OPENAI_MODEL").unwrap_or(defaults.model);

        let max_pending_bytes = match env::var("RELAY_MAX_PENDING_BYTES") {
            Ok(v) => v.parse::<usize>().map_err(|e| {
                RelayError::ConfigError(format!("Invalid RELAY_MAX_PENDING_BYTES: {}", e))
            })?,
            Err(_) => RelaySettings::default().max_pending_bytes,
        };

        Ok(RelayConfig {
            server: ServerConfig { listen_addr },
            upstream: UpstreamConfig {
                api_key,
                endpoint,
                model,
                timeout_secs: defaults.timeout_secs,
            },
            generation: GenerationConfig::default(),
            relay: RelaySettings {
                max_pending_bytes,
                ..RelaySettings::default()
            },
        })
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| RelayError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: RelayConfig = toml::from_str(&contents)
            .map_err(|e| RelayError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        // Allow environment variables to override file config
        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            config.upstream.api_key = api_key;
        }

        Ok(config)
    }

    /// Validate configuration. An empty credential is allowed here.
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.is_empty() {
            return Err(RelayError::ConfigError("Listen address is empty".to_string()));
        }

        if self.upstream.endpoint.is_empty() {
            return Err(RelayError::ConfigError("Endpoint is empty".to_string()));
        }

        if self.upstream.model.is_empty() {
            return Err(RelayError::ConfigError("Model is empty".to_string()));
        }

        if self.relay.max_pending_bytes == 0 {
            return Err(RelayError::ConfigError(
                "max_pending_bytes must be greater than 0".to_string(),
            ));
        }

        if self.relay.channel_capacity == 0 {
            return Err(RelayError::ConfigError(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn has_credential(&self) -> bool {
        !self.upstream.api_key.is_empty()
    }
}
