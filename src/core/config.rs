use crate::core::errors::ConfigError;
use crate::core::types::ProviderId;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    /// Request body limit in megabytes (two images per request)
    pub max_body_mb: usize,
}

/// Remote provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Whole-request timeout for a remote call
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub nanobanana_endpoint: String,
    pub deepai_endpoint: String,
    /// Instruction sent along with the image to the DeepAI editor
    pub deepai_prompt: String,
}

/// Circuit breaker settings applied to every remote provider
#[derive(Debug, Clone)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: usize,
    pub recovery_seconds: u64,
    pub success_threshold: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProviderConfig,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 5000,
                host: "0.0.0.0".to_string(),
                log_level: Level::INFO,
                max_body_mb: 25,
            },
            providers: ProviderConfig {
                timeout_seconds: 20,
                connect_timeout_seconds: 10,
                nanobanana_endpoint: "https://api.nanobanana.ai/api/try-on".to_string(),
                deepai_endpoint: "https://api.deepai.org/api/image-editor".to_string(),
                deepai_prompt: "merge with dress image and create virtual try-on".to_string(),
            },
            circuit_breaker: CircuitBreakerSettings {
                failure_threshold: 5,
                recovery_seconds: 60,
                success_threshold: 2,
            },
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let defaults = Self::default();

        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(defaults.server.log_level);

        Self {
            server: ServerConfig {
                port: parse_env("SERVER_PORT").unwrap_or(defaults.server.port),
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                log_level,
                max_body_mb: parse_env("MAX_BODY_MB").unwrap_or(defaults.server.max_body_mb),
            },
            providers: ProviderConfig {
                timeout_seconds: parse_env("PROVIDER_TIMEOUT_SECONDS")
                    .unwrap_or(defaults.providers.timeout_seconds),
                connect_timeout_seconds: parse_env("PROVIDER_CONNECT_TIMEOUT_SECONDS")
                    .unwrap_or(defaults.providers.connect_timeout_seconds),
                nanobanana_endpoint: env::var("NANOBANANA_ENDPOINT")
                    .unwrap_or(defaults.providers.nanobanana_endpoint),
                deepai_endpoint: env::var("DEEPAI_ENDPOINT")
                    .unwrap_or(defaults.providers.deepai_endpoint),
                deepai_prompt: env::var("DEEPAI_PROMPT")
                    .unwrap_or(defaults.providers.deepai_prompt),
            },
            circuit_breaker: CircuitBreakerSettings {
                failure_threshold: parse_env("CIRCUIT_FAILURE_THRESHOLD")
                    .unwrap_or(defaults.circuit_breaker.failure_threshold),
                recovery_seconds: parse_env("CIRCUIT_RECOVERY_SECONDS")
                    .unwrap_or(defaults.circuit_breaker.recovery_seconds),
                success_threshold: parse_env("CIRCUIT_SUCCESS_THRESHOLD")
                    .unwrap_or(defaults.circuit_breaker.success_threshold),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=300).contains(&self.providers.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.providers.timeout_seconds));
        }

        if self.providers.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout(0));
        }

        for (provider, url) in [
            (ProviderId::NanoBanana, &self.providers.nanobanana_endpoint),
            (ProviderId::DeepAi, &self.providers.deepai_endpoint),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidEndpoint {
                    provider,
                    url: url.clone(),
                });
            }
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidCircuitBreaker(
                "failure_threshold must be > 0".to_string(),
            ));
        }
        if self.circuit_breaker.success_threshold == 0 {
            return Err(ConfigError::InvalidCircuitBreaker(
                "success_threshold must be > 0".to_string(),
            ));
        }

        if self.server.max_body_mb == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "max_body_mb must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn max_body_bytes(&self) -> usize {
        self.server.max_body_mb * 1024 * 1024
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.providers.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.providers.connect_timeout_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
