use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Gold Smith
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GoldSmithConfig {
    /// One-time code settings
    pub otp: OtpConfig,
    /// Where send/verify/commit calls go
    pub backend: BackendConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Exact number of digits in a code
    pub code_length: usize,
    /// Cooldown used when the backend omits `expiresIn`
    pub fallback_expires_in_secs: u64,
    /// Countdown tick period
    pub tick_interval_ms: u64,
    /// Lock verification after this many rejected codes; unset means unlimited
    pub max_verify_attempts: Option<u32>,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            fallback_expires_in_secs: 30,
            tick_interval_ms: 1000,
            max_verify_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    Mock,
    Http,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub mode: BackendMode,
    /// REST API root, used in `http` mode
    pub base_url: String,
    pub requests_per_second: u32,
    pub request_timeout_secs: u64,
    /// Simulated latency of the in-memory backend
    pub mock_latency_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Mock,
            base_url: "http://localhost:8080/api".to_string(),
            requests_per_second: 5,
            request_timeout_secs: 15,
            mock_latency_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

impl GoldSmithConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`gold-smith.toml`, or `path` when given)
    /// 3. Environment variables (prefixed with GOLD_SMITH_, nested with `__`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if Path::new("gold-smith.toml").exists() {
                    builder = builder.add_source(File::with_name("gold-smith"));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("GOLD_SMITH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let gold_smith_config: GoldSmithConfig = config.try_deserialize()?;
        gold_smith_config.validate()?;
        Ok(gold_smith_config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.otp.code_length == 0 {
            anyhow::bail!("otp.code_length must be at least 1");
        }
        if self.otp.tick_interval_ms == 0 {
            anyhow::bail!("otp.tick_interval_ms must be positive");
        }
        if self.otp.max_verify_attempts == Some(0) {
            anyhow::bail!("otp.max_verify_attempts must be positive when set");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
