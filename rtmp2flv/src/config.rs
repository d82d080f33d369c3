use std::path::Path;
use std::time::Duration;

use clap::Parser;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Browser identification sent to redirectors that filter on user agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Command-line flags. Anything set here overrides file and environment.
#[derive(Parser, Debug, Default)]
#[command(name = "rtmp2flv")]
#[command(about = "Relays remote RTMP streams as HTTP-FLV", long_about = None)]
pub struct Args {
    /// flv dest address
    #[arg(long = "flv")]
    pub flv: Option<String>,

    /// optional appkey for more privacy
    #[arg(long)]
    pub appkey: Option<String>,

    /// Config file (yaml, toml, json)
    #[arg(short, long, env = "RTMP2FLV_CONFIG_PATH")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    pub log_format: Option<String>,

    /// RTMP dial timeout in seconds, 0 waits forever
    #[arg(long)]
    pub dial_timeout_secs: Option<u64>,
}

/// Process configuration, fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub appkey: String,
    pub resolve_timeout_secs: u64,
    pub dial_timeout_secs: u64,
    pub user_agent: String,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:80".to_string(),
            appkey: String::new(),
            resolve_timeout_secs: 10,
            dial_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            } else {
                return Err(ConfigError::NotFound(path.to_string()));
            }
        }

        // RTMP2FLV_APPKEY, RTMP2FLV_LOGGING__LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("RTMP2FLV")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(false),
        );

        builder.build()?.try_deserialize()
    }

    /// Loads file and environment, then applies command-line overrides.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let mut config = Self::load(args.config.as_deref())?;
        config.apply_args(args);
        Ok(config)
    }

    fn apply_args(&mut self, args: Args) {
        if let Some(listen) = args.flv {
            self.listen = listen;
        }
        if let Some(appkey) = args.appkey {
            self.appkey = appkey;
        }
        if let Some(level) = args.log_level {
            self.logging.level = level;
        }
        if let Some(format) = args.log_format {
            self.logging.format = format;
        }
        if let Some(secs) = args.dial_timeout_secs {
            self.dial_timeout_secs = secs;
        }
    }

    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.listen.trim().is_empty() {
            errors.push("Flv address can not be empty".to_string());
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            errors.push(format!(
                "Invalid log format: {} (expected pretty or json)",
                self.logging.format
            ));
        }
        if self.resolve_timeout_secs == 0 {
            errors.push("resolve_timeout_secs must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    #[must_use]
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// `None` when dialing is unbounded.
    #[must_use]
    pub fn dial_timeout(&self) -> Option<Duration> {
        (self.dial_timeout_secs > 0).then(|| Duration::from_secs(self.dial_timeout_secs))
    }
}
