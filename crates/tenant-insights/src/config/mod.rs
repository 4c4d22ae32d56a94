use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::insights::NpsMethod;

pub const DEFAULT_LIST_LIMIT: usize = 12;
pub const DEFAULT_MAX_HIGHLIGHTS: usize = 5;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub insights: InsightsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            insights: InsightsConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Report pipeline tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightsConfig {
    /// Default page size for report history listings.
    pub list_limit: usize,
    /// Cap on wins, attention areas, and action items per report (3..=5).
    pub max_highlights: usize,
    pub nps_method: NpsMethod,
    /// Directory of CSV activity exports the service reads from, when set.
    pub activity_dir: Option<PathBuf>,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            list_limit: DEFAULT_LIST_LIMIT,
            max_highlights: DEFAULT_MAX_HIGHLIGHTS,
            nps_method: NpsMethod::default(),
            activity_dir: None,
        }
    }
}

impl InsightsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("INSIGHTS_LIST_LIMIT") {
            config.list_limit = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| (1..=104).contains(limit))
                .ok_or(ConfigError::InvalidListLimit { value })?;
        }

        if let Ok(value) = env::var("INSIGHTS_MAX_HIGHLIGHTS") {
            config.max_highlights = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|count| (3..=5).contains(count))
                .ok_or(ConfigError::InvalidMaxHighlights { value })?;
        }

        if let Ok(value) = env::var("INSIGHTS_NPS_METHOD") {
            config.nps_method = value
                .parse()
                .map_err(|_| ConfigError::InvalidNpsMethod { value })?;
        }

        config.activity_dir = env::var("INSIGHTS_ACTIVITY_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(config)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidListLimit { value: String },
    InvalidMaxHighlights { value: String },
    InvalidNpsMethod { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidListLimit { value } => {
                write!(f, "INSIGHTS_LIST_LIMIT must be between 1 and 104, got '{value}'")
            }
            ConfigError::InvalidMaxHighlights { value } => {
                write!(f, "INSIGHTS_MAX_HIGHLIGHTS must be between 3 and 5, got '{value}'")
            }
            ConfigError::InvalidNpsMethod { value } => write!(
                f,
                "INSIGHTS_NPS_METHOD must be 'mean' or 'net_promoter', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
