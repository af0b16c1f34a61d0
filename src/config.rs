use std::env;
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::assessment::{ConfigurationError, PipelineConfig};

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
    pub data_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load from environment (with `.env` support). The risk pipeline config
    /// comes from the optional JSON file named by `APP_RISK_CONFIG` and is
    /// validated here, so a bad threshold fails at startup rather than
    /// mid-request.
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

        let data_dir =
            PathBuf::from(env::var("APP_DATA_DIR").unwrap_or_else(|_| "data".to_string()));

        let pipeline = match env::var("APP_RISK_CONFIG") {
            Ok(path) => Self::load_pipeline(&PathBuf::from(path))?,
            Err(_) => PipelineConfig::default(),
        };
        pipeline.validate().map_err(ConfigError::Pipeline)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            data_dir,
            pipeline,
        })
    }

    fn load_pipeline(path: &PathBuf) -> Result<PipelineConfig, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::RiskConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::RiskConfigParse {
            path: path.display().to_string(),
            source,
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

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    RiskConfigRead {
        path: String,
        source: std::io::Error,
    },
    RiskConfigParse {
        path: String,
        source: serde_json::Error,
    },
    Pipeline(ConfigurationError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::RiskConfigRead { path, .. } => {
                write!(f, "failed to read risk config at '{path}'")
            }
            ConfigError::RiskConfigParse { path, .. } => {
                write!(f, "failed to parse risk config at '{path}'")
            }
            ConfigError::Pipeline(err) => write!(f, "risk config invalid: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::RiskConfigRead { source, .. } => Some(source),
            ConfigError::RiskConfigParse { source, .. } => Some(source),
            ConfigError::Pipeline(source) => Some(source),
        }
    }
}
