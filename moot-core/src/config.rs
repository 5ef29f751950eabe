use config::{Config as ConfigBuilder, Environment as EnvSource, File};
use serde::{Deserialize, Serialize};

/// Default STUN server emitted in ICE configurations.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Deployment environment. Anything other than `production` behaves as
/// development (permissive CORS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "production" {
            Self::Production
        } else {
            Self::Development
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
        }
    }
}

/// Application configuration
///
/// Loaded from defaults, an optional `moot.toml`, and the process
/// environment: `HOST`, `PORT`, `ENV`, `ALLOWED_ORIGINS` (CSV),
/// `ICE_SERVERS` (CSV), `LOG_LEVEL`, `LOG_FORMAT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `development` or `production`.
    pub env: String,
    /// Origins allowed by the CORS layer in production; `*` allows any.
    pub allowed_origins: Vec<String>,
    /// STUN servers handed to every peer connection.
    pub ice_servers: Vec<String>,
    pub log_level: String,
    /// "json" or "pretty"
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            env: "development".to_string(),
            allowed_origins: vec!["*".to_string()],
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional config file and the
    /// environment. Environment variables win over the file.
    pub fn load() -> crate::Result<Self> {
        let defaults = Self::default();

        let cfg = ConfigBuilder::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("env", "development")?
            .set_default("allowed_origins", defaults.allowed_origins)?
            .set_default("ice_servers", defaults.ice_servers)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", defaults.log_format)?
            .add_source(File::with_name("moot").required(false))
            .add_source(
                EnvSource::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins")
                    .with_list_parse_key("ice_servers"),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Bind address in `host:port` form.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        Environment::parse(&self.env)
    }

    /// Whether the given Origin header value passes the allow-list.
    /// Development is always permissive; production honors `allowed_origins`.
    #[must_use]
    pub fn origin_allowed(&self, origin: &str) -> bool {
        if !self.environment().is_production() {
            return true;
        }
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_addr(), "0.0.0.0:3000");
        assert_eq!(config.environment(), Environment::Development);
        assert_eq!(config.allowed_origins, vec!["*"]);
        assert_eq!(config.ice_servers, vec![DEFAULT_STUN_SERVER]);
    }

    #[test]
    fn test_environment_parsing() {
        assert!(Environment::parse("production").is_production());

        // Unrecognized values fall back to development.
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn test_origin_allowed() {
        let mut config = Config {
            env: "production".to_string(),
            allowed_origins: vec!["https://app.example.com".to_string()],
            ..Config::default()
        };
        assert!(config.origin_allowed("https://app.example.com"));
        assert!(!config.origin_allowed("https://evil.example.com"));

        config.allowed_origins = vec!["*".to_string()];
        assert!(config.origin_allowed("https://anything.example.com"));

        config.env = "development".to_string();
        config.allowed_origins = vec![];
        assert!(config.origin_allowed("https://anything.example.com"));
    }
}
