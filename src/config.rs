// Configuration management

use crate::core::errors::QhseError;
use secrecy::Secret;
use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
///
/// Every value has a default so a bare `cargo run` starts a local instance
/// backed by `qhse.db`. All values are validated on load.
#[derive(Debug, Clone)]
pub struct Config {
    // Server configuration
    pub bind_address: String,
    pub port: u16,

    // Database configuration
    pub database_url: String,
    pub database_max_connections: u32,
    pub seed_demo_data: bool,
    pub admin_password: Secret<String>,

    // Session configuration
    pub session_ttl_secs: u64,
    pub session_cache_capacity: u64,

    // Ledger configuration
    pub ledger_difficulty: usize,
    pub ledger_signing_key_path: Option<PathBuf>,

    // Background tasks
    pub iot_simulator_enabled: bool,
    pub iot_simulator_interval_secs: u64,
    pub notification_sweep_interval_secs: u64,

    // LLM text analysis (optional)
    pub llm_api_key: Option<Secret<String>>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,

    // Middleware configuration
    pub request_timeout_secs: u64,
    pub body_size_limit_bytes: usize,

    // Logging configuration
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Supports `.env` file loading in development (via dotenv crate).
    pub fn from_env() -> Result<Self, QhseError> {
        // Skipped under test so test env vars are not overridden
        #[cfg(not(test))]
        {
            dotenv::dotenv().ok();
        }

        let config = Self {
            bind_address: Self::get_env_or_default("BIND_ADDRESS", "0.0.0.0")?,
            port: Self::parse_port()?,
            database_url: Self::get_env_or_default("DATABASE_URL", "sqlite://qhse.db?mode=rwc")?,
            database_max_connections: Self::parse_u32_or_default("DATABASE_MAX_CONNECTIONS", 5)?,
            seed_demo_data: Self::parse_bool_or_default("SEED_DEMO_DATA", true)?,
            admin_password: Secret::new(Self::get_env_or_default("ADMIN_PASSWORD", "admin123")?),
            session_ttl_secs: Self::parse_u64_or_default("SESSION_TTL_SECS", 8 * 3600)?,
            session_cache_capacity: Self::parse_u64_or_default("SESSION_CACHE_CAPACITY", 10_000)?,
            ledger_difficulty: Self::parse_usize_or_default("LEDGER_DIFFICULTY", 4)?,
            ledger_signing_key_path: Self::get_optional_path("LEDGER_SIGNING_KEY_PATH")?,
            iot_simulator_enabled: Self::parse_bool_or_default("IOT_SIMULATOR_ENABLED", true)?,
            iot_simulator_interval_secs: Self::parse_u64_or_default("IOT_SIMULATOR_INTERVAL_SECS", 5)?,
            notification_sweep_interval_secs: Self::parse_u64_or_default("NOTIFICATION_SWEEP_INTERVAL_SECS", 3600)?,
            llm_api_key: Self::get_optional_env("LLM_API_KEY")?.map(Secret::new),
            llm_api_url: Self::get_env_or_default("LLM_API_URL", "https://api.openai.com/v1/chat/completions")?,
            llm_model: Self::get_env_or_default("LLM_MODEL", "gpt-3.5-turbo")?,
            llm_timeout_secs: Self::parse_u64_or_default("LLM_TIMEOUT_SECS", 30)?,
            request_timeout_secs: Self::parse_u64_or_default("REQUEST_TIMEOUT_SECS", 30)?,
            body_size_limit_bytes: Self::parse_usize_or_default("BODY_SIZE_LIMIT_BYTES", 2 * 1024 * 1024)?,
            log_level: Self::get_env_or_default("LOG_LEVEL", "info")?,
            log_format: Self::get_env_or_default("LOG_FORMAT", "json")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Get environment variable or return default value
    fn get_env_or_default(key: &str, default: &str) -> Result<String, QhseError> {
        Ok(env::var(key).unwrap_or_else(|_| default.to_string()))
    }

    /// Get optional environment variable
    fn get_optional_env(key: &str) -> Result<Option<String>, QhseError> {
        match env::var(key) {
            Ok(value) if !value.is_empty() => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Get optional file path from environment variable
    fn get_optional_path(key: &str) -> Result<Option<PathBuf>, QhseError> {
        Ok(Self::get_optional_env(key)?.map(PathBuf::from))
    }

    /// Parse port from PORT environment variable
    fn parse_port() -> Result<u16, QhseError> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let port = port_str.parse::<u16>()
            .map_err(|e| QhseError::ConfigurationError(
                format!("Invalid PORT value '{}': {}", port_str, e)
            ))?;

        if port == 0 {
            return Err(QhseError::ConfigurationError(
                "PORT must be between 1 and 65535".to_string()
            ));
        }

        Ok(port)
    }

    /// Parse a boolean flag ("true"/"false"/"1"/"0"/"yes"/"no")
    fn parse_bool_or_default(key: &str, default: bool) -> Result<bool, QhseError> {
        match env::var(key) {
            Ok(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(QhseError::ConfigurationError(
                    format!("Invalid {} value '{}': expected a boolean", key, value)
                )),
            },
            _ => Ok(default),
        }
    }

    /// Parse a strictly positive number from an environment variable
    fn parse_positive<T>(key: &str, default: T) -> Result<T, QhseError>
    where
        T: std::str::FromStr + PartialEq + Default,
        T::Err: std::fmt::Display,
    {
        match env::var(key) {
            Ok(value) => {
                let parsed = value.parse::<T>()
                    .map_err(|e| QhseError::ConfigurationError(
                        format!("Invalid {} value '{}': {}", key, value, e)
                    ))?;

                if parsed == T::default() {
                    return Err(QhseError::ConfigurationError(
                        format!("{} must be greater than 0", key)
                    ));
                }

                Ok(parsed)
            }
            _ => Ok(default),
        }
    }

    /// Parse u64 from environment variable or return default
    fn parse_u64_or_default(key: &str, default: u64) -> Result<u64, QhseError> {
        Self::parse_positive(key, default)
    }

    /// Parse u32 from environment variable or return default
    fn parse_u32_or_default(key: &str, default: u32) -> Result<u32, QhseError> {
        Self::parse_positive(key, default)
    }

    /// Parse usize from environment variable or return default
    fn parse_usize_or_default(key: &str, default: usize) -> Result<usize, QhseError> {
        Self::parse_positive(key, default)
    }

    /// Validate all configuration values
    fn validate(&self) -> Result<(), QhseError> {
        Self::validate_database_url(&self.database_url)?;
        Self::validate_url(&self.llm_api_url, "LLM API")?;

        if self.ledger_difficulty > 6 {
            return Err(QhseError::ConfigurationError(
                format!("Invalid LEDGER_DIFFICULTY '{}': must be between 1 and 6", self.ledger_difficulty)
            ));
        }

        if let Some(ref path) = self.ledger_signing_key_path {
            Self::validate_file_path(path, "Ledger signing key")?;
        }

        Self::validate_log_level(&self.log_level)?;
        Self::validate_log_format(&self.log_format)?;

        Ok(())
    }

    /// Validate that a file path exists and is a regular file
    fn validate_file_path(path: &PathBuf, description: &str) -> Result<(), QhseError> {
        if !path.exists() {
            return Err(QhseError::ConfigurationError(
                format!("{} not found at {:?}", description, path)
            ));
        }

        if !path.is_file() {
            return Err(QhseError::ConfigurationError(
                format!("{} is not a file: {:?}", description, path)
            ));
        }

        Ok(())
    }

    /// Validate URL format
    fn validate_url(url: &str, description: &str) -> Result<(), QhseError> {
        url::Url::parse(url)
            .map_err(|e| QhseError::ConfigurationError(
                format!("Invalid {} URL '{}': {}", description, url, e)
            ))?;
        Ok(())
    }

    /// Only SQLite URLs are supported
    fn validate_database_url(url: &str) -> Result<(), QhseError> {
        Self::validate_url(url, "Database")?;
        if !url.starts_with("sqlite:") {
            return Err(QhseError::ConfigurationError(
                format!("Invalid DATABASE_URL '{}': only sqlite URLs are supported", url)
            ));
        }
        Ok(())
    }

    /// Validate log level
    fn validate_log_level(level: &str) -> Result<(), QhseError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(QhseError::ConfigurationError(
                format!("Invalid LOG_LEVEL '{}': must be one of {}", level, valid_levels.join(", "))
            ));
        }
        Ok(())
    }

    /// Validate log format
    fn validate_log_format(format: &str) -> Result<(), QhseError> {
        if format != "json" && format != "text" {
            return Err(QhseError::ConfigurationError(
                format!("Invalid LOG_FORMAT '{}': must be 'json' or 'text'", format)
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Create a test configuration
    ///
    /// Uses an in-memory database, a low mining difficulty and no background tasks.
    pub fn test_config() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            seed_demo_data: false,
            admin_password: Secret::new("admin123".to_string()),
            session_ttl_secs: 3600,
            session_cache_capacity: 100,
            ledger_difficulty: 1,
            ledger_signing_key_path: None,
            iot_simulator_enabled: false,
            iot_simulator_interval_secs: 5,
            notification_sweep_interval_secs: 3600,
            llm_api_key: None,
            llm_api_url: "http://localhost/v1/chat/completions".to_string(),
            llm_model: "gpt-3.5-turbo".to_string(),
            llm_timeout_secs: 5,
            request_timeout_secs: 30,
            body_size_limit_bytes: 2 * 1024 * 1024,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_get_env_or_default() {
        env::set_var("QHSE_TEST_VAR", "test_value");
        let result = Config::get_env_or_default("QHSE_TEST_VAR", "default").unwrap();
        assert_eq!(result, "test_value");
        env::remove_var("QHSE_TEST_VAR");
    }

    #[test]
    fn test_get_env_or_default_missing() {
        env::remove_var("QHSE_TEST_VAR_MISSING");
        let result = Config::get_env_or_default("QHSE_TEST_VAR_MISSING", "default").unwrap();
        assert_eq!(result, "default");
    }

    #[test]
    fn test_parse_bool_variants() {
        env::set_var("QHSE_TEST_BOOL", "yes");
        assert!(Config::parse_bool_or_default("QHSE_TEST_BOOL", false).unwrap());
        env::set_var("QHSE_TEST_BOOL", "0");
        assert!(!Config::parse_bool_or_default("QHSE_TEST_BOOL", true).unwrap());
        env::set_var("QHSE_TEST_BOOL", "maybe");
        assert!(Config::parse_bool_or_default("QHSE_TEST_BOOL", true).is_err());
        env::remove_var("QHSE_TEST_BOOL");
        assert!(Config::parse_bool_or_default("QHSE_TEST_BOOL", true).unwrap());
    }

    #[test]
    fn test_parse_u64_rejects_zero() {
        env::set_var("QHSE_TEST_U64", "0");
        assert!(Config::parse_u64_or_default("QHSE_TEST_U64", 5).is_err());
        env::set_var("QHSE_TEST_U64", "abc");
        assert!(Config::parse_u64_or_default("QHSE_TEST_U64", 5).is_err());
        env::set_var("QHSE_TEST_U64", "12");
        assert_eq!(Config::parse_u64_or_default("QHSE_TEST_U64", 5).unwrap(), 12);
        env::remove_var("QHSE_TEST_U64");
    }

    #[test]
    fn test_validate_log_level() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(Config::validate_log_level(level).is_ok());
        }
        assert!(Config::validate_log_level("verbose").is_err());
    }

    #[test]
    fn test_validate_log_format() {
        assert!(Config::validate_log_format("json").is_ok());
        assert!(Config::validate_log_format("text").is_ok());
        assert!(Config::validate_log_format("xml").is_err());
    }

    #[test]
    fn test_validate_database_url() {
        assert!(Config::validate_database_url("sqlite://qhse.db?mode=rwc").is_ok());
        assert!(Config::validate_database_url("sqlite::memory:").is_ok());
        assert!(Config::validate_database_url("postgresql://localhost/qhse").is_err());
        assert!(Config::validate_database_url("not a url").is_err());
    }

    #[test]
    fn test_validate_file_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.pem");
        fs::write(&path, "test content").unwrap();

        assert!(Config::validate_file_path(&path, "Key").is_ok());
        assert!(Config::validate_file_path(&temp_dir.path().to_path_buf(), "Key").is_err());
        assert!(Config::validate_file_path(&PathBuf::from("/nonexistent/key.pem"), "Key").is_err());
    }

    #[test]
    fn test_test_config_is_valid() {
        assert!(Config::test_config().validate().is_ok());
    }

    #[test]
    fn test_difficulty_out_of_range() {
        let mut config = Config::test_config();
        config.ledger_difficulty = 9;
        assert!(config.validate().is_err());
    }
}
