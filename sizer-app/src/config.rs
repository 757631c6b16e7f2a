//! Application configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{AppError, AppResult};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Store path value selecting the in-memory store
pub const MEMORY_STORE: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage configuration
    pub store: StoreConfig,

    /// Debounce timings
    pub timing: TimingConfig,

    /// Event bus buffer size
    pub event_capacity: usize,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// JSON file holding persisted values (`None` = in-memory only)
    pub path: Option<PathBuf>,
}

/// Debounce configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Quiet period before a field value reaches the computation graph
    pub compute_debounce: Duration,
    /// Quiet period before a value or lock flag is written to storage
    pub persist_debounce: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory store)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let store = Self::load_store_config(environment);
        let timing = Self::load_timing_config()?;
        let event_capacity = Self::load_u64_env("SIZER_EVENT_CAPACITY", 256)? as usize;

        if event_capacity == 0 {
            return Err(AppError::Config("SIZER_EVENT_CAPACITY must be positive".to_string()));
        }

        Ok(Self {
            store,
            timing,
            event_capacity,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            store: StoreConfig { path: None },
            timing: TimingConfig::default(),
            event_capacity: 256,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> AppResult<Environment> {
        let env_str = env::var("SIZER_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(AppError::Config(format!(
                "Invalid SIZER_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_store_config(environment: Environment) -> StoreConfig {
        let default_path = match environment {
            Environment::Test => MEMORY_STORE.to_string(),
            _ => "sizer-state.json".to_string(),
        };
        let path = env::var("SIZER_STORE_PATH").unwrap_or(default_path);

        StoreConfig {
            path: (path != MEMORY_STORE).then(|| PathBuf::from(path)),
        }
    }

    fn load_timing_config() -> AppResult<TimingConfig> {
        let defaults = TimingConfig::default();
        let compute_ms = Self::load_u64_env(
            "SIZER_COMPUTE_DEBOUNCE_MS",
            defaults.compute_debounce.as_millis() as u64,
        )?;
        let persist_ms = Self::load_u64_env(
            "SIZER_PERSIST_DEBOUNCE_MS",
            defaults.persist_debounce.as_millis() as u64,
        )?;

        Ok(TimingConfig {
            compute_debounce: Duration::from_millis(compute_ms),
            persist_debounce: Duration::from_millis(persist_ms),
        })
    }

    fn load_u64_env(key: &str, default: u64) -> AppResult<u64> {
        match env::var(key) {
            Ok(val) => val
                .trim()
                .parse::<u64>()
                .map_err(|_| AppError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                path: Some(PathBuf::from("sizer-state.json")),
            },
            timing: TimingConfig::default(),
            event_capacity: 256,
            environment: Environment::Development,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            compute_debounce: Duration::from_millis(200),
            persist_debounce: Duration::from_millis(250),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.store.path, Some(PathBuf::from("sizer-state.json")));
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.store.path, None);
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_timing_defaults() {
        let timing = TimingConfig::default();

        assert_eq!(timing.compute_debounce, Duration::from_millis(200));
        assert_eq!(timing.persist_debounce, Duration::from_millis(250));
        assert!(timing.compute_debounce < timing.persist_debounce);
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
