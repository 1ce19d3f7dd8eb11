//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    /// Seconds between token rotations for an active session.
    pub rotation_seconds: u64,
    /// Distances beyond `radius * suspicious_multiplier` are rejected outright;
    /// anything between the radius and that bound is flagged for review.
    pub suspicious_multiplier: f64,
    /// Geofence radius used when a session is opened without one (meters).
    pub default_radius_m: i32,
    /// Upper bound for a session's geofence radius (meters).
    pub max_radius_m: i32,
    /// Hard ceiling on a session's duration; there is no unbounded session.
    pub max_session_minutes: i32,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "rollcall".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/rollcall.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .unwrap(),
            rotation_seconds: env::var("ROTATION_SECONDS")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .unwrap(),
            suspicious_multiplier: env::var("SUSPICIOUS_MULTIPLIER")
                .unwrap_or_else(|_| "3.0".into())
                .parse()
                .unwrap(),
            default_radius_m: env::var("DEFAULT_RADIUS_M")
                .unwrap_or_else(|_| "15".into())
                .parse()
                .unwrap(),
            max_radius_m: env::var("MAX_RADIUS_M")
                .unwrap_or_else(|_| "500".into())
                .parse()
                .unwrap(),
            max_session_minutes: env::var("MAX_SESSION_MINUTES")
                .unwrap_or_else(|_| "480".into())
                .parse()
                .unwrap(),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap();
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_host(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.host = value.into());
    }

    pub fn set_port(value: u16) {
        AppConfig::set_field(|cfg| cfg.port = value);
    }

    pub fn set_rotation_seconds(value: u64) {
        AppConfig::set_field(|cfg| cfg.rotation_seconds = value);
    }

    pub fn set_suspicious_multiplier(value: f64) {
        AppConfig::set_field(|cfg| cfg.suspicious_multiplier = value);
    }

    pub fn set_default_radius_m(value: i32) {
        AppConfig::set_field(|cfg| cfg.default_radius_m = value);
    }

    pub fn set_max_session_minutes(value: i32) {
        AppConfig::set_field(|cfg| cfg.max_session_minutes = value);
    }
}

// --- Free accessors used throughout the workspace ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn rotation_seconds() -> u64 {
    AppConfig::global().rotation_seconds
}

pub fn suspicious_multiplier() -> f64 {
    AppConfig::global().suspicious_multiplier
}

pub fn default_radius_m() -> i32 {
    AppConfig::global().default_radius_m
}

pub fn max_radius_m() -> i32 {
    AppConfig::global().max_radius_m
}

pub fn max_session_minutes() -> i32 {
    AppConfig::global().max_session_minutes
}
