//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub structure_model: String,
    pub summary_model: String,
    pub question_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub storage_url: String,
    pub storage_api_key: String,
    pub audio_bucket: String,
    pub caption_primary_lang: String,
    pub caption_secondary_lang: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Generation Settings ---
        let structure_model =
            std::env::var("STRUCTURE_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let summary_model = std::env::var("SUMMARY_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let question_model =
            std::env::var("QUESTION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let tts_model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let tts_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "nova".to_string());

        // --- Load Object Storage Settings ---
        let storage_url = std::env::var("STORAGE_URL")
            .map_err(|_| ConfigError::MissingVar("STORAGE_URL".to_string()))?;
        let storage_api_key = std::env::var("STORAGE_API_KEY")
            .map_err(|_| ConfigError::MissingVar("STORAGE_API_KEY".to_string()))?;
        let audio_bucket = std::env::var("AUDIO_BUCKET").unwrap_or_else(|_| "audio".to_string());

        // --- Load Caption Language Preferences ---
        let caption_primary_lang =
            std::env::var("CAPTION_PRIMARY_LANG").unwrap_or_else(|_| "en".to_string());
        let caption_secondary_lang =
            std::env::var("CAPTION_SECONDARY_LANG").unwrap_or_else(|_| "es".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            structure_model,
            summary_model,
            question_model,
            tts_model,
            tts_voice,
            storage_url,
            storage_api_key,
            audio_bucket,
            caption_primary_lang,
            caption_secondary_lang,
        })
    }
}
