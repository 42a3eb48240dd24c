use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::generation::GenerationConfig;
use crate::moderation::ModerationConfig;
use crate::notify::NotificationConfig;
use crate::recovery::RecoveryConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("songsmith.db")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub generation: SanitizedGenerationConfig,
    pub moderation: SanitizedModerationConfig,
    pub notifications: NotificationConfig,
    pub recovery: RecoveryConfig,
}

/// Sanitized generation config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGenerationConfig {
    pub api_base: String,
    pub api_key_configured: bool,
    pub model: String,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub on_payment: bool,
}

/// Moderation settings without the term list itself.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedModerationConfig {
    pub enabled: bool,
    pub blocked_terms_count: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            generation: SanitizedGenerationConfig {
                api_base: config.generation.api_base.clone(),
                api_key_configured: config
                    .generation
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty()),
                model: config.generation.model.clone(),
                timeout_ms: config.generation.timeout_ms,
                temperature: config.generation.temperature,
                max_tokens: config.generation.max_tokens,
                on_payment: config.generation.on_payment,
            },
            moderation: SanitizedModerationConfig {
                enabled: config.moderation.enabled,
                blocked_terms_count: config.moderation.blocked_terms.len(),
            },
            notifications: config.notifications.clone(),
            recovery: config.recovery.clone(),
        }
    }
}
