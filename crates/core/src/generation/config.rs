use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provider configuration, passed explicitly to the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the OpenAI-compatible API (no trailing `/v1`).
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bearer token. Omit for local servers that do not check it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Deadline for one `complete` call, fallback included.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Start generation as soon as a payment is confirmed. When off, lyrics
    /// come from explicit requests and the recovery sweep.
    #[serde(default = "default_on_payment")]
    pub on_payment: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            on_payment: default_on_payment(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api_base.trim().is_empty() {
            return Err("generation.api_base cannot be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("generation.model cannot be empty".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("generation.timeout_ms cannot be 0".to_string());
        }
        if self.max_tokens == 0 {
            return Err("generation.max_tokens cannot be 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "generation.temperature must be between 0 and 2, got {}",
                self.temperature
            ));
        }
        Ok(())
    }
}

fn default_api_base() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_temperature() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    1200
}

fn default_on_payment() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.on_payment);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_temperature() {
        let config = GenerationConfig {
            temperature: 3.5,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("temperature"));
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let config = GenerationConfig {
            model: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
