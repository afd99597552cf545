//! Quill configuration loader.
//!
//! Reads `~/.quill/config.toml`, applies environment overrides, and validates
//! the model selection at load time so an unsupported model never reaches the
//! client.

use quill_llm::{ModelId, SettingsSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfig {
    pub openai_api_key: Option<String>,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            keys: KeysConfig::default(),
        }
    }
}

impl QuillConfig {
    /// Load from `path` (default `~/.quill/config.toml`). A missing file is
    /// not an error; defaults plus environment overrides apply.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(default_config_path);
        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => toml::from_str::<QuillConfig>(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => QuillConfig::default(),
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("QUILL_MODEL") {
            if !v.trim().is_empty() {
                self.general.model = v;
            }
        }
        if let Some(v) = get("QUILL_BASE_URL") {
            if !v.trim().is_empty() {
                self.general.base_url = v;
            }
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            if !v.trim().is_empty() {
                self.keys.openai_api_key = Some(v);
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.general.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("general.base_url is required"));
        }
        // Fatal at read time: the model set is closed.
        ModelId::parse(&self.general.model)?;
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".quill").join("config.toml")
}

/// [`SettingsSource`] view over the loaded config.
pub struct ConfigSettings {
    config: QuillConfig,
}

impl ConfigSettings {
    pub fn new(config: QuillConfig) -> Self {
        Self { config }
    }
}

impl SettingsSource for ConfigSettings {
    fn model(&self) -> quill_llm::Result<ModelId> {
        ModelId::parse(&self.config.general.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let cfg: QuillConfig = toml::from_str(
            r#"
            [general]
            model = "gpt-4"
            base_url = "https://proxy.internal/llm"

            [keys]
            openai_api_key = "sk-file"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.general.model, "gpt-4");
        assert_eq!(cfg.general.base_url, "https://proxy.internal/llm");
        assert_eq!(cfg.keys.openai_api_key.as_deref(), Some("sk-file"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg: QuillConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.general.model, "gpt-3.5-turbo");
        assert_eq!(cfg.general.base_url, "https://api.openai.com/v1");
        assert!(cfg.keys.openai_api_key.is_none());
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut cfg: QuillConfig = toml::from_str(
            r#"
            [general]
            model = "gpt-4"
            "#,
        )
        .unwrap();
        cfg.apply_env_overrides(|name| match name {
            "QUILL_MODEL" => Some("gpt-4-32k".to_string()),
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            _ => None,
        });
        assert_eq!(cfg.general.model, "gpt-4-32k");
        assert_eq!(cfg.keys.openai_api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = QuillConfig::default();
        cfg.apply_env_overrides(|name| match name {
            "QUILL_MODEL" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.general.model, "gpt-3.5-turbo");
    }

    #[test]
    fn unknown_model_is_fatal_at_validation() {
        let mut cfg = QuillConfig::default();
        cfg.general.model = "gpt-5".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unsupported model"));
    }

    #[test]
    fn settings_source_validates_at_read() {
        let mut cfg = QuillConfig::default();
        cfg.general.model = "davinci".to_string();
        let settings = ConfigSettings::new(cfg);
        assert!(settings.model().is_err());

        let settings = ConfigSettings::new(QuillConfig::default());
        assert_eq!(settings.model().unwrap(), ModelId::Gpt35Turbo);
    }
}
