//! Configuration loading and backend factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examprep_core::config::ExamConfig;
use examprep_core::model::Section;

use crate::api::{ApiClient, DEFAULT_TIMEOUT_SECS};

/// Connection settings for the examprep API. `Debug` masks the token.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Top-level examprep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamprepConfig {
    /// Remote API. Without it, questions come from the built-in pool.
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub exam: ExamConfig,
    /// Categories requested in continuous mode.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

fn default_categories() -> Vec<String> {
    Section::ALL.iter().map(|s| s.label().to_string()).collect()
}

impl Default for ExamprepConfig {
    fn default() -> Self {
        Self {
            api: None,
            exam: ExamConfig::default(),
            categories: default_categories(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(len) = result[start..].find('}') else {
            break;
        };
        let value = std::env::var(&result[start + 2..start + len]).unwrap_or_default();
        result.replace_range(start..start + len + 1, &value);
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examprep.toml` in the current directory
/// 2. `~/.config/examprep/config.toml`
///
/// Environment variable overrides: `EXAMPREP_API_URL`, `EXAMPREP_TOKEN`.
pub fn load_config() -> Result<ExamprepConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamprepConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examprep.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamprepConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamprepConfig::default(),
    };

    apply_env_overrides(&mut config);

    if let Some(api) = &mut config.api {
        api.base_url = resolve_env_vars(&api.base_url);
        api.token = api.token.as_deref().map(resolve_env_vars);
    }

    config.exam.validate().context("invalid [exam] settings")?;
    Ok(config)
}

fn apply_env_overrides(config: &mut ExamprepConfig) {
    if let Ok(url) = std::env::var("EXAMPREP_API_URL") {
        match &mut config.api {
            Some(api) => api.base_url = url,
            None => {
                config.api = Some(ApiConfig {
                    base_url: url,
                    token: None,
                    timeout_secs: default_timeout(),
                })
            }
        }
    }
    if let Ok(token) = std::env::var("EXAMPREP_TOKEN") {
        if let Some(api) = &mut config.api {
            api.token = Some(token);
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examprep"))
}

/// Build the shared API client from its configuration.
pub fn create_api_client(config: &ApiConfig) -> Result<Arc<ApiClient>> {
    let client = ApiClient::new(&config.base_url, config.token.clone(), config.timeout_secs)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMPREP_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMPREP_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMPREP_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("open ${brace"), "open ${brace");
        std::env::remove_var("_EXAMPREP_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ExamprepConfig::default();
        assert!(config.api.is_none());
        assert_eq!(config.exam.pass_threshold, 70);
        assert_eq!(config.categories.len(), 6);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
categories = ["Verbal Ability", "Numerical Ability"]

[api]
base_url = "https://exams.example.com"
token = "secret"

[exam]
pass_threshold = 75
lock_fade_ms = 800
"#;
        let config: ExamprepConfig = toml::from_str(toml_str).unwrap();
        let api = config.api.as_ref().unwrap();
        assert_eq!(api.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.exam.pass_threshold, 75);
        assert_eq!(config.exam.lock_fade_ms, 800);
        assert_eq!(config.exam.strength_threshold, 75);
        assert_eq!(config.categories.len(), 2);
    }

    #[test]
    fn debug_masks_token() {
        let api = ApiConfig {
            base_url: "https://exams.example.com".into(),
            token: Some("super-secret".into()),
            timeout_secs: 10,
        };
        let debug = format!("{api:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/examprep.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn invalid_exam_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examprep.toml");
        std::fs::write(&path, "[exam]\nweakness_threshold = 90\nstrength_threshold = 50\n")
            .unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("weakness_threshold"));
    }
}
