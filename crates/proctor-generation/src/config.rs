//! Configuration file and generator factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use proctor_core::integrity::IntegrityPolicy;
use proctor_core::service::SessionServiceConfig;
use proctor_core::traits::QuestionGenerator;

use crate::anthropic::AnthropicGenerator;
use crate::mock::MockGenerator;
use crate::openai::OpenAiGenerator;

/// Which question generator to use.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratorConfig {
    Anthropic {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    OpenAI {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Mock {
        #[serde(default = "default_mock_questions")]
        questions_per_category: usize,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            GeneratorConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            GeneratorConfig::Mock {
                questions_per_category,
                delay_ms,
            } => f
                .debug_struct("Mock")
                .field("questions_per_category", questions_per_category)
                .field("delay_ms", delay_ms)
                .finish(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::Anthropic {
            api_key: String::new(),
            base_url: None,
        }
    }
}

fn default_mock_questions() -> usize {
    2
}

/// Top-level proctor configuration (`proctor.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Model identifier passed to the generator.
    #[serde(default = "default_model")]
    pub model: String,
    /// Seconds one generator call may take before it is abandoned.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    /// Retries after a failed generator call.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Where the CLI keeps its session store.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub integrity: IntegrityPolicy,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_generation_timeout() -> u64 {
    300
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./proctor-sessions.json")
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            generation_timeout_secs: default_generation_timeout(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            store_path: default_store_path(),
            generator: GeneratorConfig::default(),
            integrity: IntegrityPolicy::default(),
        }
    }
}

impl ProctorConfig {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.integrity
            .validate()
            .context("invalid [integrity] section")?;
        if self.generation_timeout_secs == 0 {
            anyhow::bail!("generation_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Settings for [`proctor_core::service::SessionService`].
    pub fn service_config(&self) -> SessionServiceConfig {
        SessionServiceConfig {
            integrity: self.integrity.clone(),
            generation_timeout: Duration::from_secs(self.generation_timeout_secs),
            max_generation_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut search_from = 0;
    while let Some(offset) = result[search_from..].find("${") {
        let start = search_from + offset;
        let Some(len) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + len];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + len + 1..]);
        search_from = start + value.len();
    }
    result
}

fn resolve_generator_config(config: &GeneratorConfig) -> GeneratorConfig {
    match config {
        GeneratorConfig::Anthropic { api_key, base_url } => GeneratorConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
        },
        GeneratorConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => GeneratorConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            org_id: org_id.as_deref().map(resolve_env_vars),
        },
        GeneratorConfig::Mock { .. } => config.clone(),
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `proctor.toml` in the current directory
/// 2. `~/.config/proctor/config.toml`
///
/// Environment variable overrides: `PROCTOR_ANTHROPIC_KEY`, `PROCTOR_OPENAI_KEY`.
pub fn load_config() -> Result<ProctorConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ProctorConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => [Some(PathBuf::from("proctor.toml")), global_config_path()]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.exists()),
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<ProctorConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => ProctorConfig::default(),
    };

    // Apply env var overrides
    match &mut config.generator {
        GeneratorConfig::Anthropic { api_key, .. } => {
            if let Ok(key) = std::env::var("PROCTOR_ANTHROPIC_KEY") {
                *api_key = key;
            }
        }
        GeneratorConfig::OpenAI { api_key, .. } => {
            if let Ok(key) = std::env::var("PROCTOR_OPENAI_KEY") {
                *api_key = key;
            }
        }
        GeneratorConfig::Mock { .. } => {}
    }
    config.generator = resolve_generator_config(&config.generator);

    config.validate()?;
    Ok(config)
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|h| {
        PathBuf::from(h)
            .join(".config")
            .join("proctor")
            .join("config.toml")
    })
}

/// Create a generator instance from the configuration.
pub fn create_generator(config: &ProctorConfig) -> Result<Arc<dyn QuestionGenerator>> {
    match &config.generator {
        GeneratorConfig::Anthropic { api_key, base_url } => {
            if api_key.is_empty() {
                anyhow::bail!(
                    "no Anthropic API key: set PROCTOR_ANTHROPIC_KEY or api_key under [generator]"
                );
            }
            Ok(Arc::new(AnthropicGenerator::new(
                api_key,
                base_url.clone(),
                &config.model,
            )?))
        }
        GeneratorConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => {
            if api_key.is_empty() {
                anyhow::bail!(
                    "no OpenAI API key: set PROCTOR_OPENAI_KEY or api_key under [generator]"
                );
            }
            Ok(Arc::new(OpenAiGenerator::new(
                api_key,
                base_url.clone(),
                org_id.clone(),
                &config.model,
            )?))
        }
        GeneratorConfig::Mock {
            questions_per_category,
            delay_ms,
        } => Ok(Arc::new(
            MockGenerator::new(*questions_per_category)
                .with_delay(Duration::from_millis(*delay_ms)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_PROCTOR_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_PROCTOR_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_PROCTOR_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${_PROCTOR_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("open ${brace"), "open ${brace");
        std::env::remove_var("_PROCTOR_TEST_VAR");
    }

    #[test]
    fn resolved_value_is_not_expanded_again() {
        std::env::set_var("_PROCTOR_NESTED_VAR", "${_PROCTOR_NESTED_VAR}");
        assert_eq!(
            resolve_env_vars("${_PROCTOR_NESTED_VAR}"),
            "${_PROCTOR_NESTED_VAR}"
        );
        std::env::remove_var("_PROCTOR_NESTED_VAR");
    }

    #[test]
    fn default_config() {
        let config = ProctorConfig::default();
        assert_eq!(config.generation_timeout_secs, 300);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.integrity.disqualification_threshold, 5.0);
        assert_eq!(config.integrity.warning_threshold, 3.0);
        assert_eq!(config.store_path, PathBuf::from("./proctor-sessions.json"));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
model = "gpt-4.1"
max_retries = 5
retry_delay_ms = 250
generation_timeout_secs = 60

[generator]
type = "openai"
api_key = "sk-openai"
org_id = "org-1"

[integrity]
disqualification_threshold = 8.0
"#;
        let config: ProctorConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(config.generator, GeneratorConfig::OpenAI { .. }));
        assert_eq!(config.integrity.disqualification_threshold, 8.0);
        assert_eq!(config.integrity.warning_threshold, 3.0);

        let service = config.service_config();
        assert_eq!(service.max_generation_retries, 5);
        assert_eq!(service.retry_delay, Duration::from_millis(250));
        assert_eq!(service.generation_timeout, Duration::from_secs(60));
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = GeneratorConfig::Anthropic {
            api_key: "sk-ant-secret".into(),
            base_url: None,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-ant-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proctor.toml");
        std::fs::write(
            &path,
            "store_path = \"sessions.json\"\n\n[generator]\ntype = \"mock\"\nquestions_per_category = 1\n",
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.store_path, PathBuf::from("sessions.json"));
        assert!(matches!(
            config.generator,
            GeneratorConfig::Mock {
                questions_per_category: 1,
                delay_ms: 0
            }
        ));
        assert_eq!(create_generator(&config).unwrap().name(), "mock");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/proctor.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proctor.toml");
        std::fs::write(&path, "[integrity]\nwarning_threshold = 0.0\n").unwrap();
        assert!(load_config_from(Some(&path)).is_err());
    }

    #[test]
    fn http_generator_requires_key() {
        let config = ProctorConfig {
            generator: GeneratorConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            },
            ..Default::default()
        };
        let err = create_generator(&config).err().unwrap();
        assert!(err.to_string().contains("PROCTOR_OPENAI_KEY"));
    }
}
