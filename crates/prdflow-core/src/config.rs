use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{PrdflowError, SecretValue, require_env};

const DEFAULT_CONFIG_PATH: &str = "prdflow.toml";
const CONFIG_PATH_ENV: &str = "PRDFLOW_CONFIG";

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the configured LLM secret value (from environment only).
    pub fn llm_api_key(&self) -> Result<SecretValue, PrdflowError> {
        require_env(&self.llm.api_key_env)
    }
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `PRDFLOW_CONFIG` environment variable.
    /// 3. `prdflow.toml` in the current working directory.
    ///
    /// Only the last candidate may be absent, in which case built-in defaults
    /// are used. The API key variable must be set either way.
    pub fn load(path: Option<PathBuf>) -> Result<Config, PrdflowError> {
        let (candidate, explicit) = resolve_path(path);

        let config = if !explicit && !candidate.exists() {
            tracing::debug!(path = %candidate.display(), "no config file found; using defaults");
            Config::default()
        } else {
            let raw = fs::read_to_string(&candidate)
                .map_err(|err| PrdflowError::config_io(candidate.clone(), err))?;
            Self::parse(&raw)?
        };

        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse a TOML document without touching the environment.
    pub fn parse(raw: &str) -> Result<Config, PrdflowError> {
        toml::from_str(raw).map_err(|err| PrdflowError::InvalidConfiguration(err.to_string()))
    }

    fn validate(config: &Config) -> Result<(), PrdflowError> {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(PrdflowError::InvalidConfiguration(
                "llm.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.llm.provider != "gemini" {
            return Err(PrdflowError::InvalidConfiguration(format!(
                "unsupported llm.provider `{}` (expected `gemini`)",
                config.llm.provider
            )));
        }
        if config.workflow.max_rounds == 0 {
            return Err(PrdflowError::InvalidConfiguration(
                "workflow.max_rounds must be at least 1".into(),
            ));
        }

        // Secrets live in the environment, never inline in the file.
        require_env(&config.llm.api_key_env)?;
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> (PathBuf, bool) {
    if let Some(path) = path {
        return (path, true);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return (PathBuf::from(from_env), true);
        }
    }

    (Path::new(DEFAULT_CONFIG_PATH).to_path_buf(), false)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "LlmConfig::default_provider")]
    pub provider: String,
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,
    #[serde(default = "LlmConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "LlmConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "LlmConfig::default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "LlmConfig::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "LlmConfig::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl LlmConfig {
    fn default_provider() -> String {
        "gemini".to_string()
    }

    fn default_model() -> String {
        "gemini-2.5-pro".to_string()
    }

    fn default_api_key_env() -> String {
        "GOOGLE_API_KEY".to_string()
    }

    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        180
    }

    const fn default_max_retries() -> usize {
        2
    }

    const fn default_initial_backoff_ms() -> u64 {
        1_000
    }

    const fn default_max_backoff_ms() -> u64 {
        30_000
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            model: Self::default_model(),
            api_key_env: Self::default_api_key_env(),
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
            max_retries: Self::default_max_retries(),
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Upper bound on Writer calls per session.
    #[serde(default = "WorkflowConfig::default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "WorkflowConfig::default_max_search_queries")]
    pub max_search_queries: usize,
}

impl WorkflowConfig {
    const fn default_max_rounds() -> u32 {
        5
    }

    const fn default_max_search_queries() -> usize {
        3
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_rounds: Self::default_max_rounds(),
            max_search_queries: Self::default_max_search_queries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ConfigLoader::parse("").unwrap();
        assert_eq!(config.llm.model, "gemini-2.5-pro");
        assert_eq!(config.llm.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.workflow.max_rounds, 5);
        assert_eq!(config.workflow.max_search_queries, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ConfigLoader::parse(
            r#"
            [llm]
            model = "gemini-2.5-flash"

            [workflow]
            max_rounds = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.workflow.max_rounds, 2);
        assert_eq!(config.workflow.max_search_queries, 3);
    }

    #[test]
    fn malformed_toml_is_invalid_configuration() {
        let err = ConfigLoader::parse("[llm\nmodel = ").unwrap_err();
        assert!(matches!(err, PrdflowError::InvalidConfiguration(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = ConfigLoader::load(Some(PathBuf::from("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, PrdflowError::ConfigIo { .. }));
    }

    #[test]
    fn load_rejects_zero_rounds_and_unknown_provider() {
        unsafe {
            std::env::set_var("PRDFLOW_TEST_CONFIG_KEY", "secret");
        }

        let mut zero_rounds = NamedTempFile::new().unwrap();
        writeln!(
            zero_rounds,
            "[llm]\napi_key_env = \"PRDFLOW_TEST_CONFIG_KEY\"\n[workflow]\nmax_rounds = 0"
        )
        .unwrap();
        let err = ConfigLoader::load(Some(zero_rounds.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, PrdflowError::InvalidConfiguration(_)));

        let mut other_provider = NamedTempFile::new().unwrap();
        writeln!(
            other_provider,
            "[llm]\nprovider = \"openai\"\napi_key_env = \"PRDFLOW_TEST_CONFIG_KEY\""
        )
        .unwrap();
        let err = ConfigLoader::load(Some(other_provider.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, PrdflowError::InvalidConfiguration(_)));
    }

    #[test]
    fn load_requires_the_api_key_variable() {
        unsafe {
            std::env::remove_var("PRDFLOW_TEST_CONFIG_ABSENT");
        }
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[llm]\napi_key_env = \"PRDFLOW_TEST_CONFIG_ABSENT\"").unwrap();

        let err = ConfigLoader::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, PrdflowError::MissingSecret(var) if var == "PRDFLOW_TEST_CONFIG_ABSENT"));
    }
}
