use std::env;

use crate::PrdflowError;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Load `.env` from the working directory (or a parent) into the process
/// environment. A missing file is not an error.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "ignoring unreadable .env file"),
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, PrdflowError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(PrdflowError::MissingSecret(var.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_env_success() {
        unsafe {
            std::env::set_var("PRDFLOW_TEST_SECRET", "value");
        }
        let secret = require_env("PRDFLOW_TEST_SECRET").expect("secret should load");
        assert_eq!(secret.expose(), "value");
    }

    #[test]
    fn require_env_missing() {
        unsafe {
            std::env::remove_var("PRDFLOW_TEST_SECRET_MISSING");
        }
        let err = require_env("PRDFLOW_TEST_SECRET_MISSING").unwrap_err();
        assert!(matches!(err, PrdflowError::MissingSecret(_)));
    }

    #[test]
    fn require_env_rejects_blank_values() {
        unsafe {
            std::env::set_var("PRDFLOW_TEST_SECRET_BLANK", "   ");
        }
        let err = require_env("PRDFLOW_TEST_SECRET_BLANK").unwrap_err();
        assert!(matches!(err, PrdflowError::MissingSecret(_)));
    }

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretValue::new("AIzaSyExample");
        assert_eq!(format!("{secret:?}"), "***redacted***");
    }
}
