use std::path::PathBuf;

use thiserror::Error;

/// Core error type for prdflow.
#[derive(Debug, Error)]
pub enum PrdflowError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error talking to the model API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model API returned no text")]
    EmptyCompletion,
    #[error("workflow error: {0}")]
    Workflow(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PrdflowError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        let throttled = PrdflowError::Api {
            status: 429,
            message: "quota".into(),
        };
        let unavailable = PrdflowError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let bad_request = PrdflowError::Api {
            status: 400,
            message: "invalid".into(),
        };

        assert!(throttled.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!PrdflowError::EmptyCompletion.is_retryable());
        assert!(!PrdflowError::MissingSecret("GOOGLE_API_KEY".into()).is_retryable());
    }
}
