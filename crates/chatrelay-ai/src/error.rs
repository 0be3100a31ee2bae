//! Error types for the AI module

use reqwest::Response;
use thiserror::Error;

/// Largest slice of an error body kept in `AiError::LlmHttp`.
const MAX_ERROR_BODY: usize = 512;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("{provider} returned HTTP {status}: {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{0} returned no choices")]
    EmptyChoices(String),

    #[error("Completion request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    /// HTTP status reported by the provider, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::LlmHttp { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;

/// Convert a non-2xx response into `AiError::LlmHttp`.
pub(crate) async fn response_to_error(response: Response, provider: &str) -> AiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    // Truncate error body to prevent leaking large or sensitive responses.
    let message = if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated]", &body[..cut])
    } else {
        body
    };

    AiError::LlmHttp {
        provider: provider.to_string(),
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_http_error() {
        let err = AiError::LlmHttp {
            provider: "OpenAI".to_string(),
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "OpenAI returned HTTP 401: unauthorized");
    }

    #[test]
    fn test_status_absent_for_format_errors() {
        assert_eq!(AiError::EmptyChoices("OpenAI".to_string()).status(), None);
        assert_eq!(AiError::Timeout(60).status(), None);
    }
}
