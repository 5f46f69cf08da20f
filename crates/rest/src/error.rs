use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// The JSON envelope the API returns on failure.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Option<Value>,
}

impl ApiErrorBody {
    pub fn from_response_text(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| Self {
            code: 0,
            message: text.to_owned(),
            errors: None,
        })
    }
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.errors {
            Some(errors) => write!(f, "(error code: {}): {}\n{errors}", self.code, self.message),
            None => write!(f, "(error code: {}): {}", self.code, self.message),
        }
    }
}

#[derive(Debug, Error)]
pub enum RestError {
    #[error("bad request {0}")]
    BadRequest(ApiErrorBody),
    #[error("unauthorized {0}")]
    Unauthorized(ApiErrorBody),
    #[error("forbidden {0}")]
    Forbidden(ApiErrorBody),
    #[error("not found {0}")]
    NotFound(ApiErrorBody),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64, body: ApiErrorBody },
    #[error("server error with status {status}")]
    Server { status: u16, body: ApiErrorBody },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// Terminal errors are surfaced to the caller immediately; the rest
    /// follow the retry policy.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::BadRequest(_)
                | Self::Unauthorized(_)
                | Self::Forbidden(_)
                | Self::NotFound(_)
                | Self::Decode(_)
        )
    }

    pub fn api_code(&self) -> Option<u64> {
        match self {
            Self::BadRequest(body)
            | Self::Unauthorized(body)
            | Self::Forbidden(body)
            | Self::NotFound(body) => Some(body.code),
            Self::RateLimited { body, .. } | Self::Server { body, .. } => Some(body.code),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

/// Maps a non-success HTTP status plus body text to the taxonomy.
pub fn classify_failure(status: u16, text: &str, retry_after_secs: Option<f64>) -> RestError {
    let body = ApiErrorBody::from_response_text(text);
    match status {
        400 => RestError::BadRequest(body),
        401 => RestError::Unauthorized(body),
        403 => RestError::Forbidden(body),
        404 => RestError::NotFound(body),
        429 => RestError::RateLimited {
            retry_after_secs: retry_after_secs.unwrap_or(1.0),
            body,
        },
        status => RestError::Server { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_failure, ApiErrorBody, RestError};

    #[test]
    fn not_found_carries_the_platform_error_code() {
        let error = classify_failure(404, r#"{"code": 10008, "message": "Unknown Message"}"#, None);

        assert!(matches!(error, RestError::NotFound(_)));
        assert!(error.is_terminal());
        assert_eq!(error.api_code(), Some(10008));
    }

    #[test]
    fn rate_limit_prefers_the_header_value() {
        let error = classify_failure(429, r#"{"code": 0, "message": "rate limited"}"#, Some(2.5));
        match error {
            RestError::RateLimited { retry_after_secs, .. } => assert_eq!(retry_after_secs, 2.5),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn five_hundreds_are_not_terminal() {
        let error = classify_failure(502, "bad gateway", None);
        assert!(!error.is_terminal());
        assert!(matches!(error, RestError::Server { status: 502, .. }));
    }

    #[test]
    fn non_json_failure_text_becomes_the_message() {
        let body = ApiErrorBody::from_response_text("upstream exploded");
        assert_eq!(body.code, 0);
        assert_eq!(body.message, "upstream exploded");
    }

    #[test]
    fn nested_errors_render_in_display() {
        let body = ApiErrorBody::from_response_text(
            r#"{"code": 50035, "message": "Invalid Form Body", "errors": {"content": ["too long"]}}"#,
        );
        let rendered = body.to_string();
        assert!(rendered.contains("50035"));
        assert!(rendered.contains("too long"));
    }
}
