//! Generator error types and HTTP status mapping.
//!
//! [`GenerationError`] is defined in `proctor-core` so the session service
//! can classify failures; the HTTP adapters share the mapping below.

use serde::Deserialize;

pub use proctor_core::error::GenerationError;

/// Seconds to wait when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Error body shape shared by the Anthropic and OpenAI APIs.
#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Map a transport failure.
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(timeout_secs)
    } else {
        GenerationError::NetworkError(e.to_string())
    }
}

/// Pass a successful response through, or turn an error status into a
/// [`GenerationError`].
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status().as_u16();
    match status {
        429 => {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            Err(GenerationError::RateLimited {
                retry_after_ms: retry_after_secs * 1000,
            })
        }
        401 | 403 => {
            let body = response.text().await.unwrap_or_default();
            Err(GenerationError::AuthenticationFailed(api_message(body)))
        }
        404 => Err(GenerationError::ModelNotFound(model.to_string())),
        400.. => {
            let body = response.text().await.unwrap_or_default();
            Err(GenerationError::ApiError {
                status,
                message: api_message(body),
            })
        }
        _ => Ok(response),
    }
}

/// The API's own error message when the body has one, else the raw body.
fn api_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}
