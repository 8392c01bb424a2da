//! Shared HTTP plumbing for the hosted provider backends.

use reqwest::StatusCode;
use tracing::error;

use crate::error::ProviderError;

/// Map a failed HTTP response to a [`ProviderError`].
///
/// 408, 429 and 5xx are transient, except a 429 that reports exhausted
/// quota. Every other status is permanent.
pub(crate) fn classify_status(status: StatusCode, detail: String) -> ProviderError {
    let mentions_quota = detail.to_ascii_lowercase().contains("quota");
    match status {
        StatusCode::TOO_MANY_REQUESTS if mentions_quota => ProviderError::QuotaExhausted(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT => ProviderError::Unavailable(format!("{status}: {detail}")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(detail),
        s if s.is_server_error() => ProviderError::Unavailable(format!("{s}: {detail}")),
        s if s == StatusCode::BAD_REQUEST || s == StatusCode::PAYLOAD_TOO_LARGE => {
            ProviderError::InvalidInput(detail)
        }
        s => ProviderError::Other(format!("{s}: {detail}")),
    }
}

/// Send a prepared request and decode a JSON body, classifying failures.
pub(crate) async fn send_json<T, E>(
    provider: &str,
    request: reqwest::RequestBuilder,
    error_detail: E,
) -> Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
    E: FnOnce(&str) -> Option<String>,
{
    let response = request.send().await.map_err(|e| {
        error!(provider, error = %e, "request failed");
        if e.is_timeout() || e.is_connect() || e.is_request() {
            ProviderError::Unavailable(format!("request failed: {e}"))
        } else {
            ProviderError::Other(format!("request failed: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body).unwrap_or(body);
        error!(provider, %status, "API error");
        return Err(classify_status(status, detail));
    }

    response.json::<T>().await.map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        ProviderError::Other(format!("failed to parse response: {e}"))
    })
}
