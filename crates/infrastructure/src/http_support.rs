//! Status classification shared by the HTTP adapters.

use adtune_core::{AppError, AppResult};
use reqwest::StatusCode;

/// Maps a non-success response onto the error taxonomy.
///
/// 401/403 mean the credential was rejected, 408 and 5xx are transient, 429
/// is a rate limit, and every other status is a rejected request.
pub(crate) async fn error_for_response(response: reqwest::Response, context: &str) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
    let detail = format!("{context} failed with status {status}: {}", truncate(&body));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(detail),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT => AppError::Transient(detail),
        status if status.is_server_error() => AppError::Transient(detail),
        _ => AppError::Validation(detail),
    }
}

/// Maps a transport failure (connect, timeout, body) to a transient error.
pub(crate) fn transport_error(context: &str, error: &reqwest::Error) -> AppError {
    if error.is_builder() {
        return AppError::Validation(format!("{context} request could not be built: {error}"));
    }
    AppError::Transient(format!("{context} transport error: {error}"))
}

/// Sends a request and returns the response only when it succeeded.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    context: &str,
) -> AppResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|error| transport_error(context, &error))?;

    if response.status().is_success() {
        return Ok(response);
    }

    Err(error_for_response(response, context).await)
}

fn truncate(body: &str) -> &str {
    const LIMIT: usize = 512;
    if body.len() <= LIMIT {
        return body;
    }
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
