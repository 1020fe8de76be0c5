//! Plain HTTP response helpers

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use crate::AcacheError;

/// Response type produced by every handler
pub type HttpResponse = Response<Full<Bytes>>;

/// Create a plain-text response
#[must_use]
pub fn text_response(status: StatusCode, body: &str) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Default response for unmatched paths
#[must_use]
pub fn not_found() -> HttpResponse {
    text_response(StatusCode::NOT_FOUND, "404 page not found")
}

/// Map an error to a response naming the failed stage
#[must_use]
pub fn error_response(error: &AcacheError) -> HttpResponse {
    let status = match error {
        AcacheError::InvalidAlias(_) => StatusCode::BAD_REQUEST,
        AcacheError::Fetch { .. } | AcacheError::Read(_) => StatusCode::BAD_GATEWAY,
        AcacheError::DataTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    text_response(status, &format!("{} failed: {error}", error.stage()))
}
