//! Correlation ids for HTTP requests.
//!
//! Callers may supply their own id; otherwise a UUID is generated. Install
//! [`set_request_id_layer`] outside [`propagate_request_id_layer`] so that
//! generated ids are echoed on the response as well.

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assigns a UUID to requests that arrive without a correlation id.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Copies the request's correlation id onto the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
