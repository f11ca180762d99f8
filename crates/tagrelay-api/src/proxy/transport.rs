//! Upstream transport: sends the rewritten request and relays the streamed response.

use axum::{
    body::Body,
    http::{HeaderMap, Method, header::CONTENT_LENGTH},
    response::Response,
};
use futures_util::TryStreamExt;
use reqwest::Client;
use tracing::warn;
use url::Url;

pub(crate) async fn forward(
    client: &Client,
    method: Method,
    headers: HeaderMap,
    target: Url,
    body: Body,
) -> Result<Response, reqwest::Error> {
    let with_body = carries_body(&method);
    let headers = outbound_headers(with_body, headers);
    let mut request = client.request(method, target).headers(headers);
    if with_body {
        request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }
    let upstream = request.send().await?;

    let status = upstream.status();
    let headers = upstream.headers().clone();
    let stream = upstream
        .bytes_stream()
        .inspect_err(|err| warn!(error = %err, "upstream body stream failed"));
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn carries_body(method: &Method) -> bool {
    method != Method::GET && method != Method::HEAD
}

/// A dropped body must not be announced by the caller's `Content-Length`.
fn outbound_headers(carries_body: bool, mut headers: HeaderMap) -> HeaderMap {
    if !carries_body {
        headers.remove(CONTENT_LENGTH);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_length() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn bodiless_methods_drop_content_length() {
        for method in [Method::GET, Method::HEAD] {
            let headers = outbound_headers(carries_body(&method), with_length());
            assert!(!headers.contains_key(CONTENT_LENGTH));
            assert!(headers.contains_key("accept"));
        }
    }

    #[test]
    fn methods_with_body_keep_content_length() {
        let headers = outbound_headers(carries_body(&Method::POST), with_length());
        assert_eq!(headers.get(CONTENT_LENGTH).expect("length"), "42");
    }
}
