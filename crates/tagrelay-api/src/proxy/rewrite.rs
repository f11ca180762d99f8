//! Target rewriting for proxied requests: path joining and query merging.

use url::Url;

use crate::http::constants::PROXY_MOUNT;

/// Join an upstream base path with an incoming path using exactly one slash
/// at the seam.
#[must_use]
pub fn single_joining_slash(base: &str, incoming: &str) -> String {
    match (base.ends_with('/'), incoming.strip_prefix('/')) {
        (true, Some(rest)) => format!("{base}{rest}"),
        (false, None) => format!("{base}/{incoming}"),
        _ => format!("{base}{incoming}"),
    }
}

/// Concatenate the upstream base query with the incoming query.
#[must_use]
pub fn join_query(base: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let base = base.filter(|query| !query.is_empty());
    let incoming = incoming.filter(|query| !query.is_empty());
    match (base, incoming) {
        (Some(base), Some(incoming)) => Some(format!("{base}&{incoming}")),
        (Some(query), None) | (None, Some(query)) => Some(query.to_string()),
        (None, None) => None,
    }
}

/// Resolve the upstream URL for an incoming path and query.
#[must_use]
pub fn target_url(base: &Url, incoming_path: &str, incoming_query: Option<&str>) -> Url {
    let mut target = base.clone();
    target.set_path(&single_joining_slash(base.path(), incoming_path));
    target.set_query(join_query(base.query(), incoming_query).as_deref());
    target
}

/// Path of a request relative to the proxy mount point.
pub(crate) fn incoming_path(path: &str) -> &str {
    path.strip_prefix(PROXY_MOUNT).unwrap_or(path)
}
