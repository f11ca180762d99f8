//! Shared HTTP constants (headers, problem URIs, mount points).

pub(crate) const HEADER_API_KEY: &str = "x-tagrelay-api-key";
pub(crate) const HEADER_REQUEST_ID: &str = tagrelay_telemetry::REQUEST_ID_HEADER;
pub(crate) const HEADER_REMOTE_PULL: &str = "is-remote-pull";

pub(crate) const PROXY_MOUNT: &str = "/remote-pull";

pub(crate) const PROBLEM_INTERNAL: &str = "https://tagrelay.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://tagrelay.dev/problems/unauthorized";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://tagrelay.dev/problems/forbidden";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://tagrelay.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://tagrelay.dev/problems/not-found";
pub(crate) const PROBLEM_CONFLICT: &str = "https://tagrelay.dev/problems/conflict";
pub(crate) const PROBLEM_PRECONDITION_FAILED: &str =
    "https://tagrelay.dev/problems/precondition-failed";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://tagrelay.dev/problems/service-unavailable";
pub(crate) const PROBLEM_BAD_GATEWAY: &str = "https://tagrelay.dev/problems/bad-gateway";
