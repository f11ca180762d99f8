//! HTTP client for the asynchronous job service.

use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tagrelay_core::{TaskClient, TaskDescriptor};
use tracing::debug;

/// Path of the job submission endpoint relative to the service base URL.
pub const JOBS_PATH: &str = "api/v1/jobs";

#[derive(Serialize)]
struct SubmitRequest<'a> {
    job: &'a TaskDescriptor,
}

#[derive(Deserialize)]
struct SubmitResponse {
    job: SubmittedJob,
}

#[derive(Deserialize)]
struct SubmittedJob {
    id: String,
}

/// [`TaskClient`] that posts descriptors to the job service over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTaskClient {
    client: Client,
    endpoint: Url,
}

impl HttpTaskClient {
    /// Build a client for the service at `base_url`, authenticating with
    /// `{secret_prefix}{secret}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the secret cannot be carried in
    /// a header, or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        secret_prefix: &str,
        secret: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url).context("invalid job service url")?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let endpoint = base.join(JOBS_PATH).context("invalid job service url")?;

        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&format!("{secret_prefix}{secret}"))
            .map_err(|_| anyhow!("job service secret contains invalid header characters"))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build job service client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl TaskClient for HttpTaskClient {
    async fn submit(&self, task: &TaskDescriptor) -> anyhow::Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&SubmitRequest { job: task })
            .send()
            .await
            .context("job service request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("job service rejected submission with {status}: {body}");
        }

        let accepted: SubmitResponse = response
            .json()
            .await
            .context("job service returned an unexpected body")?;
        debug!(task_id = %accepted.job.id, "job service accepted task");
        Ok(accepted.job.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn submission_wraps_descriptor_and_returns_task_id() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/jobservice/api/v1/jobs")
                .header("authorization", "Relay-Secret js")
                .json_body(json!({
                    "job": {
                        "metadata": {"kind": "Generic"},
                        "status_hook": "http://core/service/notifications/jobs/replication/3"
                    }
                }));
            then.status(202)
                .json_body(json!({"job": {"id": "abc123", "status": "Pending"}}));
        });

        let client = HttpTaskClient::new(
            &format!("{}/jobservice", server.base_url()),
            "Relay-Secret ",
            "js",
            Duration::from_secs(5),
        )?;
        let task_id = client
            .submit(&TaskDescriptor::generic(
                "http://core/service/notifications/jobs/replication/3",
            ))
            .await?;

        assert_eq!(task_id, "abc123");
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn rejected_submission_is_an_error() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/jobs");
            then.status(500).body("queue unavailable");
        });

        let client =
            HttpTaskClient::new(&server.base_url(), "Relay-Secret ", "js", Duration::from_secs(5))?;
        let err = client
            .submit(&TaskDescriptor::generic("hook"))
            .await
            .expect_err("500 is not accepted");
        assert!(err.to_string().contains("queue unavailable"));
        Ok(())
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpTaskClient::new("not a url", "p", "s", Duration::from_secs(1)).is_err());
    }
}
