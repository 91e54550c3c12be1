// restorectl/src/transport/http.rs
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::Transport;
use super::wire::{
    Destination, Envelope, JobId, JobRef, JobSummary, SearchQuery, StatusQuery, StatusReport,
    Submitted,
};
use crate::errors::{ClientError, Result};
use crate::restore::RestoreRequest;

const API_PREFIX: &str = "api/v1/";

/// JSON-over-HTTP transport against the restore server's `/api/v1` endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, mut base_url: Url) -> Self {
        // Url::join drops the last path segment unless it ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        HttpTransport { client, base_url }
    }

    pub(crate) fn endpoint(&self, name: &str) -> Result<Url> {
        Ok(self.base_url.join(API_PREFIX)?.join(name)?)
    }

    async fn post<Req, Res>(&self, name: &str, body: Option<&Req>) -> Result<Envelope<Res>>
    where
        Req: Serialize + ?Sized + Sync,
        Res: DeserializeOwned,
    {
        let url = self.endpoint(name)?;
        tracing::debug!(%url, "POST");

        let mut request = self.client.post(url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("POST {} failed: {}", url, e)))?
            .error_for_status()
            .map_err(|e| ClientError::Transport(format!("POST {} returned error: {}", url, e)))?;

        response
            .json::<Envelope<Res>>()
            .await
            .map_err(|e| ClientError::Transport(format!("Invalid response body from {}: {}", url, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit_restore(&self, request: &RestoreRequest) -> Result<JobId> {
        let submitted: Submitted = self.post("restore", Some(request)).await?.into_result()?;
        tracing::info!(jobid = %submitted.jobid, "Restore submitted");
        Ok(submitted.jobid)
    }

    async fn poll_status(&self, query: &StatusQuery) -> Result<StatusReport> {
        self.post("status", Some(query)).await?.into_result()
    }

    async fn abort_job(&self, jobid: JobId) -> Result<()> {
        self.post::<_, serde_json::Value>("abort", Some(&JobRef { jobid }))
            .await?
            .into_ack()
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>> {
        self.post::<(), _>("destination", None).await?.into_result()
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let mut jobs: Vec<JobSummary> = self.post::<(), _>("jobs", None).await?.into_result()?;
        jobs.sort_by_key(|job| job.jobid);
        Ok(jobs)
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        if query.trim().is_empty() {
            return Err(ClientError::InvalidInput("search query is empty".to_string()));
        }
        self.post("search", Some(&SearchQuery { query })).await?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_under_base_path() -> anyhow::Result<()> {
        let transport = HttpTransport::new(Url::parse("http://host:8080/restore-ui")?, Duration::from_secs(5))?;
        assert_eq!(
            transport.endpoint("status")?.as_str(),
            "http://host:8080/restore-ui/api/v1/status"
        );

        let root = HttpTransport::new(Url::parse("http://host:8080")?, Duration::from_secs(5))?;
        assert_eq!(root.endpoint("abort")?.as_str(), "http://host:8080/api/v1/abort");
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() -> anyhow::Result<()> {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let transport = HttpTransport::new(Url::parse("http://127.0.0.1:9")?, Duration::from_secs(2))?;
        let err = transport.abort_job(JobId(1)).await.unwrap_err();
        assert!(err.is_transport());
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_search_is_rejected_locally() -> anyhow::Result<()> {
        let transport = HttpTransport::new(Url::parse("http://127.0.0.1:9")?, Duration::from_secs(2))?;
        let err = transport.search("   ").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        Ok(())
    }
}
