// restorectl/src/transport/mod.rs
pub(crate) mod http;
pub(crate) mod wire;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

use crate::errors::Result;
use crate::restore::RestoreRequest;

pub use http::HttpTransport;
pub use wire::{Destination, JobId, JobStatus, JobSummary, StatusQuery, StatusReport};

/// Request/response access to the restore server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit_restore(&self, request: &RestoreRequest) -> Result<JobId>;

    async fn poll_status(&self, query: &StatusQuery) -> Result<StatusReport>;

    async fn abort_job(&self, jobid: JobId) -> Result<()>;

    async fn list_destinations(&self) -> Result<Vec<Destination>>;

    async fn list_jobs(&self) -> Result<Vec<JobSummary>>;

    async fn search(&self, query: &str) -> Result<Vec<String>>;
}
