// restorectl/src/transport/wire.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ClientError, Result};

/// Identifier the server assigns to a restore job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{success, result|message}` wrapper around every server response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub result: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    fn rejection(message: Option<String>) -> ClientError {
        ClientError::Protocol(message.unwrap_or_else(|| "request failed without a message".to_string()))
    }

    /// Unwraps a successful envelope that must carry a result.
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(Self::rejection(self.message));
        }
        self.result
            .ok_or_else(|| ClientError::Protocol("successful response without a result".to_string()))
    }

    /// Unwraps a successful envelope whose result, if any, is irrelevant.
    pub fn into_ack(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(Self::rejection(self.message))
        }
    }
}

/// Job status as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(alias = "Pending")]
    Loading,
    InProgress,
    Success,
    Aborted,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Aborted | JobStatus::Failed)
    }

    /// Position in the `Loading -> InProgress -> terminal` progression.
    pub(crate) fn rank(self) -> u8 {
        match self {
            JobStatus::Loading => 0,
            JobStatus::InProgress => 1,
            JobStatus::Success | JobStatus::Aborted | JobStatus::Failed => 2,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            JobStatus::Loading => "Pending",
            JobStatus::InProgress => "In progress",
            JobStatus::Success => "Finished with success",
            JobStatus::Aborted => "Aborted",
            JobStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusQuery {
    pub jobid: JobId,
    pub stdout_position: u64,
    pub stderr_position: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub stdout_position: u64,
    pub stderr_position: u64,
    pub status: JobStatus,
    #[serde(default)]
    pub database_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct JobRef {
    pub jobid: JobId,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Submitted {
    pub jobid: JobId,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SearchQuery<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    pub jobid: JobId,
    /// Unix timestamp, seconds.
    pub created: i64,
    pub status: JobStatus,
    #[serde(default)]
    pub stage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success_with_result() -> anyhow::Result<()> {
        let envelope: Envelope<Submitted> =
            serde_json::from_value(json!({"success": true, "result": {"jobid": 7}}))?;
        assert_eq!(envelope.into_result()?.jobid, JobId(7));
        Ok(())
    }

    #[test]
    fn test_envelope_failure_surfaces_message() -> anyhow::Result<()> {
        let envelope: Envelope<Submitted> =
            serde_json::from_value(json!({"success": false, "message": "Job not found"}))?;
        match envelope.into_result() {
            Err(ClientError::Protocol(message)) => assert_eq!(message, "Job not found"),
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_envelope_ack_ignores_null_result() -> anyhow::Result<()> {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_value(json!({"success": true, "result": null}))?;
        envelope.into_ack()?;
        Ok(())
    }

    #[test]
    fn test_status_report_defaults() -> anyhow::Result<()> {
        let report: StatusReport = serde_json::from_value(json!({
            "stdout_position": 10,
            "stderr_position": 0,
            "status": "Pending"
        }))?;
        assert_eq!(report.status, JobStatus::Loading);
        assert_eq!(report.stdout, "");
        assert_eq!(report.stage, None);
        Ok(())
    }

    #[test]
    fn test_status_ordering() {
        assert!(JobStatus::Loading.rank() < JobStatus::InProgress.rank());
        assert!(JobStatus::InProgress.rank() < JobStatus::Aborted.rank());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }
}
