// restorectl/src/transport/fake.rs
//! Scripted in-memory transport for tests.
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::Transport;
use super::wire::{Destination, JobId, JobStatus, JobSummary, StatusQuery, StatusReport};
use crate::errors::{ClientError, Result};
use crate::restore::RestoreRequest;

type Scripted = (Duration, Result<StatusReport>);

#[derive(Default)]
pub(crate) struct FakeTransport {
    polls: Mutex<HashMap<JobId, VecDeque<Scripted>>>,
    pub queries: Mutex<Vec<StatusQuery>>,
    pub aborts: Mutex<Vec<JobId>>,
    pub submitted: Mutex<Vec<RestoreRequest>>,
    pub abort_error: Mutex<Option<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a poll response for `jobid`, delivered after `delay`.
    pub fn script(&self, jobid: JobId, delay: Duration, response: Result<StatusReport>) {
        self.polls
            .lock()
            .unwrap()
            .entry(jobid)
            .or_default()
            .push_back((delay, response));
    }

    pub fn queries(&self) -> Vec<StatusQuery> {
        self.queries.lock().unwrap().clone()
    }
}

pub(crate) fn report(
    stdout: &str,
    stdout_position: u64,
    stderr: &str,
    stderr_position: u64,
    status: JobStatus,
) -> StatusReport {
    StatusReport {
        stage: Some(format!("stage-{}", stdout_position)),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        stdout_position,
        stderr_position,
        status,
        database_name: None,
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn submit_restore(&self, request: &RestoreRequest) -> Result<JobId> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(JobId(submitted.len() as u64))
    }

    async fn poll_status(&self, query: &StatusQuery) -> Result<StatusReport> {
        self.queries.lock().unwrap().push(query.clone());
        let next = self
            .polls
            .lock()
            .unwrap()
            .get_mut(&query.jobid)
            .and_then(|queue| queue.pop_front());

        match next {
            Some((delay, response)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                response
            }
            None => Err(ClientError::Transport(format!("no scripted response for job {}", query.jobid))),
        }
    }

    async fn abort_job(&self, jobid: JobId) -> Result<()> {
        self.aborts.lock().unwrap().push(jobid);
        match self.abort_error.lock().unwrap().clone() {
            Some(message) => Err(ClientError::Protocol(message)),
            None => Ok(()),
        }
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>> {
        Ok(vec![Destination {
            index: 0,
            name: "postgres@db-1:5432".to_string(),
        }])
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        Ok(Vec::new())
    }

    async fn search(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
