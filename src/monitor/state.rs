// restorectl/src/monitor/state.rs
use super::buffer::OutputBuffer;
use crate::config::OutputConfig;
use crate::errors::{ClientError, Result};
use crate::transport::{JobId, JobStatus, StatusQuery, StatusReport};

/// Observable state of the monitor as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Loading,
    InProgress,
    Success,
    Aborted,
    Failed,
    /// Polling stopped after a transport or protocol failure.
    Stalled(String),
}

impl From<JobStatus> for MonitorState {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Loading => MonitorState::Loading,
            JobStatus::InProgress => MonitorState::InProgress,
            JobStatus::Success => MonitorState::Success,
            JobStatus::Aborted => MonitorState::Aborted,
            JobStatus::Failed => MonitorState::Failed,
        }
    }
}

/// Everything the client knows about the job currently being watched.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    stdout_cursor: u64,
    stderr_cursor: u64,
    status: JobStatus,
    stage: String,
    database_name: Option<String>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    stall: Option<String>,
    abort_enabled: bool,
    abort_pending: bool,
}

impl JobHandle {
    fn new(id: JobId, output: OutputConfig) -> Self {
        JobHandle {
            id,
            stdout_cursor: 0,
            stderr_cursor: 0,
            status: JobStatus::Loading,
            stage: String::new(),
            database_name: None,
            stdout: OutputBuffer::new(output),
            stderr: OutputBuffer::new(output),
            stall: None,
            abort_enabled: true,
            abort_pending: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn cursors(&self) -> (u64, u64) {
        (self.stdout_cursor, self.stderr_cursor)
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    pub fn stdout(&self) -> &OutputBuffer {
        &self.stdout
    }

    pub fn stderr(&self) -> &OutputBuffer {
        &self.stderr
    }

    /// Abort may be requested while the job is live and no earlier abort succeeded.
    pub fn can_abort(&self) -> bool {
        self.abort_enabled && !self.abort_pending && !self.status.is_terminal()
    }

    /// Points the handle at `id` with empty buffers and zeroed cursors.
    fn restart(&mut self, id: JobId) {
        self.id = id;
        self.stdout_cursor = 0;
        self.stderr_cursor = 0;
        self.status = JobStatus::Loading;
        self.stage.clear();
        self.database_name = None;
        self.stdout.reset();
        self.stderr.reset();
        self.stall = None;
        self.abort_enabled = true;
        self.abort_pending = false;
    }

    fn query(&self) -> StatusQuery {
        StatusQuery {
            jobid: self.id,
            stdout_position: self.stdout_cursor,
            stderr_position: self.stderr_cursor,
        }
    }

    fn apply(&mut self, report: StatusReport) -> Result<()> {
        if self.status.is_terminal() {
            tracing::debug!(jobid = %self.id, status = ?self.status, "Ignoring report for finished job");
            return Ok(());
        }
        if report.stdout_position < self.stdout_cursor || report.stderr_position < self.stderr_cursor {
            return Err(ClientError::Protocol(format!(
                "output cursor moved backwards: stdout {} -> {}, stderr {} -> {}",
                self.stdout_cursor, report.stdout_position, self.stderr_cursor, report.stderr_position
            )));
        }

        self.stdout.append(&report.stdout);
        self.stderr.append(&report.stderr);
        self.stdout_cursor = report.stdout_position;
        self.stderr_cursor = report.stderr_position;

        if let Some(stage) = report.stage {
            self.stage = stage;
        }
        if let Some(name) = report.database_name.filter(|n| !n.is_empty()) {
            self.database_name = Some(name);
        }

        if report.status.rank() >= self.status.rank() {
            self.status = report.status;
        } else {
            tracing::debug!(
                jobid = %self.id,
                current = ?self.status,
                reported = ?report.status,
                "Ignoring backward status transition"
            );
        }
        Ok(())
    }
}

/// A poll that may be dispatched. The response must be handed back together with
/// `generation` so that answers for a replaced job can be recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    pub generation: u64,
    pub query: StatusQuery,
}

/// What the caller should do after a poll response has been processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Job still running; schedule the next poll.
    Continue,
    Finished(JobStatus),
    Stalled(String),
    /// Response belonged to an earlier generation and was dropped.
    Discarded,
}

/// Cursor-based polling state machine for a single watched job.
///
/// All mutation is synchronous; the async driver in `super::driver` only moves
/// tickets and responses between this type and the transport.
#[derive(Debug)]
pub struct JobMonitor {
    output: OutputConfig,
    generation: u64,
    job: Option<JobHandle>,
    in_flight: bool,
}

impl JobMonitor {
    pub fn new(output: OutputConfig) -> Self {
        JobMonitor {
            output,
            generation: 0,
            job: None,
            in_flight: false,
        }
    }

    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    pub fn state(&self) -> MonitorState {
        match &self.job {
            None => MonitorState::Idle,
            Some(job) => match &job.stall {
                Some(reason) => MonitorState::Stalled(reason.clone()),
                None => job.status.into(),
            },
        }
    }

    /// Replaces the watched job. Always starts a new generation, so anything still
    /// in flight for the previous job will be discarded on arrival.
    pub fn set_job(&mut self, id: Option<JobId>) -> Option<PollTicket> {
        self.generation += 1;
        self.in_flight = false;

        match id {
            Some(id) => {
                match self.job.as_mut() {
                    Some(job) => job.restart(id),
                    None => self.job = Some(JobHandle::new(id, self.output)),
                }
                tracing::info!(jobid = %id, generation = self.generation, "Watching job");
                self.issue()
            }
            None => {
                self.job = None;
                tracing::debug!(generation = self.generation, "No job selected");
                None
            }
        }
    }

    /// Ticket for the next poll of the current generation, if one is due.
    pub fn next_poll(&mut self, generation: u64) -> Option<PollTicket> {
        if generation != self.generation {
            return None;
        }
        let due = self
            .job
            .as_ref()
            .is_some_and(|job| job.stall.is_none() && !job.status.is_terminal());
        if due { self.issue() } else { None }
    }

    /// User-initiated restart after a stall. Keeps buffers and cursors.
    pub fn resume(&mut self) -> Option<PollTicket> {
        let job = self.job.as_mut()?;
        job.stall.take()?;
        self.generation += 1;
        self.in_flight = false;
        tracing::info!(jobid = %job.id, generation = self.generation, "Resuming job polling");
        self.issue()
    }

    fn issue(&mut self) -> Option<PollTicket> {
        if self.in_flight {
            return None;
        }
        let query = self.job.as_ref()?.query();
        self.in_flight = true;
        Some(PollTicket {
            generation: self.generation,
            query,
        })
    }

    pub fn complete_poll(&mut self, generation: u64, response: Result<StatusReport>) -> PollOutcome {
        if generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                "Discarding stale status response"
            );
            return PollOutcome::Discarded;
        }
        if !self.in_flight {
            tracing::debug!(generation, "Discarding status response with no poll outstanding");
            return PollOutcome::Discarded;
        }
        self.in_flight = false;

        let Some(job) = self.job.as_mut() else {
            return PollOutcome::Discarded;
        };
        if job.status.is_terminal() {
            return PollOutcome::Discarded;
        }

        match response.and_then(|report| job.apply(report)) {
            Ok(()) if job.status.is_terminal() => {
                tracing::info!(jobid = %job.id, status = ?job.status, "Job finished");
                PollOutcome::Finished(job.status)
            }
            Ok(()) => PollOutcome::Continue,
            Err(e) => {
                let reason = e.to_string();
                let kind = if e.is_transport() { "transport" } else { "protocol" };
                tracing::warn!(jobid = %job.id, kind, "Status polling stopped: {}", reason);
                job.stall = Some(reason.clone());
                PollOutcome::Stalled(reason)
            }
        }
    }

    /// Marks an abort request as dispatched. Returns the job it targets.
    pub fn begin_abort(&mut self) -> Option<JobId> {
        let job = self.job.as_mut().filter(|job| job.can_abort())?;
        job.abort_pending = true;
        Some(job.id)
    }

    /// Records the abort result. Success only prevents further abort requests;
    /// the `Aborted` status itself must come from a poll.
    pub fn complete_abort(&mut self, id: JobId, result: &Result<()>) {
        let Some(job) = self.job.as_mut().filter(|job| job.id == id) else {
            return;
        };
        job.abort_pending = false;
        match result {
            Ok(()) => {
                tracing::info!(jobid = %id, "Abort accepted by server");
                job.abort_enabled = false;
            }
            Err(e) => tracing::warn!(jobid = %id, "Abort request failed: {}", e),
        }
    }
}
