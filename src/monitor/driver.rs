// restorectl/src/monitor/driver.rs
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::{JobMonitor, MonitorState, PollOutcome, PollTicket};
use crate::config::OutputConfig;
use crate::errors::{ClientError, Result};
use crate::transport::{JobId, JobStatus, Transport};

/// Progress notifications for the job currently being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Progress {
        jobid: JobId,
        stage: String,
        stdout: String,
        stderr: String,
    },
    Finished {
        jobid: JobId,
        status: JobStatus,
    },
    Stalled {
        jobid: JobId,
        reason: String,
    },
}

/// The polling loop of one generation. Cancelling the token stops the loop at its
/// next scheduled delay; a response already in flight is still delivered and then
/// dropped by the generation check.
struct ScheduledPoll {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives a [`JobMonitor`] against a [`Transport`] on the current thread.
///
/// Must be used inside a `tokio::task::LocalSet`.
pub struct JobWatcher<T> {
    transport: Arc<T>,
    monitor: Rc<RefCell<JobMonitor>>,
    poll_interval: Duration,
    events: UnboundedSender<WatchEvent>,
    scheduled: Option<ScheduledPoll>,
}

impl<T: Transport + 'static> JobWatcher<T> {
    pub fn new(
        transport: Arc<T>,
        output: OutputConfig,
        poll_interval: Duration,
    ) -> (Self, UnboundedReceiver<WatchEvent>) {
        let (events, receiver) = unbounded_channel();
        let watcher = JobWatcher {
            transport,
            monitor: Rc::new(RefCell::new(JobMonitor::new(output))),
            poll_interval,
            events,
            scheduled: None,
        };
        (watcher, receiver)
    }

    pub fn monitor(&self) -> std::cell::Ref<'_, JobMonitor> {
        self.monitor.borrow()
    }

    pub fn state(&self) -> MonitorState {
        self.monitor.borrow().state()
    }

    /// Switches to `id` (or to no job) and starts polling it immediately.
    pub fn set_job(&mut self, id: Option<JobId>) {
        self.cancel_scheduled();
        let ticket = self.monitor.borrow_mut().set_job(id);
        if let Some(ticket) = ticket {
            self.spawn(ticket);
        }
    }

    /// Restarts polling after a stall, from the last known cursors.
    pub fn resume(&mut self) -> bool {
        let ticket = self.monitor.borrow_mut().resume();
        match ticket {
            Some(ticket) => {
                self.cancel_scheduled();
                self.spawn(ticket);
                true
            }
            None => false,
        }
    }

    /// Sends an abort request for the current job. Independent of the polling loop:
    /// the job's status only changes when a later poll reports it.
    pub async fn abort(&self) -> Result<JobId> {
        let id = {
            let mut monitor = self.monitor.borrow_mut();
            let current = monitor.job().map(|job| job.id()).ok_or(ClientError::NoJob)?;
            monitor
                .begin_abort()
                .ok_or(ClientError::AbortUnavailable(current))?
        };
        let result = self.transport.abort_job(id).await;
        self.monitor.borrow_mut().complete_abort(id, &result);
        result.map(|()| id)
    }

    fn cancel_scheduled(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            tracing::debug!(generation = scheduled.generation, "Cancelling scheduled polls");
            scheduled.cancel.cancel();
        }
    }

    fn spawn(&mut self, ticket: PollTicket) {
        let cancel = CancellationToken::new();
        let generation = ticket.generation;
        let handle = tokio::task::spawn_local(poll_loop(
            Arc::clone(&self.transport),
            Rc::clone(&self.monitor),
            ticket,
            self.poll_interval,
            self.events.clone(),
            cancel.clone(),
        ));
        self.scheduled = Some(ScheduledPoll {
            generation,
            cancel,
            handle,
        });
    }

    /// Waits until the polling loop of the current generation has exited.
    #[cfg(test)]
    pub async fn settled(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            if let Err(e) = scheduled.handle.await {
                tracing::warn!("Polling task ended abnormally: {}", e);
            }
        }
    }
}

impl<T> Drop for JobWatcher<T> {
    fn drop(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            scheduled.cancel.cancel();
            scheduled.handle.abort();
        }
    }
}

async fn poll_loop<T: Transport>(
    transport: Arc<T>,
    monitor: Rc<RefCell<JobMonitor>>,
    mut ticket: PollTicket,
    poll_interval: Duration,
    events: UnboundedSender<WatchEvent>,
    cancel: CancellationToken,
) {
    let jobid = ticket.query.jobid;
    loop {
        tracing::debug!(
            %jobid,
            stdout_position = ticket.query.stdout_position,
            stderr_position = ticket.query.stderr_position,
            "Polling job status"
        );
        let response = transport.poll_status(&ticket.query).await;
        let deltas = response
            .as_ref()
            .ok()
            .map(|report| (report.stdout.clone(), report.stderr.clone()));

        let outcome = monitor.borrow_mut().complete_poll(ticket.generation, response);
        let event = match &outcome {
            PollOutcome::Discarded => return,
            PollOutcome::Stalled(reason) => WatchEvent::Stalled {
                jobid,
                reason: reason.clone(),
            },
            PollOutcome::Continue | PollOutcome::Finished(_) => {
                let (stdout, stderr) = deltas.unwrap_or_default();
                let stage = monitor
                    .borrow()
                    .job()
                    .map(|job| job.stage().to_string())
                    .unwrap_or_default();
                WatchEvent::Progress {
                    jobid,
                    stage,
                    stdout,
                    stderr,
                }
            }
        };
        // The receiver may be gone; polling still completes for the monitor's sake.
        let _ = events.send(event);

        match outcome {
            PollOutcome::Continue => {}
            PollOutcome::Finished(status) => {
                let _ = events.send(WatchEvent::Finished { jobid, status });
                return;
            }
            PollOutcome::Stalled(_) | PollOutcome::Discarded => return,
        }

        // Fixed delay measured from receipt of the previous response.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let next = monitor.borrow_mut().next_poll(ticket.generation);
        match next {
            Some(next) => ticket = next,
            None => return,
        }
    }
}
