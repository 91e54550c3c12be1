// restorectl/src/restore/logic.rs
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use super::request::RestoreForm;
use crate::config::AppConfig;
use crate::monitor::{JobWatcher, MonitorState, WatchEvent};
use crate::transport::{JobId, JobStatus, Transport};

/// Validates the form, submits it and follows the resulting job to the end.
pub async fn run_restore_flow<T, R>(
    transport: Arc<T>,
    app_config: &AppConfig,
    form: &RestoreForm,
    input: R,
) -> Result<MonitorState>
where
    T: Transport + 'static,
    R: AsyncBufRead + Unpin,
{
    let request = form.build().context("Restore request is incomplete")?;
    println!(
        "📦 Restoring {:?} into database '{}' on destination {}",
        request.backup, request.database_name, request.destination
    );

    let jobid = transport
        .submit_restore(&request)
        .await
        .context("Failed to submit restore request")?;
    println!("🆔 Job {} accepted", jobid);

    watch_job(transport, app_config, jobid, input).await
}

/// Streams job output to the terminal until the job finishes.
///
/// The first Ctrl-C asks the server to abort the job and keeps watching until the
/// abort is reported; a second one stops watching. When polling stalls, a line on
/// `input` resumes from the last cursors and end of input gives up.
pub async fn watch_job<T, R>(
    transport: Arc<T>,
    app_config: &AppConfig,
    jobid: JobId,
    input: R,
) -> Result<MonitorState>
where
    T: Transport + 'static,
    R: AsyncBufRead + Unpin,
{
    let (interrupt_tx, mut interrupts) = unbounded_channel();
    let forwarder = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send(()).is_err() {
                break;
            }
        }
    });

    let result = follow_job(transport, app_config, jobid, input, &mut interrupts).await;
    forwarder.abort();
    result
}

async fn follow_job<T, R>(
    transport: Arc<T>,
    app_config: &AppConfig,
    jobid: JobId,
    input: R,
    interrupts: &mut UnboundedReceiver<()>,
) -> Result<MonitorState>
where
    T: Transport + 'static,
    R: AsyncBufRead + Unpin,
{
    let (mut watcher, mut events) =
        JobWatcher::new(transport, app_config.output, app_config.poll_interval);
    watcher.set_job(Some(jobid));

    let mut lines = input.lines();
    let mut stage = String::new();
    let mut stalled = false;
    let mut abort_accepted = false;
    let mut interrupts_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    WatchEvent::Progress { jobid: from, stage: current, stdout, stderr } => {
                        tracing::trace!(jobid = %from, stdout = stdout.len(), stderr = stderr.len(), "Output received");
                        if !current.is_empty() && current != stage {
                            println!("📍 Stage: {}", current);
                            stage = current;
                        }
                        print!("{}", stdout);
                        eprint!("{}", stderr);
                        std::io::stdout().flush().context("Failed to flush stdout")?;
                    }
                    WatchEvent::Finished { jobid: from, status } => {
                        println!("🏁 Job {}: {}", from, status.describe());
                        break;
                    }
                    WatchEvent::Stalled { jobid: from, reason } => {
                        eprintln!("⚠️ Lost track of job {}: {}", from, reason);
                        println!("Press Enter to resume polling, or Ctrl-C to stop watching.");
                        stalled = true;
                    }
                }
            }
            line = lines.next_line(), if stalled => {
                match line.context("Failed to read from standard input")? {
                    Some(_) => {
                        if watcher.resume() {
                            println!("🔁 Resuming job {} from where polling stopped", jobid);
                            stalled = false;
                        }
                    }
                    None => break,
                }
            }
            interrupt = interrupts.recv(), if interrupts_open => {
                if interrupt.is_none() {
                    interrupts_open = false;
                    continue;
                }
                if stalled || abort_accepted {
                    println!("Stopped watching job {}.", jobid);
                    break;
                }
                println!("🛑 Requesting abort of job {}...", jobid);
                match watcher.abort().await {
                    Ok(_) => {
                        abort_accepted = true;
                        println!("Abort requested; waiting for the server to stop the job. Press Ctrl-C again to stop watching.");
                    }
                    Err(e) => eprintln!("❌ Abort request failed: {}", e),
                }
            }
        }
    }

    let state = watcher.state();
    if let Some(job) = watcher.monitor().job() {
        let (stdout_position, stderr_position) = job.cursors();
        tracing::debug!(
            %jobid,
            status = ?job.status(),
            stdout_position,
            stderr_position,
            database = ?job.database_name(),
            "Stopped watching job"
        );
        if job.status() == JobStatus::Failed && !job.stderr().is_empty() {
            eprintln!("--- Error output of job {} ---\n{}", jobid, job.stderr().content());
        }
        if job.stdout().is_truncated() || job.stderr().is_truncated() {
            println!(
                "ℹ️  Earlier output was dropped; only the last {} characters of each stream were kept.",
                job.stdout().max_length()
            );
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, RawJsonConfig};
    use crate::errors::ClientError;
    use crate::restore::RestoreKind;
    use crate::restore::request::RestoreScope;
    use crate::transport::fake::{FakeTransport, report};
    use std::time::Duration;
    use tokio::task::LocalSet;

    fn app_config() -> AppConfig {
        AppConfig::from_raw(RawJsonConfig::default(), Some("http://localhost:8080".into())).unwrap()
    }

    fn no_input() -> &'static [u8] {
        b""
    }

    #[tokio::test(start_paused = true)]
    async fn test_submits_and_follows_job() {
        let transport = Arc::new(FakeTransport::new());
        transport.script(JobId(1), Duration::ZERO, Ok(report("restoring\n", 10, "", 0, JobStatus::InProgress)));
        transport.script(JobId(1), Duration::ZERO, Ok(report("done\n", 15, "", 0, JobStatus::Success)));

        let form = RestoreForm {
            destination: Some(0),
            backup: "/backups/shop.dump".into(),
            database_name: "shop".into(),
            kind: RestoreKind::Partial,
            objects: "sales.orders".into(),
            ..Default::default()
        };

        let state = LocalSet::new()
            .run_until(run_restore_flow(Arc::clone(&transport), &app_config(), &form, no_input()))
            .await
            .unwrap();

        assert_eq!(state, MonitorState::Success);
        let submitted = transport.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert!(matches!(submitted[0].restore, RestoreScope::Partial { ref objects, .. } if objects == &["sales.orders"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_form_never_reaches_transport() {
        let transport = Arc::new(FakeTransport::new());
        let form = RestoreForm::new(Some(0));

        let result = LocalSet::new()
            .run_until(run_restore_flow(Arc::clone(&transport), &app_config(), &form, no_input()))
            .await;

        assert!(result.is_err());
        assert!(transport.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_without_input_gives_up() {
        let transport = Arc::new(FakeTransport::new());
        let state = LocalSet::new()
            .run_until(watch_job(Arc::clone(&transport), &app_config(), JobId(42), no_input()))
            .await
            .unwrap();

        assert!(matches!(state, MonitorState::Stalled(_)));
        assert_eq!(transport.queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_after_stall_resumes_from_last_cursor() {
        let transport = Arc::new(FakeTransport::new());
        let id = JobId(3);
        transport.script(id, Duration::ZERO, Ok(report("part one\n", 9, "", 0, JobStatus::InProgress)));
        transport.script(id, Duration::ZERO, Err(ClientError::Transport("connection reset".into())));
        transport.script(id, Duration::ZERO, Ok(report("part two\n", 18, "", 0, JobStatus::Success)));

        let state = LocalSet::new()
            .run_until(watch_job(Arc::clone(&transport), &app_config(), id, &b"\n"[..]))
            .await
            .unwrap();

        assert_eq!(state, MonitorState::Success);
        let positions: Vec<u64> = transport.queries().iter().map(|q| q.stdout_position).collect();
        assert_eq!(positions, vec![0, 9, 9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_interrupt_after_abort_stops_watching() {
        let transport = Arc::new(FakeTransport::new());
        let id = JobId(5);
        transport.script(id, Duration::ZERO, Ok(report("", 0, "", 0, JobStatus::InProgress)));
        // The server never reports the abort.
        transport.script(id, Duration::from_secs(3600), Ok(report("", 0, "", 0, JobStatus::InProgress)));

        let (interrupt_tx, mut interrupts) = unbounded_channel();
        interrupt_tx.send(()).unwrap();
        interrupt_tx.send(()).unwrap();

        let state = LocalSet::new()
            .run_until(follow_job(Arc::clone(&transport), &app_config(), id, no_input(), &mut interrupts))
            .await
            .unwrap();

        assert!(matches!(state, MonitorState::Loading | MonitorState::InProgress));
        assert_eq!(*transport.aborts.lock().unwrap(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_abort_keeps_watching() {
        let transport = Arc::new(FakeTransport::new());
        let id = JobId(6);
        *transport.abort_error.lock().unwrap() = Some("Failed to abort job".into());
        transport.script(id, Duration::ZERO, Ok(report("", 0, "", 0, JobStatus::InProgress)));
        transport.script(id, Duration::ZERO, Ok(report("", 0, "", 0, JobStatus::Failed)));

        let (interrupt_tx, mut interrupts) = unbounded_channel();
        interrupt_tx.send(()).unwrap();

        let state = LocalSet::new()
            .run_until(follow_job(Arc::clone(&transport), &app_config(), id, no_input(), &mut interrupts))
            .await
            .unwrap();

        assert_eq!(state, MonitorState::Failed);
        drop(interrupt_tx);
    }
}
