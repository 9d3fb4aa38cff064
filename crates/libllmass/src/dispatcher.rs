use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use llmass_protocol::{CmdResult, ExecMode, NEXT_HINT, SessionName, Submission, Ticket};

use crate::dedup::{DEFAULT_DEDUP_WINDOW, DedupCache};
use crate::error::{LlmassError, Result};
use crate::executor::{DEFAULT_EXEC_TIMEOUT, DEFAULT_SHELL, Executor};
use crate::session::validate_session_name;
use crate::store::{HistoryEntry, ReadOutcome, ResultStore};
use crate::ticket::{AllocationGuard, TicketAllocator};

/// Builds the URL a caller polls for a ticket's result.
pub trait PollLinks: Send + Sync {
    fn poll_url(&self, session: &str, ticket: Ticket) -> String;
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sessions_root: PathBuf,
    pub shell: PathBuf,
    pub exec_timeout: Duration,
    pub dedup_window: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            sessions_root: llmass_protocol::paths::default_sessions_dir(),
            shell: PathBuf::from(DEFAULT_SHELL),
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub session: SessionName,
    pub command: String,
    /// The base64 form the command arrived in, echoed back to the caller.
    pub b64_command: Option<String>,
    pub mode: ExecMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Identical command seen within the dedup window; nothing ran.
    Cached(Submission),
    /// Accepted for background execution. Poll the callback for the result.
    Accepted(Submission),
    /// Ran inline; the result is already persisted.
    Completed(CmdResult),
}

impl SubmitOutcome {
    pub fn ticket(&self) -> Ticket {
        match self {
            SubmitOutcome::Cached(s) | SubmitOutcome::Accepted(s) => s.ticket,
            SubmitOutcome::Completed(r) => r.ticket,
        }
    }
}

/// Session-scoped command dispatch: dedup, ticket allocation, execution, persistence.
pub struct Dispatcher {
    store: ResultStore,
    allocator: Arc<TicketAllocator>,
    dedup: Arc<DedupCache>,
    executor: Executor,
    links: Arc<dyn PollLinks>,
    exec_timeout: Duration,
    tasks: TaskTracker,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, links: Arc<dyn PollLinks>) -> Self {
        let store = ResultStore::new(config.sessions_root);
        Self {
            allocator: Arc::new(TicketAllocator::new(store.clone())),
            store,
            dedup: Arc::new(DedupCache::with_window(config.dedup_window)),
            executor: Executor::new(config.shell),
            links,
            exec_timeout: config.exec_timeout,
            tasks: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitOutcome> {
        validate_session_name(&req.session)?;
        if req.command.is_empty() {
            return Err(LlmassError::Validation(
                "Invalid or missing 'cmd' or 'b64cmd' parameter".to_string(),
            ));
        }
        let session = req.session.as_str();

        // Dedup check, allocation and cache update happen under one
        // per-session lock so concurrent duplicates see each other.
        let guard = self.allocator.lock(session).await;
        if let Some(hit) = self.dedup.lookup(session, &req.command, req.mode).await {
            info!(session, ticket = hit.ticket, "suppressed duplicate submission");
            return Ok(SubmitOutcome::Cached(hit));
        }
        let ticket = self.allocator.allocate(&guard).await?;
        let submission = Submission {
            mode: req.mode,
            cached: false,
            session: req.session.clone(),
            ticket,
            input: req.command,
            b64_input: req.b64_command,
            callback: self.links.poll_url(session, ticket),
        };
        self.dedup.update(session, &submission).await;
        let generation = guard.generation();
        drop(guard);

        info!(session, ticket, mode = %submission.mode, "executing command");
        match submission.mode {
            ExecMode::Asynchronous => {
                // Detached: the task persists on its own and logs failures.
                drop(self.spawn_run(submission.clone(), generation));
                Ok(SubmitOutcome::Accepted(submission))
            }
            ExecMode::Synchronous => {
                // Still on the tracker, so a dropped request cannot orphan the ticket.
                let result = self
                    .spawn_run(submission, generation)
                    .await
                    .map_err(|e| LlmassError::Io(std::io::Error::other(e)))??;
                Ok(SubmitOutcome::Completed(result))
            }
        }
    }

    fn spawn_run(
        &self,
        submission: Submission,
        generation: u64,
    ) -> JoinHandle<Result<CmdResult>> {
        let run = Run {
            store: self.store.clone(),
            allocator: Arc::clone(&self.allocator),
            dedup: Arc::clone(&self.dedup),
            executor: self.executor.clone(),
            timeout: self.exec_timeout,
            generation,
        };
        self.tasks.spawn(async move {
            let session = submission.session.as_str();
            let ticket = submission.ticket;
            let outcome = run.execute(&submission).await;
            match &outcome {
                Ok(result) => {
                    info!(session, ticket, duration = %result.duration, "result persisted");
                }
                Err(LlmassError::SessionCleared { .. }) => {
                    info!(session, ticket, "session cleared during run, result discarded");
                }
                Err(e) => {
                    error!(session, ticket, "failed to persist result: {e}");
                    run.release(session, ticket).await;
                }
            }
            outcome
        })
    }

    pub async fn poll(&self, session: &str, ticket: Ticket) -> Result<ReadOutcome> {
        validate_session_name(session)?;
        if ticket == 0 {
            return Err(LlmassError::Validation(
                "Invalid or missing 'ticket' parameter".to_string(),
            ));
        }
        if !self.store.session_exists(session).await? {
            return Err(LlmassError::SessionNotFound(session.to_string()));
        }
        self.store.read(session, ticket).await
    }

    pub async fn history(&self, session: &str) -> Result<Vec<HistoryEntry>> {
        if !self.store.session_exists(session).await? {
            return Err(LlmassError::SessionNotFound(session.to_string()));
        }
        self.store.history(session).await
    }

    /// Create a session explicitly. With `clear`, wipe its records and dedup state first.
    pub async fn open_session(&self, session: &str, clear: bool) -> Result<()> {
        validate_session_name(session)?;
        let mut guard = self.allocator.lock(session).await;
        if clear {
            // Runs started before this point will not publish into the new directory.
            guard.bump_generation();
            self.dedup.forget(session).await;
            self.store.clear_session(session).await?;
        }
        self.store.ensure_session(session).await?;
        Ok(())
    }

    /// Number of background runs still in flight.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for all background runs to persist. New submissions may still be accepted.
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

/// Everything one spawned run needs, detached from the dispatcher.
struct Run {
    store: ResultStore,
    allocator: Arc<TicketAllocator>,
    dedup: Arc<DedupCache>,
    executor: Executor,
    timeout: Duration,
    /// Session generation at allocation time.
    generation: u64,
}

impl Run {
    /// Allocation lock for the run's session, or `SessionCleared` if the
    /// session was cleared since the ticket was allocated.
    async fn current(&self, submission: &Submission) -> Result<AllocationGuard> {
        let guard = self.allocator.lock(&submission.session).await;
        if guard.generation() != self.generation {
            return Err(LlmassError::SessionCleared {
                session: submission.session.clone(),
                ticket: submission.ticket,
            });
        }
        Ok(guard)
    }

    async fn execute(&self, submission: &Submission) -> Result<CmdResult> {
        let session = submission.session.as_str();
        let ticket = submission.ticket;
        let pending = {
            let _guard = self.current(submission).await?;
            self.store.begin_write(session, ticket).await?
        };

        let outcome = self.executor.run(&submission.input, self.timeout).await;
        if outcome.failed {
            warn!(
                session,
                ticket,
                exit_code = ?outcome.exit_code,
                timed_out = outcome.timed_out,
                "command failed"
            );
        }

        let elapsed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        let result = CmdResult {
            mode: submission.mode,
            ticket,
            session: submission.session.clone(),
            input: submission.input.clone(),
            b64_input: submission.b64_input.clone(),
            duration: outcome.duration_text(),
            output: outcome.output,
            next: NEXT_HINT.to_string(),
            exit_code: outcome.exit_code,
            failed: outcome.failed,
            timed_out: outcome.timed_out,
            completed_at_epoch_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };

        let _guard = match self.current(submission).await {
            Ok(guard) => guard,
            Err(e) => {
                pending.abandon();
                return Err(e);
            }
        };
        pending.commit(&result).await?;
        Ok(result)
    }

    /// Undo the reservation of a run that failed before publishing, so the
    /// ticket polls as missing and a retry executes again.
    async fn release(&self, session: &str, ticket: Ticket) {
        let guard = self.allocator.lock(session).await;
        if guard.generation() != self.generation {
            return;
        }
        if let Err(e) = self.store.release(session, ticket).await {
            warn!(session, ticket, "failed to release ticket: {e}");
        }
        self.dedup.forget_if(session, ticket).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HistoryRecord;
    use tempfile::TempDir;

    struct TestLinks;

    impl PollLinks for TestLinks {
        fn poll_url(&self, session: &str, ticket: Ticket) -> String {
            format!("http://test/callback?session={session}&ticket={ticket}")
        }
    }

    fn dispatcher(tmp: &TempDir) -> Dispatcher {
        dispatcher_with_window(tmp, DEFAULT_DEDUP_WINDOW)
    }

    fn dispatcher_with_window(tmp: &TempDir, window: Duration) -> Dispatcher {
        Dispatcher::new(
            DispatcherConfig {
                sessions_root: tmp.path().join("sessions"),
                shell: PathBuf::from("/bin/sh"),
                exec_timeout: Duration::from_secs(10),
                dedup_window: window,
            },
            Arc::new(TestLinks),
        )
    }

    fn req(session: &str, command: &str, mode: ExecMode) -> SubmitRequest {
        SubmitRequest {
            session: session.to_string(),
            command: command.to_string(),
            b64_command: None,
            mode,
        }
    }

    async fn wait_ready(d: &Dispatcher, session: &str, ticket: Ticket) -> CmdResult {
        for _ in 0..200 {
            if let ReadOutcome::Ready(result) = d.poll(session, ticket).await.unwrap() {
                return result;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("ticket {ticket} never completed");
    }

    #[tokio::test]
    async fn async_submission_is_acknowledged_then_pollable() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);

        let outcome = d
            .submit(req("s1", "echo hi", ExecMode::Asynchronous))
            .await
            .unwrap();
        let SubmitOutcome::Accepted(sub) = outcome else {
            panic!("expected acknowledgment, got {outcome:?}");
        };
        assert_eq!(sub.ticket, 1);
        assert!(!sub.cached);
        assert_eq!(sub.callback, "http://test/callback?session=s1&ticket=1");

        let result = wait_ready(&d, "s1", 1).await;
        assert!(result.output.contains("hi"));
        assert_eq!(result.mode, ExecMode::Asynchronous);
    }

    #[tokio::test]
    async fn poll_before_completion_is_not_ready() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.submit(req("s1", "sleep 1; echo late", ExecMode::Asynchronous))
            .await
            .unwrap();
        assert_eq!(d.poll("s1", 1).await.unwrap(), ReadOutcome::NotReady);
        d.drain().await;
        assert!(matches!(d.poll("s1", 1).await.unwrap(), ReadOutcome::Ready(r) if r.output == "late\n"));
    }

    #[tokio::test]
    async fn identical_resubmission_within_window_is_cached() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.submit(req("s1", "echo hi", ExecMode::Asynchronous))
            .await
            .unwrap();

        let outcome = d
            .submit(req("s1", "echo hi", ExecMode::Synchronous))
            .await
            .unwrap();
        let SubmitOutcome::Cached(sub) = outcome else {
            panic!("expected cached, got {outcome:?}");
        };
        assert!(sub.cached);
        assert_eq!(sub.ticket, 1);

        d.drain().await;
        assert_eq!(d.store().list_tickets("s1").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn resubmission_after_window_allocates_new_ticket() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher_with_window(&tmp, Duration::from_millis(50));
        d.submit(req("s1", "true", ExecMode::Synchronous))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        let outcome = d
            .submit(req("s1", "true", ExecMode::Synchronous))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed(ref r) if r.ticket == 2));
    }

    #[tokio::test]
    async fn failing_command_is_persisted_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        let outcome = d
            .submit(req("s1", "echo nope 1>&2; exit 7", ExecMode::Synchronous))
            .await
            .unwrap();
        let SubmitOutcome::Completed(result) = outcome else {
            panic!("expected result, got {outcome:?}");
        };
        assert!(result.failed);
        assert_eq!(result.exit_code, Some(7));
        assert_eq!(result.output, "nope\n");
        assert_eq!(d.poll("s1", 1).await.unwrap(), ReadOutcome::Ready(result));
    }

    #[tokio::test]
    async fn sessions_keep_independent_numbering_and_dedup() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.submit(req("a", "echo x", ExecMode::Synchronous)).await.unwrap();
        d.submit(req("a", "echo y", ExecMode::Synchronous)).await.unwrap();
        let outcome = d
            .submit(req("b", "echo x", ExecMode::Synchronous))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed(ref r) if r.ticket == 1));
    }

    #[tokio::test]
    async fn poll_reports_unknown_ticket_and_session() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.open_session("s1", false).await.unwrap();
        assert_eq!(d.poll("s1", 9).await.unwrap(), ReadOutcome::NotFound);
        assert!(matches!(
            d.poll("ghost", 1).await.unwrap_err(),
            LlmassError::SessionNotFound(_)
        ));
        assert!(matches!(
            d.poll("s1", 0).await.unwrap_err(),
            LlmassError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn history_is_numerically_ordered() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        for i in 0..11 {
            d.submit(req("s1", &format!("echo {i}"), ExecMode::Synchronous))
                .await
                .unwrap();
        }
        let history = d.history("s1").await.unwrap();
        let tickets: Vec<Ticket> = history.iter().map(|e| e.ticket).collect();
        assert_eq!(tickets, (1..=11).collect::<Vec<_>>());
        assert!(matches!(&history[9].record, HistoryRecord::Complete(r) if r.output == "9\n"));
    }

    #[tokio::test]
    async fn validation_errors_have_no_side_effects() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        let err = d
            .submit(req("s1", "", ExecMode::Synchronous))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmassError::Validation(_)));
        let err = d
            .submit(req("../up", "ls", ExecMode::Synchronous))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmassError::Validation(_)));
        assert!(!tmp.path().join("sessions").exists());
    }

    #[tokio::test]
    async fn storage_failure_during_allocation_leaves_dedup_untouched() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("sessions"), b"file, not dir").unwrap();
        let d = dispatcher(&tmp);
        let err = d
            .submit(req("s1", "echo hi", ExecMode::Synchronous))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmassError::Storage { .. }));
        assert!(!d.dedup().matches("s1", "echo hi").await);
    }

    /// A directory squatting on the staging path makes `begin_write` fail.
    fn block_staging(tmp: &TempDir, session: &str, ticket: Ticket) -> PathBuf {
        let staging = tmp
            .path()
            .join("sessions")
            .join(session)
            .join(format!(".{ticket:02}.ticket.tmp"));
        std::fs::create_dir_all(&staging).unwrap();
        staging
    }

    #[tokio::test]
    async fn failed_sync_write_releases_ticket_so_retry_executes() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.open_session("s1", false).await.unwrap();
        let staging = block_staging(&tmp, "s1", 1);

        let err = d
            .submit(req("s1", "echo hi", ExecMode::Synchronous))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmassError::Storage { .. }));
        assert_eq!(d.poll("s1", 1).await.unwrap(), ReadOutcome::NotFound);
        assert!(!d.dedup().matches("s1", "echo hi").await);

        std::fs::remove_dir(&staging).unwrap();
        let outcome = d
            .submit(req("s1", "echo hi", ExecMode::Synchronous))
            .await
            .unwrap();
        let SubmitOutcome::Completed(result) = outcome else {
            panic!("expected a fresh run, got {outcome:?}");
        };
        assert_eq!(result.ticket, 1);
        assert_eq!(result.output, "hi\n");
        assert_eq!(d.poll("s1", 1).await.unwrap(), ReadOutcome::Ready(result));
    }

    #[tokio::test]
    async fn failed_async_write_polls_as_not_found() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.open_session("s1", false).await.unwrap();
        let staging = block_staging(&tmp, "s1", 1);

        let outcome = d
            .submit(req("s1", "echo hi", ExecMode::Asynchronous))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted(ref s) if s.ticket == 1));
        d.drain().await;
        assert_eq!(d.poll("s1", 1).await.unwrap(), ReadOutcome::NotFound);

        std::fs::remove_dir(&staging).unwrap();
        let outcome = d
            .submit(req("s1", "echo hi", ExecMode::Asynchronous))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted(ref s) if !s.cached && s.ticket == 1));
        assert_eq!(wait_ready(&d, "s1", 1).await.output, "hi\n");
    }

    #[tokio::test]
    async fn run_from_before_a_clear_does_not_disturb_the_new_session() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.submit(req("s1", "sleep 0.3; echo old", ExecMode::Asynchronous))
            .await
            .unwrap();
        d.open_session("s1", true).await.unwrap();

        // Staged while the old run finishes, committed after it.
        let outcome = d
            .submit(req("s1", "sleep 0.8; echo new", ExecMode::Synchronous))
            .await
            .unwrap();
        let SubmitOutcome::Completed(result) = outcome else {
            panic!("expected result, got {outcome:?}");
        };
        assert_eq!(result.ticket, 1);
        assert_eq!(result.output, "new\n");

        d.drain().await;
        assert_eq!(d.poll("s1", 1).await.unwrap(), ReadOutcome::Ready(result));
        assert_eq!(d.store().list_tickets("s1").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn sync_run_reports_a_clear_that_happened_mid_run() {
        let tmp = TempDir::new().unwrap();
        let d = Arc::new(dispatcher(&tmp));
        let runner = Arc::clone(&d);
        let handle = tokio::spawn(async move {
            runner
                .submit(req("s1", "sleep 0.5; echo gone", ExecMode::Synchronous))
                .await
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        d.open_session("s1", true).await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, LlmassError::SessionCleared { ticket: 1, .. }));
        assert!(d.store().list_tickets("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_carry_wall_clock_completion_time() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        let outcome = d
            .submit(req("s1", "true", ExecMode::Synchronous))
            .await
            .unwrap();
        let SubmitOutcome::Completed(result) = outcome else {
            panic!("expected result, got {outcome:?}");
        };
        // 2020-01-01T00:00:00Z
        assert!(result.completed_at_epoch_ms > 1_577_836_800_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_execute_once() {
        let tmp = TempDir::new().unwrap();
        let d = Arc::new(dispatcher(&tmp));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let d = Arc::clone(&d);
            handles.push(tokio::spawn(async move {
                d.submit(req("s1", "echo once", ExecMode::Asynchronous))
                    .await
                    .unwrap()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.ticket(), 1);
            if matches!(outcome, SubmitOutcome::Accepted(_)) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        d.drain().await;
        assert_eq!(d.store().list_tickets("s1").await.unwrap(), vec![1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_distinct_commands_get_distinct_tickets() {
        let tmp = TempDir::new().unwrap();
        let d = Arc::new(dispatcher(&tmp));

        let mut handles = Vec::new();
        for i in 0..12 {
            let d = Arc::clone(&d);
            handles.push(tokio::spawn(async move {
                d.submit(req("s1", &format!("echo {i}"), ExecMode::Asynchronous))
                    .await
                    .unwrap()
                    .ticket()
            }));
        }
        let mut tickets = Vec::new();
        for handle in handles {
            tickets.push(handle.await.unwrap());
        }
        tickets.sort_unstable();
        assert_eq!(tickets, (1..=12).collect::<Vec<_>>());
        d.drain().await;
        assert_eq!(d.in_flight(), 0);
    }

    #[tokio::test]
    async fn clearing_a_session_resets_tickets_and_dedup() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        d.submit(req("s1", "echo hi", ExecMode::Synchronous)).await.unwrap();
        d.submit(req("s1", "echo again", ExecMode::Synchronous)).await.unwrap();

        d.open_session("s1", true).await.unwrap();
        assert!(d.store().list_tickets("s1").await.unwrap().is_empty());

        let outcome = d
            .submit(req("s1", "echo again", ExecMode::Synchronous))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed(ref r) if r.ticket == 1));
    }

    #[tokio::test]
    async fn base64_form_is_echoed_in_result() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(&tmp);
        let outcome = d
            .submit(SubmitRequest {
                b64_command: Some("ZWNobyBoaQ==".to_string()),
                ..req("s1", "echo hi", ExecMode::Synchronous)
            })
            .await
            .unwrap();
        let SubmitOutcome::Completed(result) = outcome else {
            panic!("expected result");
        };
        assert_eq!(result.b64_input.as_deref(), Some("ZWNobyBoaQ=="));
    }
}
