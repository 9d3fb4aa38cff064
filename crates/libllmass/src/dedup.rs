use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use llmass_protocol::{ExecMode, SessionName, Submission, Ticket};

/// How long an identical resubmission is suppressed.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct DedupEntry {
    ticket: Ticket,
    input: String,
    b64_input: Option<String>,
    callback: String,
    updated_at: Option<Instant>,
}

impl DedupEntry {
    fn is_fresh_match(&self, command: &str, window: Duration) -> bool {
        self.updated_at
            .is_some_and(|at| at.elapsed() < window && self.input == command)
    }

    fn to_submission(&self, session: &str, mode: ExecMode, cached: bool) -> Submission {
        Submission {
            mode,
            cached,
            session: session.to_string(),
            ticket: self.ticket,
            input: self.input.clone(),
            b64_input: self.b64_input.clone(),
            callback: self.callback.clone(),
        }
    }
}

/// Last submission per session, used to suppress accidental resubmits.
///
/// The session map lock is only taken for writing to insert a new session.
/// Each entry has its own lock, so traffic on one session never waits on another.
pub struct DedupCache {
    window: Duration,
    sessions: RwLock<HashMap<SessionName, Arc<Mutex<DedupEntry>>>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_DEDUP_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    async fn entry(&self, session: &str) -> Arc<Mutex<DedupEntry>> {
        if let Some(entry) = self.sessions.read().await.get(session) {
            return Arc::clone(entry);
        }
        // Another task may have inserted between the two locks.
        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session.to_string()).or_default())
    }

    /// True if `command` equals the session's last command and that entry is still fresh.
    pub async fn matches(&self, session: &str, command: &str) -> bool {
        let entry = self.entry(session).await;
        let entry = entry.lock().await;
        entry.is_fresh_match(command, self.window)
    }

    /// Record `submission` as the session's latest command.
    pub async fn update(&self, session: &str, submission: &Submission) {
        let entry = self.entry(session).await;
        let mut entry = entry.lock().await;
        entry.ticket = submission.ticket;
        entry.input = submission.input.clone();
        entry.b64_input = submission.b64_input.clone();
        entry.callback = submission.callback.clone();
        entry.updated_at = Some(Instant::now());
    }

    /// The session's latest submission rendered as a response.
    pub async fn current_as_response(
        &self,
        session: &str,
        mode: ExecMode,
        cached: bool,
    ) -> Submission {
        let entry = self.entry(session).await;
        let entry = entry.lock().await;
        entry.to_submission(session, mode, cached)
    }

    /// Match and snapshot under one entry lock.
    ///
    /// Returns the cached submission marked `cached = true` on a hit.
    pub async fn lookup(&self, session: &str, command: &str, mode: ExecMode) -> Option<Submission> {
        let entry = self.entry(session).await;
        let entry = entry.lock().await;
        entry
            .is_fresh_match(command, self.window)
            .then(|| entry.to_submission(session, mode, true))
    }

    /// Drop the session's entry. Used when a session is cleared.
    pub async fn forget(&self, session: &str) {
        self.sessions.write().await.remove(session);
    }

    /// Reset the session's entry if it still points at `ticket`.
    ///
    /// Used when a run fails before its record exists, so a retry executes
    /// instead of being answered with a ticket that will never be ready.
    pub async fn forget_if(&self, session: &str, ticket: Ticket) -> bool {
        let Some(entry) = self.sessions.read().await.get(session).cloned() else {
            return false;
        };
        let mut entry = entry.lock().await;
        if entry.ticket != ticket || entry.updated_at.is_none() {
            return false;
        }
        *entry = DedupEntry::default();
        true
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}
