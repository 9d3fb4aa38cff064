use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use llmass_protocol::{CmdResult, Ticket, parse_ticket_file_name, ticket_file_name};

use crate::error::{LlmassError, Result};
use crate::session::validate_session_name;

/// Outcome of reading one ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Ready(CmdResult),
    /// The ticket is allocated but its run has not finished.
    NotReady,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRecord {
    Complete(CmdResult),
    Pending,
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub ticket: Ticket,
    pub record: HistoryRecord,
}

/// File-backed result store: `<root>/<session>/<NN>.ticket`, one JSON record per ticket.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing `session`. Validates the name first.
    pub fn session_dir(&self, session: &str) -> Result<PathBuf> {
        validate_session_name(session)?;
        Ok(self.root.join(session))
    }

    pub fn ticket_path(&self, session: &str, ticket: Ticket) -> Result<PathBuf> {
        Ok(self.session_dir(session)?.join(ticket_file_name(ticket)))
    }

    pub async fn session_exists(&self, session: &str) -> Result<bool> {
        let dir = self.session_dir(session)?;
        match fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LlmassError::storage(dir, e)),
        }
    }

    /// Create the session directory if needed and return its path.
    pub async fn ensure_session(&self, session: &str) -> Result<PathBuf> {
        let dir = self.session_dir(session)?;
        if !self.session_exists(session).await? {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| LlmassError::storage(&dir, e))?;
            info!(session, dir = %dir.display(), "created session directory");
        }
        Ok(dir)
    }

    /// Remove a session directory and everything in it. Missing sessions are fine.
    pub async fn clear_session(&self, session: &str) -> Result<()> {
        let dir = self.session_dir(session)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(session, "cleared session directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LlmassError::storage(dir, e)),
        }
    }

    /// Ticket numbers present in the session, ascending by value.
    pub async fn list_tickets(&self, session: &str) -> Result<Vec<Ticket>> {
        let dir = self.session_dir(session)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LlmassError::SessionNotFound(session.to_string()));
            }
            Err(e) => return Err(LlmassError::storage(dir, e)),
        };

        let mut tickets = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LlmassError::storage(&dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(ticket) = entry.file_name().to_str().and_then(parse_ticket_file_name) {
                tickets.push(ticket);
            }
        }
        tickets.sort_unstable();
        tickets.dedup();
        Ok(tickets)
    }

    /// Claim a ticket by creating its empty record. Returns `false` if it already exists.
    pub async fn reserve(&self, session: &str, ticket: Ticket) -> Result<bool> {
        let path = self.ticket_path(session, ticket)?;
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => {
                debug!(session, ticket, "reserved ticket");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LlmassError::storage(path, e)),
        }
    }

    /// Give back a reserved ticket whose run never produced a record.
    ///
    /// Only an empty reservation is removed. Returns `true` if one was.
    pub async fn release(&self, session: &str, ticket: Ticket) -> Result<bool> {
        let path = self.ticket_path(session, ticket)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() == 0 => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(LlmassError::storage(path, e)),
        }
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(session, ticket, "released ticket");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LlmassError::storage(path, e)),
        }
    }

    /// Open the staging file for a ticket's record.
    ///
    /// Nothing becomes visible to readers until [`PendingWrite::commit`].
    pub async fn begin_write(&self, session: &str, ticket: Ticket) -> Result<PendingWrite> {
        let final_path = self.ticket_path(session, ticket)?;
        let tmp_path = final_path.with_file_name(format!(".{}.tmp", ticket_file_name(ticket)));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .await
            .map_err(|e| LlmassError::storage(&tmp_path, e))?;
        Ok(PendingWrite {
            file,
            tmp_path,
            final_path,
        })
    }

    pub async fn write(&self, session: &str, ticket: Ticket, result: &CmdResult) -> Result<()> {
        self.begin_write(session, ticket).await?.commit(result).await
    }

    pub async fn read(&self, session: &str, ticket: Ticket) -> Result<ReadOutcome> {
        let path = self.ticket_path(session, ticket)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::NotFound),
            Err(e) => return Err(LlmassError::storage(path, e)),
        };
        if bytes.is_empty() {
            return Ok(ReadOutcome::NotReady);
        }
        serde_json::from_slice(&bytes)
            .map(ReadOutcome::Ready)
            .map_err(|source| LlmassError::Corrupt {
                path,
                ticket,
                source,
            })
    }

    /// Every ticket of the session in ascending order.
    ///
    /// A ticket that cannot be read is reported in place and does not stop the scan.
    pub async fn history(&self, session: &str) -> Result<Vec<HistoryEntry>> {
        let tickets = self.list_tickets(session).await?;
        let mut entries = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let record = match self.read(session, ticket).await {
                Ok(ReadOutcome::Ready(result)) => HistoryRecord::Complete(result),
                Ok(ReadOutcome::NotReady) => HistoryRecord::Pending,
                Ok(ReadOutcome::NotFound) => continue,
                Err(e) => {
                    warn!(session, ticket, "failed to read ticket: {e}");
                    HistoryRecord::Unreadable(e.to_class().1)
                }
            };
            entries.push(HistoryEntry { ticket, record });
        }
        Ok(entries)
    }
}

/// Staged record for one ticket, published by rename on commit.
pub struct PendingWrite {
    file: File,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl PendingWrite {
    pub async fn commit(mut self, result: &CmdResult) -> Result<()> {
        let outcome = self.flush_and_rename(result).await;
        if outcome.is_err() {
            let _ = fs::remove_file(&self.tmp_path).await;
        }
        outcome
    }

    /// Drop the staged record without touching the filesystem.
    ///
    /// For runs whose session was cleared: the staging path may already
    /// belong to a newer run.
    pub fn abandon(self) {
        drop(self.file);
    }

    async fn flush_and_rename(&mut self, result: &CmdResult) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(result).map_err(std::io::Error::from)?;
        self.file
            .write_all(&bytes)
            .await
            .map_err(|e| LlmassError::storage(&self.tmp_path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| LlmassError::storage(&self.tmp_path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| LlmassError::storage(&self.tmp_path, e))?;
        fs::rename(&self.tmp_path, &self.final_path)
            .await
            .map_err(|e| LlmassError::storage(&self.final_path, e))?;
        Ok(())
    }
}
