pub mod paths;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-chosen session identifier. One session maps to one directory.
pub type SessionName = String;

/// Per-session sequence number, starting at 1.
pub type Ticket = u64;

/// File extension of persisted ticket records.
pub const TICKET_EXTENSION: &str = "ticket";

/// Hint attached to every completed result.
pub const NEXT_HINT: &str =
    "This is your result. Review the Input & Output. You can now issue your next command to /shell";

/// How a submission is executed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    Synchronous,
    Asynchronous,
}

impl ExecMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecMode::Synchronous => "synchronous",
            ExecMode::Asynchronous => "asynchronous",
        }
    }

    /// Parse a caller or config supplied mode. Accepts the short forms
    /// `sync`/`async` as well as the full names.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Some(ExecMode::Synchronous),
            "async" | "asynchronous" => Some(ExecMode::Asynchronous),
            _ => None,
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgment returned for a submitted command. Never persisted as-is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub mode: ExecMode,
    pub cached: bool,
    pub session: SessionName,
    pub ticket: Ticket,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_input: Option<String>,
    pub callback: String,
}

impl Submission {
    /// Label shown to callers: `cached` for suppressed duplicates, the mode otherwise.
    pub fn kind_label(&self) -> &'static str {
        if self.cached {
            "cached"
        } else {
            self.mode.as_str()
        }
    }
}

/// Durable record of one ticket's execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CmdResult {
    pub mode: ExecMode,
    pub ticket: Ticket,
    pub session: SessionName,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_input: Option<String>,
    pub output: String,
    pub duration: String,
    pub next: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub completed_at_epoch_ms: u64,
}

/// File name for a ticket: zero-padded to at least two digits.
pub fn ticket_file_name(ticket: Ticket) -> String {
    format!("{ticket:02}.{TICKET_EXTENSION}")
}

/// Extract the ticket number from a file name produced by [`ticket_file_name`].
///
/// Returns `None` for anything that is not `<digits>.ticket` with a positive number.
pub fn parse_ticket_file_name(name: &str) -> Option<Ticket> {
    let stem = name.strip_suffix(TICKET_EXTENSION)?.strip_suffix('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse::<Ticket>().ok().filter(|t| *t > 0)
}
