//! Plain-text bodies. Every response is addressed to the calling model, so
//! the blocks are labelled and separated by blank lines.

use std::fmt::Write;

use url::Url;

use libllmass::{HistoryEntry, HistoryRecord};
use llmass_protocol::{CmdResult, Submission, Ticket};

pub const RESULT_GREETING: &str = "HELLO LLM, YOU SUBMITTED A REQUEST AND THESE ARE RESULTS!";
pub const HISTORY_GREETING: &str = "HELLO LLM, HERE IS YOUR COMMAND HISTORY:";

pub fn message(text: &str) -> String {
    format!("{text}\n")
}

pub fn submission(sub: &Submission) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{RESULT_GREETING}\n\n\
         TYPE: {}\n\n\
         IS_CACHED:\n\n{}\n\n\
         SESSION: {}\n\n\
         TICKET: {}\n\n\
         CALLBACK: {}\n\n\
         INPUT:\n\n{}\n\n",
        sub.kind_label(),
        sub.cached,
        sub.session,
        sub.ticket,
        sub.callback,
        sub.input,
    );
    if let Some(b64) = &sub.b64_input {
        let _ = write!(out, "B64INPUT:\n\n{b64}\n\n");
    }
    out
}

fn status_line(result: &CmdResult) -> String {
    if result.timed_out {
        "timed out".to_string()
    } else if let Some(code) = result.exit_code.filter(|_| result.failed) {
        format!("failed (exit code {code})")
    } else if result.failed {
        "failed".to_string()
    } else {
        "ok".to_string()
    }
}

pub fn result(result: &CmdResult) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{RESULT_GREETING}\n\n\
         TYPE: {}\n\n\
         SESSION: {}\n\n\
         TICKET: {}\n\n\
         DURATION: {}\n\n\
         STATUS: {}\n\n\
         NEXT:\n\n{}\n\n",
        result.mode,
        result.session,
        result.ticket,
        result.duration,
        status_line(result),
        result.next,
    );
    if let Some(b64) = &result.b64_input {
        let _ = write!(out, "B64INPUT:\n\n{b64}\n\n");
    }
    let _ = write!(
        out,
        "INPUT:\n\n{}\n\nOUTPUT:\n\n{}\n\n",
        result.input, result.output
    );
    out
}

pub fn not_ready(ticket: Ticket) -> String {
    message(&format!(
        "No output for ticket {ticket} yet. Refresh the page after randomly waiting a 1-20 seconds!"
    ))
}

pub fn history(session: &str, entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return message(&format!("No tickets found for session {session}"));
    }
    let mut out = format!("{HISTORY_GREETING}\n\n");
    for entry in entries {
        let _ = writeln!(out, "--- TICKET {:02} ---", entry.ticket);
        match &entry.record {
            HistoryRecord::Complete(r) => {
                let _ = write!(out, "{}\n\n", result(r));
            }
            HistoryRecord::Pending => out.push_str("[Empty ticket]\n\n"),
            HistoryRecord::Unreadable(reason) => {
                let _ = write!(out, "Error reading ticket: {reason}\n\n");
            }
        }
    }
    out
}

pub fn usage(base: &Url) -> String {
    let base = base.as_str().trim_end_matches('/');
    format!(
        "llmass: run shell commands in named sessions and collect their output by ticket.\n\n\
         Every call needs hash=<secret>.\n\n\
         GET {base}/shell?hash=..&session=NAME&cmd=COMMAND   (or b64cmd=BASE64, optional mode=sync|async)\n\
         GET {base}/callback?hash=..&session=NAME&ticket=N\n\
         GET {base}/history?hash=..&session=NAME\n\
         GET {base}/session?hash=..&name=NAME[&clear=true]\n\n\
         Repeating the same command in a session within a minute returns the earlier ticket.\n"
    )
}
