use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use url::Url;

use libllmass::{
    Dispatcher, DispatcherConfig, ErrorClass, LlmassError, ReadOutcome, SubmitOutcome,
    SubmitRequest,
};
use llmass_protocol::{ExecMode, Ticket};

use crate::auth::SharedSecret;
use crate::config::RuntimeConfig;
use crate::links::CallbackLinks;
use crate::render;

const HASH_MESSAGE: &str = "Invalid or missing 'hash' parameter";
const SESSION_MESSAGE: &str = "Invalid or missing 'session' parameter";
const TICKET_MESSAGE: &str = "Invalid or missing 'ticket' parameter";
const CMD_MESSAGE: &str = "Invalid or missing 'cmd' or 'b64cmd' parameter";
const NAME_MESSAGE: &str = "Missing 'name' parameter";
const TIMEOUT_MESSAGE: &str = "Request timeout exceeded";

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub secret: SharedSecret,
    pub default_mode: ExecMode,
    pub request_timeout: Duration,
    pub base_url: Url,
}

impl AppState {
    pub fn from_config(cfg: &RuntimeConfig) -> Arc<Self> {
        let secret = SharedSecret::new(cfg.secret.as_str());
        let links = CallbackLinks::new(cfg.base_url.clone(), secret.clone());
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                sessions_root: cfg.sessions_dir.clone(),
                shell: cfg.shell.clone(),
                exec_timeout: cfg.exec_timeout,
                dedup_window: cfg.dedup_window,
            },
            Arc::new(links),
        );
        Arc::new(Self {
            dispatcher: Arc::new(dispatcher),
            secret,
            default_mode: cfg.default_mode,
            request_timeout: cfg.request_timeout,
            base_url: cfg.base_url.clone(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/shell", get(shell))
        .route("/callback", get(callback))
        .route("/history", get(history))
        .route("/session", get(session))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            enforce_request_timeout,
        ))
        // Spans carry the path only; the query holds the secret.
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                tracing::info_span!("http", method = %req.method(), path = %req.uri().path())
            }),
        )
        .with_state(state)
}

type Reply = (StatusCode, String);

fn invalid(text: impl AsRef<str>) -> Reply {
    (StatusCode::OK, render::message(text.as_ref()))
}

fn error_reply(err: LlmassError) -> Reply {
    let (class, text) = err.to_class();
    match class {
        ErrorClass::Invalid => invalid(text),
        ErrorClass::Internal => {
            error!("request failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, render::message(&text))
        }
    }
}

fn authorize(state: &AppState, hash: Option<&str>) -> Result<(), Reply> {
    if state.secret.verify(hash) {
        Ok(())
    } else {
        warn!("rejected request with invalid hash");
        Err((StatusCode::UNAUTHORIZED, render::message(HASH_MESSAGE)))
    }
}

fn required<'a>(value: &'a Option<String>, text: &str) -> Result<&'a str, Reply> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(text))
}

async fn enforce_request_timeout(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(state.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                path = %path,
                timeout_secs = state.request_timeout.as_secs(),
                "request timed out"
            );
            (StatusCode::GATEWAY_TIMEOUT, render::message(TIMEOUT_MESSAGE)).into_response()
        }
    }
}

/// GET / - usage banner.
async fn index(State(state): State<Arc<AppState>>) -> String {
    render::usage(&state.base_url)
}

#[derive(Debug, Deserialize)]
struct ShellQuery {
    hash: Option<String>,
    session: Option<String>,
    cmd: Option<String>,
    b64cmd: Option<String>,
    mode: Option<String>,
}

/// Returns the command text and, when it arrived encoded, the original base64.
fn decode_command(
    cmd: Option<String>,
    b64cmd: Option<String>,
) -> Result<(String, Option<String>), Reply> {
    if let Some(encoded) = b64cmd.filter(|v| !v.is_empty()) {
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| invalid(format!("Failed to decode base64 command: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| invalid(format!("Failed to decode base64 command: {e}")))?;
        return Ok((text, Some(encoded)));
    }
    match cmd.filter(|v| !v.is_empty()) {
        Some(text) => Ok((text, None)),
        None => Err(invalid(CMD_MESSAGE)),
    }
}

/// GET /shell - submit a command.
async fn shell(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ShellQuery>,
) -> Result<String, Reply> {
    authorize(&state, q.hash.as_deref())?;
    let session = required(&q.session, SESSION_MESSAGE)?.to_string();
    let mode = match q.mode.as_deref().filter(|m| !m.is_empty()) {
        None => state.default_mode,
        Some(raw) => ExecMode::parse(raw).ok_or_else(|| {
            invalid(format!(
                "Invalid 'mode' parameter: {raw} (expected sync or async)"
            ))
        })?,
    };
    let (command, b64_command) = decode_command(q.cmd, q.b64cmd)?;

    let outcome = state
        .dispatcher
        .submit(SubmitRequest {
            session,
            command,
            b64_command,
            mode,
        })
        .await
        .map_err(error_reply)?;

    Ok(match outcome {
        SubmitOutcome::Cached(sub) | SubmitOutcome::Accepted(sub) => render::submission(&sub),
        SubmitOutcome::Completed(result) => render::result(&result),
    })
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    hash: Option<String>,
    session: Option<String>,
    ticket: Option<String>,
}

/// GET /callback - poll one ticket.
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> Result<String, Reply> {
    authorize(&state, q.hash.as_deref())?;
    let session = required(&q.session, SESSION_MESSAGE)?;
    let ticket = q
        .ticket
        .as_deref()
        .and_then(|t| t.trim().parse::<Ticket>().ok())
        .filter(|t| *t > 0)
        .ok_or_else(|| invalid(TICKET_MESSAGE))?;

    let body = match state
        .dispatcher
        .poll(session, ticket)
        .await
        .map_err(error_reply)?
    {
        ReadOutcome::Ready(result) => render::result(&result),
        ReadOutcome::NotReady => render::not_ready(ticket),
        ReadOutcome::NotFound => render::message(&format!(
            "Ticket {ticket} does not exist in session {session}"
        )),
    };
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    hash: Option<String>,
    session: Option<String>,
}

/// GET /history - every ticket of a session in order.
async fn history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> Result<String, Reply> {
    authorize(&state, q.hash.as_deref())?;
    let session = required(&q.session, SESSION_MESSAGE)?;
    let entries = state
        .dispatcher
        .history(session)
        .await
        .map_err(error_reply)?;
    Ok(render::history(session, &entries))
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    hash: Option<String>,
    name: Option<String>,
    clear: Option<String>,
}

/// GET /session - create a session, optionally wiping it first.
async fn session(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SessionQuery>,
) -> Result<String, Reply> {
    authorize(&state, q.hash.as_deref())?;
    let name = required(&q.name, NAME_MESSAGE)?;
    let clear = q.clear.as_deref() == Some("true");
    state
        .dispatcher
        .open_session(name, clear)
        .await
        .map_err(error_reply)?;
    info!(session = name, clear, "session opened");
    Ok(render::message(&format!(
        "Session '{name}' created successfully"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_takes_precedence_over_plain_command() {
        let (text, b64) =
            decode_command(Some("ls".to_string()), Some("ZWNobyBoaQ==".to_string())).unwrap();
        assert_eq!(text, "echo hi");
        assert_eq!(b64.as_deref(), Some("ZWNobyBoaQ=="));
    }

    #[test]
    fn plain_command_is_used_verbatim() {
        let (text, b64) = decode_command(Some("echo 100%25".to_string()), None).unwrap();
        assert_eq!(text, "echo 100%25");
        assert_eq!(b64, None);
    }

    #[test]
    fn bad_base64_is_reported_as_a_message() {
        let (status, body) = decode_command(None, Some("!!not-base64".to_string())).unwrap_err();
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("Failed to decode base64 command:"));
    }

    #[test]
    fn missing_command_is_reported() {
        let (status, body) = decode_command(Some(String::new()), None).unwrap_err();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{CMD_MESSAGE}\n"));
    }

    #[test]
    fn internal_errors_are_sanitized() {
        let err = LlmassError::Io(std::io::Error::other("disk on fire at /srv/data"));
        let (status, body) = error_reply(err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("/srv/data"));
    }
}
