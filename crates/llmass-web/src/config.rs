use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;
use url::Url;

use libllmass::{DEFAULT_DEDUP_WINDOW, DEFAULT_EXEC_TIMEOUT, DEFAULT_SHELL};
use llmass_protocol::ExecMode;
use llmass_protocol::paths::{config_path, default_sessions_dir};

use crate::links::parse_base_url;

pub const MIN_SECRET_LEN: usize = 32;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about = "llmass command ticket service")]
pub struct Args {
    /// Shared secret every request must present as `hash`.
    #[arg(long = "hash", env = "HASH", hide_env_values = true)]
    pub secret: Option<String>,
    /// Public base URL used to build callback links.
    #[arg(long, env = "FQDN")]
    pub fqdn: Option<String>,
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
    #[arg(long, env = "LISTEN_HOST")]
    pub listen_host: Option<String>,
    #[arg(long, env = "SESSIONS_DIR")]
    pub sessions_dir: Option<PathBuf>,
    /// Run commands inline unless a request asks otherwise.
    #[arg(long, env = "SYNC")]
    pub sync: Option<String>,
    #[arg(long = "shell", env = "SHELL_PATH")]
    pub shell: Option<PathBuf>,
    #[arg(long, env = "EXEC_TIMEOUT_SECS")]
    pub exec_timeout_secs: Option<u64>,
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,
    #[arg(long, env = "DEDUP_WINDOW_SECS")]
    pub dedup_window_secs: Option<u64>,
    /// TOML config file. Defaults to `$XDG_CONFIG_HOME/llmass/config.toml` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub hash: Option<String>,
    pub fqdn: Option<String>,
    pub port: Option<u16>,
    pub listen_host: Option<String>,
    pub sessions_dir: Option<PathBuf>,
    pub sync: Option<bool>,
    pub shell: Option<PathBuf>,
    pub exec_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub dedup_window_secs: Option<u64>,
}

#[derive(Clone)]
pub struct RuntimeConfig {
    pub secret: String,
    pub base_url: Url,
    pub listen: SocketAddr,
    pub sessions_dir: PathBuf,
    pub default_mode: ExecMode,
    pub shell: PathBuf,
    pub exec_timeout: Duration,
    pub request_timeout: Duration,
    pub dedup_window: Duration,
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("listen", &self.listen)
            .field("sessions_dir", &self.sessions_dir)
            .field("default_mode", &self.default_mode)
            .field("shell", &self.shell)
            .field("exec_timeout", &self.exec_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("dedup_window", &self.dedup_window)
            .finish()
    }
}

pub fn load_runtime_config(args: &Args) -> Result<RuntimeConfig> {
    let file_cfg = match &args.config {
        Some(path) => read_file_config(path)?,
        None => {
            let path = config_path();
            if path.exists() {
                read_file_config(&path)?
            } else {
                FileConfig::default()
            }
        }
    };
    resolve(args, file_cfg)
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str::<FileConfig>(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

/// Merge flags and environment over the file config, then validate.
pub fn resolve(args: &Args, file_cfg: FileConfig) -> Result<RuntimeConfig> {
    let secret = args
        .secret
        .clone()
        .or(file_cfg.hash)
        .unwrap_or_default();
    if secret.len() < MIN_SECRET_LEN {
        bail!(
            "HASH must be >= {MIN_SECRET_LEN} characters: {}",
            secret.len()
        );
    }

    let fqdn = args
        .fqdn
        .clone()
        .or(file_cfg.fqdn)
        .filter(|f| !f.trim().is_empty())
        .context("FQDN must be set")?;
    let base_url = parse_base_url(&fqdn).with_context(|| format!("invalid FQDN: {fqdn}"))?;

    let host = args
        .listen_host
        .clone()
        .or(file_cfg.listen_host)
        .unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string());
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("invalid LISTEN_HOST: {host}"))?;
    let port = args.port.or(file_cfg.port).unwrap_or(DEFAULT_PORT);

    let sync = match &args.sync {
        Some(raw) => parse_bool(raw).with_context(|| format!("invalid SYNC value: {raw}"))?,
        None => file_cfg.sync.unwrap_or(false),
    };
    let default_mode = if sync {
        ExecMode::Synchronous
    } else {
        ExecMode::Asynchronous
    };

    Ok(RuntimeConfig {
        secret,
        base_url,
        listen: SocketAddr::new(ip, port),
        sessions_dir: args
            .sessions_dir
            .clone()
            .or(file_cfg.sessions_dir)
            .unwrap_or_else(default_sessions_dir),
        default_mode,
        shell: args
            .shell
            .clone()
            .or(file_cfg.shell)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL)),
        exec_timeout: seconds(
            "EXEC_TIMEOUT_SECS",
            args.exec_timeout_secs.or(file_cfg.exec_timeout_secs),
            DEFAULT_EXEC_TIMEOUT,
        )?,
        request_timeout: seconds(
            "REQUEST_TIMEOUT_SECS",
            args.request_timeout_secs.or(file_cfg.request_timeout_secs),
            DEFAULT_REQUEST_TIMEOUT,
        )?,
        dedup_window: seconds(
            "DEDUP_WINDOW_SECS",
            args.dedup_window_secs.or(file_cfg.dedup_window_secs),
            DEFAULT_DEDUP_WINDOW,
        )?,
    })
}

fn seconds(name: &str, value: Option<u64>, default: Duration) -> Result<Duration> {
    match value {
        Some(0) => bail!("{name} must be > 0"),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => bail!("expected true or false, got {other}"),
    }
}

/// Create the sessions root at startup so the first request cannot fail on it.
pub fn ensure_sessions_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to initialize sessions directory {}", path.display()))
}
