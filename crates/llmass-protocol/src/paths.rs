use std::path::PathBuf;

/// Default sessions root, relative to the working directory.
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

/// Returns the default sessions root.
pub fn default_sessions_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SESSIONS_DIR)
}

/// Returns the config directory path for llmass.
pub fn dirs_path() -> PathBuf {
    if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(config_dir).join("llmass")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("llmass")
    } else {
        PathBuf::from("/tmp/llmass")
    }
}

/// Returns the config file path for the llmass server.
pub fn config_path() -> PathBuf {
    dirs_path().join("config.toml")
}
