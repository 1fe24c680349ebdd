use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Errors from reading or writing the profile file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A pixel could not be read from the screen.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("capture failed: {0}")]
    Capture(#[from] xcap::XCapError),

    #[error("pixel ({x}, {y}) is outside monitor bounds")]
    OutOfBounds { x: i32, y: i32 },
}

/// Synthetic input could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("keyboard backend unavailable: {0}")]
    Connect(#[from] enigo::NewConError),

    #[error("input injection failed: {0}")]
    Input(#[from] enigo::InputError),

    #[error("automation backend failed: {0}")]
    Backend(#[from] BackendError),
}

/// Failures of the external AutoHotkey process.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no automation executable found")]
    NotFound,

    #[error("failed to launch {path}: {source}")]
    Spawn { path: PathBuf, source: io::Error },

    #[error("automation script timed out after {0:?}")]
    Timeout(Duration),

    #[error("automation script exited with {status}: {stderr}")]
    Script { status: String, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A hotkey name in the profile could not be mapped to a key.
#[derive(Debug, thiserror::Error)]
#[error("unknown key name: {0:?}")]
pub struct HotkeyError(pub String);

/// A failed iteration of the AFK loop.
#[derive(Debug, thiserror::Error)]
pub enum AfkError {
    #[error("jump failed: {0}")]
    Jump(#[source] DispatchError),

    #[error("input task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
