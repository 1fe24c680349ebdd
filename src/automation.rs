//! AutoHotkey backend.
//!
//! Clicks are delivered by piping a short script into the AutoHotkey
//! executable (`AutoHotkey /ErrorStdOut *` reads the script from stdin). This
//! module also finds the executable on disk and checks that it starts.

use std::env;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::config::Point;
use crate::error::BackendError;

pub const DOWNLOAD_URL: &str = "https://www.autohotkey.com/download/ahk-install.exe";

/// Time allowed for the start-up probe.
const INIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time allowed for one click script. A hung process is killed after this.
pub const CLICK_TIMEOUT: Duration = Duration::from_secs(5);

const EXECUTABLE_NAMES: &[&str] = &[
    "AutoHotkey.exe",
    "AutoHotkeyU64.exe",
    "AutoHotkey64.exe",
    "AutoHotkeyU32.exe",
    "AutoHotkey",
];

const INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\AutoHotkey",
    r"C:\Program Files\AutoHotkey\v1.1",
    r"C:\Program Files (x86)\AutoHotkey",
];

/// Handle to a verified AutoHotkey executable.
#[derive(Debug, Clone)]
pub struct AutoHotkey {
    executable: PathBuf,
    window_title: String,
}

impl AutoHotkey {
    /// Run an empty script to make sure the executable actually starts.
    pub fn initialize(executable: &Path, window_title: &str) -> Result<Self, BackendError> {
        let backend = Self {
            executable: executable.to_path_buf(),
            window_title: window_title.to_string(),
        };
        backend.run_script("ExitApp\n", INIT_TIMEOUT)?;
        info!(path = %executable.display(), "automation backend initialized");
        Ok(backend)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Activate the target window, then click at `at`.
    pub fn click(&self, at: Point) -> Result<(), BackendError> {
        self.run_script(&click_script(&self.window_title, at), CLICK_TIMEOUT)?;
        debug!(%at, "clicked using automation script");
        Ok(())
    }

    /// Pipe `script` into a fresh AutoHotkey process and wait for it.
    ///
    /// # Arguments
    ///
    /// * `script` - Script text read by AutoHotkey from stdin.
    /// * `limit` - How long to wait before the process is killed.
    fn run_script(&self, script: &str, limit: Duration) -> Result<(), BackendError> {
        let mut child = Command::new(&self.executable)
            .arg("/ErrorStdOut")
            .arg("*")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                path: self.executable.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes())?;
        }

        let status = wait_with_limit(&mut child, limit)?;
        if status.success() {
            return Ok(());
        }

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        Err(BackendError::Script {
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

fn wait_with_limit(child: &mut Child, limit: Duration) -> Result<ExitStatus, BackendError> {
    match child.wait_timeout(limit)? {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(BackendError::Timeout(limit))
        }
    }
}

/// Script sent for every click.
pub fn click_script(window_title: &str, at: Point) -> String {
    format!("WinActivate, {window_title}\nSleep 200\nClick {}, {}\n", at.x, at.y)
}

/// Directories searched after the configured path: the usual install
/// directories, then `PATH`.
pub fn search_dirs() -> Vec<PathBuf> {
    let path_dirs = env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();
    INSTALL_DIRS.iter().map(PathBuf::from).chain(path_dirs).collect()
}

/// Every existing executable worth trying, in the order it should be tried.
///
/// # Arguments
///
/// * `configured` - The path saved in the config, may be empty.
/// * `dirs` - Directories to search after the configured path, in order.
pub fn candidates(configured: &str, dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let configured = configured.trim();
    if !configured.is_empty() {
        let path = PathBuf::from(configured);
        if path.is_file() {
            found.push(path);
        } else {
            warn!(path = configured, "configured automation path does not exist");
        }
    }

    let discovered = dirs
        .iter()
        .flat_map(|dir| EXECUTABLE_NAMES.iter().map(move |name| dir.join(name)))
        .filter(|candidate| candidate.is_file());
    for candidate in discovered {
        if !found.contains(&candidate) {
            found.push(candidate);
        }
    }
    found
}

/// Initialize the first candidate that starts. The error of the last
/// attempt is returned if none does.
///
/// # Arguments
///
/// * `configured` - The path saved in the config, may be empty.
/// * `window_title` - Window activated before each click.
/// * `dirs` - Directories to search after the configured path.
pub fn connect(
    configured: &str,
    window_title: &str,
    dirs: &[PathBuf],
) -> Result<AutoHotkey, BackendError> {
    let mut last_err = BackendError::NotFound;
    for path in candidates(configured, dirs) {
        match AutoHotkey::initialize(&path, window_title) {
            Ok(backend) => return Ok(backend),
            Err(err) => {
                warn!(path = %path.display(), "automation candidate failed: {err}");
                last_err = err;
            }
        }
    }
    Err(last_err)
}
