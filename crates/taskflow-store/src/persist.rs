//! On-disk snapshot of the in-process backend.
//!
//! The whole backend state (accounts, task documents, current session) is
//! written as one JSON document. Each write goes to its own temp file in the
//! target directory that is then renamed over the target, so a crash or a
//! second writer never leaves a truncated or mixed state file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use taskflow_shared::constants::STATE_FILE_NAME;
use taskflow_shared::{Identity, Task, UserId};

use crate::error::{Result, StoreError};

/// A registered email/password account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub uid: UserId,
    pub email: String,
    /// Hex BLAKE3 key-derivation of uid + password.
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub session: Option<Identity>,
}

/// Platform-appropriate location of the state file:
/// - Linux:   `~/.local/share/taskflow/taskflow-state.json`
/// - macOS:   `~/Library/Application Support/com.taskflow.taskflow/taskflow-state.json`
/// - Windows: `{FOLDERID_RoamingAppData}\taskflow\taskflow\data\taskflow-state.json`
pub fn default_state_path() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("com", "taskflow", "taskflow").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().join(STATE_FILE_NAME))
}

/// Load the state at `path`. A missing file is an empty state.
pub fn load(path: &Path) -> Result<PersistedState> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
        Err(e) => Err(e.into()),
    }
}

/// Atomically replace the state at `path`.
///
/// Callers writing from several threads must serialise calls themselves;
/// each call is atomic but the last rename wins.
pub fn save(path: &Path, state: &PersistedState) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(state)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
