//! Shared directory resolution
//!
//! Cooperating processes agree on an application group identifier and a
//! directory name. Together with a root directory they resolve to:
//!
//! ```text
//! <root>/<group>/<directory>   stored objects, one file per identifier
//! <root>/<group>/.signals      signal files for the filesystem bridge
//! ```
//!
//! Directories are created lazily by the components that use them.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::debug;
use uuid::Uuid;

use crate::identifier;

/// Environment variable overriding the default root directory
pub const ROOT_ENV_VAR: &str = "GROUPCAST_ROOT";

const SIGNALS_DIR: &str = ".signals";

/// Resolved location of a group's shared storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLocation {
    root: PathBuf,
    group: String,
    directory: String,
}

impl SharedLocation {
    /// Resolve a location under an explicit root
    pub fn new(root: impl Into<PathBuf>, group: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            group: group.into(),
            directory: directory.into(),
        }
    }

    /// Resolve a location under the default root
    pub fn resolve(group: impl Into<String>, directory: impl Into<String>) -> Self {
        Self::new(default_root(), group, directory)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Container shared by every directory of the group
    pub fn container(&self) -> PathBuf {
        self.root.join(identifier::escape(&self.group))
    }

    /// Directory holding stored objects
    pub fn objects_dir(&self) -> PathBuf {
        self.container().join(identifier::escape(&self.directory))
    }

    /// Directory holding signal files; shared by every directory of the group
    pub fn signals_dir(&self) -> PathBuf {
        self.container().join(SIGNALS_DIR)
    }
}

/// Create a directory and its parents if absent
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.is_dir() {
        debug!("Creating shared directory: {}", path.display());
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Unique hidden temporary file in a directory, for write-then-rename.
///
/// The name does not embed the identifier, so it stays short whatever the
/// length of the final file name.
pub fn temp_file_in(directory: &Path) -> PathBuf {
    directory.join(format!(".{}.tmp", Uuid::new_v4().simple()))
}

/// Default root: `$GROUPCAST_ROOT`, then the local data directory, then the
/// system temp directory.
pub fn default_root() -> PathBuf {
    if let Ok(root) = env::var(ROOT_ENV_VAR) {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }

    dirs::data_local_dir()
        .map(|dir| dir.join("groupcast"))
        .unwrap_or_else(|| env::temp_dir().join("groupcast"))
}
