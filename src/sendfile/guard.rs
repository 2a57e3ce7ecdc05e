//! Sentinel path validation.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::sendfile::error::SendfileError;

/// Parent-directory token rejected anywhere in a sentinel path.
const PARENT_DIR_TOKEN: &[u8] = b"..";

/// Validates sentinel paths before any file I/O happens.
///
/// The baseline check is a plain substring scan for `..`. It is coarse:
/// it rejects harmless names such as `a..b` and accepts absolute paths
/// anywhere on disk. Configuring a root directory adds canonicalisation
/// and confines every path to that root. Absolute paths already under the
/// root are taken as they are; any other path is resolved relative to it.
#[derive(Debug, Clone, Default)]
pub struct PathGuard {
    root: Option<PathBuf>,
}

impl PathGuard {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Return the path to stream, or why it was refused.
    pub fn check(&self, candidate: &Path) -> Result<PathBuf, SendfileError> {
        let raw = candidate.as_os_str().as_encoded_bytes();
        if raw.windows(PARENT_DIR_TOKEN.len()).any(|w| w == PARENT_DIR_TOKEN) {
            tracing::warn!(path = %candidate.display(), "Sendfile path traversal rejected");
            return Err(SendfileError::SecurityViolation);
        }

        match &self.root {
            None => Ok(candidate.to_path_buf()),
            Some(root) => confine(root, candidate),
        }
    }
}

fn confine(configured: &Path, candidate: &Path) -> Result<PathBuf, SendfileError> {
    let root = configured.canonicalize().map_err(SendfileError::Io)?;
    let joined = if candidate.starts_with(&root) || candidate.starts_with(configured) {
        candidate.to_path_buf()
    } else {
        let relative: PathBuf = candidate
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        root.join(relative)
    };
    let resolved = joined.canonicalize().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SendfileError::NotFound,
        _ => SendfileError::Io(e),
    })?;

    if !resolved.starts_with(&root) {
        tracing::warn!(
            path = %candidate.display(),
            root = %root.display(),
            "Sendfile path resolves outside of root"
        );
        return Err(SendfileError::SecurityViolation);
    }
    Ok(resolved)
}
