//! Atomic publication of artifacts.
//!
//! Bytes go to a temporary file in the destination directory, are synced
//! to disk and then renamed over the destination. Readers see either the
//! previous artifact or the complete new one. A cancelled or failed write
//! never reaches the rename and its temporary file is removed on drop.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;
use tsk_ir::ConfigTree;

use crate::cancel::CancelToken;
use crate::compiler::{compile, CompileOptions};
use crate::error::CompileError;

pub fn write_artifact(path: &Path, bytes: &[u8], cancel: &CancelToken) -> Result<(), CompileError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let shown = path.display();
    cancel.check()?;
    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| CompileError::io(format!("creating a temporary file for `{shown}`"), e))?;
    temp.write_all(bytes)
        .map_err(|e| CompileError::io(format!("writing `{shown}`"), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| CompileError::io(format!("syncing `{shown}`"), e))?;
    cancel.check()?;
    temp.persist(path)
        .map_err(|e| CompileError::io(format!("publishing `{shown}`"), e.error))?;
    debug!(path = %shown, bytes = bytes.len(), "published artifact");
    Ok(())
}

/// Compile `tree` and publish it at `path`. Returns the artifact size.
pub fn compile_to_file(
    tree: &ConfigTree,
    path: &Path,
    options: &CompileOptions,
) -> Result<usize, CompileError> {
    let bytes = compile(tree, options)?;
    write_artifact(path, &bytes, &options.cancel)?;
    Ok(bytes.len())
}
