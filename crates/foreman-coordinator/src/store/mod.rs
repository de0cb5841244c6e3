//! Durable records of tasks and active assignments.
//!
//! Both files are read whole and rewritten whole. A rewrite goes to a temporary file
//! in the same directory which is then renamed over the original, so readers see
//! either the old or the new collection, never a torn one.

use foreman_core::Result;
use foreman_deps::tempfile::NamedTempFile;
use std::fs;
use std::io::Write as _;
use std::path::Path;

/// Markdown table of active assignments
pub mod ledger;
/// Line-delimited JSON task collection
pub mod tasks;

pub use ledger::AssignmentLedger;
pub use tasks::TaskStore;

/// Replaces the file at `path` with `contents` via write-then-rename.
///
/// # Errors
/// Returns an error if the temporary file cannot be written or renamed
pub(crate) fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|error| error.error)?;
    Ok(())
}
