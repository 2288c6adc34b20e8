//! Anonymous files backing shared-memory pools

use std::{fs::File, io, path::Path};

use tracing::trace;

use crate::Error;

/// Create an already unlinked, close-on-exec file of `size` bytes inside `dir`
///
/// `dir` is normally `$XDG_RUNTIME_DIR`, which the compositor can be expected to map from.
pub fn create_anonymous_file(dir: Option<&Path>, size: u64) -> Result<File, Error> {
    let dir = dir.ok_or(Error::NoRuntimeDir)?;

    let file = tempfile::tempfile_in(dir).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("Failed to create a file in {}: {}", dir.display(), err),
        )
    })?;
    rustix::fs::ftruncate(&file, size).map_err(io::Error::from)?;

    trace!("Created anonymous file of {} bytes in {}", size, dir.display());
    Ok(file)
}
