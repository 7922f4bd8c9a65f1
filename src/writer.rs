//! Atomic output writes.
//!
//! Bytes go to a hidden temporary file in the destination's directory, are
//! flushed to disk, and only then renamed over the destination. A reader
//! watching that directory therefore sees either nothing or the complete
//! file, never a prefix of it. Any failure (or cancellation) before the
//! rename removes the temporary file.

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use tempfile::Builder as TempFileBuilder;

use crate::{
    error::ThumbnailError,
    progress::{CancellationToken, Checkpoint},
};

/// Atomically write `bytes` to `destination`.
///
/// Missing parent directories are created. An existing file at
/// `destination` is replaced in one step.
///
/// # Errors
///
/// Returns [`ThumbnailError::Io`] if the directory cannot be created or
/// written, or the rename fails.
///
/// # Example
///
/// ```no_run
/// use vidthumb::write_atomic;
///
/// write_atomic("thumbs/clip.jpg", b"...")?;
/// # Ok::<(), vidthumb::ThumbnailError>(())
/// ```
pub fn write_atomic<P: AsRef<Path>>(destination: P, bytes: &[u8]) -> Result<(), ThumbnailError> {
    write_with_checkpoint(destination.as_ref(), bytes, &Checkpoint::new(None, None))
}

/// Like [`write_atomic`], but abandons the write if `token` is cancelled
/// before the rename.
///
/// # Errors
///
/// Returns [`ThumbnailError::Cancelled`] when cancelled. The destination is
/// untouched and no temporary file remains.
pub fn write_atomic_with_cancellation<P: AsRef<Path>>(
    destination: P,
    bytes: &[u8],
    token: &CancellationToken,
) -> Result<(), ThumbnailError> {
    let checkpoint = Checkpoint::new(Some(token.clone()), None);
    write_with_checkpoint(destination.as_ref(), bytes, &checkpoint)
}

pub(crate) fn write_with_checkpoint(
    destination: &Path,
    bytes: &[u8],
    checkpoint: &Checkpoint,
) -> Result<(), ThumbnailError> {
    write_staged(destination, bytes, checkpoint, |_| {})
}

/// Stage `bytes` next to `destination` and rename them into place.
///
/// `before_commit` runs once the temporary file is complete and synced,
/// immediately before the final checkpoint.
fn write_staged<F>(
    destination: &Path,
    bytes: &[u8],
    checkpoint: &Checkpoint,
    before_commit: F,
) -> Result<(), ThumbnailError>
where
    F: FnOnce(&Path),
{
    checkpoint.check()?;

    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).map_err(|error| ThumbnailError::io(directory, error))?;

    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thumbnail".to_string());

    // Dropping the temporary file on any early return deletes it.
    let mut temporary = TempFileBuilder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(directory)
        .map_err(|error| ThumbnailError::io(directory, error))?;

    temporary
        .as_file_mut()
        .write_all(bytes)
        .map_err(|error| ThumbnailError::io(temporary.path(), error))?;
    temporary
        .as_file()
        .sync_all()
        .map_err(|error| ThumbnailError::io(temporary.path(), error))?;

    before_commit(temporary.path());

    // Last chance to withdraw; after the rename the file is public.
    checkpoint.check()?;

    temporary
        .persist(destination)
        .map_err(|error| ThumbnailError::io(destination, error.error))?;

    // Persist the rename itself. Not every platform can open directories.
    if let Ok(handle) = File::open(directory) {
        let _ = handle.sync_all();
    }

    log::debug!("Wrote {} ({} bytes)", destination.display(), bytes.len());
    Ok(())
}
