use crate::cancel::CancelFlag;
use blake3::Hasher;
use std::fs::{self, File, FileTimes};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// Failures during a staged copy, split by which side of the stream broke.
/// Read-side failures mean the content hash could not be computed; write-side
/// failures mean it was, but the destination could not take the bytes.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("cancelled")]
    Cancelled,
}

/// A fully written temporary file whose content hash is already known, parked
/// next to its final destination. The caller decides its fate after checking
/// the hash index: `commit` renames it into place, `discard` deletes it.
/// Dropping an undecided stage removes the temporary file.
pub struct StagedCopy {
    tmp: Option<PathBuf>,
    final_path: PathBuf,
    pub hash: String,
    pub bytes: u64,
}

impl StagedCopy {
    /// Atomically promote the staged file to its final path.
    pub fn commit(mut self) -> Result<PathBuf, CopyError> {
        let tmp = self.tmp.take().expect("stage already consumed");
        fs::rename(&tmp, &self.final_path).map_err(CopyError::Write)?;
        Ok(std::mem::take(&mut self.final_path))
    }

    /// Delete the staged file; used when the content turned out to be a
    /// duplicate of something already archived.
    pub fn discard(mut self) {
        if let Some(tmp) = self.tmp.take() {
            remove_quietly(&tmp);
        }
    }
}

impl Drop for StagedCopy {
    fn drop(&mut self) {
        if let Some(tmp) = self.tmp.take() {
            remove_quietly(&tmp);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Could not remove temp file {}: {}", path.display(), e);
    }
}

/// Stream the source into `<dest>.tmp` while hashing the same bytes, in one
/// pass over the content. The destination's parent directory is created on
/// demand. The file is fsynced and stamped with the source's modified time
/// before the stage is handed back, so a later rename is the only thing
/// between staged and durable.
///
/// Cancellation is checked between buffer reads; a cancelled stage leaves no
/// temporary file behind.
pub fn stage_copy(
    src: &Path,
    dest: &Path,
    buffer_size: usize,
    modified: Option<SystemTime>,
    cancel: &CancelFlag,
) -> Result<StagedCopy, CopyError> {
    let mut reader = File::open(src).map_err(CopyError::Read)?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(CopyError::Write)?;
    }
    let tmp_path = tmp_path_for(dest);
    let mut stage = StagedCopy {
        tmp: Some(tmp_path.clone()),
        final_path: dest.to_path_buf(),
        hash: String::new(),
        bytes: 0,
    };
    let mut writer = File::create(&tmp_path).map_err(CopyError::Write)?;

    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; buffer_size.max(1)];
    loop {
        if cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }
        let n = reader.read(&mut buffer).map_err(CopyError::Read)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        writer.write_all(&buffer[..n]).map_err(CopyError::Write)?;
        stage.bytes += n as u64;
    }

    writer.sync_all().map_err(CopyError::Write)?;
    if let Some(mtime) = modified {
        // Preserve the source timestamp; failure here is not worth losing the
        // copy over.
        if let Err(e) = writer.set_times(FileTimes::new().set_modified(mtime)) {
            warn!("Could not set mtime on {}: {}", tmp_path.display(), e);
        }
    }

    stage.hash = hasher.finalize().to_hex().to_string();
    Ok(stage)
}

fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    dest.with_file_name(name)
}
