//! Journal storage on the local filesystem.

use crate::backend::StorageBackend;
use crate::error::{check_truncate, read_range, StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOCK_SUFFIX: &str = "lock";
const STAGING_SUFFIX: &str = "compact";

/// Open journal file plus its logical length.
#[derive(Debug)]
struct Handle {
    file: File,
    len: u64,
}

impl Handle {
    /// Writes `data` to a fresh file at `path` and syncs it.
    fn create_synced(path: &Path, data: &[u8]) -> StorageResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(Self {
            file,
            len: data.len() as u64,
        })
    }

    fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

/// A backend writing the journal to a single file.
///
/// Opening takes an exclusive advisory lock on `<path>.lock`, held until
/// the backend is dropped, so one journal has one writer. `flush` syncs
/// file data. `replace` stages `<path>.compact`, syncs it and renames it
/// over the journal.
///
/// ```no_run
/// use outbox_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("outbox.journal")).unwrap();
/// backend.append(b"frame").unwrap();
/// backend.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    handle: Mutex<Handle>,
    _lock: File,
}

impl FileBackend {
    /// Opens the journal at `path`, creating an empty one if missing.
    ///
    /// # Errors
    ///
    /// [`StorageError::Locked`] when another backend holds the journal,
    /// otherwise any I/O failure opening the files.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let lock = acquire_lock(&companion(path, LOCK_SUFFIX))?;
        let handle = Handle::open(path)?;
        tracing::debug!(path = %path.display(), size = handle.len, "opened journal file");

        Ok(Self {
            path: path.to_path_buf(),
            handle: Mutex::new(handle),
            _lock: lock,
        })
    }

    /// Like [`open`](Self::open), creating missing parent directories first.
    ///
    /// # Errors
    ///
    /// Fails if a directory cannot be created or [`open`](Self::open) fails.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)?,
            _ => {}
        }
        Self::open(path)
    }

    /// Location of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn acquire_lock(lock_path: &Path) -> StorageResult<File> {
    let lock = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;
    match lock.try_lock_exclusive() {
        Ok(()) => Ok(lock),
        Err(_) => Err(StorageError::Locked {
            path: lock_path.to_path_buf(),
        }),
    }
}

/// `outbox.journal` -> `outbox.journal.<suffix>`
fn companion(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    name.into()
}

fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    // Not every platform can fsync a directory.
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        tracing::trace!(dir = %parent.display(), error = %e, "directory sync skipped");
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut handle = self.handle.lock();
        let range = read_range(offset, len, handle.len)?;
        let mut out = vec![0u8; range.len()];
        if !out.is_empty() {
            handle.file.seek(SeekFrom::Start(offset))?;
            handle.file.read_exact(&mut out)?;
        }
        Ok(out)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let handle = self.handle.get_mut();
        let at = handle.len;
        if !data.is_empty() {
            handle.file.seek(SeekFrom::Start(at))?;
            handle.file.write_all(data)?;
            handle.len += data.len() as u64;
        }
        Ok(at)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let file = &mut self.handle.get_mut().file;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.handle.lock().len)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let handle = self.handle.get_mut();
        check_truncate(new_size, handle.len)?;
        handle.file.set_len(new_size)?;
        handle.file.sync_all()?;
        handle.len = new_size;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let staging = companion(&self.path, STAGING_SUFFIX);
        let staged = match Handle::create_synced(&staging, data) {
            Ok(staged) => staged,
            Err(e) => {
                let _ = fs::remove_file(&staging);
                return Err(e);
            }
        };

        // Nothing may fail after the rename; the staged handle is the journal.
        if let Err(e) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        *self.handle.get_mut() = staged;
        sync_parent_dir(&self.path);

        tracing::debug!(path = %self.path.display(), size = data.len(), "replaced journal file");
        Ok(())
    }
}
