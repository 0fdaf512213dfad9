use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tracing::warn;

/// Advisory exclusive lock held next to a correction file while it is
/// rewritten. At most one writer per correction file.
pub struct CorrectionLock {
    file: File,
    path: PathBuf,
}

pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

fn open_lock_file(target: &Path) -> std::io::Result<(File, PathBuf)> {
    let path = lock_path(target);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;
    Ok((file, path))
}

impl CorrectionLock {
    /// Block until the lock for `target` is held.
    pub fn acquire(target: &Path) -> std::io::Result<Self> {
        let (file, path) = open_lock_file(target)?;
        loop {
            match file.lock_exclusive() {
                Ok(()) => return Ok(Self { file, path }),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Take the lock only if nobody else holds it.
    #[cfg(test)]
    fn try_acquire(target: &Path) -> std::io::Result<Option<Self>> {
        let (file, path) = open_lock_file(target)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Drop for CorrectionLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!(%error, path = %self.path.display(), "failed to release correction lock");
        }
    }
}
