use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cache directory missing or not writable: {0}")]
    CacheDir(String),
    #[error("cannot lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Directory that holds `target`; a bare file name lives in the current directory.
fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Ensure the directory that will hold `target` exists; create if missing.
pub fn ensure_parent_dir(target: &Path) -> Result<(), PersistError> {
    let dir = parent_dir(target);
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::CacheDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
    }
    Ok(())
}

/// Replace the contents of `target` by writing a sibling temp file and
/// renaming it into place. On error the previous file, if any, is untouched.
pub fn write_atomic(target: &Path, content: &[u8]) -> Result<(), PersistError> {
    ensure_parent_dir(target)?;

    let mut tmp = NamedTempFile::new_in(parent_dir(target))?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(target).map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}

/// Advisory lock on `<cache path>.lock`, held until dropped.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block until the lock for `target` is ours.
    pub fn acquire(target: &Path) -> Result<Self, PersistError> {
        ensure_parent_dir(target)?;
        let path = lock_path(target);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| PersistError::Lock {
                path: path.clone(),
                source,
            })?;
        file.lock().map_err(|source| PersistError::Lock {
            path: path.clone(),
            source,
        })?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn lock_path(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_name_lives_in_current_dir() {
        assert_eq!(parent_dir(Path::new("photos.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("cache/photos.json")), Path::new("cache"));
    }

    #[test]
    fn lock_file_sits_next_to_target() {
        assert_eq!(
            lock_path(Path::new("cache/photos.json")),
            PathBuf::from("cache/photos.json.lock")
        );
    }
}
