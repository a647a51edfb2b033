//! Crash-safe JSON writes.
//!
//! The new content is staged in a temp file beside the destination and
//! renamed over it; the rename is the commit point. The previous file is
//! copied to `<name>.bak` first, so the destination is never missing or
//! partially written at any point. The replacement keeps the destination's
//! permission bits.
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("stage {path}: {source}")]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("back up {path}: {source}")]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("commit {path}: {source}")]
    Commit {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// `<dest>.bak`, next to the destination.
pub fn backup_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".bak");
    dest.with_file_name(name)
}

/// Serialize `value` as pretty JSON and write it to `dest` atomically.
pub fn write_json_atomic<T: Serialize>(dest: &Path, value: &T) -> Result<(), PersistError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Serialize {
        path: dest.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    write_atomic(dest, &bytes)
}

/// Mode of a newly created destination on unix.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Write `bytes` to `dest` atomically, keeping a `.bak` of any prior file.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    sweep_stale_stages(dest);
    let staged = stage(dest, bytes)?;
    commit(staged, dest)
}

fn staging_dir(dest: &Path) -> &Path {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `(prefix, suffix)` of temp files staged for `dest`.
fn staging_affixes(dest: &Path) -> (String, &'static str) {
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    (format!(".{file_name}."), ".tmp")
}

/// Remove temp files left by an earlier writer that was killed before its
/// commit. Failures are logged and otherwise ignored.
fn sweep_stale_stages(dest: &Path) {
    let dir = staging_dir(dest);
    let (prefix, suffix) = staging_affixes(dest);
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(name.starts_with(&prefix) && name.ends_with(suffix)) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "removed stale staged file"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot remove stale staged file")
            }
        }
    }
}

/// Give the staged file the destination's permissions, or the default
/// mode when the destination does not exist yet.
fn match_permissions(staged: &Path, dest: &Path) -> io::Result<()> {
    match fs::metadata(dest) {
        Ok(meta) => fs::set_permissions(staged, meta.permissions()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => set_new_file_mode(staged),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn set_new_file_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn set_new_file_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Write the new content to a temp file in the destination directory.
///
/// Dropping the returned handle without committing removes the temp file.
fn stage(dest: &Path, bytes: &[u8]) -> Result<NamedTempFile, PersistError> {
    let stage_err = |source| PersistError::Stage {
        path: dest.to_path_buf(),
        source,
    };
    let (prefix, suffix) = staging_affixes(dest);
    let mut staged = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(suffix)
        .tempfile_in(staging_dir(dest))
        .map_err(stage_err)?;
    staged.write_all(bytes).map_err(stage_err)?;
    match_permissions(staged.path(), dest).map_err(stage_err)?;
    staged.as_file().sync_all().map_err(stage_err)?;
    Ok(staged)
}

fn commit(staged: NamedTempFile, dest: &Path) -> Result<(), PersistError> {
    if dest.exists() {
        let backup = backup_path(dest);
        // On error `staged` is dropped here and its temp file removed.
        fs::copy(dest, &backup).map_err(|source| PersistError::Backup {
            path: backup.clone(),
            source,
        })?;
    }
    staged.persist(dest).map_err(|err| PersistError::Commit {
        path: dest.to_path_buf(),
        source: err.error,
    })?;
    tracing::debug!(path = %dest.display(), "committed atomic write");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn writes_new_file_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("restaurants.json");
        write_json_atomic(&dest, &json!({"seoul": null})).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(written, json!({"seoul": null}));
        assert!(!backup_path(&dest).exists());
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn overwrite_keeps_previous_content_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("restaurants.json");
        fs::write(&dest, "old").unwrap();
        fs::write(backup_path(&dest), "older").unwrap();

        write_atomic(&dest, b"new").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        assert_eq!(fs::read_to_string(backup_path(&dest)).unwrap(), "old");
        assert_eq!(
            backup_path(&dest).file_name().unwrap(),
            "restaurants.json.bak"
        );
    }

    #[test]
    fn interruption_before_commit_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("restaurants.json");
        fs::write(&dest, "original contents").unwrap();

        let staged = stage(&dest, b"half written replacement").unwrap();
        assert_eq!(leftover_temp_files(dir.path()).len(), 1);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "original contents");
        drop(staged);

        assert_eq!(fs::read_to_string(&dest).unwrap(), "original contents");
        assert!(leftover_temp_files(dir.path()).is_empty());
        assert!(!backup_path(&dest).exists());
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn replacement_keeps_destination_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("restaurants.json");
        fs::write(&dest, "old").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o644)).unwrap();

        write_atomic(&dest, b"new").unwrap();
        assert_eq!(mode(&dest), 0o644);

        fs::set_permissions(&dest, fs::Permissions::from_mode(0o640)).unwrap();
        write_atomic(&dest, b"newer").unwrap();
        assert_eq!(mode(&dest), 0o640);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "newer");
    }

    #[cfg(unix)]
    #[test]
    fn new_destination_is_world_readable() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("merged.json");
        write_atomic(&dest, b"{}").unwrap();
        assert_eq!(mode(&dest), NEW_FILE_MODE);
    }

    #[test]
    fn stale_staged_files_are_swept() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("restaurants.json");
        let stale = dir.path().join(".restaurants.json.a1B2c3.tmp");
        let other = dir.path().join(".other.json.a1B2c3.tmp");
        fs::write(&stale, "partial").unwrap();
        fs::write(&other, "partial").unwrap();

        write_atomic(&dest, b"data").unwrap();

        assert!(!stale.exists());
        assert!(other.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "data");
    }

    #[test]
    fn failed_write_surfaces_error_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let missing_dir = dir.path().join("does-not-exist");
        let dest = missing_dir.join("restaurants.json");

        let err = write_atomic(&dest, b"data").unwrap_err();

        assert!(matches!(err, PersistError::Stage { .. }));
        assert!(!dest.exists());
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn failed_commit_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the destination cannot be replaced by a file rename.
        let dest = dir.path().join("restaurants.json");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep"), "x").unwrap();

        let err = write_atomic(&dest, b"data").unwrap_err();

        assert!(matches!(
            err,
            PersistError::Backup { .. } | PersistError::Commit { .. }
        ));
        assert!(dest.join("keep").is_file());
        assert!(leftover_temp_files(dir.path()).is_empty());
    }
}
