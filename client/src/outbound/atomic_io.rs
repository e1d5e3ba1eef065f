//! Atomic replacement of small files inside a capability directory.
//!
//! A session slot is rewritten through a hidden temporary file that is
//! renamed over the target, so a concurrent reader sees either the old
//! session or the new one and never a truncated file.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Component, Utf8Path};
use cap_std::fs::{Dir, OpenOptions};

use crate::domain::ports::SessionStoreError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Replace `path` inside `dir` with `contents`.
///
/// `path` must be a bare file name.
///
/// # Errors
///
/// Returns [`SessionStoreError::Io`] if the temporary file cannot be written
/// or renamed into place. The temporary file is removed on failure.
pub(crate) fn write_atomic(
    dir: &Dir,
    path: &Utf8Path,
    contents: &str,
) -> Result<(), SessionStoreError> {
    let mut components = path.components();
    let (Some(Utf8Component::Normal(file_name)), None) = (components.next(), components.next())
    else {
        return Err(SessionStoreError::io(format!(
            "session path {path} must be a bare file name"
        )));
    };
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let tmp_name = format!(".{file_name}.{}.{stamp}.{counter}.tmp", std::process::id());

    write_temp(dir, &tmp_name, contents).map_err(|err| {
        SessionStoreError::io(format!("writing {tmp_name} failed: {err}"))
    })?;
    if let Err(err) = replace(dir, &tmp_name, file_name) {
        drop(dir.remove_file(&tmp_name));
        return Err(SessionStoreError::io(format!(
            "replacing {file_name} failed: {err}"
        )));
    }
    sync_dir(dir);
    Ok(())
}

fn write_temp(dir: &Dir, tmp_name: &str, contents: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir.open_with(tmp_name, &options)?;
    let written = file
        .write_all(contents.as_bytes())
        .and_then(|()| file.sync_all());
    if written.is_err() {
        drop(file);
        drop(dir.remove_file(tmp_name));
    }
    written
}

#[cfg(windows)]
fn replace(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    match dir.remove_file(target_name) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    dir.rename(tmp_name, dir, target_name)
}

#[cfg(not(windows))]
fn replace(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    dir.rename(tmp_name, dir, target_name)
}

fn sync_dir(dir: &Dir) {
    // Best effort.
    drop(dir.open(".").and_then(|handle| handle.sync_all()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_std::ambient_authority;

    fn temp_dir() -> (tempfile::TempDir, Dir) {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = Dir::open_ambient_dir(root.path(), ambient_authority()).expect("open dir");
        (root, dir)
    }

    #[test]
    fn replaces_existing_contents_without_leftovers() {
        let (_root, dir) = temp_dir();
        let path = Utf8Path::new("userToken.json");

        write_atomic(&dir, path, "first").expect("first write");
        write_atomic(&dir, path, "second").expect("second write");

        assert_eq!(dir.read_to_string(path).expect("read"), "second");
        let entries = dir.entries().expect("list").count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn nested_paths_are_refused() {
        let (_root, dir) = temp_dir();

        let err = write_atomic(&dir, Utf8Path::new("nested/userToken.json"), "x")
            .expect_err("nested path");

        assert!(matches!(err, SessionStoreError::Io { .. }));
    }
}
