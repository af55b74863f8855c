//! Capability-based filesystem checks for datastore paths.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};

/// Open the directory containing `path` and return it with the file name.
///
/// A bare file name resolves against the current directory.
fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, &str)> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("datastore path should name a file"))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Whether `path` exists and is a regular file.
///
/// A missing file or parent directory surfaces as [`io::ErrorKind::NotFound`].
pub(crate) fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name).map(|meta| meta.is_file())
}
