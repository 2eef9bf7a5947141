//! Mapping remote relative paths onto the local tree.

use std::fs::OpenOptions;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::SessionError;

/// Join a remote relative path (`/`-separated) onto `root`, component by component.
///
/// Rejects absolute paths, `..`, and anything else that is not a plain name, so
/// a listing can never direct a write outside `root`.
pub fn local_path_for(root: &Path, relative: &str) -> Result<PathBuf, SessionError> {
    let invalid = || SessionError::InvalidPath(relative.to_string());
    if relative.contains('\0') {
        return Err(invalid());
    }
    let mut out = root.to_path_buf();
    let mut pushed = false;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                out.push(name);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid())
            }
        }
    }
    if !pushed {
        return Err(invalid());
    }
    Ok(out)
}

/// Claim `path`, or the first free `stem_N.ext` (N from 1), by creating an
/// empty file there with `create_new`. The caller owns the returned name and
/// replaces the placeholder with the finished file.
pub fn claim_unique_path(path: &Path) -> io::Result<PathBuf> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut candidate = path.to_path_buf();
    let mut n = 1u32;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
        let name = match &ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        candidate = parent.join(name);
        n += 1;
    }
}

/// Temporary sibling used while a transfer is in flight: `file.csv` → `file.csv.part`.
pub(super) fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}
