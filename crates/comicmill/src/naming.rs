use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Filename candidates: `stem.ext`, then `stem(2).ext`, `stem(3).ext`, ...
fn candidate(dir: &Path, stem: &str, ext: &str, counter: u32) -> PathBuf {
    if counter <= 1 {
        dir.join(format!("{}.{}", stem, ext))
    } else {
        dir.join(format!("{}({}).{}", stem, counter, ext))
    }
}

/// Returns the first collision-free path in `dir` for `stem.ext`.
///
/// The check runs against the live filesystem at call time; the output
/// folder is shared with other processes, so callers that can should prefer
/// [`create_unique`], which claims the name atomically.
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut counter = 1;
    loop {
        let path = candidate(dir, stem, ext, counter);
        if std::fs::symlink_metadata(&path).is_err() {
            return path;
        }
        counter += 1;
    }
}

/// Creates and returns the first collision-free file in `dir` for
/// `stem.ext`, using `O_EXCL` so a concurrent writer can never be
/// overwritten; on a lost race the next suffix is tried.
pub fn create_unique(dir: &Path, stem: &str, ext: &str) -> std::io::Result<(File, PathBuf)> {
    let mut counter = 1;
    loop {
        let path = candidate(dir, stem, ext, counter);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
