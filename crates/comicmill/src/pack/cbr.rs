use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::PackagingError;

/// Writes pages into a cbr archive via the external `rar` tool.
///
/// There is no library route for writing rar; this is gated on the tool
/// being installed, and its absence is a packaging error for this format
/// only. `-ep` flattens entry names so the archive lists bare filenames.
pub fn write(
    pages: &[PathBuf],
    target: &Path,
    password: Option<&str>,
) -> Result<(), PackagingError> {
    let mut cmd = Command::new("rar");
    cmd.arg("a").arg("-ep").arg("-idq");
    if let Some(password) = password {
        cmd.arg(format!("-hp{}", password));
    }
    cmd.arg(target);
    for page in pages {
        cmd.arg(page);
    }

    let output = cmd.output().map_err(|e| {
        PackagingError::RarToolUnavailable(format!("failed to run 'rar': {}", e))
    })?;

    if !output.status.success() {
        return Err(PackagingError::Archive {
            path: target.to_path_buf(),
            reason: format!(
                "rar exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(())
}
