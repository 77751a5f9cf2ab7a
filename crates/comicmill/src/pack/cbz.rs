use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

use crate::error::PackagingError;
use crate::pack::page_entry_name;

/// Writes pages into a cbz (zip) archive. A password enables AES-256 entry
/// encryption.
pub fn write(
    pages: &[PathBuf],
    target: &Path,
    password: Option<&str>,
) -> Result<(), PackagingError> {
    let archive_err = |reason: String| PackagingError::Archive {
        path: target.to_path_buf(),
        reason,
    };

    let file = File::create(target).map_err(|e| PackagingError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;
    let mut writer = ZipWriter::new(file);

    for (index, page) in pages.iter().enumerate() {
        let mut options = SimpleFileOptions::default()
            // Pages are already compressed image data.
            .compression_method(CompressionMethod::Stored);
        if let Some(password) = password {
            options = options.with_aes_encryption(AesMode::Aes256, password);
        }

        let bytes = std::fs::read(page).map_err(|e| PackagingError::Io {
            path: page.clone(),
            source: e,
        })?;
        writer
            .start_file(page_entry_name(index, page), options)
            .map_err(|e| archive_err(e.to_string()))?;
        writer
            .write_all(&bytes)
            .map_err(|e| archive_err(e.to_string()))?;
    }

    writer.finish().map_err(|e| archive_err(e.to_string()))?;
    Ok(())
}
