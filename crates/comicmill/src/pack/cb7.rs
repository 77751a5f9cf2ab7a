use std::fs::File;
use std::path::{Path, PathBuf};

use sevenz_rust::{AesEncoderOptions, SevenZArchiveEntry, SevenZWriter};

use crate::error::PackagingError;
use crate::pack::page_entry_name;

/// Writes pages into a cb7 (7z) archive. A password enables AES-256
/// content encryption.
pub fn write(
    pages: &[PathBuf],
    target: &Path,
    password: Option<&str>,
) -> Result<(), PackagingError> {
    let archive_err = |reason: String| PackagingError::Archive {
        path: target.to_path_buf(),
        reason,
    };

    let mut writer = SevenZWriter::create(target).map_err(|e| archive_err(e.to_string()))?;
    if let Some(password) = password {
        writer.set_content_methods(vec![
            AesEncoderOptions::new(password.into()).into(),
            sevenz_rust::lzma::LZMA2Options::with_preset(6).into(),
        ]);
    }

    for (index, page) in pages.iter().enumerate() {
        let reader = File::open(page).map_err(|e| PackagingError::Io {
            path: page.clone(),
            source: e,
        })?;
        let entry = SevenZArchiveEntry::from_path(page, page_entry_name(index, page));
        writer
            .push_archive_entry(entry, Some(reader))
            .map_err(|e| archive_err(e.to_string()))?;
    }

    writer.finish().map_err(|e| archive_err(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_archive_with_all_pages() {
        let tmp = TempDir::new().unwrap();
        let pages: Vec<PathBuf> = (0..3)
            .map(|i| {
                let p = tmp.path().join(format!("p{}.jpg", i));
                std::fs::write(&p, format!("page {}", i)).unwrap();
                p
            })
            .collect();

        let target = tmp.path().join("out.cb7");
        write(&pages, &target, None).unwrap();
        assert!(target.exists());

        let extracted = tmp.path().join("x");
        sevenz_rust::decompress_file(&target, &extracted).unwrap();
        assert_eq!(
            std::fs::read(extracted.join("0001.jpg")).unwrap(),
            b"page 1"
        );
    }

    #[test]
    fn test_encrypted_archive_round_trip() {
        let tmp = TempDir::new().unwrap();
        let page = tmp.path().join("p.jpg");
        std::fs::write(&page, b"locked page").unwrap();

        let target = tmp.path().join("locked.cb7");
        write(&[page], &target, Some("hunter2")).unwrap();

        let extracted = tmp.path().join("x");
        sevenz_rust::decompress_file_with_password(&target, &extracted, "hunter2".into())
            .unwrap();
        assert_eq!(
            std::fs::read(extracted.join("0000.jpg")).unwrap(),
            b"locked page"
        );
    }
}
