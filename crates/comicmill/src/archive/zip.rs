use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::archive::{has_image_extension, natural_cmp, ArchiveReader};
use crate::error::ExtractError;
use crate::source::PageEntry;

/// Reads cbz/zip containers. Pages are listed straight from the central
/// directory and decompressed one entry at a time; the archive is never
/// extracted in full.
#[derive(Debug)]
pub struct ZipReader {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl ZipReader {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = File::open(path).map_err(|e| ExtractError::OpenContainer {
            path: path.to_path_buf(),
            source: e,
        })?;
        let archive = ZipArchive::new(file).map_err(|e| map_zip_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }
}

impl ArchiveReader for ZipReader {
    fn list_pages(&mut self) -> Result<Vec<PageEntry>, ExtractError> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| has_image_extension(Path::new(name)))
            .map(String::from)
            .collect();

        if names.is_empty() {
            return Err(ExtractError::EmptySource {
                path: self.path.clone(),
            });
        }

        // Natural filename order, not the container's physical order.
        names.sort_by(|a, b| natural_cmp(a, b));

        Ok(names
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| PageEntry::new(ordinal, name))
            .collect())
    }

    fn read_page(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ExtractError> {
        let mut file = self
            .archive
            .by_name(&entry.local_path)
            .map_err(|e| map_zip_error(&self.path, e))?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| ExtractError::ReadEntry {
                entry: entry.local_path.clone(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }
}

fn map_zip_error(path: &Path, err: ZipError) -> ExtractError {
    match err {
        ZipError::UnsupportedArchive(msg) if msg.contains("Password") => {
            ExtractError::PasswordProtected {
                path: path.to_path_buf(),
            }
        }
        ZipError::Io(source) => ExtractError::OpenContainer {
            path: path.to_path_buf(),
            source,
        },
        other => ExtractError::Corrupt {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}
