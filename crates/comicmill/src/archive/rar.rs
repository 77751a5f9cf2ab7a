use std::path::PathBuf;

use log::debug;
use unrar::Archive;

use crate::archive::folder::ordered_image_walk;
use crate::archive::ArchiveReader;
use crate::error::ExtractError;
use crate::source::PageEntry;

/// Reads cbr/rar containers.
///
/// Rar offers no practical single-entry random access, so the first listing
/// extracts the whole archive into a workspace subdirectory and every page
/// read afterwards is a plain file read from the extracted tree. The
/// extracted tree is walked with the same ordering as folder sources.
pub struct RarReader {
    path: PathBuf,
    scratch: PathBuf,
    extracted: bool,
}

impl RarReader {
    pub fn new(
        path: PathBuf,
        workspace: &crate::workspace::TempWorkspace,
    ) -> Result<Self, ExtractError> {
        let scratch = workspace
            .subdir("rar")
            .map_err(|e| ExtractError::Rar(e.to_string()))?;
        Ok(Self {
            path,
            scratch,
            extracted: false,
        })
    }

    fn extract_all(&mut self) -> Result<(), ExtractError> {
        if self.extracted {
            return Ok(());
        }

        let mut archive = Archive::new(&self.path)
            .open_for_processing()
            .map_err(|e| map_rar_error(e))?;

        loop {
            let header = match archive.read_header().map_err(|e| map_rar_error(e))? {
                Some(header) => header,
                None => break,
            };
            archive = if header.entry().is_file() {
                header
                    .extract_with_base(&self.scratch)
                    .map_err(|e| map_rar_error(e))?
            } else {
                header.skip().map_err(|e| map_rar_error(e))?
            };
        }

        debug!(
            "rar extracted: {} -> {}",
            self.path.display(),
            self.scratch.display()
        );
        self.extracted = true;
        Ok(())
    }
}

impl ArchiveReader for RarReader {
    fn list_pages(&mut self) -> Result<Vec<PageEntry>, ExtractError> {
        self.extract_all()?;

        let files = ordered_image_walk(&self.scratch, true);
        if files.is_empty() {
            return Err(ExtractError::EmptySource {
                path: self.path.clone(),
            });
        }

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(ordinal, path)| {
                let local = path
                    .strip_prefix(&self.scratch)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .into_owned();
                let mut entry = PageEntry::new(ordinal, local);
                entry.extracted_path = Some(path);
                entry
            })
            .collect())
    }

    fn read_page(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ExtractError> {
        self.extract_all()?;
        let path = match &entry.extracted_path {
            Some(path) => path.clone(),
            None => self.scratch.join(&entry.local_path),
        };
        std::fs::read(&path).map_err(|e| ExtractError::ReadEntry {
            entry: entry.local_path.clone(),
            reason: e.to_string(),
        })
    }
}

fn map_rar_error(err: unrar::error::UnrarError) -> ExtractError {
    let message = err.to_string();
    if message.to_ascii_lowercase().contains("password") {
        ExtractError::Rar(format!("archive is password-protected: {}", message))
    } else {
        ExtractError::Rar(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::TempWorkspace;
    use tempfile::TempDir;

    #[test]
    fn test_garbage_file_is_rejected() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::create(Some(parent.path())).unwrap();

        let bogus = parent.path().join("fake.cbr");
        std::fs::write(&bogus, b"definitely not a rar archive").unwrap();

        let mut reader = RarReader::new(bogus, &ws).unwrap();
        assert!(reader.list_pages().is_err());
    }

    #[test]
    fn test_scratch_lives_inside_workspace() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::create(Some(parent.path())).unwrap();
        let reader = RarReader::new(parent.path().join("a.cbr"), &ws).unwrap();
        assert!(reader.scratch.starts_with(ws.root()));
    }
}
