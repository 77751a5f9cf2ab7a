use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The container kind of one queued input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Zip,
    Rar,
    Pdf,
    Epub,
    Folder,
}

impl SourceKind {
    /// Detects the kind from a path: directories are folders, files are
    /// classified by extension (cbz/zip, cbr/rar, pdf, epub).
    pub fn detect(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return Some(SourceKind::Folder);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "cbz" | "zip" => Some(SourceKind::Zip),
            "cbr" | "rar" => Some(SourceKind::Rar),
            "pdf" => Some(SourceKind::Pdf),
            "epub" => Some(SourceKind::Epub),
            _ => None,
        }
    }
}

/// One input unit of a conversion queue. Immutable once enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComicSource {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// Folder sources only: include images in subfolders.
    pub recursive: bool,
}

impl ComicSource {
    pub fn new(path: PathBuf, kind: SourceKind) -> Self {
        Self {
            path,
            kind,
            recursive: false,
        }
    }

    /// Builds a source by detecting the kind from the path.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let kind = SourceKind::detect(&path)?;
        Some(Self::new(path, kind))
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// The base name outputs derive their filename from.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("comic")
            .to_string()
    }
}

/// One page within a [`ComicSource`].
///
/// `ordinal` is a dense 0..N-1 index assigned at listing time and defines
/// the page order. `local_path` is the entry name inside the container (or
/// the filesystem path for folder sources). `extracted_path` is set once the
/// page has been materialized on disk.
#[derive(Debug, Clone)]
pub struct PageEntry {
    pub ordinal: usize,
    pub local_path: String,
    pub extracted_path: Option<PathBuf>,
}

impl PageEntry {
    pub fn new(ordinal: usize, local_path: String) -> Self {
        Self {
            ordinal,
            local_path,
            extracted_path: None,
        }
    }
}
