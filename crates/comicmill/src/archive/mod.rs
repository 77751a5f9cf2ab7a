pub mod epub;
pub mod folder;
pub mod pdf;
pub mod rar;
pub mod zip;

use std::cmp::Ordering;
use std::path::Path;

use crate::config::PdfExtraction;
use crate::error::ExtractError;
use crate::source::{ComicSource, PageEntry, SourceKind};
use crate::workspace::TempWorkspace;

/// Raster formats recognized as comic pages.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "avif"];

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Uniform page access over all supported container kinds.
///
/// `list_pages` returns entries with dense 0..N-1 ordinals in the order the
/// output must preserve; `read_page` materializes one page's raw bytes.
pub trait ArchiveReader: Send {
    fn list_pages(&mut self) -> Result<Vec<PageEntry>, ExtractError>;
    fn read_page(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ExtractError>;
}

/// Opens the reader matching the source kind. `workspace` provides scratch
/// space for kinds that need full extraction (rar) or page rendering (pdf).
pub fn open_source(
    source: &ComicSource,
    workspace: &TempWorkspace,
    pdf_opts: &PdfExtraction,
) -> Result<Box<dyn ArchiveReader>, ExtractError> {
    match source.kind {
        SourceKind::Zip => Ok(Box::new(zip::ZipReader::open(&source.path)?)),
        SourceKind::Rar => Ok(Box::new(rar::RarReader::new(
            source.path.clone(),
            workspace,
        )?)),
        SourceKind::Pdf => Ok(Box::new(pdf::PdfReader::open(
            source.path.clone(),
            workspace,
            pdf_opts.clone(),
        )?)),
        SourceKind::Epub => Ok(Box::new(epub::EpubReader::open(&source.path)?)),
        SourceKind::Folder => Ok(Box::new(folder::FolderReader::new(
            source.path.clone(),
            source.recursive,
        ))),
    }
}

/// Digit-aware, case-insensitive ordering so that `page2` sorts before
/// `page10`. This is the canonical page order for zip entries and folder
/// trees.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ai);
                    let nb = take_number(&mut bi);
                    match na.cmp(&nb) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    let la = ca.to_ascii_lowercase();
                    let lb = cb.to_ascii_lowercase();
                    match la.cmp(&lb) {
                        Ordering::Equal => {
                            ai.next();
                            bi.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = iter.peek().copied() {
        if let Some(d) = c.to_digit(10) {
            value = value.saturating_mul(10).saturating_add(d as u64);
            iter.next();
        } else {
            break;
        }
    }
    value
}
