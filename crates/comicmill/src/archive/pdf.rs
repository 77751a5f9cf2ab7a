use std::path::{Path, PathBuf};
use std::process::Command;

use crate::archive::ArchiveReader;
use crate::config::{PdfExtraction, PdfExtractionMethod};
use crate::error::ExtractError;
use crate::source::PageEntry;
use crate::workspace::TempWorkspace;

/// Reads pdf documents as page sequences.
///
/// Rendering is inherently per-page, so listing only establishes the page
/// count and `read_page` rasterizes (or pulls the embedded image of) one
/// page on demand via poppler-utils, the same tools the rest of the
/// pipeline shells out to.
pub struct PdfReader {
    path: PathBuf,
    scratch: PathBuf,
    opts: PdfExtraction,
}

impl PdfReader {
    pub fn open(
        path: PathBuf,
        workspace: &TempWorkspace,
        opts: PdfExtraction,
    ) -> Result<Self, ExtractError> {
        let scratch = workspace
            .subdir("pdf")
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;
        Ok(Self {
            path,
            scratch,
            opts,
        })
    }

    fn page_count(&self) -> Result<usize, ExtractError> {
        match lopdf::Document::load(&self.path) {
            Ok(doc) => Ok(doc.get_pages().len()),
            Err(e) => {
                // lopdf can't parse some real-world PDFs (e.g. broken xref
                // tables); pdfinfo handles more variants.
                tracing::warn!(
                    "lopdf failed to parse {}: {}. Falling back to pdfinfo.",
                    self.path.display(),
                    e
                );
                count_pages_with_pdfinfo(&self.path)
            }
        }
    }
}

impl ArchiveReader for PdfReader {
    fn list_pages(&mut self) -> Result<Vec<PageEntry>, ExtractError> {
        if !self.path.is_file() {
            return Err(ExtractError::OpenContainer {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }

        let count = self.page_count()?;
        if count == 0 {
            return Err(ExtractError::EmptySource {
                path: self.path.clone(),
            });
        }

        Ok((0..count)
            .map(|ordinal| PageEntry::new(ordinal, format!("page-{}", ordinal + 1)))
            .collect())
    }

    fn read_page(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ExtractError> {
        let page_num = entry.ordinal as u32 + 1;
        match self.opts.method {
            PdfExtractionMethod::Render => {
                render_page(&self.path, &self.scratch, page_num, self.opts.dpi)
            }
            PdfExtractionMethod::Embedded => {
                extract_embedded_image(&self.path, &self.scratch, page_num)
            }
        }
    }
}

fn count_pages_with_pdfinfo(path: &Path) -> Result<usize, ExtractError> {
    let output = Command::new("pdfinfo").arg(path).output().map_err(|e| {
        ExtractError::Pdf(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ExtractError::Corrupt {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(count_str) = line.strip_prefix("Pages:") {
            if let Ok(count) = count_str.trim().parse::<usize>() {
                return Ok(count);
            }
        }
    }

    Err(ExtractError::Pdf(format!(
        "pdfinfo reported no page count for {}",
        path.display()
    )))
}

/// Rasterizes one page with `pdftoppm` and returns the PNG bytes.
fn render_page(
    path: &Path,
    scratch: &Path,
    page_num: u32,
    dpi: u32,
) -> Result<Vec<u8>, ExtractError> {
    let prefix = scratch.join(format!("render-{}", uuid::Uuid::new_v4()));

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
        ])
        .arg(path)
        .arg(&prefix)
        .output()
        .map_err(|e| {
            ExtractError::Pdf(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(ExtractError::Pdf(format!(
            "pdftoppm failed on page {}: {}",
            page_num,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm zero-pads the page suffix depending on the total page count.
    let candidates = [
        format!("{}-{}.png", prefix.display(), page_num),
        format!("{}-{:02}.png", prefix.display(), page_num),
        format!("{}-{:03}.png", prefix.display(), page_num),
    ];
    let rendered = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| {
            ExtractError::Pdf(format!("rendered image for page {} not found", page_num))
        })?;

    let bytes = std::fs::read(rendered).map_err(|e| ExtractError::ReadEntry {
        entry: format!("page-{}", page_num),
        reason: e.to_string(),
    })?;
    let _ = std::fs::remove_file(rendered);
    Ok(bytes)
}

/// Pulls the page's embedded raster out with `pdfimages -all` (no
/// re-rendering, original resolution). Falls back on the first image when a
/// page carries several.
fn extract_embedded_image(
    path: &Path,
    scratch: &Path,
    page_num: u32,
) -> Result<Vec<u8>, ExtractError> {
    let prefix = scratch.join(format!("embed-{}", uuid::Uuid::new_v4()));

    let output = Command::new("pdfimages")
        .args([
            "-all",
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
        ])
        .arg(path)
        .arg(&prefix)
        .output()
        .map_err(|e| {
            ExtractError::Pdf(format!(
                "Failed to run pdfimages: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(ExtractError::Pdf(format!(
            "pdfimages failed on page {}: {}",
            page_num,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdfimages names outputs <prefix>-NNN.<ext>; take the first produced.
    let parent = prefix.parent().unwrap_or(scratch);
    let stem = prefix
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut produced: Vec<PathBuf> = std::fs::read_dir(parent)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(&stem))
                .unwrap_or(false)
        })
        .collect();
    produced.sort();

    let first = produced.first().ok_or_else(|| {
        ExtractError::Pdf(format!("page {} has no embedded image", page_num))
    })?;
    let bytes = std::fs::read(first).map_err(|e| ExtractError::ReadEntry {
        entry: format!("page-{}", page_num),
        reason: e.to_string(),
    })?;
    for p in &produced {
        let _ = std::fs::remove_file(p);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_open_error() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::create(Some(parent.path())).unwrap();
        let mut reader = PdfReader::open(
            PathBuf::from("/nonexistent/book.pdf"),
            &ws,
            PdfExtraction::default(),
        )
        .unwrap();
        assert!(matches!(
            reader.list_pages().unwrap_err(),
            ExtractError::OpenContainer { .. }
        ));
    }

    #[test]
    fn test_page_count_via_lopdf() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::create(Some(parent.path())).unwrap();

        // Minimal two-page document built with lopdf itself.
        let pdf_path = parent.path().join("two-pages.pdf");
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<lopdf::Object> = Vec::new();
        for _ in 0..2 {
            let content_id = doc.add_object(lopdf::Object::Stream(lopdf::Stream::new(
                lopdf::dictionary! {},
                Vec::new(),
            )));
            let page_id = doc.add_object(lopdf::dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            lopdf::Object::Dictionary(lopdf::dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
            }),
        );
        let catalog_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(&pdf_path).unwrap();

        let mut reader =
            PdfReader::open(pdf_path, &ws, PdfExtraction::default()).unwrap();
        let pages = reader.list_pages().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].ordinal, 0);
        assert_eq!(pages[1].ordinal, 1);
        assert_eq!(pages[0].local_path, "page-1");
    }
}
