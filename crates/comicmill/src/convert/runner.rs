use std::path::{Path, PathBuf};

use tracing::{info_span, warn};

use crate::archive::open_source;
use crate::config::PdfExtraction;
use crate::convert::options::{OutputImageFormat, OutputOptions};
use crate::convert::progress::{ProgressEvent, ProgressReporter};
use crate::convert::{CancelToken, ConversionResult, FileOutcome};
use crate::error::ComicmillError;
use crate::export::sniff::sniff_image_extension;
use crate::pack::package_pages;
use crate::source::ComicSource;
use crate::transcode::transcode_page;
use crate::workspace::TempWorkspace;

/// One batch run over an ordered queue of sources.
///
/// Sources are processed strictly in queue order, one page at a time. A
/// source that fails is recorded and the batch moves on; only a workspace
/// failure aborts the job. The cancel token is polled before each source
/// and before each page, never mid-operation, and the workspace is cleaned
/// up at every terminal state.
pub struct ConversionJob {
    sources: Vec<ComicSource>,
    options: OutputOptions,
    pdf_extraction: PdfExtraction,
    cancel: CancelToken,
}

enum SourceRun {
    /// All pages staged (and, in convert mode, packaged).
    Completed { pages: Vec<PathBuf> },
    Canceled,
}

impl ConversionJob {
    pub fn new(
        sources: Vec<ComicSource>,
        options: OutputOptions,
        pdf_extraction: PdfExtraction,
        cancel: CancelToken,
    ) -> Self {
        Self {
            sources,
            options,
            pdf_extraction,
            cancel,
        }
    }

    /// Drives the job to a terminal state and returns its result summary.
    pub fn run(
        self,
        temp_parent: Option<&Path>,
        reporter: &dyn ProgressReporter,
    ) -> Result<ConversionResult, ComicmillError> {
        let workspace = TempWorkspace::create(temp_parent)?;
        let total = self.sources.len();
        let merged_mode = self.options.base_name.is_some();

        let mut result = ConversionResult {
            files_total: total,
            files_attempted: 0,
            error_count: 0,
            was_canceled: false,
        };
        let mut merged_pages: Vec<PathBuf> = Vec::new();

        for (index, source) in self.sources.iter().enumerate() {
            if self.cancel.is_canceled() {
                result.was_canceled = true;
                break;
            }

            reporter.report(ProgressEvent::FileStarted {
                index: index + 1,
                total,
            });
            reporter.report(ProgressEvent::Info(format!(
                "Converting file {} of {}...",
                index + 1,
                total
            )));

            let _span = info_span!("source", path = %source.path.display()).entered();
            match self.process_source(source, &workspace, reporter) {
                Ok(SourceRun::Completed { pages }) => {
                    result.files_attempted += 1;
                    if merged_mode {
                        merged_pages.extend(pages);
                        // Packaging happens once, after the last source.
                    }
                    reporter.report(ProgressEvent::FileFinished {
                        outcome: FileOutcome::Done,
                    });
                }
                Ok(SourceRun::Canceled) => {
                    result.was_canceled = true;
                    reporter.report(ProgressEvent::FileFinished {
                        outcome: FileOutcome::Canceled,
                    });
                    break;
                }
                Err(error) => {
                    // No safe place to stage work: abort the whole job.
                    if matches!(error, ComicmillError::Workspace(_)) {
                        return Err(error);
                    }
                    warn!("source failed: {}", error);
                    result.files_attempted += 1;
                    result.error_count += 1;
                    reporter.report(ProgressEvent::Log(error.to_string()));
                    reporter.report(ProgressEvent::FileFinished {
                        outcome: FileOutcome::Error,
                    });
                }
            }
        }

        if merged_mode && !result.was_canceled && !merged_pages.is_empty() {
            let base = self.options.base_name.clone().unwrap_or_default();
            let mut pages = merged_pages;
            if self.options.reverse_page_order {
                pages.reverse();
            }
            reporter.report(ProgressEvent::Log(format!("packaging: {}", base)));
            if let Err(error) = package_pages(&pages, &base, &self.options) {
                warn!("packaging failed: {}", error);
                result.error_count += 1;
                reporter.report(ProgressEvent::Log(error.to_string()));
            }
        }

        workspace.cleanup()?;
        reporter.report(ProgressEvent::JobFinished {
            result: result.clone(),
        });
        Ok(result)
    }

    /// Runs one source through LISTING -> EXTRACTING -> [transcode] ->
    /// PACKAGING. Per-source failures bubble up as errors; cancellation
    /// short-circuits between pages.
    fn process_source(
        &self,
        source: &ComicSource,
        workspace: &TempWorkspace,
        reporter: &dyn ProgressReporter,
    ) -> Result<SourceRun, ComicmillError> {
        // LISTING
        reporter.report(ProgressEvent::Log(format!(
            "opening: {}",
            source.path.display()
        )));
        let mut reader = open_source(source, workspace, &self.pdf_extraction)?;
        let entries = reader.list_pages()?;

        // EXTRACTING_PAGES
        let page_dir = workspace.subdir("pages")?;
        let mut pages: Vec<PathBuf> = Vec::with_capacity(entries.len());
        for entry in &entries {
            if self.cancel.is_canceled() {
                return Ok(SourceRun::Canceled);
            }
            let bytes = reader.read_page(entry)?;
            let extension = sniff_image_extension(&bytes)
                .or_else(|| {
                    Path::new(&entry.local_path)
                        .extension()
                        .and_then(|e| e.to_str())
                })
                .unwrap_or("jpg");
            let path = page_dir.join(format!("page_{:04}.{}", entry.ordinal, extension));
            std::fs::write(&path, &bytes).map_err(|e| {
                ComicmillError::Extract(crate::error::ExtractError::ReadEntry {
                    entry: entry.local_path.clone(),
                    reason: e.to_string(),
                })
            })?;
            pages.push(path);
        }
        reporter.report(ProgressEvent::Log(format!(
            "extracted {} pages",
            pages.len()
        )));

        // RESIZING / ENCODING
        if self.options.needs_transcode() {
            let transcode_dir = workspace.subdir("encoded")?;
            let mut encoded = Vec::with_capacity(pages.len());
            for (ordinal, page) in pages.iter().enumerate() {
                if self.cancel.is_canceled() {
                    return Ok(SourceRun::Canceled);
                }
                let format = self
                    .options
                    .image_format
                    .unwrap_or_else(|| native_format(page));
                let stem = format!("page_{:04}", ordinal);
                let output = transcode_page(
                    page,
                    &transcode_dir,
                    &stem,
                    format,
                    self.options.image_scale,
                    &self.options.image_params,
                    workspace,
                )?;
                encoded.push(output);
            }
            pages = encoded;
        }

        // In merged (creation) mode packaging is deferred to the caller.
        if self.options.base_name.is_some() {
            return Ok(SourceRun::Completed { pages });
        }

        // PACKAGING
        if self.cancel.is_canceled() {
            return Ok(SourceRun::Canceled);
        }
        if self.options.reverse_page_order {
            pages.reverse();
        }
        let base = source.stem();
        reporter.report(ProgressEvent::Log(format!("packaging: {}", base)));
        let outputs = package_pages(&pages, &base, &self.options)?;
        for output in &outputs {
            reporter.report(ProgressEvent::Log(format!(
                "created: {}",
                output.display()
            )));
        }

        Ok(SourceRun::Completed { pages })
    }
}

/// Keep-format transcodes (scale-only) re-encode each page in its own
/// codec; formats without an encoder here fall back to png.
fn native_format(page: &Path) -> OutputImageFormat {
    match page
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => OutputImageFormat::Jpg,
        Some("webp") => OutputImageFormat::Webp,
        Some("avif") => OutputImageFormat::Avif,
        _ => OutputImageFormat::Png,
    }
}
