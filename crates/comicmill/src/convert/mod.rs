pub mod options;
pub mod progress;
mod runner;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::ConverterConfig;
use crate::error::{ComicmillError, Result};
use crate::export::{ExportRequest, ExportResponse, PageExportWorker};
use crate::source::ComicSource;

pub use options::{ImageFormatParams, OutputFormat, OutputImageFormat, OutputOptions};
pub use progress::{BroadcastReporter, NoopReporter, ProgressEvent, ProgressReporter};
pub use runner::ConversionJob;

/// Cooperative cancellation token threaded through every suspend point.
/// Checked at per-source and per-page granularity, never mid-operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Outcome of one source within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutcome {
    Done,
    Error,
    Canceled,
}

/// Summary of a finished (or canceled) job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub files_total: usize,
    pub files_attempted: usize,
    pub error_count: usize,
    pub was_canceled: bool,
}

impl ConversionResult {
    pub fn files_succeeded(&self) -> usize {
        self.files_attempted - self.error_count
    }

    pub fn files_skipped(&self) -> usize {
        self.files_total - self.files_attempted
    }
}

/// Facade over the batch machinery: one job at a time, cooperative
/// cancellation, and one-off page exports outside a batch.
pub struct Converter {
    config: ConverterConfig,
    running: Arc<AtomicBool>,
    cancel: CancelToken,
    export_worker: Mutex<Option<PageExportWorker>>,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancelToken::new(),
            export_worker: Mutex::new(None),
        }
    }

    /// A clone of the job-scoped cancel token, for wiring into UIs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs a batch to completion on the calling thread.
    ///
    /// Fails before any I/O when the queue is empty or the output folder is
    /// unset, and refuses to start while another job is running (the
    /// workspace is exclusively owned by the running job).
    pub fn start_job(
        &self,
        sources: Vec<ComicSource>,
        options: OutputOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<ConversionResult> {
        if sources.is_empty() {
            return Err(ComicmillError::EmptyQueue);
        }
        if options.output_folder.as_os_str().is_empty() {
            return Err(ComicmillError::MissingOutputFolder);
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ComicmillError::JobAlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        self.cancel.reset();
        let temp_parent = self.temp_parent();
        let job = ConversionJob::new(
            sources,
            options,
            self.config.pdf_extraction.clone(),
            self.cancel.clone(),
        );
        job.run(temp_parent.as_deref(), reporter)
    }

    /// Requests cancellation of the running job. Idempotent; a no-op when
    /// nothing is running.
    pub fn cancel_job(&self) {
        if self.running.load(Ordering::SeqCst) {
            self.cancel.cancel();
        }
    }

    /// Exports one page of one source to `output_folder` through the
    /// isolated worker, outside any batch job.
    pub fn export_single_page(
        &self,
        source: ComicSource,
        page_index: usize,
        output_folder: PathBuf,
    ) -> Result<PathBuf> {
        let mut slot = self
            .export_worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            *slot = Some(PageExportWorker::spawn()?);
        }
        let worker = slot.as_mut().expect("worker just spawned");

        let response = worker.export(ExportRequest {
            source,
            page_index,
            page_local_path: None,
            output_folder,
        });
        match response {
            ExportResponse::Ok { output_path } => Ok(output_path),
            ExportResponse::Err { message } => Err(ComicmillError::ExportFailed(message)),
        }
    }

    fn temp_parent(&self) -> Option<PathBuf> {
        self.config.temp_folder_path.clone()
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::progress::NoopReporter;
    use crate::source::SourceKind;

    #[test]
    fn test_empty_queue_rejected_before_io() {
        let converter = Converter::new(ConverterConfig::default());
        let options = OutputOptions::new(PathBuf::from("/tmp/out"), OutputFormat::Cbz);
        let err = converter
            .start_job(Vec::new(), options, &NoopReporter)
            .unwrap_err();
        assert!(matches!(err, ComicmillError::EmptyQueue));
    }

    #[test]
    fn test_missing_output_folder_rejected_before_io() {
        let converter = Converter::new(ConverterConfig::default());
        let options = OutputOptions::new(PathBuf::new(), OutputFormat::Cbz);
        let sources = vec![ComicSource::new(
            PathBuf::from("/x/a.cbz"),
            SourceKind::Zip,
        )];
        let err = converter
            .start_job(sources, options, &NoopReporter)
            .unwrap_err();
        assert!(matches!(err, ComicmillError::MissingOutputFolder));
    }

    #[test]
    fn test_cancel_without_running_job_is_noop() {
        let converter = Converter::new(ConverterConfig::default());
        converter.cancel_job();
        assert!(!converter.cancel.is_canceled());
        converter.cancel_job();
        assert!(!converter.cancel.is_canceled());
    }

    #[test]
    fn test_result_summary_counts() {
        let result = ConversionResult {
            files_total: 5,
            files_attempted: 4,
            error_count: 1,
            was_canceled: true,
        };
        assert_eq!(result.files_succeeded(), 3);
        assert_eq!(result.files_skipped(), 1);
    }

    #[test]
    fn test_cancel_token_round_trip() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_canceled());
        token.reset();
        assert!(!token.is_canceled());
    }
}
