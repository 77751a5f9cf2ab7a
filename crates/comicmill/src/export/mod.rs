pub mod sniff;

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::archive::open_source;
use crate::config::PdfExtraction;
use crate::error::WorkerError;
use crate::naming::create_unique;
use crate::source::{ComicSource, PageEntry};
use crate::workspace::TempWorkspace;

/// One page-export request. Exactly one request is in flight per worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub source: ComicSource,
    pub page_index: usize,
    /// Entry name inside the container, when the caller already listed the
    /// source; the worker lists it itself otherwise.
    pub page_local_path: Option<String>,
    pub output_folder: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "ok")]
pub enum ExportResponse {
    #[serde(rename = "true")]
    Ok { output_path: PathBuf },
    #[serde(rename = "false")]
    Err { message: String },
}

/// Host side of the isolated page exporter.
///
/// Decoding runs on a dedicated worker thread behind a pair of bounded
/// channels, so a decoder panic is contained there instead of unwinding the
/// orchestrating thread. The host blocks on the single pending response; a
/// dead worker surfaces as an error response and a fresh worker is spawned
/// for the next request (supervised restart, no automatic retry of the
/// failed request).
pub struct PageExportWorker {
    request_tx: Sender<ExportRequest>,
    response_rx: Receiver<ExportResponse>,
    handle: Option<JoinHandle<()>>,
}

impl PageExportWorker {
    pub fn spawn() -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = bounded::<ExportRequest>(1);
        let (response_tx, response_rx) = bounded::<ExportResponse>(1);

        let handle = std::thread::Builder::new()
            .name("page-export".to_string())
            .spawn(move || run_worker(request_rx, response_tx))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        debug!("page export worker started");
        Ok(Self {
            request_tx,
            response_rx,
            handle: Some(handle),
        })
    }

    /// Sends one request and blocks for its response.
    pub fn export(&mut self, request: ExportRequest) -> ExportResponse {
        if self.request_tx.send(request).is_err() {
            return self.handle_crash(WorkerError::ChannelClosed);
        }
        match self.response_rx.recv() {
            Ok(response) => response,
            Err(_) => self.handle_crash(WorkerError::Crashed(
                "worker exited without responding".to_string(),
            )),
        }
    }

    fn handle_crash(&mut self, cause: WorkerError) -> ExportResponse {
        error!("page export worker failed: {}", cause);
        match Self::spawn() {
            Ok(fresh) => *self = fresh,
            Err(e) => warn!("could not respawn page export worker: {}", e),
        }
        ExportResponse::Err {
            message: cause.to_string(),
        }
    }
}

impl Drop for PageExportWorker {
    fn drop(&mut self) {
        // Disconnecting the request channel stops the worker loop.
        let (dead_tx, _) = bounded::<ExportRequest>(0);
        self.request_tx = dead_tx;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(request_rx: Receiver<ExportRequest>, response_tx: Sender<ExportResponse>) {
    while let Ok(request) = request_rx.recv() {
        let outcome = catch_unwind(AssertUnwindSafe(|| export_page(&request)));
        let response = match outcome {
            Ok(Ok(output_path)) => ExportResponse::Ok { output_path },
            Ok(Err(message)) => ExportResponse::Err { message },
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "decoder panicked".to_string());
                ExportResponse::Err {
                    message: format!("page decode panicked: {}", message),
                }
            }
        };
        if response_tx.send(response).is_err() {
            break;
        }
    }
    debug!("page export worker stopped");
}

/// Worker body: pull one page's bytes, sniff the real format, write it under
/// a collision-free name.
fn export_page(request: &ExportRequest) -> Result<PathBuf, String> {
    let workspace = TempWorkspace::create(None).map_err(|e| e.to_string())?;
    let mut reader = open_source(&request.source, &workspace, &PdfExtraction::default())
        .map_err(|e| e.to_string())?;

    let entry = match &request.page_local_path {
        Some(local) => PageEntry::new(request.page_index, local.clone()),
        None => {
            let pages = reader.list_pages().map_err(|e| e.to_string())?;
            pages
                .get(request.page_index)
                .cloned()
                .ok_or_else(|| format!("page index {} out of range", request.page_index))?
        }
    };

    let bytes = reader.read_page(&entry).map_err(|e| e.to_string())?;
    if bytes.is_empty() {
        return Err("page decoded to an empty buffer".to_string());
    }

    // Trust the bytes, not the container's claimed extension.
    let extension = sniff::sniff_image_extension(&bytes).unwrap_or("jpg");
    let stem = format!("{}_page_{}", request.source.stem(), request.page_index + 1);

    let (mut file, output_path) = create_unique(&request.output_folder, &stem, extension)
        .map_err(|e| format!("cannot create output file: {}", e))?;
    file.write_all(&bytes)
        .map_err(|e| format!("cannot write output file: {}", e))?;

    workspace.cleanup().map_err(|e| e.to_string())?;
    Ok(output_path)
}
