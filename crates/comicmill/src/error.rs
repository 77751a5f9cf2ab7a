use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComicmillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("A conversion job is already running")]
    JobAlreadyRunning,

    #[error("Page export failed: {0}")]
    ExportFailed(String),

    #[error("No input sources were queued")]
    EmptyQueue,

    #[error("Output folder is not set")]
    MissingOutputFolder,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Failures while staging work in the scratch directory. Fatal to a job:
/// without a workspace there is no safe place to extract into.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create workspace directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to delete '{path}': not under the temp root '{guard}'")]
    OutsideTempRoot { path: PathBuf, guard: PathBuf },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-source failures from the archive layer. Never fatal to a batch; the
/// orchestrator records them and moves on to the next source.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to open container '{path}': {source}")]
    OpenContainer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Container '{path}' is corrupt or unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Container '{path}' is password-protected")]
    PasswordProtected { path: PathBuf },

    #[error("No image pages found in '{path}'")]
    EmptySource { path: PathBuf },

    #[error("Failed to read page '{entry}': {reason}")]
    ReadEntry { entry: String, reason: String },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("EPUB extraction failed: {0}")]
    Epub(String),

    #[error("RAR extraction failed: {0}")]
    Rar(String),
}

/// Per-page resize/re-encode failures. They accumulate into the owning
/// source's error outcome rather than aborting the batch.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to decode image '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to encode image '{path}': {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Failed to write archive '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Failed to assemble PDF '{path}': {reason}")]
    Pdf { path: PathBuf, reason: String },

    #[error("Failed to assemble EPUB '{path}': {reason}")]
    Epub { path: PathBuf, reason: String },

    #[error("Output format '{format}' does not support password protection")]
    PasswordUnsupported { format: String },

    #[error("The external 'rar' tool is required for cbr output: {0}")]
    RarToolUnavailable(String),

    #[error("No pages to package for '{path}'")]
    NoPages { path: PathBuf },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the isolated page-export worker. Normalized to an error
/// response at the call boundary; a crashed worker never unwinds the host.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn export worker: {0}")]
    SpawnFailed(String),

    #[error("Export worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Export worker crashed: {0}")]
    Crashed(String),
}

pub type Result<T> = std::result::Result<T, ComicmillError>;
