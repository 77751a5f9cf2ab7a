pub mod archive;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod naming;
pub mod pack;
pub mod source;
pub mod transcode;
pub mod workspace;

pub use config::{load_config, ConverterConfig, PdfExtraction, PdfExtractionMethod};
pub use convert::{
    CancelToken, ConversionJob, ConversionResult, Converter, FileOutcome, ImageFormatParams,
    NoopReporter, OutputFormat, OutputImageFormat, OutputOptions, ProgressEvent,
    ProgressReporter,
};
pub use error::{
    ComicmillError, ConfigError, ExtractError, PackagingError, Result, TranscodeError,
    WorkerError, WorkspaceError,
};
pub use export::{ExportRequest, ExportResponse, PageExportWorker};
pub use source::{ComicSource, PageEntry, SourceKind};
pub use workspace::TempWorkspace;
