use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Cbz,
    Cbr,
    Pdf,
    Epub,
    Cb7,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Cbz => "cbz",
            OutputFormat::Cbr => "cbr",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Epub => "epub",
            OutputFormat::Cb7 => "cb7",
        }
    }
}

/// Output image codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputImageFormat {
    Jpg,
    Png,
    Webp,
    Avif,
}

impl OutputImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputImageFormat::Jpg => "jpg",
            OutputImageFormat::Png => "png",
            OutputImageFormat::Webp => "webp",
            OutputImageFormat::Avif => "avif",
        }
    }
}

/// Per-codec quality parameters (1-100). The png value is a hint: palette
/// and compression tuning only kicks in below 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFormatParams {
    pub jpg_quality: u8,
    pub png_quality: u8,
    pub webp_quality: u8,
    pub avif_quality: u8,
}

impl Default for ImageFormatParams {
    fn default() -> Self {
        Self {
            jpg_quality: 90,
            png_quality: 100,
            webp_quality: 80,
            avif_quality: 50,
        }
    }
}

impl ImageFormatParams {
    pub fn quality_for(&self, format: OutputImageFormat) -> u8 {
        match format {
            OutputImageFormat::Jpg => self.jpg_quality,
            OutputImageFormat::Png => self.png_quality,
            OutputImageFormat::Webp => self.webp_quality,
            OutputImageFormat::Avif => self.avif_quality,
        }
    }
}

/// Everything a conversion job needs to know about its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputOptions {
    pub output_folder: PathBuf,
    pub format: OutputFormat,
    /// `None` keeps the pages' native formats (no re-encode).
    pub image_format: Option<OutputImageFormat>,
    /// Percentage of the original width; 100 means no resize.
    pub image_scale: u32,
    pub image_params: ImageFormatParams,
    /// Divide each output into N roughly-equal archives. 1 means no split.
    pub split_num_files: u32,
    /// Container-level encryption, where the output format supports it.
    pub password: Option<String>,
    /// Creation mode: merge every queued source into one output set under
    /// this base name. `None` derives each output's name from its source.
    pub base_name: Option<String>,
    pub reverse_page_order: bool,
}

impl OutputOptions {
    pub fn new(output_folder: PathBuf, format: OutputFormat) -> Self {
        Self {
            output_folder,
            format,
            image_format: None,
            image_scale: 100,
            image_params: ImageFormatParams::default(),
            split_num_files: 1,
            password: None,
            base_name: None,
            reverse_page_order: false,
        }
    }

    /// True when pages must pass through the transcode pipeline.
    pub fn needs_transcode(&self) -> bool {
        self.image_format.is_some() || self.image_scale < 100
    }
}
