use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::convert::options::{ImageFormatParams, OutputImageFormat};
use crate::error::TranscodeError;
use crate::naming::create_unique;
use crate::workspace::TempWorkspace;

/// Resizes and re-encodes one decoded page.
///
/// The resize, when requested, runs as its own temporary-file step before
/// the final encode; the working file is replaced by the resized copy so the
/// encode step always starts from a file on disk. The source file is deleted
/// only after a successful encode; any failure leaves it in place.
pub fn transcode_page(
    source: &Path,
    output_dir: &Path,
    stem: &str,
    format: OutputImageFormat,
    scale_percent: u32,
    params: &ImageFormatParams,
    workspace: &TempWorkspace,
) -> Result<PathBuf, TranscodeError> {
    if scale_percent < 100 {
        resize_in_place(source, scale_percent, workspace)?;
    }

    let img = image::open(source).map_err(|e| TranscodeError::Decode {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;

    let quality = params.quality_for(format).clamp(1, 100);
    let output_path = encode(&img, output_dir, stem, format, quality)?;

    debug!(
        "transcoded {} -> {}",
        source.display(),
        output_path.display()
    );
    std::fs::remove_file(source).map_err(|e| TranscodeError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(output_path)
}

/// Scales the working file to `scale_percent` of its width, aspect
/// preserved, via a sibling temp file in the workspace.
fn resize_in_place(
    source: &Path,
    scale_percent: u32,
    workspace: &TempWorkspace,
) -> Result<(), TranscodeError> {
    let img = image::open(source).map_err(|e| TranscodeError::Decode {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;

    let new_width = ((img.width() as f64) * (scale_percent as f64) / 100.0).round() as u32;
    let new_width = new_width.max(1);
    let resized = img.resize(new_width, u32::MAX, image::imageops::FilterType::Lanczos3);

    let format = ImageFormat::from_path(source).unwrap_or(ImageFormat::Png);
    let tmp_path = workspace
        .root()
        .join(format!("resize-{}.tmp", uuid::Uuid::new_v4()));
    {
        let file = std::fs::File::create(&tmp_path).map_err(|e| TranscodeError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        resized
            .write_to(&mut writer, format)
            .map_err(|e| TranscodeError::Encode {
                path: tmp_path.clone(),
                reason: e.to_string(),
            })?;
        writer.flush().map_err(|e| TranscodeError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
    }

    std::fs::rename(&tmp_path, source).map_err(|e| TranscodeError::Io {
        path: source.to_path_buf(),
        source: e,
    })
}

fn encode(
    img: &DynamicImage,
    output_dir: &Path,
    stem: &str,
    format: OutputImageFormat,
    quality: u8,
) -> Result<PathBuf, TranscodeError> {
    let (file, output_path) =
        create_unique(output_dir, stem, format.extension()).map_err(|e| TranscodeError::Io {
            path: output_dir.join(format!("{}.{}", stem, format.extension())),
            source: e,
        })?;
    let mut writer = BufWriter::new(file);

    let encode_err = |e: String| TranscodeError::Encode {
        path: output_path.clone(),
        reason: e,
    };

    match format {
        OutputImageFormat::Jpg => {
            // Jpeg carries no alpha channel.
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        OutputImageFormat::Png => {
            if quality < 100 {
                let encoder = PngEncoder::new_with_quality(
                    &mut writer,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)
                    .map_err(|e| encode_err(e.to_string()))?;
            } else {
                img.write_to(&mut writer, ImageFormat::Png)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
        }
        OutputImageFormat::Webp => {
            let rgba = img.to_rgba8();
            let encoder = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height());
            let encoded = encoder.encode(quality as f32);
            writer
                .write_all(&encoded)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        OutputImageFormat::Avif => {
            let rgba = img.to_rgba8();
            let encoder = AvifEncoder::new_with_speed_quality(&mut writer, 6, quality);
            rgba.write_with_encoder(encoder)
                .map_err(|e| encode_err(e.to_string()))?;
        }
    }

    writer.flush().map_err(|e| TranscodeError::Io {
        path: output_path.clone(),
        source: e,
    })?;

    // On error the output stub may remain; the caller discards the source's
    // partial output, never the source file itself.
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_test_png(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        img.save(path).unwrap();
    }

    fn setup() -> (TempDir, TempWorkspace, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let ws = TempWorkspace::create(Some(tmp.path())).unwrap();
        let out = tmp.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let src = ws.root().join("page.png");
        (tmp, ws, src, out)
    }

    #[test]
    fn test_half_scale_yields_half_width() {
        let (_tmp, ws, src, out) = setup();
        write_test_png(&src, 64, 40);

        let result = transcode_page(
            &src,
            &out,
            "page",
            OutputImageFormat::Png,
            50,
            &ImageFormatParams::default(),
            &ws,
        )
        .unwrap();

        let img = image::open(&result).unwrap();
        assert_eq!(img.width(), 32);
        assert_eq!(img.height(), 20);
    }

    #[test]
    fn test_odd_scale_rounds_width() {
        let (_tmp, ws, src, out) = setup();
        write_test_png(&src, 33, 10);

        let result = transcode_page(
            &src,
            &out,
            "page",
            OutputImageFormat::Png,
            50,
            &ImageFormatParams::default(),
            &ws,
        )
        .unwrap();

        // round(33 * 0.5) = 17
        assert_eq!(image::open(&result).unwrap().width(), 17);
    }

    #[test]
    fn test_source_deleted_after_success() {
        let (_tmp, ws, src, out) = setup();
        write_test_png(&src, 16, 16);

        transcode_page(
            &src,
            &out,
            "page",
            OutputImageFormat::Jpg,
            100,
            &ImageFormatParams::default(),
            &ws,
        )
        .unwrap();
        assert!(!src.exists());
        assert!(out.join("page.jpg").exists());
    }

    #[test]
    fn test_source_kept_on_decode_failure() {
        let (_tmp, ws, src, out) = setup();
        std::fs::write(&src, b"not an image at all").unwrap();

        let err = transcode_page(
            &src,
            &out,
            "page",
            OutputImageFormat::Jpg,
            100,
            &ImageFormatParams::default(),
            &ws,
        )
        .unwrap_err();
        assert!(matches!(err, TranscodeError::Decode { .. }));
        assert!(src.exists());
    }

    #[test]
    fn test_collision_suffix_on_existing_output() {
        let (_tmp, ws, src, out) = setup();
        write_test_png(&src, 8, 8);
        std::fs::write(out.join("page.jpg"), b"already here").unwrap();

        let result = transcode_page(
            &src,
            &out,
            "page",
            OutputImageFormat::Jpg,
            100,
            &ImageFormatParams::default(),
            &ws,
        )
        .unwrap();
        assert_eq!(result, out.join("page(2).jpg"));
        assert_eq!(std::fs::read(out.join("page.jpg")).unwrap(), b"already here");
    }

    #[test]
    fn test_webp_and_png_outputs_decode() {
        let (_tmp, ws, src, out) = setup();
        write_test_png(&src, 12, 9);

        let webp_out = transcode_page(
            &src,
            &out,
            "w",
            OutputImageFormat::Webp,
            100,
            &ImageFormatParams::default(),
            &ws,
        )
        .unwrap();
        let img = image::open(&webp_out).unwrap();
        assert_eq!((img.width(), img.height()), (12, 9));
    }
}
