mod cb7;
mod cbr;
mod cbz;
mod epub;
mod pdf;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::convert::options::{OutputFormat, OutputOptions};
use crate::error::PackagingError;
use crate::naming::unique_path;

/// Assembles extracted pages into the requested output container(s).
///
/// `pages` must already be in final page order. With `split_num_files` > 1
/// the set is divided into contiguous, roughly equal chunks, each packaged
/// as its own archive. Output names are resolved against the live
/// filesystem with the `(N)` suffix policy; nothing existing is overwritten.
pub fn package_pages(
    pages: &[PathBuf],
    base_name: &str,
    options: &OutputOptions,
) -> Result<Vec<PathBuf>, PackagingError> {
    if pages.is_empty() {
        return Err(PackagingError::NoPages {
            path: options.output_folder.join(base_name),
        });
    }

    if options.password.is_some() && !supports_password(options.format) {
        return Err(PackagingError::PasswordUnsupported {
            format: options.format.extension().to_string(),
        });
    }

    let split = (options.split_num_files.max(1) as usize).min(pages.len());
    let chunk_size = pages.len().div_ceil(split);
    let chunks: Vec<&[PathBuf]> = pages.chunks(chunk_size).collect();
    let total = chunks.len();

    let mut outputs = Vec::with_capacity(total);
    for (index, chunk) in chunks.iter().enumerate() {
        let name = if total > 1 {
            format!("{} ({} of {})", base_name, index + 1, total)
        } else {
            base_name.to_string()
        };
        let target = unique_path(&options.output_folder, &name, options.format.extension());
        write_container(chunk, &target, options)?;
        debug!("packaged {} pages into {}", chunk.len(), target.display());
        outputs.push(target);
    }
    Ok(outputs)
}

pub fn supports_password(format: OutputFormat) -> bool {
    matches!(
        format,
        OutputFormat::Cbz | OutputFormat::Cb7 | OutputFormat::Cbr
    )
}

fn write_container(
    pages: &[PathBuf],
    target: &Path,
    options: &OutputOptions,
) -> Result<(), PackagingError> {
    let password = options.password.as_deref();
    match options.format {
        OutputFormat::Cbz => cbz::write(pages, target, password),
        OutputFormat::Cbr => cbr::write(pages, target, password),
        OutputFormat::Cb7 => cb7::write(pages, target, password),
        OutputFormat::Pdf => pdf::write(pages, target),
        OutputFormat::Epub => epub::write(pages, target),
    }
}

/// Entry name inside an output container: zero-padded position plus the
/// page's real extension, so every reader sorts the pages identically.
pub(crate) fn page_entry_name(index: usize, page: &Path) -> String {
    let ext = page
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg")
        .to_ascii_lowercase();
    format!("{:04}.{}", index, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::options::OutputOptions;
    use tempfile::TempDir;

    fn fake_pages(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let p = dir.join(format!("page_{:04}.jpg", i));
                std::fs::write(&p, format!("page {}", i)).unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn test_empty_page_set_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let options = OutputOptions::new(tmp.path().to_path_buf(), OutputFormat::Cbz);
        assert!(matches!(
            package_pages(&[], "x", &options).unwrap_err(),
            PackagingError::NoPages { .. }
        ));
    }

    #[test]
    fn test_password_rejected_for_pdf_and_epub() {
        let tmp = TempDir::new().unwrap();
        let pages = fake_pages(tmp.path(), 1);
        for format in [OutputFormat::Pdf, OutputFormat::Epub] {
            let mut options = OutputOptions::new(tmp.path().to_path_buf(), format);
            options.password = Some("secret".to_string());
            assert!(matches!(
                package_pages(&pages, "x", &options).unwrap_err(),
                PackagingError::PasswordUnsupported { .. }
            ));
        }
    }

    #[test]
    fn test_split_produces_roughly_equal_archives() {
        let tmp = TempDir::new().unwrap();
        let pages = fake_pages(tmp.path(), 7);
        let out = tmp.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let mut options = OutputOptions::new(out.clone(), OutputFormat::Cbz);
        options.split_num_files = 3;
        let outputs = package_pages(&pages, "book", &options).unwrap();

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0], out.join("book (1 of 3).cbz"));
        assert_eq!(outputs[2], out.join("book (3 of 3).cbz"));

        let mut total = 0;
        for output in &outputs {
            let file = std::fs::File::open(output).unwrap();
            let archive = zip::ZipArchive::new(file).unwrap();
            assert!(archive.len() <= 3);
            total += archive.len();
        }
        assert_eq!(total, 7);
    }

    #[test]
    fn test_split_larger_than_page_count_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let pages = fake_pages(tmp.path(), 2);
        let out = tmp.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let mut options = OutputOptions::new(out, OutputFormat::Cbz);
        options.split_num_files = 10;
        let outputs = package_pages(&pages, "tiny", &options).unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn test_output_collision_gets_suffix() {
        let tmp = TempDir::new().unwrap();
        let pages = fake_pages(tmp.path(), 1);
        let out = tmp.path().join("out");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("book.cbz"), b"existing").unwrap();

        let options = OutputOptions::new(out.clone(), OutputFormat::Cbz);
        let outputs = package_pages(&pages, "book", &options).unwrap();
        assert_eq!(outputs[0], out.join("book(2).cbz"));
        assert_eq!(std::fs::read(out.join("book.cbz")).unwrap(), b"existing");
    }

    #[test]
    fn test_page_entry_name_padding() {
        assert_eq!(page_entry_name(0, Path::new("a/cover.PNG")), "0000.png");
        assert_eq!(page_entry_name(12, Path::new("b/p.jpg")), "0012.jpg");
        assert_eq!(page_entry_name(3, Path::new("noext")), "0003.jpg");
    }
}
