use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackagingError;

/// Assembles pages into a fixed-layout EPUB: one XHTML wrapper per image,
/// images stored as manifest resources, spine in page order. The `mimetype`
/// entry must be first and stored uncompressed per the OCF spec.
pub fn write(pages: &[PathBuf], target: &Path) -> Result<(), PackagingError> {
    let epub_err = |reason: String| PackagingError::Epub {
        path: target.to_path_buf(),
        reason,
    };

    let file = File::create(target).map_err(|e| PackagingError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;
    let mut writer = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default();

    writer
        .start_file("mimetype", stored)
        .map_err(|e| epub_err(e.to_string()))?;
    writer
        .write_all(b"application/epub+zip")
        .map_err(|e| epub_err(e.to_string()))?;

    writer
        .start_file("META-INF/container.xml", deflated)
        .map_err(|e| epub_err(e.to_string()))?;
    writer
        .write_all(CONTAINER_XML.as_bytes())
        .map_err(|e| epub_err(e.to_string()))?;

    let title = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Comic");
    let book_id = uuid::Uuid::new_v4();

    let image_names: Vec<String> = pages
        .iter()
        .enumerate()
        .map(|(i, p)| crate::pack::page_entry_name(i, p))
        .collect();

    writer
        .start_file("OEBPS/content.opf", deflated)
        .map_err(|e| epub_err(e.to_string()))?;
    writer
        .write_all(build_opf(title, &book_id.to_string(), &image_names).as_bytes())
        .map_err(|e| epub_err(e.to_string()))?;

    for (index, (page, image_name)) in pages.iter().zip(&image_names).enumerate() {
        let bytes = std::fs::read(page).map_err(|e| PackagingError::Io {
            path: page.clone(),
            source: e,
        })?;
        writer
            .start_file(format!("OEBPS/images/{}", image_name), stored)
            .map_err(|e| epub_err(e.to_string()))?;
        writer
            .write_all(&bytes)
            .map_err(|e| epub_err(e.to_string()))?;

        writer
            .start_file(format!("OEBPS/pages/page_{:04}.xhtml", index), deflated)
            .map_err(|e| epub_err(e.to_string()))?;
        writer
            .write_all(build_page_xhtml(index, image_name).as_bytes())
            .map_err(|e| epub_err(e.to_string()))?;
    }

    writer.finish().map_err(|e| epub_err(e.to_string()))?;
    Ok(())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

fn media_type_for(image_name: &str) -> &'static str {
    match image_name.rsplit('.').next() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

fn build_opf(title: &str, book_id: &str, image_names: &[String]) -> String {
    let mut manifest = String::new();
    let mut spine = String::new();
    for (index, image_name) in image_names.iter().enumerate() {
        manifest.push_str(&format!(
            "    <item id=\"img{i}\" href=\"images/{name}\" media-type=\"{mt}\"/>\n",
            i = index,
            name = image_name,
            mt = media_type_for(image_name),
        ));
        manifest.push_str(&format!(
            "    <item id=\"page{i}\" href=\"pages/page_{i:04}.xhtml\" media-type=\"application/xhtml+xml\"/>\n",
            i = index,
        ));
        spine.push_str(&format!("    <itemref idref=\"page{}\"/>\n", index));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">urn:uuid:{book_id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
{spine}  </spine>
</package>
"#,
        book_id = book_id,
        title = xml_escape(title),
        manifest = manifest,
        spine = spine,
    )
}

fn build_page_xhtml(index: usize, image_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
  <head><title>Page {n}</title></head>
  <body><img src="../images/{name}" alt="page {n}"/></body>
</html>
"#,
        n = index + 1,
        name = image_name,
    )
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::epub::EpubReader;
    use crate::archive::ArchiveReader;
    use tempfile::TempDir;

    fn fake_pages(dir: &Path) -> Vec<PathBuf> {
        [
            ("a.jpg", b"\xff\xd8\xff jpeg one".as_slice()),
            ("b.png", b"\x89PNG png two".as_slice()),
        ]
        .iter()
        .map(|(name, data)| {
            let p = dir.join(name);
            std::fs::write(&p, data).unwrap();
            p
        })
        .collect()
    }

    #[test]
    fn test_written_epub_reads_back_in_order() {
        let tmp = TempDir::new().unwrap();
        let pages = fake_pages(tmp.path());
        let target = tmp.path().join("book.epub");
        write(&pages, &target).unwrap();

        // Our own epub reader must list the same pages in the same order.
        let mut reader = EpubReader::open(&target).unwrap();
        let listed = reader.list_pages().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].local_path, "OEBPS/images/0000.jpg");
        assert_eq!(listed[1].local_path, "OEBPS/images/0001.png");
        assert_eq!(reader.read_page(&listed[0]).unwrap(), b"\xff\xd8\xff jpeg one");
    }

    #[test]
    fn test_mimetype_is_first_and_stored() {
        let tmp = TempDir::new().unwrap();
        let pages = fake_pages(tmp.path());
        let target = tmp.path().join("book.epub");
        write(&pages, &target).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&target).unwrap()).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_title_is_escaped() {
        let opf = build_opf("Cats & <Dogs>", "id", &[]);
        assert!(opf.contains("Cats &amp; &lt;Dogs&gt;"));
    }
}
