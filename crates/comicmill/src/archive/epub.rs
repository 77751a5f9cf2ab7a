use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::archive::ArchiveReader;
use crate::error::ExtractError;
use crate::source::PageEntry;

/// Reads epub documents as page sequences.
///
/// An epub is a zip package described by an OPF manifest; the pages are the
/// image resources the manifest declares, in declaration (reading) order.
/// Whether a page image is referenced from spine XHTML or stored as a bare
/// resource, its bytes are a plain zip entry either way.
#[derive(Debug)]
pub struct EpubReader {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl EpubReader {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = File::open(path).map_err(|e| ExtractError::OpenContainer {
            path: path.to_path_buf(),
            source: e,
        })?;
        let archive = ZipArchive::new(file).map_err(|e| ExtractError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ExtractError> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| ExtractError::Epub(format!("missing entry '{}': {}", name, e)))?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| ExtractError::ReadEntry {
                entry: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }

    /// Locates the OPF package document via META-INF/container.xml.
    fn opf_path(&mut self) -> Result<String, ExtractError> {
        let container = self.read_entry("META-INF/container.xml")?;
        let xml = String::from_utf8_lossy(&container).into_owned();

        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.local_name().as_ref() == b"rootfile" {
                        if let Some(path) = attr(e, b"full-path") {
                            return Ok(path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ExtractError::Epub(format!("container.xml: {}", e)));
                }
                _ => {}
            }
        }
        Err(ExtractError::Epub(
            "container.xml declares no rootfile".to_string(),
        ))
    }

    /// Image resources from the OPF manifest, in declaration order, resolved
    /// to zip entry names.
    fn manifest_images(&mut self) -> Result<Vec<String>, ExtractError> {
        let opf_path = self.opf_path()?;
        let opf_dir = match opf_path.rfind('/') {
            Some(idx) => opf_path[..idx].to_string(),
            None => String::new(),
        };
        let opf = self.read_entry(&opf_path)?;
        let xml = String::from_utf8_lossy(&opf).into_owned();

        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);
        let mut images = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.local_name().as_ref() == b"item" {
                        let media_type = attr(e, b"media-type").unwrap_or_default();
                        if media_type.starts_with("image/") {
                            if let Some(href) = attr(e, b"href") {
                                images.push(resolve_href(&opf_dir, &href));
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ExtractError::Epub(format!("package document: {}", e)));
                }
                _ => {}
            }
        }
        Ok(images)
    }
}

impl ArchiveReader for EpubReader {
    fn list_pages(&mut self) -> Result<Vec<PageEntry>, ExtractError> {
        let images = self.manifest_images()?;
        if images.is_empty() {
            return Err(ExtractError::EmptySource {
                path: self.path.clone(),
            });
        }
        Ok(images
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| PageEntry::new(ordinal, name))
            .collect())
    }

    fn read_page(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ExtractError> {
        self.read_entry(&entry.local_path)
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Resolves a manifest href against the OPF directory, handling `..`
/// segments without touching the filesystem.
fn resolve_href(opf_dir: &str, href: &str) -> String {
    let mut parts: Vec<&str> = if opf_dir.is_empty() {
        Vec::new()
    } else {
        opf_dir.split('/').collect()
    };
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
