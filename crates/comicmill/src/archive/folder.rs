use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::archive::{has_image_extension, natural_cmp, ArchiveReader};
use crate::error::ExtractError;
use crate::source::PageEntry;

/// Walks a directory tree and returns image files in the canonical page
/// order: at each level all files come before any subfolder, files and
/// folders each in natural name order, subfolders expanded depth-first.
///
/// The same walk is used for folder sources and for extracted rar trees, so
/// identical directory structures produce identical page ordering no matter
/// which container they came from.
pub fn ordered_image_walk(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        // Files sort before directories; walkdir then descends into each
        // directory as it is reached, which yields the files-first
        // depth-first order.
        .sort_by(|a, b| {
            let a_dir = a.file_type().is_dir();
            let b_dir = b.file_type().is_dir();
            a_dir.cmp(&b_dir).then_with(|| {
                natural_cmp(
                    &a.file_name().to_string_lossy(),
                    &b.file_name().to_string_lossy(),
                )
            })
        });

    walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_image_extension(e.path()))
        .map(|e| e.into_path())
        .collect()
}

pub struct FolderReader {
    root: PathBuf,
    recursive: bool,
}

impl FolderReader {
    pub fn new(root: PathBuf, recursive: bool) -> Self {
        Self { root, recursive }
    }
}

impl ArchiveReader for FolderReader {
    fn list_pages(&mut self) -> Result<Vec<PageEntry>, ExtractError> {
        if !self.root.is_dir() {
            return Err(ExtractError::OpenContainer {
                path: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not a directory",
                ),
            });
        }

        let files = ordered_image_walk(&self.root, self.recursive);
        if files.is_empty() {
            return Err(ExtractError::EmptySource {
                path: self.root.clone(),
            });
        }

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(ordinal, path)| {
                let mut entry = PageEntry::new(ordinal, path.to_string_lossy().into_owned());
                // Folder pages already live on disk.
                entry.extracted_path = Some(path);
                entry
            })
            .collect())
    }

    fn read_page(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ExtractError> {
        std::fs::read(&entry.local_path).map_err(|e| ExtractError::ReadEntry {
            entry: entry.local_path.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::write(path, b"img").unwrap();
    }

    fn fixture_tree(root: &Path) {
        // Root files must come before anything in subfolders.
        touch(&root.join("b.jpg"));
        touch(&root.join("a.png"));
        touch(&root.join("notes.txt"));
        std::fs::create_dir(root.join("ch2")).unwrap();
        touch(&root.join("ch2/p10.jpg"));
        touch(&root.join("ch2/p2.jpg"));
        std::fs::create_dir(root.join("ch1")).unwrap();
        touch(&root.join("ch1/x.jpg"));
        std::fs::create_dir(root.join("ch1/inner")).unwrap();
        touch(&root.join("ch1/inner/deep.png"));
    }

    #[test]
    fn test_files_before_subfolders_depth_first() {
        let tmp = TempDir::new().unwrap();
        fixture_tree(tmp.path());

        let files = ordered_image_walk(tmp.path(), true);
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(tmp.path())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        assert_eq!(
            names,
            vec![
                "a.png",
                "b.jpg",
                "ch1/x.jpg",
                "ch1/inner/deep.png",
                "ch2/p2.jpg",
                "ch2/p10.jpg",
            ]
        );
    }

    #[test]
    fn test_non_recursive_limits_to_top_level() {
        let tmp = TempDir::new().unwrap();
        fixture_tree(tmp.path());

        let files = ordered_image_walk(tmp.path(), false);
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn test_list_pages_dense_ordinals() {
        let tmp = TempDir::new().unwrap();
        fixture_tree(tmp.path());

        let mut reader = FolderReader::new(tmp.path().to_path_buf(), true);
        let pages = reader.list_pages().unwrap();
        assert_eq!(pages.len(), 6);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.ordinal, i);
            assert!(page.extracted_path.is_some());
        }
    }

    #[test]
    fn test_empty_folder_is_empty_source() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("readme.txt"));

        let mut reader = FolderReader::new(tmp.path().to_path_buf(), true);
        assert!(matches!(
            reader.list_pages().unwrap_err(),
            ExtractError::EmptySource { .. }
        ));
    }

    #[test]
    fn test_read_page_round_trip() {
        let tmp = TempDir::new().unwrap();
        let payload = b"\xff\xd8\xffraw-jpeg-bytes";
        std::fs::write(tmp.path().join("only.jpg"), payload).unwrap();

        let mut reader = FolderReader::new(tmp.path().to_path_buf(), false);
        let pages = reader.list_pages().unwrap();
        let bytes = reader.read_page(&pages[0]).unwrap();
        assert_eq!(bytes, payload);
    }
}
