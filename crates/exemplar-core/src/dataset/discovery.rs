//! Image and class-folder discovery.
//!
//! Every listing is sorted by path so that sampling and output order never
//! depend on filesystem iteration order.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;
use crate::types::QueryImage;

use super::layout::CategoryLayout;
use super::registry::ClassRegistry;

/// Lists supported image files.
#[derive(Debug, Clone)]
pub struct ImageLister {
    formats: Vec<String>,
}

impl ImageLister {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            formats: config
                .supported_formats
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
        }
    }

    /// All supported images under `dir`, recursively, in sorted path order.
    pub fn list(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    /// Supported images directly inside `dir` (no recursion), sorted.
    pub fn list_shallow(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.formats.iter().any(|f| *f == ext)
            })
            .unwrap_or(false)
    }
}

/// Immediate subdirectories of `dir` as `(folder name, path)`, sorted by name.
pub fn class_dirs(dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    dirs.sort();
    dirs
}

/// `/`-separated path of `path` relative to `base`.
pub fn relative_id(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The query images of a category, with ground truth from their folders.
#[derive(Debug, Clone, Default)]
pub struct QueryCorpus {
    images: Vec<QueryImage>,
}

impl QueryCorpus {
    /// Discover `6.preprocessed/<class>/<image>`.
    ///
    /// Folders that are not registered classes are skipped with a warning.
    /// Images directly under the corpus root carry no ground truth.
    pub fn discover(layout: &CategoryLayout, registry: &ClassRegistry, lister: &ImageLister) -> Self {
        let root = layout.query_root();
        let mut images = Vec::new();

        for path in lister.list_shallow(&root) {
            images.push(QueryImage {
                image_id: relative_id(&root, &path),
                path,
                true_class: None,
            });
        }

        for (name, dir) in class_dirs(&root) {
            if !registry.contains(&name) {
                tracing::warn!(
                    "Skipping query folder {:?}: not a registered class",
                    name
                );
                continue;
            }
            for path in lister.list(&dir) {
                images.push(QueryImage {
                    image_id: relative_id(&root, &path),
                    path,
                    true_class: Some(name.clone()),
                });
            }
        }

        images.sort_by(|a, b| a.image_id.cmp(&b.image_id));
        tracing::info!(
            "Query corpus: {} image(s) under {:?}",
            images.len(),
            root
        );
        Self { images }
    }

    pub fn images(&self) -> &[QueryImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_is_supported() {
        let lister = ImageLister::new(&ProcessingConfig::default());
        assert!(lister.is_supported(Path::new("a.jpg")));
        assert!(lister.is_supported(Path::new("a.PNG")));
        assert!(!lister.is_supported(Path::new("a.txt")));
        assert!(!lister.is_supported(Path::new("noext")));
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/c.png"));

        let lister = ImageLister::new(&ProcessingConfig::default());
        let names: Vec<String> = lister
            .list(dir.path())
            .iter()
            .map(|p| relative_id(dir.path(), p))
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "nested/c.png"]);

        let shallow = lister.list_shallow(dir.path());
        assert_eq!(shallow.len(), 2);
    }

    #[test]
    fn test_class_dirs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["wren", "finch", "unknown_other"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        touch(&dir.path().join("stray.png"));
        let names: Vec<String> = class_dirs(dir.path()).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["finch", "unknown_other", "wren"]);
    }

    #[test]
    fn test_relative_id_uses_forward_slashes() {
        let base = Path::new("/data/birds/6.preprocessed");
        let path = base.join("finch").join("001.png");
        assert_eq!(relative_id(base, &path), "finch/001.png");
    }
}
