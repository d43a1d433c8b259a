//! Loads `.txt` files from a directory tree as ingestion-ready documents.
//!
//! The relative parent directory becomes the `document_type` ("misc" for files
//! at the root), the file stem becomes the title and the path is recorded as
//! `source` and in `metadata.path`.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::NewDocument;

#[derive(Debug, Clone, Default)]
pub struct DirectoryLoader {
    limit: Option<usize>,
}

impl DirectoryLoader {
    pub fn new() -> Self { Self::default() }

    pub fn with_limit(limit: usize) -> Self { Self { limit: Some(limit) } }

    pub fn load(&self, data_dir: &Path) -> Result<Vec<NewDocument>> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit {
            if files.len() > limit { files.truncate(limit); debug!(limit, "limited to first files"); }
        }
        let mut docs = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(n = file_index + 1, total = files.len(), path = %file_path.display(), "reading file");
            let content = self.read_file_content(file_path)?;
            if content.trim().is_empty() { continue; }
            let path = file_path.to_string_lossy().to_string();
            let mut doc = NewDocument::new(content)
                .with_document_type(self.get_category_from_path(file_path, data_dir))
                .with_source(path.clone())
                .with_metadata("path", path);
            if let Some(stem) = file_path.file_stem() { doc = doc.with_title(stem.to_string_lossy()); }
            docs.push(doc);
        }
        info!(files = files.len(), documents = docs.len(), "loaded directory");
        Ok(docs)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn get_category_from_path(&self, file_path: &Path, data_dir: &Path) -> String {
        let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        match relative_path.parent().and_then(Path::to_str) {
            Some(parent) if !parent.is_empty() => parent.replace('\\', "/"),
            _ => "misc".to_string(),
        }
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
            .map(|e| e.path().to_path_buf())
            .collect();
        txt_files.sort();
        txt_files
    }
}
