use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::types::DocumentChunk;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 500, overlap_chars: 50 }
    }
}

fn ensure_dir(dir: &Path) -> std::result::Result<(), Error> {
    if dir.is_dir() { Ok(()) } else { Err(Error::NotFound(format!("data directory {}", dir.display()))) }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<DocumentChunk>> {
        ensure_dir(data_dir)?;
        self.process_files(data_dir, self.list_txt_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<DocumentChunk>> {
        ensure_dir(data_dir)?;
        let mut files = self.list_txt_files(data_dir);
        if files.len() > limit { files.truncate(limit); info!(limit, "limited to first files"); }
        self.process_files(data_dir, files)
    }

    fn process_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<DocumentChunk>> {
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(file_path);
            all_chunks.extend(self.chunk_content(&content, &doc_id, file_path));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed documents");
        Ok(all_chunks)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_doc_id(&self, file_path: &Path) -> String {
        file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string_lossy().to_string())
    }

    fn chunk_content(&self, content: &str, doc_id: &str, file_path: &Path) -> Vec<DocumentChunk> {
        let source = file_path.to_string_lossy().to_string();
        let mut chunks: Vec<DocumentChunk> = self
            .split_text(content)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| DocumentChunk {
                id: format!("{}:{}", doc_id, chunk_index),
                source: source.clone(),
                content: text,
                chunk_index,
                total_chunks: 0,
            })
            .collect();
        let total_chunks = chunks.len();
        for chunk in &mut chunks { chunk.total_chunks = total_chunks; }
        chunks
    }

    /// Splits `text` into windows of at most `max_chars` characters that
    /// overlap by `overlap_chars`, breaking on whitespace when one falls in
    /// the second half of the window.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let max = self.chunking_config.max_chars.max(1);
        let overlap = self.chunking_config.overlap_chars.min(max - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = (start + max).min(chars.len());
            if end < chars.len() {
                if let Some(ws) = (start + max / 2..end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = ws;
                }
            }
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() { chunks.push(piece.to_string()); }
            if end >= chars.len() { break; }
            start = end.saturating_sub(overlap).max(start + 1);
        }
        chunks
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}
