//! Corpus documents and the chunks cut from them.
//!
//! A document is one flat file of the corpus directory. Its file name is the
//! `source` tag carried by every chunk produced from it, and is the unit of
//! relevance for retrieval metrics.

use crate::error::{EvalError, Result};
use crate::splitter::TextSplitter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A fragment of one source document, used as the retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text content.
    pub text: String,
    /// File name of the document the chunk was cut from.
    pub source: String,
    /// Position of the chunk within its source (0-based).
    pub index: usize,
}

/// A reference document loaded from the corpus directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File name, used as the source tag.
    pub name: String,
    /// Original file path (if loaded from file).
    pub path: Option<PathBuf>,
    /// Decoded text content.
    pub content: String,
}

impl Document {
    /// Create a document from raw text content.
    pub fn from_text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            content: content.into(),
        }
    }

    /// Load a file as text. Invalid UTF-8 sequences are replaced rather than
    /// rejected, so a partially broken file still yields its readable text.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| EvalError::io(path, e))?;

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Whether the document has any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Split the document into chunks tagged with its name.
    pub fn chunks(&self, splitter: &TextSplitter) -> Vec<Chunk> {
        splitter
            .split(&self.content)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                text,
                source: self.name.clone(),
                index,
            })
            .collect()
    }
}
