//! Corpus loading and index construction.
//!
//! Every regular file directly under the corpus directory is one document.
//! Files are visited in lexicographic order so logs and chunk order are
//! reproducible between runs.

use crate::document::{Chunk, Document};
use crate::error::{EvalError, Result};
use crate::index::{Embedder, VectorIndex};
use crate::splitter::{ChunkConfig, TextSplitter};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default name of the evaluation index.
pub const DEFAULT_INDEX_NAME: &str = "eval-run";

/// Summary of a corpus build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusStats {
    /// Files that produced at least one chunk.
    pub files: usize,
    /// Files skipped because they were unreadable or blank.
    pub skipped: usize,
    /// Total chunks indexed.
    pub chunks: usize,
    /// `(source, chunk count)` in file order.
    pub per_source: Vec<(String, usize)>,
}

/// Load every regular file directly under `dir`, sorted by file name.
///
/// Unreadable files are skipped with a warning. Fails if `dir` is not a
/// directory.
pub fn load_corpus(dir: &Path) -> Result<Vec<Document>> {
    read_corpus(dir).map(|(documents, _)| documents)
}

/// Documents plus the number of files that could not be read.
fn read_corpus(dir: &Path) -> Result<(Vec<Document>, usize)> {
    if !dir.is_dir() {
        return Err(EvalError::InvalidCorpusPath(dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    let mut unreadable = 0;
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable corpus entry");
                unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        match Document::from_file(entry.path()) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                warn!(error = %e, "skipping unreadable corpus file");
                unreadable += 1;
            }
        }
    }

    Ok((documents, unreadable))
}

/// Split documents into source-tagged chunks. Documents yielding no chunks
/// are left out of the stats' file count.
pub fn chunk_documents(documents: &[Document], config: &ChunkConfig) -> (Vec<Chunk>, CorpusStats) {
    let splitter = TextSplitter::new(config.clone());
    let mut chunks = Vec::new();
    let mut stats = CorpusStats::default();

    for doc in documents {
        let doc_chunks = doc.chunks(&splitter);
        if doc_chunks.is_empty() {
            debug!(source = %doc.name, "document produced no chunks");
            stats.skipped += 1;
            continue;
        }

        debug!(source = %doc.name, chunks = doc_chunks.len(), "chunked document");
        stats.files += 1;
        stats.per_source.push((doc.name.clone(), doc_chunks.len()));
        chunks.extend(doc_chunks);
    }

    stats.chunks = chunks.len();
    (chunks, stats)
}

/// Build a fresh in-memory index from the corpus directory.
///
/// Fails with [`EvalError::InvalidCorpusPath`] if the directory is missing and
/// [`EvalError::EmptyCorpus`] if no file yields any text.
pub async fn build_index(
    corpus_dir: &Path,
    config: &ChunkConfig,
    embedder: Arc<dyn Embedder>,
    index_name: &str,
    batch_size: usize,
) -> Result<(VectorIndex, CorpusStats)> {
    let (documents, unreadable) = read_corpus(corpus_dir)?;

    let (chunks, mut stats) = chunk_documents(&documents, config);
    stats.skipped += unreadable;

    if stats.files == 0 {
        return Err(EvalError::EmptyCorpus(corpus_dir.to_path_buf()));
    }

    info!(
        corpus = %corpus_dir.display(),
        files = stats.files,
        skipped = stats.skipped,
        chunks = stats.chunks,
        embedder = embedder.name(),
        "building index"
    );

    let index = VectorIndex::build(index_name, chunks, embedder, batch_size).await?;
    Ok((index, stats))
}
