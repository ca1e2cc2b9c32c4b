//! Recursive character text splitting.
//!
//! Text is cut on the coarsest separator present (paragraphs, then lines, then
//! words, then single characters) and the pieces are greedily merged back into
//! chunks of at most `chunk_size` characters. Consecutive chunks share a tail
//! of at most `chunk_overlap` characters.

use std::collections::VecDeque;

/// Separators tried in order; the empty separator splits into characters.
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for text chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 700,
            chunk_overlap: 100,
        }
    }
}

/// Splits text into overlapping, size-bounded chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkConfig,
    separators: Vec<&'static str>,
}

impl TextSplitter {
    /// Create a splitter with the paragraph/line/word/character separators.
    pub fn new(config: ChunkConfig) -> Self {
        Self::with_separators(config, DEFAULT_SEPARATORS.to_vec())
    }

    /// Create a splitter with custom separators, coarsest first.
    pub fn with_separators(config: ChunkConfig, separators: Vec<&'static str>) -> Self {
        Self { config, separators }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split text into trimmed, non-empty chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&'static str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.config.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    /// Greedily join pieces into chunks, carrying a tail of at most
    /// `chunk_overlap` characters into the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let sep_len = char_len(separator);

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joint = if window.is_empty() { 0 } else { sep_len };

            if total + len + joint > size && !window.is_empty() {
                if let Some(chunk) = join_trimmed(&window, separator) {
                    chunks.push(chunk);
                }

                loop {
                    let joint = if window.is_empty() { 0 } else { sep_len };
                    let too_long = total > overlap || (total > 0 && total + len + joint > size);
                    if !too_long {
                        break;
                    }
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let joint = if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(first) + joint);
                }
            }

            window.push_back(piece);
            let joint = if window.len() > 1 { sep_len } else { 0 };
            total += len + joint;
        }

        if let Some(chunk) = join_trimmed(&window, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_trimmed(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
