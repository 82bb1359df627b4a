//! Source location tracking for diagnostics.
//!
//! - `Span` — compact byte range into a file managed by a `SourceMap`
//! - `SourceMap` — owns all source files of a compilation
//! - `SourceFile` — one file with a precomputed line-start index

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Byte range in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    /// Index into `SourceMap` files
    pub file_id: u16,
    /// Byte offset of the first byte
    pub start: u32,
    /// Byte offset one past the last byte
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// Zero-length span at the start of a file.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0)
    }

    /// Span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Span {
        debug_assert_eq!(self.file_id, other.file_id);
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// All source files of a compilation.
///
/// Spans carry a `file_id` that resolves against this map for line/column
/// lookup and snippet extraction.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id.
    pub fn add_file(&mut self, path: PathBuf, source: String) -> u16 {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many source files");
        self.files.push(SourceFile::new(path, source));
        file_id as u16
    }

    pub fn file(&self, span: &Span) -> &SourceFile {
        &self.files[span.file_id as usize]
    }

    pub fn file_path(&self, span: &Span) -> &Path {
        &self.files[span.file_id as usize].path
    }

    /// 1-based (line, column) of the span start.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        self.file(span).line_col(span.start)
    }
}

/// A single source file with line indexing.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    /// Byte offset of each line start; the last entry is an EOF sentinel.
    line_starts: Vec<u32>,
}

impl SourceFile {
    pub fn new(path: PathBuf, source: String) -> Self {
        let mut line_starts = vec![0u32];
        for (idx, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push((idx + 1) as u32);
            }
        }
        if line_starts.last() != Some(&(source.len() as u32)) {
            line_starts.push(source.len() as u32);
        }
        Self {
            path,
            source,
            line_starts,
        }
    }

    /// 1-based (line, column) for a byte offset.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.max(1) - 1,
        };
        let line_idx = line_idx.min(self.line_starts.len().saturating_sub(2));
        (
            (line_idx + 1) as u32,
            offset - self.line_starts[line_idx] + 1,
        )
    }

    /// Text of a 1-based line, without the trailing newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 || line as usize >= self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[(line - 1) as usize] as usize;
        let end = self.line_starts[line as usize] as usize;
        Some(self.source[start..end].trim_end_matches(['\n', '\r']))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_lookup() {
        let file = SourceFile::new(PathBuf::from("t.rpl"), "source A;\nstream B;".to_string());
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(7), (1, 8));
        assert_eq!(file.line_col(10), (2, 1));
        assert_eq!(file.line_col(17), (2, 8));
    }

    #[test]
    fn line_text_strips_newline() {
        let file = SourceFile::new(PathBuf::from("t.rpl"), "one\r\ntwo\n".to_string());
        assert_eq!(file.line_text(1), Some("one"));
        assert_eq!(file.line_text(2), Some("two"));
        assert_eq!(file.line_text(3), None);
    }

    #[test]
    fn span_merge_covers_both() {
        let a = Span::new(0, 4, 9);
        let b = Span::new(0, 7, 20);
        assert_eq!(a.merge(&b), Span::new(0, 4, 20));
    }
}
