//! Compile-time diagnostics.
//!
//! - `CompileError` — one diagnostic with a primary span, optional
//!   secondary labels, and optional notes
//! - `ErrorKind` — categorizes diagnostics by the stage that raised them
//! - `DiagnosticFormatter` — renders diagnostics with source context and
//!   a caret underline

use crate::span::{SourceMap, Span};
use std::fmt;

/// A single compile-stage diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    /// Related locations ("first defined here", ...).
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

/// Category of compile error, by pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Illegal character or malformed literal.
    Lex,
    /// Grammar violation.
    Syntax,
    /// Name declared more than once.
    DuplicateDefinition,
    /// Free identifier that is not a declared name.
    UndefinedReference,
    /// Unknown built-in, wrong arity, or a misplaced lambda/temporal form.
    InvalidCall,
    /// Cycle in the non-temporal dependency graph.
    CircularDependency,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::DuplicateDefinition => "duplicate definition",
            ErrorKind::UndefinedReference => "undefined reference",
            ErrorKind::InvalidCall => "invalid call",
            ErrorKind::CircularDependency => "circular dependency",
        }
    }
}

/// Secondary labeled span.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl CompileError {
    pub fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {}: {}", self.kind.name(), self.message)
    }
}

impl std::error::Error for CompileError {}

/// Renders diagnostics with file/line/column, the offending source line,
/// and a caret underline sized to the span.
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    pub fn format(&self, error: &CompileError) -> String {
        let mut out = String::new();
        out.push_str(&format!("{error}\n"));

        let (line, col) = self.sources.line_col(&error.span);
        out.push_str(&format!(
            "  --> {}:{}:{}\n",
            self.sources.file_path(&error.span).display(),
            line,
            col
        ));

        let file = self.sources.file(&error.span);
        if let Some(text) = file.line_text(line) {
            out.push_str("   |\n");
            if line > 1 {
                if let Some(previous) = file.line_text(line - 1) {
                    out.push_str(&format!("{:3} | {previous}\n", line - 1));
                }
            }
            out.push_str(&format!("{line:3} | {text}\n"));
            let width = (error.span.end.saturating_sub(error.span.start) as usize).max(1);
            let width = width.min(text.len().saturating_sub(col as usize - 1).max(1));
            out.push_str(&format!(
                "   | {}{}\n",
                " ".repeat(col as usize - 1),
                "^".repeat(width)
            ));
            if let Some(next) = file.line_text(line + 1) {
                out.push_str(&format!("{:3} | {next}\n", line + 1));
            }
        }

        for label in &error.labels {
            let (lline, lcol) = self.sources.line_col(&label.span);
            out.push_str(&format!(
                "   = note: {} (at {}:{}:{})\n",
                label.message,
                self.sources.file_path(&label.span).display(),
                lline,
                lcol
            ));
        }
        for note in &error.notes {
            out.push_str(&format!("   = help: {note}\n"));
        }
        out
    }

    pub fn format_all(&self, errors: &[CompileError]) -> String {
        errors
            .iter()
            .map(|e| self.format(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn formats_with_caret_under_span() {
        let mut sources = SourceMap::new();
        let file_id = sources.add_file(
            PathBuf::from("t.rpl"),
            "stream B <- A + X;".to_string(),
        );
        let error = CompileError::new(
            ErrorKind::UndefinedReference,
            Span::new(file_id, 16, 17),
            "undefined reference `X` in `B`",
        );

        let rendered = DiagnosticFormatter::new(&sources).format(&error);
        assert!(rendered.contains("error: undefined reference"));
        assert!(rendered.contains("t.rpl:1:17"));
        assert!(rendered.contains("stream B <- A + X;"));
        let caret_line = rendered
            .lines()
            .find(|l| l.contains('^'))
            .expect("caret line");
        assert_eq!(caret_line.find('^'), Some(16 + 5)); // 5 = "   | " gutter
    }

    #[test]
    fn labels_and_notes_render() {
        let mut sources = SourceMap::new();
        let file_id = sources.add_file(PathBuf::from("t.rpl"), "stream B <- 1;\nstream B <- 2;".into());
        let error = CompileError::new(
            ErrorKind::DuplicateDefinition,
            Span::new(file_id, 22, 23),
            "duplicate definition of `B`",
        )
        .with_label(Span::new(file_id, 7, 8), "first defined here")
        .with_note("rename one of the declarations");

        let rendered = DiagnosticFormatter::new(&sources).format(&error);
        assert!(rendered.contains("first defined here (at t.rpl:1:8)"));
        assert!(rendered.contains("help: rename one of the declarations"));
    }
}
