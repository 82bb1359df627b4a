//! # Ripple language front end
//!
//! Compilation pipeline for Ripple source text, up to (but not including)
//! graph construction:
//!
//! ```text
//! source text
//!     ↓  lexer   (logos)
//! tokens + byte spans
//!     ↓  parser  (hand-written recursive descent)
//! Program (declarations + expressions, every node spanned)
//!     ↓  analyze (duplicates, undefined references, cycles, ranks)
//! Analysis (per-node kind, rank, dependency sets)
//! ```
//!
//! Each stage fails with structured [`error::CompileError`] diagnostics
//! that render with source context through [`error::DiagnosticFormatter`].
//! The executable graph and scheduler live in the `ripple-runtime` crate.

pub mod analyze;
pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use analyze::{analyze, Analysis, NodeInfo, NodeKind};
pub use ast::{Decl, Expr, ExprKind, Program};
pub use error::{CompileError, DiagnosticFormatter, ErrorKind};
pub use lexer::{lex, Token};
pub use parser::parse_program;
pub use span::{SourceFile, SourceMap, Span};

/// Run the full front end: lex, parse, analyze.
///
/// Returns the parsed program together with its analysis, or every
/// diagnostic the first failing stage produced.
pub fn frontend(source: &str, file_id: u16) -> Result<(Program, Analysis), Vec<CompileError>> {
    let tokens = lex(source, file_id).map_err(|e| vec![e])?;
    let program = parse_program(&tokens, file_id).map_err(|e| vec![e])?;
    let analysis = analyze(&program)?;
    Ok((program, analysis))
}
