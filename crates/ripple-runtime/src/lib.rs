//! # Ripple runtime
//!
//! Executable side of the Ripple dataflow language: the dynamically
//! tagged value model with tabular operators, the dependency graph
//! builder, and the rank-ordered reactive engine.
//!
//! The embedding API is four operations:
//!
//! ```text
//! compile(text)            -> Engine | CompileFailure
//! engine.push(name, value) -> Ok | Error        (name must be a source)
//! engine.read(name)        -> Value             (any declared name)
//! engine.subscribe(sink, callback)              (sink observers)
//! ```
//!
//! A push is processed to quiescence before the next one; the graph is
//! owned exclusively by the engine and mutated only from inside `push`.

pub mod builtins;
pub mod csv;
pub mod engine;
pub mod error;
pub mod eval;
pub mod graph;
pub mod value;

pub use engine::Engine;
pub use error::{Error, EvalError};
pub use graph::{CsvBinding, Graph};
pub use value::{Table, Value};

use ripple_lang::{CompileError, DiagnosticFormatter, SourceMap};
use std::fmt;
use std::path::PathBuf;

/// Front-end diagnostics bundled with the sources needed to render them.
#[derive(Debug)]
pub struct Diagnostics {
    pub errors: Vec<CompileError>,
    pub sources: SourceMap,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatter = DiagnosticFormatter::new(&self.sources);
        write!(f, "{}", formatter.format_all(&self.errors))
    }
}

/// Why `compile` failed.
#[derive(Debug)]
pub enum CompileFailure {
    /// Lex, parse, or analysis diagnostics.
    Frontend(Diagnostics),
    /// Graph construction failed (a source initializer did not evaluate).
    Build(Error),
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileFailure::Frontend(diagnostics) => write!(f, "{diagnostics}"),
            CompileFailure::Build(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for CompileFailure {}

/// Compile source text into a ready engine (graph built, cold build done).
pub fn compile(source: &str) -> Result<Engine, CompileFailure> {
    compile_named(source, "<input>")
}

/// `compile` with a file name for diagnostics.
pub fn compile_named(
    source: &str,
    path: impl Into<PathBuf>,
) -> Result<Engine, CompileFailure> {
    let mut sources = SourceMap::new();
    let file_id = sources.add_file(path.into(), source.to_string());
    match ripple_lang::frontend(source, file_id) {
        Err(errors) => Err(CompileFailure::Frontend(Diagnostics { errors, sources })),
        Ok((program, analysis)) => Graph::build(&program, &analysis)
            .map(Engine::new)
            .map_err(CompileFailure::Build),
    }
}
