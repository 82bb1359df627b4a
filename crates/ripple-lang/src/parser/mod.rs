//! Hand-written recursive descent parser for Ripple.
//!
//! - `stream`: token stream wrapper with lookahead and span tracking
//! - `decl`: declaration parsers (keyword-dispatched)
//! - `expr`: expression parser (precedence climbing)
//!
//! The parser stops at the first grammar violation; diagnostics carry the
//! span of the offending token.

mod decl;
mod expr;
mod stream;

use crate::ast::Program;
use crate::error::{CompileError, ErrorKind};
use crate::lexer::Token;
use crate::span::Span;
use std::ops::Range;
use stream::TokenStream;

/// Parse a full program from lexed tokens.
pub fn parse_program(
    tokens: &[(Token, Range<usize>)],
    file_id: u16,
) -> Result<Program, CompileError> {
    let mut parser = Parser::new(tokens, file_id);
    parser.parse_program()
}

/// Parser state: the token stream plus the program-wide `fold` slot
/// counter used to key persistent accumulator cells.
pub(crate) struct Parser<'src> {
    stream: TokenStream<'src>,
    fold_slots: usize,
}

impl<'src> Parser<'src> {
    fn new(tokens: &'src [(Token, Range<usize>)], file_id: u16) -> Self {
        Self {
            stream: TokenStream::new(tokens, file_id),
            fold_slots: 0,
        }
    }

    fn next_fold_slot(&mut self) -> usize {
        let slot = self.fold_slots;
        self.fold_slots += 1;
        slot
    }
}

/// "expected X, found Y" at the given span.
pub(crate) fn expected(what: impl AsRef<str>, found: Option<&Token>, span: Span) -> CompileError {
    let message = match found {
        Some(token) => format!("expected {}, found {}", what.as_ref(), token.describe()),
        None => format!("expected {}, found end of input", what.as_ref()),
    };
    CompileError::new(ErrorKind::Syntax, span, message)
}

/// "unexpected Y <context>" at the given span.
pub(crate) fn unexpected(found: Option<&Token>, context: &str, span: Span) -> CompileError {
    let message = match found {
        Some(token) => format!("unexpected {} {}", token.describe(), context),
        None => format!("unexpected end of input {}", context),
    };
    CompileError::new(ErrorKind::Syntax, span, message)
}
