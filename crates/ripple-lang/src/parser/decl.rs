//! Declaration parsers (keyword-dispatched).
//!
//! ```text
//! program     := decl* EOF
//! sourceDecl  := 'source' IDENT (':' type)? (':=' expr)? ';'
//! streamDecl  := 'stream' IDENT '<-' expr ';'
//! sinkDecl    := 'sink'   IDENT '<-' expr ';'
//! ```

use super::{unexpected, Parser};
use crate::ast::{Decl, Program, ScalarType, SinkDecl, SourceDecl, StreamDecl};
use crate::error::CompileError;
use crate::lexer::Token;

impl Parser<'_> {
    pub(super) fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut decls = Vec::new();
        while !self.stream.at_end() {
            decls.push(self.parse_decl()?);
        }
        Ok(Program { decls })
    }

    fn parse_decl(&mut self) -> Result<Decl, CompileError> {
        match self.stream.peek() {
            Some(Token::Source) => self.parse_source_decl(),
            Some(Token::Stream) => self.parse_stream_decl(),
            Some(Token::Sink) => self.parse_sink_decl(),
            other => Err(unexpected(
                other,
                "at declaration (expected `source`, `stream`, or `sink`)",
                self.stream.current_span(),
            )),
        }
    }

    fn parse_source_decl(&mut self) -> Result<Decl, CompileError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::Source)?;
        let (name, name_span) = self.stream.expect_ident("after `source`")?;

        let ty = if self.stream.check(&Token::Colon) {
            self.stream.advance();
            Some(self.parse_type()?)
        } else {
            None
        };

        let init = if self.stream.check(&Token::ColonEq) {
            self.stream.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.stream.expect(Token::Semicolon)?;
        Ok(Decl::Source(SourceDecl {
            name,
            name_span,
            ty,
            init,
            span: self.stream.span_from(start),
        }))
    }

    fn parse_stream_decl(&mut self) -> Result<Decl, CompileError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::Stream)?;
        let (name, name_span) = self.stream.expect_ident("after `stream`")?;
        self.stream.expect(Token::LeftArrow)?;
        let expr = self.parse_expr()?;
        self.stream.expect(Token::Semicolon)?;
        Ok(Decl::Stream(StreamDecl {
            name,
            name_span,
            expr,
            span: self.stream.span_from(start),
        }))
    }

    fn parse_sink_decl(&mut self) -> Result<Decl, CompileError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::Sink)?;
        let (name, name_span) = self.stream.expect_ident("after `sink`")?;
        self.stream.expect(Token::LeftArrow)?;
        let expr = self.parse_expr()?;
        self.stream.expect(Token::Semicolon)?;
        Ok(Decl::Sink(SinkDecl {
            name,
            name_span,
            expr,
            span: self.stream.span_from(start),
        }))
    }

    fn parse_type(&mut self) -> Result<ScalarType, CompileError> {
        let ty = match self.stream.peek() {
            Some(Token::TyInt) => ScalarType::Int,
            Some(Token::TyFloat) => ScalarType::Float,
            Some(Token::TyBool) => ScalarType::Bool,
            Some(Token::TyString) => ScalarType::String,
            other => {
                return Err(super::expected(
                    "type (`int`, `float`, `bool`, or `string`)",
                    other,
                    self.stream.current_span(),
                ))
            }
        };
        self.stream.advance();
        Ok(ty)
    }
}
