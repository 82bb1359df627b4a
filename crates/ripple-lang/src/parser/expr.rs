//! Expression parser: precedence climbing over a single operator table.
//!
//! Precedence tiers, loosest first: `||`, `&&`, equality, relational,
//! additive, multiplicative, unary, primary. All binary operators are
//! left-associative.

use super::{expected, unexpected, Parser};
use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::CompileError;
use crate::lexer::Token;

/// Binary operator table: (precedence, operator). Higher binds tighter.
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::OrOr => Some((10, BinaryOp::Or)),
        Token::AndAnd => Some((20, BinaryOp::And)),
        Token::EqEq => Some((30, BinaryOp::Eq)),
        Token::BangEq => Some((30, BinaryOp::Ne)),
        Token::Lt => Some((40, BinaryOp::Lt)),
        Token::LtEq => Some((40, BinaryOp::Le)),
        Token::Gt => Some((40, BinaryOp::Gt)),
        Token::GtEq => Some((40, BinaryOp::Ge)),
        Token::Plus => Some((50, BinaryOp::Add)),
        Token::Minus => Some((50, BinaryOp::Sub)),
        Token::Star => Some((60, BinaryOp::Mul)),
        Token::Slash => Some((60, BinaryOp::Div)),
        Token::Percent => Some((60, BinaryOp::Mod)),
        _ => None,
    }
}

impl Parser<'_> {
    pub(super) fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary(0)
    }

    /// Precedence climbing: consume operators with precedence >= `min_prec`.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        let mut left = self.parse_unary()?;

        loop {
            let info = self.stream.peek().and_then(binary_op_info);
            let Some((prec, op)) = info else { break };
            if prec < min_prec {
                break;
            }
            self.stream.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = self.stream.span_from(start);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        let op = match self.stream.peek() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.stream.advance();
            let operand = self.parse_unary()?;
            let span = self.stream.span_from(start);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        match self.stream.peek() {
            Some(Token::Integer(n)) => {
                let n = *n;
                self.stream.advance();
                Ok(Expr::new(ExprKind::IntLiteral(n), self.stream.span_from(start)))
            }
            Some(Token::Float(f)) => {
                let f = *f;
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::FloatLiteral(f),
                    self.stream.span_from(start),
                ))
            }
            Some(Token::True) => {
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::BoolLiteral(true),
                    self.stream.span_from(start),
                ))
            }
            Some(Token::False) => {
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::BoolLiteral(false),
                    self.stream.span_from(start),
                ))
            }
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::StringLiteral(s),
                    self.stream.span_from(start),
                ))
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::Pre) => self.parse_pre(),
            Some(Token::Fold) => self.parse_fold(),
            Some(Token::Ident(_)) => self.parse_ident_or_call(),
            Some(Token::LParen) => {
                if self.lambda_ahead() {
                    self.parse_lambda()
                } else {
                    self.stream.advance();
                    let expr = self.parse_expr()?;
                    self.stream.expect(Token::RParen)?;
                    Ok(expr)
                }
            }
            other => Err(unexpected(other, "in expression", self.stream.current_span())),
        }
    }

    /// `if condition then expr else expr end`
    fn parse_if(&mut self) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::If)?;
        let condition = self.parse_expr()?;
        self.stream.expect(Token::Then)?;
        let then_branch = self.parse_expr()?;
        self.stream.expect(Token::Else)?;
        let else_branch = self.parse_expr()?;
        self.stream.expect(Token::End)?;
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            self.stream.span_from(start),
        ))
    }

    /// `pre(IDENT, initial)`
    fn parse_pre(&mut self) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::Pre)?;
        self.stream.expect(Token::LParen)?;
        let (name, _) = self.stream.expect_ident("as the `pre` target")?;
        self.stream.expect(Token::Comma)?;
        let initial = self.parse_expr()?;
        self.stream.expect(Token::RParen)?;
        Ok(Expr::new(
            ExprKind::Pre {
                name,
                initial: Box::new(initial),
            },
            self.stream.span_from(start),
        ))
    }

    /// `fold(input, initial, (acc, x) => step)`
    fn parse_fold(&mut self) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::Fold)?;
        let slot = self.next_fold_slot();
        self.stream.expect(Token::LParen)?;
        let input = self.parse_expr()?;
        self.stream.expect(Token::Comma)?;
        let initial = self.parse_expr()?;
        self.stream.expect(Token::Comma)?;
        if !self.lambda_ahead() {
            return Err(expected(
                "lambda `(acc, x) => expr` as the third `fold` argument",
                self.stream.peek(),
                self.stream.current_span(),
            ));
        }
        let step = self.parse_lambda()?;
        self.stream.expect(Token::RParen)?;
        Ok(Expr::new(
            ExprKind::Fold {
                slot,
                input: Box::new(input),
                initial: Box::new(initial),
                step: Box::new(step),
            },
            self.stream.span_from(start),
        ))
    }

    fn parse_ident_or_call(&mut self) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        let (name, span) = self.stream.expect_ident("in expression")?;
        if !self.stream.check(&Token::LParen) {
            return Ok(Expr::new(ExprKind::Ident(name), span));
        }

        self.stream.advance();
        let mut args = Vec::new();
        if !self.stream.check(&Token::RParen) {
            loop {
                if self.lambda_ahead() {
                    args.push(self.parse_lambda()?);
                } else {
                    args.push(self.parse_expr()?);
                }
                if !self.stream.check(&Token::Comma) {
                    break;
                }
                self.stream.advance();
            }
        }
        self.stream.expect(Token::RParen)?;
        Ok(Expr::new(
            ExprKind::Call { name, args },
            self.stream.span_from(start),
        ))
    }

    /// `(p1, p2, ...) => body`
    fn parse_lambda(&mut self) -> Result<Expr, CompileError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.stream.check(&Token::RParen) {
            loop {
                let (param, _) = self.stream.expect_ident("as a lambda parameter")?;
                params.push(param);
                if !self.stream.check(&Token::Comma) {
                    break;
                }
                self.stream.advance();
            }
        }
        self.stream.expect(Token::RParen)?;
        self.stream.expect(Token::FatArrow)?;
        let body = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            self.stream.span_from(start),
        ))
    }

    /// Lookahead for `( ident, ident, ... ) =>` without consuming.
    fn lambda_ahead(&self) -> bool {
        if !self.stream.check(&Token::LParen) {
            return false;
        }
        let mut i = 1;
        if matches!(self.stream.peek_nth(i), Some(Token::RParen)) {
            return matches!(self.stream.peek_nth(i + 1), Some(Token::FatArrow));
        }
        loop {
            match self.stream.peek_nth(i) {
                Some(Token::Ident(_)) => i += 1,
                _ => return false,
            }
            match self.stream.peek_nth(i) {
                Some(Token::Comma) => i += 1,
                Some(Token::RParen) => {
                    return matches!(self.stream.peek_nth(i + 1), Some(Token::FatArrow))
                }
                _ => return false,
            }
        }
    }
}
