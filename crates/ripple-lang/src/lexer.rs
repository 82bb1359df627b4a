//! Lexical analysis for Ripple source text.
//!
//! Tokenization uses logos. Whitespace and `//` line comments are skipped
//! during lexing; multi-character operators (`:=`, `<-`, `==`, `!=`, `<=`,
//! `>=`, `&&`, `||`, `=>`) are matched with maximal munch. Numeric
//! literals with a dot become floats, otherwise integers. String literals
//! are double-quoted with `\"`, `\\`, `\n`, `\t` escapes.

use crate::error::{CompileError, ErrorKind};
use crate::span::Span;
use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Ripple token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line comments
pub enum Token {
    // === Keywords ===
    /// Keyword `source`
    #[token("source")]
    Source,
    /// Keyword `stream`
    #[token("stream")]
    Stream,
    /// Keyword `sink`
    #[token("sink")]
    Sink,
    /// Keyword `if`
    #[token("if")]
    If,
    /// Keyword `then`
    #[token("then")]
    Then,
    /// Keyword `else`
    #[token("else")]
    Else,
    /// Keyword `end`
    #[token("end")]
    End,
    /// Temporal operator `pre`
    #[token("pre")]
    Pre,
    /// Temporal operator `fold`
    #[token("fold")]
    Fold,

    // Type names
    /// Type name `int`
    #[token("int")]
    TyInt,
    /// Type name `float`
    #[token("float")]
    TyFloat,
    /// Type name `bool`
    #[token("bool")]
    TyBool,
    /// Type name `string`
    #[token("string")]
    TyString,

    // Boolean literals
    /// Boolean literal `true`
    #[token("true")]
    True,
    /// Boolean literal `false`
    #[token("false")]
    False,

    // === Punctuation ===
    /// `:` (type annotation)
    #[token(":")]
    Colon,
    /// `:=` (source initializer)
    #[token(":=")]
    ColonEq,
    /// `<-` (stream/sink binding)
    #[token("<-")]
    LeftArrow,
    /// `;`
    #[token(";")]
    Semicolon,
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `,`
    #[token(",")]
    Comma,
    /// `=>` (lambda arrow)
    #[token("=>")]
    FatArrow,

    // === Operators ===
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `%`
    #[token("%")]
    Percent,
    /// `==`
    #[token("==")]
    EqEq,
    /// `!=`
    #[token("!=")]
    BangEq,
    /// `<`
    #[token("<")]
    Lt,
    /// `<=`
    #[token("<=")]
    LtEq,
    /// `>`
    #[token(">")]
    Gt,
    /// `>=`
    #[token(">=")]
    GtEq,
    /// `&&`
    #[token("&&")]
    AndAnd,
    /// `||`
    #[token("||")]
    OrOr,
    /// `!`
    #[token("!")]
    Bang,

    // === Literals ===
    /// Integer literal
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    /// Float literal (digits with a decimal point)
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    /// String literal, quotes stripped and escapes resolved
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len() - 1])
    })]
    Str(String),

    /// Identifier
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    /// Short description used in parse error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Integer(n) => format!("integer `{n}`"),
            Token::Float(f) => format!("float `{f}`"),
            Token::Str(_) => "string literal".to_string(),
            other => format!("`{other}`"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Source => "source",
            Token::Stream => "stream",
            Token::Sink => "sink",
            Token::If => "if",
            Token::Then => "then",
            Token::Else => "else",
            Token::End => "end",
            Token::Pre => "pre",
            Token::Fold => "fold",
            Token::TyInt => "int",
            Token::TyFloat => "float",
            Token::TyBool => "bool",
            Token::TyString => "string",
            Token::True => "true",
            Token::False => "false",
            Token::Colon => ":",
            Token::ColonEq => ":=",
            Token::LeftArrow => "<-",
            Token::Semicolon => ";",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::FatArrow => "=>",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Integer(n) => return write!(f, "{n}"),
            Token::Float(v) => return write!(f, "{v}"),
            Token::Str(s) => return write!(f, "\"{s}\""),
            Token::Ident(name) => return write!(f, "{name}"),
        };
        f.write_str(text)
    }
}

/// Resolve escape sequences in a string literal body.
fn unescape(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// Tokenize `source`, returning tokens paired with their byte spans.
///
/// Fails on the first unrecognized character or malformed literal.
pub fn lex(source: &str, file_id: u16) -> Result<Vec<(Token, Range<usize>)>, CompileError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        match result {
            Ok(token) => tokens.push((token, range)),
            Err(()) => {
                let slice = lexer.slice();
                let message = if slice.starts_with('"') {
                    "unterminated or malformed string literal".to_string()
                } else {
                    format!("unrecognized character `{slice}`")
                };
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    Span::new(file_id, range.start as u32, range.end as u32),
                    message,
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source, 0)
            .expect("lex failed")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn lexes_declaration_shapes() {
        let tokens = kinds("source A : int := 1;");
        assert_eq!(
            tokens,
            vec![
                Token::Source,
                Token::Ident("A".into()),
                Token::Colon,
                Token::TyInt,
                Token::ColonEq,
                Token::Integer(1),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn maximal_munch_on_compound_operators() {
        assert_eq!(
            kinds("a <= b < c <- d"),
            vec![
                Token::Ident("a".into()),
                Token::LtEq,
                Token::Ident("b".into()),
                Token::Lt,
                Token::Ident("c".into()),
                Token::LeftArrow,
                Token::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn numeric_literals_split_on_dot() {
        assert_eq!(
            kinds("42 3.14"),
            vec![Token::Integer(42), Token::Float(3.14)]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n\t\\""#),
            vec![Token::Str("a\"b\n\t\\".into())]
        );
    }

    #[test]
    fn skips_comments_and_whitespace() {
        assert_eq!(
            kinds("// header\nx // trailing\n  y"),
            vec![Token::Ident("x".into()), Token::Ident("y".into())]
        );
    }

    #[test]
    fn rejects_unknown_character() {
        let err = lex("a @ b", 0).unwrap_err();
        assert!(err.message.contains('@'));
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = lex("\"abc", 0).unwrap_err();
        assert!(err.message.contains("string"));
    }

    #[test]
    fn spans_are_byte_accurate() {
        let tokens = lex("ab + cd", 0).unwrap();
        assert_eq!(tokens[0].1, 0..2);
        assert_eq!(tokens[1].1, 3..4);
        assert_eq!(tokens[2].1, 5..7);
    }
}
