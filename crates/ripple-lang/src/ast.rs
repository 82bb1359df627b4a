//! AST for Ripple programs.
//!
//! A program is a flat list of declarations; expressions are a spanned
//! tagged union. `pre` and `fold` are AST forms of their own rather than
//! function calls, because the analyzer and the engine treat them
//! specially (temporal back-edges and persistent accumulators).

use crate::span::Span;
use serde::Serialize;

/// A parsed Ripple program.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub decls: Vec<Decl>,
}

/// Top-level declaration.
#[derive(Debug, Clone, Serialize)]
pub enum Decl {
    Source(SourceDecl),
    Stream(StreamDecl),
    Sink(SinkDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Source(d) => &d.name,
            Decl::Stream(d) => &d.name,
            Decl::Sink(d) => &d.name,
        }
    }

    /// Span of the declared name.
    pub fn name_span(&self) -> Span {
        match self {
            Decl::Source(d) => d.name_span,
            Decl::Stream(d) => d.name_span,
            Decl::Sink(d) => d.name_span,
        }
    }

    /// The bound expression: `None` for sources without an initializer.
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Decl::Source(d) => d.init.as_ref(),
            Decl::Stream(d) => Some(&d.expr),
            Decl::Sink(d) => Some(&d.expr),
        }
    }
}

/// `source IDENT (: type)? (:= expr)? ;`
#[derive(Debug, Clone, Serialize)]
pub struct SourceDecl {
    pub name: String,
    pub name_span: Span,
    pub ty: Option<ScalarType>,
    pub init: Option<Expr>,
    pub span: Span,
}

/// `stream IDENT <- expr ;`
#[derive(Debug, Clone, Serialize)]
pub struct StreamDecl {
    pub name: String,
    pub name_span: Span,
    pub expr: Expr,
    pub span: Span,
}

/// `sink IDENT <- expr ;`
#[derive(Debug, Clone, Serialize)]
pub struct SinkDecl {
    pub name: String,
    pub name_span: Span,
    pub expr: Expr,
    pub span: Span,
}

/// Scalar type annotation on a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalarType {
    Int,
    Float,
    Bool,
    String,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
        }
    }
}

/// Spanned expression.
#[derive(Debug, Clone, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Expression variants.
#[derive(Debug, Clone, Serialize)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    /// Reference to a declared node or a lambda parameter.
    Ident(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `if c then a else b end`
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// Built-in function call.
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `(p1, p2, ...) => body` — consumed by `fold`/`filter`/`count_if`.
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    /// `pre(name, initial)` — value of `name` as of the previous wave.
    Pre {
        name: String,
        initial: Box<Expr>,
    },
    /// `fold(input, initial, (acc, x) => step)`.
    ///
    /// `slot` is a program-wide occurrence id assigned by the parser; the
    /// engine keys the persistent accumulator cell on it.
    Fold {
        slot: usize,
        input: Box<Expr>,
        initial: Box<Expr>,
        step: Box<Expr>,
    },
}

/// Binary operators, grouped by precedence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Walk every referenced graph name in `expr`, skipping lambda-bound
/// parameters. `pre` targets are reported when `include_pre` is set;
/// either way the `pre` initializer subtree is walked.
fn walk_references<'a>(
    expr: &'a Expr,
    bound: &mut Vec<&'a str>,
    include_pre: bool,
    out: &mut dyn FnMut(&'a str, Span),
) {
    match &expr.kind {
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::StringLiteral(_) => {}
        ExprKind::Ident(name) => {
            if !bound.iter().any(|b| b == name) {
                out(name, expr.span);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            walk_references(left, bound, include_pre, out);
            walk_references(right, bound, include_pre, out);
        }
        ExprKind::Unary { operand, .. } => walk_references(operand, bound, include_pre, out),
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            walk_references(condition, bound, include_pre, out);
            walk_references(then_branch, bound, include_pre, out);
            walk_references(else_branch, bound, include_pre, out);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                walk_references(arg, bound, include_pre, out);
            }
        }
        ExprKind::Lambda { params, body } => {
            let depth = bound.len();
            bound.extend(params.iter().map(String::as_str));
            walk_references(body, bound, include_pre, out);
            bound.truncate(depth);
        }
        ExprKind::Pre { name, initial } => {
            if include_pre && !bound.iter().any(|b| b == name) {
                out(name, expr.span);
            }
            walk_references(initial, bound, include_pre, out);
        }
        ExprKind::Fold {
            input,
            initial,
            step,
            ..
        } => {
            walk_references(input, bound, include_pre, out);
            walk_references(initial, bound, include_pre, out);
            walk_references(step, bound, include_pre, out);
        }
    }
}

impl Expr {
    /// Every referenced graph name (including `pre` targets), with the
    /// span of its first occurrence, in traversal order.
    pub fn references(&self) -> Vec<(String, Span)> {
        let mut seen = Vec::new();
        let mut bound = Vec::new();
        walk_references(self, &mut bound, true, &mut |name, span| {
            if !seen.iter().any(|(n, _)| n == name) {
                seen.push((name.to_string(), span));
            }
        });
        seen
    }

    /// Referenced names that form data dependencies: `pre` targets are
    /// excluded (temporal back-edges do not participate in cycle
    /// detection or ranking).
    pub fn data_dependencies(&self) -> Vec<(String, Span)> {
        let mut seen = Vec::new();
        let mut bound = Vec::new();
        walk_references(self, &mut bound, false, &mut |name, span| {
            if !seen.iter().any(|(n, _)| n == name) {
                seen.push((name.to_string(), span));
            }
        });
        seen
    }

    /// Whether the expression contains a `pre` form anywhere.
    pub fn contains_pre(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(e.kind, ExprKind::Pre { .. }) {
                found = true;
            }
        });
        found
    }

    /// Names referenced through `pre`, in traversal order.
    pub fn pre_targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        self.visit(&mut |e| {
            if let ExprKind::Pre { name, .. } = &e.kind {
                if !targets.contains(name) {
                    targets.push(name.clone());
                }
            }
        });
        targets
    }

    /// Pre-order traversal over every subexpression.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match &self.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::Ident(_) => {}
            ExprKind::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            ExprKind::Unary { operand, .. } => operand.visit(f),
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.visit(f);
                then_branch.visit(f);
                else_branch.visit(f);
            }
            ExprKind::Call { args, .. } => {
                for arg in args {
                    arg.visit(f);
                }
            }
            ExprKind::Lambda { body, .. } => body.visit(f),
            ExprKind::Pre { initial, .. } => initial.visit(f),
            ExprKind::Fold {
                input,
                initial,
                step,
                ..
            } => {
                input.visit(f);
                initial.visit(f);
                step.visit(f);
            }
        }
    }
}
