//! AST renderers: indented tree and Graphviz dot.
//!
//! JSON rendering goes through serde on the AST types directly.

use ripple_lang::ast::{Decl, Expr, ExprKind, Program};
use std::fmt::Write;

/// Indented tree, one node per line.
pub fn tree(program: &Program) -> String {
    let mut out = String::new();
    out.push_str("program\n");
    for decl in &program.decls {
        match decl {
            Decl::Source(d) => {
                let ty = d.ty.map(|t| format!(" : {}", t.name())).unwrap_or_default();
                let _ = writeln!(out, "  source {}{ty}", d.name);
                if let Some(init) = &d.init {
                    expr_tree(init, 2, &mut out);
                }
            }
            Decl::Stream(d) => {
                let _ = writeln!(out, "  stream {}", d.name);
                expr_tree(&d.expr, 2, &mut out);
            }
            Decl::Sink(d) => {
                let _ = writeln!(out, "  sink {}", d.name);
                expr_tree(&d.expr, 2, &mut out);
            }
        }
    }
    out
}

fn expr_label(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::IntLiteral(n) => format!("int {n}"),
        ExprKind::FloatLiteral(f) => format!("float {f}"),
        ExprKind::BoolLiteral(b) => format!("bool {b}"),
        ExprKind::StringLiteral(s) => format!("string {s:?}"),
        ExprKind::Ident(name) => format!("ident {name}"),
        ExprKind::Binary { op, .. } => format!("binary {}", op.symbol()),
        ExprKind::Unary { op, .. } => format!("unary {}", op.symbol()),
        ExprKind::If { .. } => "if".to_string(),
        ExprKind::Call { name, .. } => format!("call {name}"),
        ExprKind::Lambda { params, .. } => format!("lambda ({})", params.join(", ")),
        ExprKind::Pre { name, .. } => format!("pre {name}"),
        ExprKind::Fold { .. } => "fold".to_string(),
    }
}

fn expr_children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Binary { left, right, .. } => vec![left, right],
        ExprKind::Unary { operand, .. } => vec![operand],
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => vec![condition, then_branch, else_branch],
        ExprKind::Call { args, .. } => args.iter().collect(),
        ExprKind::Lambda { body, .. } => vec![body],
        ExprKind::Pre { initial, .. } => vec![initial],
        ExprKind::Fold {
            input,
            initial,
            step,
            ..
        } => vec![input, initial, step],
        _ => Vec::new(),
    }
}

fn expr_tree(expr: &Expr, depth: usize, out: &mut String) {
    let _ = writeln!(out, "{}{}", "  ".repeat(depth), expr_label(expr));
    for child in expr_children(expr) {
        expr_tree(child, depth + 1, out);
    }
}

/// Graphviz digraph of the AST.
pub fn dot(program: &Program) -> String {
    let mut out = String::from("digraph ast {\n  node [shape=box, fontname=\"monospace\"];\n");
    let mut next_id = 0usize;

    for decl in &program.decls {
        let decl_id = next_id;
        next_id += 1;
        let (label, expr) = match decl {
            Decl::Source(d) => (format!("source {}", d.name), d.init.as_ref()),
            Decl::Stream(d) => (format!("stream {}", d.name), Some(&d.expr)),
            Decl::Sink(d) => (format!("sink {}", d.name), Some(&d.expr)),
        };
        let _ = writeln!(out, "  n{decl_id} [label=\"{}\"];", escape(&label));
        if let Some(expr) = expr {
            let child = dot_expr(expr, &mut next_id, &mut out);
            let _ = writeln!(out, "  n{decl_id} -> n{child};");
        }
    }

    out.push_str("}\n");
    out
}

fn dot_expr(expr: &Expr, next_id: &mut usize, out: &mut String) -> usize {
    let id = *next_id;
    *next_id += 1;
    let _ = writeln!(out, "  n{id} [label=\"{}\"];", escape(&expr_label(expr)));
    for child in expr_children(expr) {
        let child_id = dot_expr(child, next_id, out);
        let _ = writeln!(out, "  n{id} -> n{child_id};");
    }
    id
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
