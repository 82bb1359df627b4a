//! Static analysis over a parsed program.
//!
//! Three properties are enforced in order, stopping at the first violated
//! one (all instances of a property are reported together):
//!
//! 1. no duplicate definitions;
//! 2. every referenced name is declared (lambda parameters shadow), with
//!    built-in call and lambda arity validation folded into this pass;
//! 3. no cycles in the non-temporal dependency graph — `pre(x, v0)`
//!    contributes `v0`'s free names as dependencies but not `x`.
//!
//! After the checks pass, a topological sweep (Kahn's algorithm) assigns
//! every node its rank: sources are rank 0, every other node is one more
//! than its highest-ranked dependency.

use crate::ast::{Decl, Expr, ExprKind, Program};
use crate::error::{CompileError, ErrorKind};
use crate::span::Span;
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};

/// What a declared name is at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Source,
    Stream,
    Sink,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Stream => "stream",
            NodeKind::Sink => "sink",
        }
    }
}

/// Analysis result for one declared name.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub kind: NodeKind,
    /// Topological height: 0 for sources, `1 + max(rank of deps)` otherwise.
    pub rank: usize,
    /// Non-temporal dependencies (excludes `pre` targets).
    pub dependencies: IndexSet<String>,
    /// Every referenced name, `pre` targets included.
    pub references: IndexSet<String>,
    /// Index of the declaration in the program.
    pub decl_index: usize,
}

/// Validated program metadata, keyed by name in declaration order.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub nodes: IndexMap<String, NodeInfo>,
}

/// Built-in function table: name, arity, and which argument (if any) must
/// be a lambda together with that lambda's parameter count.
const BUILTINS: &[(&str, usize, Option<(usize, usize)>)] = &[
    ("load_csv", 2, None),
    ("csv_header", 1, None),
    ("col", 2, None),
    ("row", 2, None),
    ("len", 1, None),
    ("sum", 1, None),
    ("avg", 1, None),
    ("min", 1, None),
    ("max", 1, None),
    ("filter", 2, Some((1, 1))),
    ("count_if", 2, Some((1, 1))),
];

/// Run all analysis passes over `program`.
pub fn analyze(program: &Program) -> Result<Analysis, Vec<CompileError>> {
    check_duplicates(program)?;

    let declared: IndexSet<String> = program
        .decls
        .iter()
        .map(|d| d.name().to_string())
        .collect();

    check_references(program, &declared)?;

    let mut nodes = IndexMap::new();
    for (idx, decl) in program.decls.iter().enumerate() {
        let (kind, dependencies, references) = match decl {
            Decl::Source(_) => (NodeKind::Source, IndexSet::new(), IndexSet::new()),
            Decl::Stream(d) => (
                NodeKind::Stream,
                d.expr.data_dependencies().into_iter().map(|(n, _)| n).collect(),
                d.expr.references().into_iter().map(|(n, _)| n).collect(),
            ),
            Decl::Sink(d) => (
                NodeKind::Sink,
                d.expr.data_dependencies().into_iter().map(|(n, _)| n).collect(),
                d.expr.references().into_iter().map(|(n, _)| n).collect(),
            ),
        };
        nodes.insert(
            decl.name().to_string(),
            NodeInfo {
                kind,
                rank: 0,
                dependencies,
                references,
                decl_index: idx,
            },
        );
    }

    check_cycles(program, &nodes)?;
    assign_ranks(&mut nodes);

    Ok(Analysis { nodes })
}

/// Property 1: names are globally unique across sources, streams, sinks.
fn check_duplicates(program: &Program) -> Result<(), Vec<CompileError>> {
    let mut first_seen: IndexMap<&str, Span> = IndexMap::new();
    let mut errors = Vec::new();
    for decl in &program.decls {
        match first_seen.entry(decl.name()) {
            Entry::Vacant(entry) => {
                entry.insert(decl.name_span());
            }
            Entry::Occupied(entry) => {
                errors.push(
                    CompileError::new(
                        ErrorKind::DuplicateDefinition,
                        decl.name_span(),
                        format!("duplicate definition of `{}`", decl.name()),
                    )
                    .with_label(*entry.get(), "first defined here"),
                );
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Property 2: every free identifier resolves to a declared name, and
/// every call is a known built-in applied with the right shape.
fn check_references(program: &Program, declared: &IndexSet<String>) -> Result<(), Vec<CompileError>> {
    let mut errors = Vec::new();

    for decl in &program.decls {
        match decl {
            Decl::Source(d) => {
                if let Some(init) = &d.init {
                    for (name, span) in init.references() {
                        errors.push(
                            CompileError::new(
                                ErrorKind::UndefinedReference,
                                span,
                                format!(
                                    "source initializer of `{}` references `{name}`",
                                    d.name
                                ),
                            )
                            .with_note("source initializers are evaluated before the graph exists and cannot read other nodes"),
                        );
                    }
                    check_lambda_free(init, &d.name, &mut errors);
                    check_calls(init, &d.name, false, &mut errors);
                }
            }
            Decl::Stream(d) => {
                check_free_names(&d.expr, &d.name, declared, &mut errors);
                check_lambda_free(&d.expr, &d.name, &mut errors);
                check_calls(&d.expr, &d.name, true, &mut errors);
            }
            Decl::Sink(d) => {
                check_free_names(&d.expr, &d.name, declared, &mut errors);
                check_lambda_free(&d.expr, &d.name, &mut errors);
                check_calls(&d.expr, &d.name, true, &mut errors);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_free_names(
    expr: &Expr,
    node: &str,
    declared: &IndexSet<String>,
    errors: &mut Vec<CompileError>,
) {
    for (name, span) in expr.references() {
        if !declared.contains(&name) {
            errors.push(CompileError::new(
                ErrorKind::UndefinedReference,
                span,
                format!("undefined reference `{name}` in `{node}`"),
            ));
        }
    }
}

/// Validate calls, lambda placement, and temporal-operator placement.
///
/// `temporal_ok` is false inside source initializers and lambda bodies,
/// where `pre`/`fold` have no wave to attach to.
fn check_calls(expr: &Expr, node: &str, temporal_ok: bool, errors: &mut Vec<CompileError>) {
    match &expr.kind {
        ExprKind::Call { name, args } => {
            match BUILTINS.iter().find(|(n, _, _)| n == name) {
                None => {
                    errors.push(CompileError::new(
                        ErrorKind::InvalidCall,
                        expr.span,
                        format!("unknown function `{name}` in `{node}`"),
                    ));
                }
                Some((_, arity, lambda_arg)) => {
                    if args.len() != *arity {
                        errors.push(CompileError::new(
                            ErrorKind::InvalidCall,
                            expr.span,
                            format!(
                                "`{name}` takes {arity} argument{}, got {}",
                                if *arity == 1 { "" } else { "s" },
                                args.len()
                            ),
                        ));
                    }
                    if let Some((pos, params)) = lambda_arg {
                        if let Some(arg) = args.get(*pos) {
                            match &arg.kind {
                                ExprKind::Lambda { params: p, .. } if p.len() == *params => {}
                                ExprKind::Lambda { params: p, .. } => {
                                    errors.push(CompileError::new(
                                        ErrorKind::InvalidCall,
                                        arg.span,
                                        format!(
                                            "lambda for `{name}` takes {params} parameter{}, got {}",
                                            if *params == 1 { "" } else { "s" },
                                            p.len()
                                        ),
                                    ));
                                }
                                _ => {
                                    errors.push(CompileError::new(
                                        ErrorKind::InvalidCall,
                                        arg.span,
                                        format!("`{name}` expects a lambda as argument {}", pos + 1),
                                    ));
                                }
                            }
                        }
                    }
                }
            }
            for (i, arg) in args.iter().enumerate() {
                // Lambdas in their expected position are checked above.
                let expected_lambda = BUILTINS
                    .iter()
                    .find(|(n, _, _)| n == name)
                    .and_then(|(_, _, l)| *l)
                    .map(|(pos, _)| pos == i)
                    .unwrap_or(false);
                if !expected_lambda {
                    check_lambda_free(arg, node, errors);
                }
                check_calls(arg, node, temporal_ok, errors);
            }
        }
        ExprKind::Lambda { body, .. } => {
            // Reaching a lambda here means its position was validated by
            // the enclosing call; its body still may not nest temporals.
            check_calls(body, node, false, errors);
        }
        ExprKind::Pre { initial, .. } => {
            if !temporal_ok {
                errors.push(CompileError::new(
                    ErrorKind::InvalidCall,
                    expr.span,
                    format!("`pre` is not allowed here in `{node}`"),
                ));
            }
            check_lambda_free(initial, node, errors);
            check_calls(initial, node, temporal_ok, errors);
        }
        ExprKind::Fold {
            input,
            initial,
            step,
            ..
        } => {
            if !temporal_ok {
                errors.push(CompileError::new(
                    ErrorKind::InvalidCall,
                    expr.span,
                    format!("`fold` is not allowed here in `{node}`"),
                ));
            }
            check_lambda_free(input, node, errors);
            check_lambda_free(initial, node, errors);
            check_calls(input, node, temporal_ok, errors);
            check_calls(initial, node, temporal_ok, errors);
            if let ExprKind::Lambda { params, body } = &step.kind {
                if params.len() != 2 {
                    errors.push(CompileError::new(
                        ErrorKind::InvalidCall,
                        step.span,
                        format!(
                            "`fold` accumulator lambda takes 2 parameters, got {}",
                            params.len()
                        ),
                    ));
                }
                check_calls(body, node, false, errors);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            check_lambda_free(left, node, errors);
            check_lambda_free(right, node, errors);
            check_calls(left, node, temporal_ok, errors);
            check_calls(right, node, temporal_ok, errors);
        }
        ExprKind::Unary { operand, .. } => {
            check_lambda_free(operand, node, errors);
            check_calls(operand, node, temporal_ok, errors);
        }
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            for part in [condition, then_branch, else_branch] {
                check_lambda_free(part, node, errors);
                check_calls(part, node, temporal_ok, errors);
            }
        }
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::Ident(_) => {}
    }
}

/// Lambdas only make sense as direct arguments of the higher-order
/// built-ins; anywhere else they are a misplaced value.
fn check_lambda_free(expr: &Expr, node: &str, errors: &mut Vec<CompileError>) {
    if matches!(expr.kind, ExprKind::Lambda { .. }) {
        errors.push(CompileError::new(
            ErrorKind::InvalidCall,
            expr.span,
            format!("lambda in `{node}` is only allowed as an argument to `fold`, `filter`, or `count_if`"),
        ));
    }
}

/// Property 3: the non-temporal dependency graph is a DAG. Every distinct
/// simple cycle is reported, path in dependency order with the first node
/// repeated at the end.
fn check_cycles(
    program: &Program,
    nodes: &IndexMap<String, NodeInfo>,
) -> Result<(), Vec<CompileError>> {
    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut finished: IndexSet<&str> = IndexSet::new();

    for name in nodes.keys() {
        let mut stack: Vec<&str> = Vec::new();
        find_cycle(name, nodes, &mut stack, &mut finished, &mut cycles);
    }

    if cycles.is_empty() {
        return Ok(());
    }

    let errors = cycles
        .into_iter()
        .map(|cycle| {
            let span = nodes
                .get(&cycle[0])
                .map(|info| program.decls[info.decl_index].name_span())
                .unwrap_or_else(|| Span::zero(0));
            let mut path = cycle.clone();
            path.push(cycle[0].clone());
            CompileError::new(
                ErrorKind::CircularDependency,
                span,
                format!("circular dependency: {}", path.join(" -> ")),
            )
            .with_note("break the cycle with `pre(name, initial)` to read the previous wave's value")
        })
        .collect();
    Err(errors)
}

/// Depth-first search from `name` with an explicit path stack; records
/// each simple cycle once, in a canonical rotation starting at its
/// lexicographically smallest node.
fn find_cycle<'a>(
    name: &'a str,
    nodes: &'a IndexMap<String, NodeInfo>,
    stack: &mut Vec<&'a str>,
    finished: &mut IndexSet<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    if finished.contains(name) {
        return;
    }
    if let Some(pos) = stack.iter().position(|n| *n == name) {
        let cycle = canonical_cycle(&stack[pos..]);
        if !cycles.contains(&cycle) {
            cycles.push(cycle);
        }
        return;
    }
    stack.push(name);
    if let Some(info) = nodes.get(name) {
        for dep in &info.dependencies {
            if nodes.contains_key(dep) {
                find_cycle(dep, nodes, stack, finished, cycles);
            }
        }
    }
    stack.pop();
    finished.insert(name);
}

fn canonical_cycle(path: &[&str]) -> Vec<String> {
    let min_pos = path
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| **n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    path[min_pos..]
        .iter()
        .chain(path[..min_pos].iter())
        .map(|n| n.to_string())
        .collect()
}

/// Kahn's algorithm over the dependency DAG; also the determinism anchor:
/// ties resolve in declaration order because the node map preserves it.
fn assign_ranks(nodes: &mut IndexMap<String, NodeInfo>) {
    let mut in_degree: IndexMap<String, usize> = nodes
        .iter()
        .map(|(name, info)| {
            (
                name.clone(),
                info.dependencies
                    .iter()
                    .filter(|d| nodes.contains_key(*d))
                    .count(),
            )
        })
        .collect();

    let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for (name, info) in nodes.iter() {
        for dep in &info.dependencies {
            if let Some((dep_key, _)) = nodes.get_key_value(dep) {
                dependents
                    .entry(dep_key.as_str())
                    .or_default()
                    .push(name.as_str());
            }
        }
    }

    let mut queue: Vec<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(n, _)| n.clone())
        .collect();
    let mut ranks: IndexMap<String, usize> = IndexMap::new();

    while let Some(name) = queue.first().cloned() {
        queue.remove(0);
        let info = &nodes[&name];
        let rank = if info.kind == NodeKind::Source {
            0
        } else {
            1 + info
                .dependencies
                .iter()
                .filter_map(|d| ranks.get(d).copied())
                .max()
                .unwrap_or(0)
        };
        ranks.insert(name.clone(), rank);

        if let Some(children) = dependents.get(name.as_str()) {
            let children: Vec<String> = children.iter().map(|c| c.to_string()).collect();
            for child in children {
                let deg = in_degree.get_mut(&child).expect("child in degree map");
                *deg -= 1;
                if *deg == 0 {
                    queue.push(child);
                }
            }
        }
    }

    for (name, rank) in ranks {
        nodes[&name].rank = rank;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse_program;

    fn run(source: &str) -> Result<Analysis, Vec<CompileError>> {
        let tokens = lex(source, 0).expect("lex failed");
        let program = parse_program(&tokens, 0).expect("parse failed");
        analyze(&program)
    }

    #[test]
    fn ranks_follow_dependency_height() {
        let analysis = run(
            "source A : int := 1;\n\
             stream B <- A * 2;\n\
             stream C <- A + 1;\n\
             stream D <- B + C;\n\
             sink out <- D;",
        )
        .expect("analysis failed");
        assert_eq!(analysis.nodes["A"].rank, 0);
        assert_eq!(analysis.nodes["B"].rank, 1);
        assert_eq!(analysis.nodes["C"].rank, 1);
        assert_eq!(analysis.nodes["D"].rank, 2);
        assert_eq!(analysis.nodes["out"].rank, 3);
    }

    #[test]
    fn duplicate_definitions_rejected() {
        let errors = run("source A : int := 1;\nstream A <- 2;").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::DuplicateDefinition);
        assert!(errors[0].message.contains("`A`"));
    }

    #[test]
    fn undefined_reference_rejected() {
        let errors = run("source A : int := 1;\nstream B <- A + X;").unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::UndefinedReference);
        assert!(errors[0].message.contains("`X`"));
        assert!(errors[0].message.contains("`B`"));
    }

    #[test]
    fn lambda_parameters_are_not_free() {
        run(
            "source data := load_csv(\"d.csv\", true);\n\
             stream kept <- filter(data, (r) => len(r) > 0);",
        )
        .expect("lambda params should not count as references");
    }

    #[test]
    fn cycle_reported_in_dependency_order() {
        let errors = run(
            "stream A <- B + 1;\n\
             stream B <- C + 1;\n\
             stream C <- A + 1;",
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::CircularDependency);
        assert!(errors[0].message.contains("A -> B -> C -> A"), "{}", errors[0].message);
    }

    #[test]
    fn two_independent_cycles_both_reported() {
        let errors = run(
            "stream A <- B;\n\
             stream B <- A;\n\
             stream C <- D;\n\
             stream D <- C;",
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn self_pre_is_not_a_cycle() {
        let analysis = run(
            "source tick : int := 0;\n\
             stream counter <- pre(counter, 0) + 1;\n\
             sink out <- counter;",
        )
        .expect("pre back-edge must not count as a cycle");
        assert_eq!(analysis.nodes["counter"].rank, 1);
        assert!(analysis.nodes["counter"].dependencies.is_empty());
        assert!(analysis.nodes["counter"].references.contains("counter"));
    }

    #[test]
    fn pre_target_must_be_declared() {
        let errors = run("stream a <- pre(ghost, 0) + 1;").unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::UndefinedReference);
        assert!(errors[0].message.contains("`ghost`"));
    }

    #[test]
    fn unknown_function_rejected() {
        let errors = run("source A : int := 1;\nstream b <- sqrt(A);").unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::InvalidCall);
        assert!(errors[0].message.contains("sqrt"));
    }

    #[test]
    fn builtin_arity_checked() {
        let errors = run("source A : int := 1;\nstream b <- len(A, A);").unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::InvalidCall);
        assert!(errors[0].message.contains("1 argument"));
    }

    #[test]
    fn filter_lambda_arity_checked() {
        let errors = run(
            "source data := load_csv(\"d.csv\", true);\n\
             stream f <- filter(data, (a, b) => true);",
        )
        .unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::InvalidCall);
        assert!(errors[0].message.contains("1 parameter"));
    }

    #[test]
    fn source_initializer_cannot_reference_nodes() {
        let errors = run("source A : int := 1;\nsource B : int := A + 1;").unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::UndefinedReference);
        assert!(errors[0].notes[0].contains("initializers"));
    }

    #[test]
    fn temporal_operators_rejected_inside_lambdas() {
        let errors = run(
            "source data := load_csv(\"d.csv\", true);\n\
             stream f <- count_if(data, (r) => pre(f, 0) > 0);",
        )
        .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ErrorKind::InvalidCall && e.message.contains("pre")));
    }

    #[test]
    fn stream_with_no_dependencies_ranks_above_sources() {
        let analysis = run("stream constant <- 1 + 2;").expect("analysis failed");
        assert_eq!(analysis.nodes["constant"].rank, 1);
    }
}
