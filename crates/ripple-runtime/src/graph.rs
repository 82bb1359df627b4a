//! Executable dependency graph.
//!
//! One node per declared name. Dependency edges are owned by the reading
//! node; `back_refs` mirrors them for dirty propagation. Nodes whose
//! formula contains `pre` or `fold` carry persistent state:
//!
//! - the `pre` snapshot maps each referenced name to its cache as of the
//!   start of the current wave (`None` until the target first computes);
//! - each `fold` occurrence owns an accumulator cell keyed by its
//!   parser-assigned slot.
//!
//! The cold build evaluates stateless streams and sinks in ascending rank
//! order. Stateful nodes are left uncomputed so that the first push wave
//! observes their initial operator state; they join every subsequent wave
//! (see the engine).

use crate::error::{Error, Result};
use crate::eval::{self, EvalContext};
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use ripple_lang::analyze::{Analysis, NodeKind};
use ripple_lang::ast::{Decl, Expr, ExprKind, Program, ScalarType};
use std::rc::Rc;
use tracing::{debug, warn};

/// Persistent accumulator for one `fold` occurrence.
#[derive(Debug, Clone, Default)]
pub struct FoldCell {
    pub acc: Value,
    /// Input value the accumulator last advanced on.
    pub last_input: Option<Value>,
}

/// Per-node state for the temporal operators.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    /// Wave-start snapshot per `pre`-referenced name.
    pub pre: IndexMap<String, Option<Value>>,
    /// Fold cells keyed by parser slot.
    pub folds: IndexMap<usize, FoldCell>,
}

/// A graph node: one declared source, stream, or sink.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Topological height; sources are 0.
    pub rank: usize,
    /// Compiled formula; absent for sources.
    pub formula: Option<Rc<Expr>>,
    /// Names this node reads, `pre` targets excluded.
    pub dependencies: IndexSet<String>,
    /// Nodes that depend on this one (dirty propagation only).
    pub back_refs: IndexSet<String>,
    /// Last computed value; `None` until first evaluation.
    pub cached: Option<Value>,
    pub state: NodeState,
    /// Formula contains `pre`: the node joins every wave.
    pub has_pre: bool,
    /// In the current wave's queue.
    pub dirty: bool,
    /// Declared source type, checked on push.
    pub ty: Option<ScalarType>,
}

/// A `load_csv` call bound to a source initializer; the file watcher
/// observes the path and pushes fresh tables into the source.
#[derive(Debug, Clone)]
pub struct CsvBinding {
    pub source: String,
    pub path: String,
    pub has_header: bool,
}

/// The compiled program: nodes in declaration order plus watcher bindings.
#[derive(Debug, Default)]
pub struct Graph {
    pub nodes: IndexMap<String, Node>,
    pub csv_bindings: Vec<CsvBinding>,
}

impl Graph {
    /// Cached value of a node, if it has computed one.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.nodes.get(name).and_then(|n| n.cached.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Nodes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Build the executable graph from an analyzed program and run the
    /// cold build. Fails only when a source initializer fails to
    /// evaluate (a missing CSV file, typically).
    pub fn build(program: &Program, analysis: &Analysis) -> Result<Graph> {
        let mut graph = Graph::default();

        for decl in &program.decls {
            let info = &analysis.nodes[decl.name()];
            let (formula, ty) = match decl {
                Decl::Source(d) => (None, d.ty),
                Decl::Stream(d) => (Some(Rc::new(d.expr.clone())), None),
                Decl::Sink(d) => (Some(Rc::new(d.expr.clone())), None),
            };

            let mut state = NodeState::default();
            let mut has_pre = false;
            if let Some(formula) = &formula {
                has_pre = formula.contains_pre();
                for target in formula.pre_targets() {
                    state.pre.insert(target, None);
                }
            }

            graph.nodes.insert(
                decl.name().to_string(),
                Node {
                    name: decl.name().to_string(),
                    kind: info.kind,
                    rank: info.rank,
                    formula,
                    dependencies: info.dependencies.clone(),
                    back_refs: IndexSet::new(),
                    cached: None,
                    state,
                    has_pre,
                    dirty: false,
                    ty,
                },
            );
        }

        // Mirror edges for dirty propagation.
        let edges: Vec<(String, String)> = graph
            .nodes
            .values()
            .flat_map(|node| {
                node.dependencies
                    .iter()
                    .map(|dep| (dep.clone(), node.name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (dep, dependent) in edges {
            if let Some(node) = graph.nodes.get_mut(&dep) {
                node.back_refs.insert(dependent);
            }
        }

        graph.bind_csv_sources(program);
        graph.init_sources(program)?;
        graph.init_fold_cells(program);
        graph.cold_build();

        Ok(graph)
    }

    fn bind_csv_sources(&mut self, program: &Program) {
        for decl in &program.decls {
            let Decl::Source(d) = decl else { continue };
            let Some(init) = &d.init else { continue };
            if let ExprKind::Call { name, args } = &init.kind {
                if name == "load_csv" && args.len() == 2 {
                    if let (ExprKind::StringLiteral(path), ExprKind::BoolLiteral(h)) =
                        (&args[0].kind, &args[1].kind)
                    {
                        self.csv_bindings.push(CsvBinding {
                            source: d.name.clone(),
                            path: path.clone(),
                            has_header: *h,
                        });
                    }
                }
            }
        }
    }

    /// Evaluate source initializers, in declaration order.
    fn init_sources(&mut self, program: &Program) -> Result<()> {
        for decl in &program.decls {
            let Decl::Source(d) = decl else { continue };
            let Some(init) = &d.init else { continue };
            let mut scratch = NodeState::default();
            let value = eval::evaluate(
                init,
                &mut EvalContext {
                    graph: self,
                    state: &mut scratch,
                },
            )
            .map_err(|e| Error::eval(d.name.as_str(), e))?;
            debug!(source = %d.name, %value, "source initialized");
            self.nodes[&d.name].cached = Some(value);
        }
        Ok(())
    }

    /// Evaluate every `fold` initial expression into its cell.
    fn init_fold_cells(&mut self, program: &Program) {
        let mut initials: Vec<(String, usize, Expr)> = Vec::new();
        for decl in &program.decls {
            let Some(expr) = decl.expr() else { continue };
            if matches!(decl, Decl::Source(_)) {
                continue;
            }
            expr.visit(&mut |e| {
                if let ExprKind::Fold { slot, initial, .. } = &e.kind {
                    initials.push((decl.name().to_string(), *slot, (**initial).clone()));
                }
            });
        }

        for (node, slot, initial) in initials {
            let mut scratch = NodeState::default();
            let acc = match eval::evaluate(
                &initial,
                &mut EvalContext {
                    graph: self,
                    state: &mut scratch,
                },
            ) {
                Ok(value) => value,
                Err(e) => {
                    warn!(node = %node, slot, error = %e, "fold initial failed, cell starts null");
                    Value::Null
                }
            };
            self.nodes[&node].state.folds.insert(
                slot,
                FoldCell {
                    acc,
                    last_input: None,
                },
            );
        }
    }

    /// Populate caches of stateless streams and sinks in rank order.
    fn cold_build(&mut self) {
        let mut order: Vec<String> = self
            .nodes
            .values()
            .filter(|n| {
                n.kind != NodeKind::Source && !n.has_pre && n.state.folds.is_empty()
            })
            .map(|n| n.name.clone())
            .collect();
        order.sort_by_key(|name| self.nodes[name].rank);

        for name in order {
            let Some(formula) = self.nodes[&name].formula.clone() else {
                continue;
            };
            let mut scratch = NodeState::default();
            match eval::evaluate(
                &formula,
                &mut EvalContext {
                    graph: self,
                    state: &mut scratch,
                },
            ) {
                Ok(value) => {
                    debug!(node = %name, %value, "cold build");
                    self.nodes[&name].cached = Some(value);
                }
                Err(e) => {
                    warn!(node = %name, error = %e, "cold build left node uncomputed");
                }
            }
        }
    }
}
