//! Event-driven, rank-priority propagation.
//!
//! Every external push runs to quiescence before the next is accepted:
//!
//! 1. write the new value into the source's cache;
//! 2. refresh every stateful node's `pre` snapshot from the current
//!    caches;
//! 3. seed a min-priority queue (rank, then FIFO) with the source's
//!    back-references and every `pre`-bearing node — the latter join
//!    every wave, which is what advances `pre(counter, 0) + 1` style
//!    self-recursion on each external event;
//! 4. pop in non-decreasing rank order, evaluate each node at most once,
//!    and propagate only when the value observably changed;
//! 5. notify sink observers for sinks whose cache changed.
//!
//! Glitch-freedom holds because a node's dependencies all have strictly
//! smaller rank, so they are final before the node evaluates. A failing
//! formula aborts the wave: the failing node and everything downstream
//! keep their previous caches and the error surfaces from `push`. An
//! optional step budget bounds a wave; exceeding it rolls every cache
//! and fold cell back to the pre-wave state.

use crate::error::{Error, Result};
use crate::eval::{self, EvalContext};
use crate::graph::{FoldCell, Graph};
use crate::value::Value;
use indexmap::IndexMap;
use ripple_lang::analyze::NodeKind;
use ripple_lang::ast::ScalarType;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{debug, trace};

/// Sink observer callback.
pub type SinkObserver = Box<dyn FnMut(&Value)>;

/// The reactive engine owning a compiled graph.
pub struct Engine {
    graph: Graph,
    observers: IndexMap<String, Vec<SinkObserver>>,
    step_budget: Option<usize>,
    waves: u64,
}

impl Engine {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            observers: IndexMap::new(),
            step_budget: None,
            waves: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Cap on node evaluations per wave; exceeding it rolls the wave back.
    pub fn set_step_budget(&mut self, budget: Option<usize>) {
        self.step_budget = budget;
    }

    /// Names of all sources, in declaration order.
    pub fn sources(&self) -> Vec<String> {
        self.names_of(NodeKind::Source)
    }

    /// Names of all sinks, in declaration order.
    pub fn sinks(&self) -> Vec<String> {
        self.names_of(NodeKind::Sink)
    }

    fn names_of(&self, kind: NodeKind) -> Vec<String> {
        self.graph
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.name.clone())
            .collect()
    }

    /// Current value of any declared name; null when never computed.
    pub fn read(&self, name: &str) -> Result<Value> {
        if !self.graph.contains(name) {
            return Err(Error::UnknownNode(name.to_string()));
        }
        Ok(self.graph.value(name).cloned().unwrap_or(Value::Null))
    }

    /// Current values of all sinks, in declaration order.
    pub fn sink_values(&self) -> Vec<(String, Value)> {
        self.graph
            .iter()
            .filter(|n| n.kind == NodeKind::Sink)
            .map(|n| (n.name.clone(), n.cached.clone().unwrap_or(Value::Null)))
            .collect()
    }

    /// Register an observer invoked whenever the sink's value changes.
    pub fn subscribe(&mut self, sink: &str, observer: SinkObserver) -> Result<()> {
        match self.graph.node(sink) {
            None => Err(Error::UnknownNode(sink.to_string())),
            Some(node) if node.kind != NodeKind::Sink => Err(Error::NotASink(sink.to_string())),
            Some(_) => {
                self.observers.entry(sink.to_string()).or_default().push(observer);
                Ok(())
            }
        }
    }

    /// Push a new value into a source and propagate to quiescence.
    pub fn push(&mut self, source: &str, value: Value) -> Result<()> {
        let node = self
            .graph
            .nodes
            .get(source)
            .ok_or_else(|| Error::UnknownNode(source.to_string()))?;
        if node.kind != NodeKind::Source {
            return Err(Error::NotASource(source.to_string()));
        }
        let value = check_push_type(source, node.ty, value)?;

        self.waves += 1;
        debug!(source = %source, wave = self.waves, %value, "push");

        // Wave-start snapshots come first: `pre` reads the world as it
        // was before this push, including the pushed source itself.
        self.snapshot_pre_cells();

        // Undo log: (name, cached, fold cells) before this wave's write.
        let mut undo: Vec<(String, Option<Value>, IndexMap<usize, FoldCell>)> =
            Vec::new();

        {
            let node = &mut self.graph.nodes[source];
            undo.push((source.to_string(), node.cached.take(), node.state.folds.clone()));
            node.cached = Some(value);
        }

        // Min-heap keyed by (rank, seq): rank order, FIFO within a rank.
        let mut queue: BinaryHeap<Reverse<(usize, u64, String)>> = BinaryHeap::new();
        let mut seq = 0u64;

        let seeds: Vec<String> = {
            let back_refs = self.graph.nodes[source]
                .back_refs
                .iter()
                .cloned()
                .collect::<Vec<_>>();
            let stateful = self
                .graph
                .iter()
                .filter(|n| n.has_pre)
                .map(|n| n.name.clone());
            back_refs.into_iter().chain(stateful).collect()
        };
        for name in seeds {
            self.enqueue(&mut queue, &mut seq, &name);
        }

        let mut steps = 0usize;
        let mut changed: Vec<String> = Vec::new();

        while let Some(Reverse((rank, _, name))) = queue.pop() {
            steps += 1;
            if let Some(budget) = self.step_budget {
                if steps > budget {
                    self.rollback(undo);
                    self.clear_dirty();
                    return Err(Error::StepBudgetExceeded(budget));
                }
            }

            let (formula, mut state) = {
                let node = &mut self.graph.nodes[&name];
                node.dirty = false;
                match &node.formula {
                    Some(formula) => (formula.clone(), std::mem::take(&mut node.state)),
                    None => continue,
                }
            };

            let mut scratch = state.clone();
            let result = eval::evaluate(
                &formula,
                &mut EvalContext {
                    graph: &self.graph,
                    state: &mut scratch,
                },
            );

            let value = match result {
                Ok(value) => value,
                Err(error) => {
                    self.graph.nodes[&name].state = state;
                    self.clear_dirty();
                    return Err(Error::eval(name.as_str(), error));
                }
            };
            trace!(node = %name, rank, %value, "evaluated");

            let node_changed = {
                let node = &mut self.graph.nodes[&name];
                let same = matches!(&node.cached, Some(old) if old.observably_equal(&value));
                if same {
                    node.state = state;
                    false
                } else {
                    undo.push((name.clone(), node.cached.take(), state.folds.clone()));
                    node.cached = Some(value);
                    node.state = scratch;
                    true
                }
            };

            if node_changed {
                changed.push(name.clone());
                let back_refs: Vec<String> = self.graph.nodes[&name]
                    .back_refs
                    .iter()
                    .cloned()
                    .collect();
                for child in back_refs {
                    self.enqueue(&mut queue, &mut seq, &child);
                }
            }
        }

        self.notify_sinks(&changed);
        Ok(())
    }

    fn enqueue(
        &mut self,
        queue: &mut BinaryHeap<Reverse<(usize, u64, String)>>,
        seq: &mut u64,
        name: &str,
    ) {
        let Some(node) = self.graph.nodes.get_mut(name) else {
            return;
        };
        if node.dirty {
            return;
        }
        node.dirty = true;
        queue.push(Reverse((node.rank, *seq, name.to_string())));
        *seq += 1;
    }

    /// Refresh the wave-start snapshot every `pre` reads from.
    fn snapshot_pre_cells(&mut self) {
        let snapshots: Vec<(String, Vec<(String, Option<Value>)>)> = self
            .graph
            .iter()
            .filter(|n| !n.state.pre.is_empty())
            .map(|n| {
                let values = n
                    .state
                    .pre
                    .keys()
                    .map(|target| (target.clone(), self.graph.value(target).cloned()))
                    .collect();
                (n.name.clone(), values)
            })
            .collect();
        for (name, values) in snapshots {
            let node = &mut self.graph.nodes[&name];
            for (target, value) in values {
                node.state.pre.insert(target, value);
            }
        }
    }

    fn rollback(
        &mut self,
        undo: Vec<(String, Option<Value>, IndexMap<usize, FoldCell>)>,
    ) {
        for (name, cached, folds) in undo.into_iter().rev() {
            let node = &mut self.graph.nodes[&name];
            node.cached = cached;
            node.state.folds = folds;
        }
    }

    fn clear_dirty(&mut self) {
        for node in self.graph.nodes.values_mut() {
            node.dirty = false;
        }
    }

    fn notify_sinks(&mut self, changed: &[String]) {
        let notifications: Vec<(String, Value)> = self
            .graph
            .iter()
            .filter(|n| n.kind == NodeKind::Sink && changed.contains(&n.name))
            .map(|n| (n.name.clone(), n.cached.clone().unwrap_or(Value::Null)))
            .collect();
        for (sink, value) in notifications {
            if let Some(observers) = self.observers.get_mut(&sink) {
                for observer in observers {
                    observer(&value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use crate::error::EvalError;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine(source: &str) -> Engine {
        compile(source).expect("compile failed")
    }

    /// Subscribe to a sink, collecting every notified value.
    fn record(engine: &mut Engine, sink: &str) -> Rc<RefCell<Vec<Value>>> {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let clone = Rc::clone(&trace);
        engine
            .subscribe(sink, Box::new(move |v| clone.borrow_mut().push(v.clone())))
            .expect("subscribe failed");
        trace
    }

    const DIAMOND: &str = "source A : int := 1;\n\
                           stream B <- A * 2;\n\
                           stream C <- A + 1;\n\
                           stream D <- B + C;\n\
                           sink out <- D;";

    #[test]
    fn diamond_propagates_in_rank_order() {
        let mut engine = engine(DIAMOND);
        assert_eq!(engine.read("out").unwrap(), Value::Int(4));

        engine.push("A", Value::Int(2)).unwrap();
        assert_eq!(engine.read("B").unwrap(), Value::Int(4));
        assert_eq!(engine.read("C").unwrap(), Value::Int(3));
        assert_eq!(engine.read("out").unwrap(), Value::Int(7));

        engine.push("A", Value::Int(5)).unwrap();
        assert_eq!(engine.read("out").unwrap(), Value::Int(16));
    }

    #[test]
    fn diamond_notifies_each_wave_exactly_once() {
        // A glitch would surface as an extra notification mixing the old
        // value of one branch with the new value of the other.
        let mut engine = engine(DIAMOND);
        let trace = record(&mut engine, "out");
        engine.push("A", Value::Int(2)).unwrap();
        engine.push("A", Value::Int(5)).unwrap();
        assert_eq!(*trace.borrow(), vec![Value::Int(7), Value::Int(16)]);
    }

    #[test]
    fn pushing_an_unchanged_value_is_quiet() {
        let mut engine = engine(DIAMOND);
        let trace = record(&mut engine, "out");
        engine.push("A", Value::Int(1)).unwrap();
        assert!(trace.borrow().is_empty());
    }

    #[test]
    fn self_pre_counter_advances_per_wave() {
        let mut engine = engine(
            "source tick : int := 0;\n\
             stream counter <- pre(counter, 0) + 1;\n\
             sink out <- counter;",
        );
        let trace = record(&mut engine, "out");
        for tick in 1..=3 {
            engine.push("tick", Value::Int(tick)).unwrap();
        }
        assert_eq!(
            *trace.borrow(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn pre_on_a_source_lags_one_wave() {
        let mut engine = engine(
            "source x : int := 0;\n\
             stream y <- pre(x, 0);\n\
             sink out <- y;",
        );
        engine.push("x", Value::Int(10)).unwrap();
        assert_eq!(engine.read("out").unwrap(), Value::Int(0));
        engine.push("x", Value::Int(20)).unwrap();
        assert_eq!(engine.read("out").unwrap(), Value::Int(10));
    }

    #[test]
    fn fold_accumulates_on_input_changes() {
        let mut engine = engine(
            "source n : int := 0;\n\
             stream s <- fold(n, 0, (a, x) => a + x);\n\
             sink out <- s;",
        );
        let trace = record(&mut engine, "out");
        for n in [3, 4, 5] {
            engine.push("n", Value::Int(n)).unwrap();
        }
        assert_eq!(
            *trace.borrow(),
            vec![Value::Int(3), Value::Int(7), Value::Int(12)]
        );

        // Re-pushing the same value re-evaluates the node but must not
        // advance the accumulator.
        engine.push("n", Value::Int(5)).unwrap();
        assert_eq!(engine.read("out").unwrap(), Value::Int(12));
        assert_eq!(trace.borrow().len(), 3);
    }

    #[test]
    fn eval_error_aborts_wave_and_keeps_caches() {
        let mut engine = engine(
            "source d : int := 1;\n\
             stream q <- 10 / d;\n\
             sink out <- q;",
        );
        assert_eq!(engine.read("out").unwrap(), Value::Float(10.0));

        let err = engine.push("d", Value::Int(0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Eval { ref node, error: EvalError::DivisionByZero } if node == "q"
        ));
        // The source keeps the pushed value; the failing node and its
        // downstream keep their previous caches.
        assert_eq!(engine.read("d").unwrap(), Value::Int(0));
        assert_eq!(engine.read("q").unwrap(), Value::Float(10.0));
        assert_eq!(engine.read("out").unwrap(), Value::Float(10.0));

        // The graph accepts further pushes.
        engine.push("d", Value::Int(2)).unwrap();
        assert_eq!(engine.read("out").unwrap(), Value::Float(5.0));
    }

    #[test]
    fn step_budget_rolls_the_wave_back() {
        let mut engine = engine(DIAMOND);
        engine.set_step_budget(Some(1));
        let err = engine.push("A", Value::Int(9)).unwrap_err();
        assert!(matches!(err, Error::StepBudgetExceeded(1)));
        assert_eq!(engine.read("A").unwrap(), Value::Int(1));
        assert_eq!(engine.read("out").unwrap(), Value::Int(4));

        engine.set_step_budget(None);
        engine.push("A", Value::Int(9)).unwrap();
        assert_eq!(engine.read("out").unwrap(), Value::Int(28));
    }

    #[test]
    fn push_validates_target_and_type() {
        let mut engine = engine(DIAMOND);
        assert!(matches!(
            engine.push("B", Value::Int(1)),
            Err(Error::NotASource(_))
        ));
        assert!(matches!(
            engine.push("ghost", Value::Int(1)),
            Err(Error::UnknownNode(_))
        ));
        assert!(matches!(
            engine.push("A", Value::Str("nope".into())),
            Err(Error::PushTypeMismatch { .. })
        ));
    }

    #[test]
    fn float_sources_promote_int_pushes() {
        let mut engine = engine(
            "source t : float := 0.0;\n\
             sink out <- t * 2.0;",
        );
        engine.push("t", Value::Int(3)).unwrap();
        assert_eq!(engine.read("out").unwrap(), Value::Float(6.0));
    }

    #[test]
    fn subscribe_rejects_non_sinks() {
        let mut engine = engine(DIAMOND);
        assert!(matches!(
            engine.subscribe("B", Box::new(|_| {})),
            Err(Error::NotASink(_))
        ));
        assert!(matches!(
            engine.subscribe("ghost", Box::new(|_| {})),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn string_concatenation_streams() {
        let mut engine = engine(
            "source name : string := \"world\";\n\
             sink greeting <- \"hello \" + name;",
        );
        assert_eq!(
            engine.read("greeting").unwrap(),
            Value::Str("hello world".into())
        );
        engine.push("name", Value::Str("ripple".into())).unwrap();
        assert_eq!(
            engine.read("greeting").unwrap(),
            Value::Str("hello ripple".into())
        );
    }
}

/// Validate a pushed value against the source's declared type. Ints are
/// promoted into float-typed sources.
fn check_push_type(source: &str, ty: Option<ScalarType>, value: Value) -> Result<Value> {
    let Some(ty) = ty else { return Ok(value) };
    let ok = match (ty, &value) {
        (ScalarType::Int, Value::Int(_)) => true,
        (ScalarType::Float, Value::Float(_)) => true,
        (ScalarType::Float, Value::Int(n)) => return Ok(Value::Float(*n as f64)),
        (ScalarType::Bool, Value::Bool(_)) => true,
        (ScalarType::String, Value::Str(_)) => true,
        _ => false,
    };
    if ok {
        Ok(value)
    } else {
        Err(Error::PushTypeMismatch {
            source_name: source.to_string(),
            expected: ty.name(),
        })
    }
}
