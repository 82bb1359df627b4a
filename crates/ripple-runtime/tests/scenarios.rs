//! End-to-end scenarios: compile a program, drive it with pushes, and
//! observe sink traces.

use ripple_runtime::{compile, CompileFailure, Engine, Table, Value};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

fn engine(source: &str) -> Engine {
    compile(source).expect("compile failed")
}

fn record(engine: &mut Engine, sink: &str) -> Rc<RefCell<Vec<Value>>> {
    let trace = Rc::new(RefCell::new(Vec::new()));
    let clone = Rc::clone(&trace);
    engine
        .subscribe(sink, Box::new(move |v| clone.borrow_mut().push(v.clone())))
        .expect("subscribe failed");
    trace
}

fn frontend_errors(source: &str) -> Vec<ripple_lang::CompileError> {
    match compile(source) {
        Err(CompileFailure::Frontend(diagnostics)) => diagnostics.errors,
        Ok(_) => panic!("expected compile failure"),
        Err(other) => panic!("expected frontend diagnostics, got {other}"),
    }
}

#[test]
fn diamond_dependency_updates_consistently() {
    let mut engine = engine(
        "source A : int := 1;\n\
         stream B <- A * 2;\n\
         stream C <- A + 1;\n\
         stream D <- B + C;\n\
         sink out <- D;",
    );
    let trace = record(&mut engine, "out");

    for a in [2, 5] {
        engine.push("A", Value::Int(a)).unwrap();
    }

    // D = 3A + 1, observed exactly once per wave.
    assert_eq!(*trace.borrow(), vec![Value::Int(7), Value::Int(16)]);
}

#[test]
fn counter_counts_external_events() {
    let mut engine = engine(
        "source tick : int := 0;\n\
         stream counter <- pre(counter, 0) + 1;\n\
         sink out <- counter;",
    );
    let trace = record(&mut engine, "out");
    for tick in [1, 2, 3] {
        engine.push("tick", Value::Int(tick)).unwrap();
    }
    assert_eq!(
        *trace.borrow(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn fold_accumulates_pushed_values() {
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
}

#[test]
fn cyclic_program_is_rejected_with_the_cycle_path() {
    let errors = frontend_errors(
        "stream A <- B + 1;\n\
         stream B <- C + 1;\n\
         stream C <- A + 1;",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ripple_lang::ErrorKind::CircularDependency);
    assert!(
        errors[0].message.contains("A -> B -> C -> A"),
        "{}",
        errors[0].message
    );
}

#[test]
fn undefined_reference_is_rejected() {
    let errors = frontend_errors("source A : int := 1;\nstream B <- A + X;");
    assert_eq!(errors[0].kind, ripple_lang::ErrorKind::UndefinedReference);
    assert!(errors[0].message.contains("`X`"));
    assert!(errors[0].message.contains("`B`"));
}

#[test]
fn duplicate_definition_is_rejected() {
    let errors = frontend_errors("source A : int := 1;\nstream A <- 2;");
    assert_eq!(errors[0].kind, ripple_lang::ErrorKind::DuplicateDefinition);
}

#[test]
fn temperature_bands_follow_the_input() {
    let mut engine = engine(
        "source t : float := 20.0;\n\
         stream s <- if t < 10 then \"cold\" else if t < 25 then \"ok\" else \"hot\" end end;\n\
         sink out <- s;",
    );
    assert_eq!(engine.read("out").unwrap(), Value::Str("ok".into()));

    let trace = record(&mut engine, "out");
    for t in [5.0, 20.0, 30.0] {
        engine.push("t", Value::Float(t)).unwrap();
    }
    assert_eq!(
        *trace.borrow(),
        vec![
            Value::Str("cold".into()),
            Value::Str("ok".into()),
            Value::Str("hot".into())
        ]
    );
}

#[test]
fn csv_average_and_table_replacement() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "name,salary\nalice,100\nbob,200\ncarol,300\n").unwrap();
    file.flush().unwrap();

    let program = format!(
        "source data := load_csv(\"{}\", true);\n\
         stream avg_salary <- avg(col(data, 1));\n\
         sink out <- avg_salary;",
        file.path().display()
    );
    let mut engine = engine(&program);
    assert_eq!(engine.read("out").unwrap(), Value::Float(200.0));

    // The watcher contract: a fresh table pushed into the bound source.
    let replacement = Value::Table(Table {
        header: Some(vec!["name".into(), "salary".into()]),
        rows: vec![
            vec![Value::Str("dave".into()), Value::Int(400)],
            vec![Value::Str("erin".into()), Value::Int(600)],
        ],
    });
    engine.push("data", replacement).unwrap();
    assert_eq!(engine.read("out").unwrap(), Value::Float(500.0));
}

#[test]
fn csv_bindings_are_exposed_for_the_watcher() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "a,b\n1,2\n").unwrap();
    file.flush().unwrap();

    let path = file.path().display().to_string();
    let engine = engine(&format!(
        "source data := load_csv(\"{path}\", true);\n\
         sink rows <- len(data);"
    ));
    let bindings = &engine.graph().csv_bindings;
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].source, "data");
    assert_eq!(bindings[0].path, path);
    assert!(bindings[0].has_header);
}

#[test]
fn missing_csv_fails_the_build() {
    let result = compile(
        "source data := load_csv(\"/nonexistent/missing.csv\", true);\n\
         sink rows <- len(data);",
    );
    match result {
        Err(CompileFailure::Build(e)) => {
            assert!(e.to_string().contains("missing.csv"), "{e}");
        }
        other => panic!("expected build failure, got {:?}", other.is_ok()),
    }
}

#[test]
fn table_reductions_and_projections() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "day,amount\n1,10\n2,30\n3,20\n").unwrap();
    file.flush().unwrap();

    let mut engine = engine(&format!(
        "source data := load_csv(\"{}\", true);\n\
         stream amounts <- col(data, 1);\n\
         sink total <- sum(amounts);\n\
         sink highest <- max(amounts);\n\
         sink lowest <- min(amounts);\n\
         sink n <- len(amounts);\n\
         sink first_day <- row(data, 0);",
        file.path().display()
    ));
    assert_eq!(engine.read("total").unwrap(), Value::Int(60));
    assert_eq!(engine.read("highest").unwrap(), Value::Int(30));
    assert_eq!(engine.read("lowest").unwrap(), Value::Int(10));
    assert_eq!(engine.read("n").unwrap(), Value::Int(3));
    assert_eq!(
        engine.read("first_day").unwrap(),
        Value::List(vec![Value::Int(1), Value::Int(10)])
    );

    engine
        .push(
            "data",
            Value::Table(Table {
                header: None,
                rows: vec![vec![Value::Int(9), Value::Int(5)]],
            }),
        )
        .unwrap();
    assert_eq!(engine.read("total").unwrap(), Value::Int(5));
}

#[test]
fn filter_and_count_if_with_predicates() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "a,b\n1,100\n2,200\n3,300\n").unwrap();
    file.flush().unwrap();

    let engine = engine(&format!(
        "source data := load_csv(\"{}\", true);\n\
         stream big <- filter(data, (r) => max(r) >= 200);\n\
         sink big_rows <- len(big);\n\
         sink n_big <- count_if(data, (r) => max(r) >= 200);",
        file.path().display()
    ));
    assert_eq!(engine.read("big_rows").unwrap(), Value::Int(2));
    assert_eq!(engine.read("n_big").unwrap(), Value::Int(2));
}

#[test]
fn csv_header_builtin() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "name,salary\nalice,100\n").unwrap();
    file.flush().unwrap();

    let engine = engine(&format!(
        "sink columns <- csv_header(\"{}\");",
        file.path().display()
    ));
    assert_eq!(
        engine.read("columns").unwrap(),
        Value::List(vec![
            Value::Str("name".into()),
            Value::Str("salary".into())
        ])
    );
}

#[test]
fn pre_on_another_stream_lags_one_wave() {
    let mut engine = engine(
        "source x : int := 0;\n\
         stream doubled <- x * 2;\n\
         stream delayed <- pre(doubled, 0);\n\
         sink now <- doubled;\n\
         sink before <- delayed;",
    );
    engine.push("x", Value::Int(1)).unwrap();
    assert_eq!(engine.read("now").unwrap(), Value::Int(2));
    assert_eq!(engine.read("before").unwrap(), Value::Int(0));

    engine.push("x", Value::Int(5)).unwrap();
    assert_eq!(engine.read("now").unwrap(), Value::Int(10));
    assert_eq!(engine.read("before").unwrap(), Value::Int(2));
}

#[test]
fn identical_push_sequences_produce_identical_traces() {
    let program = "source a : int := 0;\n\
                   source b : int := 0;\n\
                   stream mix <- a * 10 + b;\n\
                   stream acc <- fold(mix, 0, (s, x) => s + x);\n\
                   sink out <- acc;";
    let pushes = [("a", 1), ("b", 2), ("a", 3), ("b", 4), ("b", 4), ("a", 1)];

    let run = || {
        let mut engine = engine(program);
        let trace = record(&mut engine, "out");
        for (source, value) in pushes {
            engine.push(source, Value::Int(value)).unwrap();
        }
        let result = trace.borrow().clone();
        result
    };

    assert_eq!(run(), run());
}

#[test]
fn mixed_arithmetic_promotes() {
    let mut engine = engine(
        "source price : float := 2.5;\n\
         source qty : int := 4;\n\
         sink cost <- price * qty;",
    );
    assert_eq!(engine.read("cost").unwrap(), Value::Float(10.0));
    engine.push("qty", Value::Int(10)).unwrap();
    assert_eq!(engine.read("cost").unwrap(), Value::Float(25.0));
}

#[test]
fn logical_operators_short_circuit() {
    // `d == 0 || 10 / d > 1` must not divide when d is zero.
    let mut engine = engine(
        "source d : int := 5;\n\
         sink ok <- d == 0 || 10 / d > 1;",
    );
    assert_eq!(engine.read("ok").unwrap(), Value::Bool(true));
    engine.push("d", Value::Int(0)).unwrap();
    assert_eq!(engine.read("ok").unwrap(), Value::Bool(true));
}
