//! Ripple runner.
//!
//! Compiles a `.rpl` program and either renders its AST, prints the
//! dependency graph, applies scripted pushes, watches bound CSV files,
//! or drops into the interactive push loop.
//!
//! Exit codes: 0 success, 1 compile error, 2 evaluation error at push
//! time, 3 I/O error loading the source file or a CSV.

mod render;
mod repl;
mod watch;

use clap::{Parser, ValueEnum};
use ripple_runtime::{CompileFailure, Engine, Error, EvalError, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AstFormat {
    Tree,
    Dot,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "ripple")]
#[command(about = "Run a Ripple reactive dataflow program")]
struct Cli {
    /// Path to a Ripple program (.rpl)
    file: PathBuf,

    /// Render the parse tree and exit
    #[arg(long, value_enum, value_name = "FORMAT")]
    ast: Option<AstFormat>,

    /// Print the dependency graph and current outputs, then exit
    #[arg(long)]
    graph: bool,

    /// Apply a `name=value` push (repeatable), print outputs, and exit
    #[arg(long = "push", value_name = "NAME=VALUE")]
    pushes: Vec<String>,

    /// Watch CSV files bound to sources and re-push on change
    #[arg(long)]
    watch: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(e) => {
            error!("cannot read {}: {e}", cli.file.display());
            return ExitCode::from(3);
        }
    };

    if let Some(format) = cli.ast {
        return render_ast(&source, &cli.file, format);
    }

    let mut engine = match ripple_runtime::compile_named(&source, cli.file.clone()) {
        Ok(engine) => engine,
        Err(CompileFailure::Frontend(diagnostics)) => {
            eprintln!("{diagnostics}");
            return ExitCode::from(1);
        }
        Err(CompileFailure::Build(e)) => {
            eprintln!("error: {e}");
            let code = match &e {
                Error::Eval {
                    error: EvalError::Io(_),
                    ..
                } => 3,
                _ => 1,
            };
            return ExitCode::from(code);
        }
    };

    if cli.graph {
        print_graph(&engine);
        print_outputs(&engine);
        return ExitCode::SUCCESS;
    }

    if !cli.pushes.is_empty() {
        return run_pushes(&mut engine, &cli.pushes);
    }

    if cli.watch {
        return watch::run(engine);
    }

    repl::run(engine)
}

fn render_ast(source: &str, file: &std::path::Path, format: AstFormat) -> ExitCode {
    let mut sources = ripple_lang::SourceMap::new();
    let file_id = sources.add_file(file.to_path_buf(), source.to_string());

    let program = ripple_lang::lex(source, file_id)
        .and_then(|tokens| ripple_lang::parse_program(&tokens, file_id));
    let program = match program {
        Ok(program) => program,
        Err(e) => {
            let formatter = ripple_lang::DiagnosticFormatter::new(&sources);
            eprintln!("{}", formatter.format(&e));
            return ExitCode::from(1);
        }
    };

    let rendered = match format {
        AstFormat::Tree => render::tree(&program),
        AstFormat::Dot => render::dot(&program),
        AstFormat::Json => match serde_json::to_string_pretty(&program) {
            Ok(json) => json,
            Err(e) => {
                error!("json rendering failed: {e}");
                return ExitCode::from(1);
            }
        },
    };
    println!("{rendered}");
    ExitCode::SUCCESS
}

fn run_pushes(engine: &mut Engine, pushes: &[String]) -> ExitCode {
    for push in pushes {
        let Some((name, raw)) = push.split_once('=') else {
            error!("push `{push}` is not of the form name=value");
            return ExitCode::from(2);
        };
        let (name, value) = (name.trim(), parse_value(raw.trim()));
        if let Err(e) = engine.push(name, value) {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
        println!("pushed {name}");
        print_outputs(engine);
    }
    ExitCode::SUCCESS
}

/// Interpret a pushed literal: int, float, bool, then string (quotes
/// stripped when present).
pub(crate) fn parse_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    Value::Str(raw.trim_matches('"').to_string())
}

pub(crate) fn print_graph(engine: &Engine) {
    let mut nodes: Vec<_> = engine.graph().iter().collect();
    nodes.sort_by_key(|n| n.rank);

    println!("dependency graph:");
    for node in nodes {
        let value = node
            .cached
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string());
        println!(
            "  [rank {}] {} {} = {}",
            node.rank,
            node.kind.name(),
            node.name,
            value
        );
        if !node.dependencies.is_empty() {
            let deps: Vec<_> = node.dependencies.iter().map(String::as_str).collect();
            println!("           reads: {}", deps.join(", "));
        }
    }
}

pub(crate) fn print_outputs(engine: &Engine) {
    println!("outputs:");
    for (name, value) in engine.sink_values() {
        println!("  {name} = {value}");
    }
}
