//! Interactive push loop.
//!
//! Reads `name = value` lines from stdin, pushes them into the engine,
//! and prints the sink values after each wave. A few inspection commands
//! mirror the runner surface: `graph`, `outputs`, `sources`, `help`,
//! `quit`.

use crate::{parse_value, print_graph, print_outputs};
use ripple_runtime::Engine;
use std::io::{BufRead, Write};
use std::process::ExitCode;

pub fn run(mut engine: Engine) -> ExitCode {
    print_graph(&engine);
    print_outputs(&engine);

    let sources = engine.sources();
    println!("\nsources: {}", sources.join(", "));
    println!("enter `name = value` to push, `help` for commands");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("error: {e}");
                break;
            }
        }

        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "help" => {
                print_help();
                continue;
            }
            "graph" => {
                print_graph(&engine);
                continue;
            }
            "outputs" => {
                print_outputs(&engine);
                continue;
            }
            "sources" => {
                println!("sources: {}", sources.join(", "));
                continue;
            }
            _ => {}
        }

        let Some((name, raw)) = line.split_once('=') else {
            println!("expected `name = value` (or `help`)");
            continue;
        };
        let name = name.trim();
        let value = parse_value(raw.trim());

        match engine.push(name, value) {
            Ok(()) => print_outputs(&engine),
            Err(e) => println!("error: {e}"),
        }
    }

    ExitCode::SUCCESS
}

fn print_help() {
    println!("commands:");
    println!("  name = value   push a value into a source");
    println!("  graph          show the dependency graph");
    println!("  outputs        show current sink values");
    println!("  sources        list source nodes");
    println!("  quit           exit");
    println!("values: 42, 3.14, true, false, \"text\" (or bare text)");
}
