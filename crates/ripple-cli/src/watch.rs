//! Polling CSV watcher.
//!
//! Observes the file behind every `load_csv` source binding; when its
//! mtime advances, the file is re-parsed and the fresh table is pushed
//! into the bound source. The watcher never writes to streams or sinks.

use crate::print_outputs;
use ripple_runtime::{csv, Engine, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

struct WatchEntry {
    source: String,
    path: PathBuf,
    has_header: bool,
    mtime: Option<SystemTime>,
}

fn mtime(path: &PathBuf) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub fn run(mut engine: Engine) -> ExitCode {
    let mut entries: Vec<WatchEntry> = engine
        .graph()
        .csv_bindings
        .iter()
        .map(|b| {
            let path = PathBuf::from(&b.path);
            WatchEntry {
                source: b.source.clone(),
                mtime: mtime(&path),
                path,
                has_header: b.has_header,
            }
        })
        .collect();

    if entries.is_empty() {
        warn!("program has no load_csv sources to watch");
        return ExitCode::SUCCESS;
    }

    for entry in &entries {
        info!(source = %entry.source, path = %entry.path.display(), "watching");
    }
    print_outputs(&engine);

    loop {
        std::thread::sleep(POLL_INTERVAL);
        for entry in &mut entries {
            let current = mtime(&entry.path);
            if current == entry.mtime {
                continue;
            }
            entry.mtime = current;

            let table = match csv::load(&entry.path, entry.has_header) {
                Ok(table) => table,
                Err(e) => {
                    warn!(source = %entry.source, error = %e, "reload failed");
                    continue;
                }
            };
            info!(source = %entry.source, rows = table.rows.len(), "reloaded");
            match engine.push(&entry.source, Value::Table(table)) {
                Ok(()) => print_outputs(&engine),
                Err(e) => warn!(source = %entry.source, error = %e, "push failed"),
            }
        }
    }
}
