use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use memgraph::{doctor, tools, Config, MemoryError, MemoryStore};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "memgraph-server")]
#[command(about = "Persistent knowledge-graph retrieval engine for agent memory")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, global = true)]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, global = true)]
    debug: bool,
    /// Overrides MEMORY_FILE_PATH for this invocation
    #[clap(long, global = true)]
    memory_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the line-delimited stdio tool server (the default command)
    Serve,
    /// Print entity/relation counts and store file metadata
    Stats,
    /// Run a context search once and print the resulting subgraph
    Search {
        /// The free-text query
        query: String,
    },
    /// Print the full graph
    Dump,
    /// Run the diagnostics pass and print any problems found
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    let mut builder = Config::builder().from_env();
    if let Some(path) = cli.memory_file {
        builder = builder.memory_file_path(path);
    }
    let store = MemoryStore::new(builder.build());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&store),
        Commands::Stats => stats(&store),
        Commands::Search { query } => run_search(&store, &query),
        Commands::Dump => dump(&store),
        Commands::Check => check(&store),
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", level);
    }
    env_logger::init();
}

/// Runs the stdio tool server: each input line is `{"tool": name,
/// "arguments": {...}}`; each output line is `{"ok": true, "result": ...}`
/// or `{"ok": false, "error": {"kind": ..., "message": ...}}`.
fn serve(store: &MemoryStore) -> Result<()> {
    info!("serving memory store at {}", store.path().display());
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = handle_request_line(store, line);
        writeln!(out, "{response}")?;
        out.flush()?;
    }
    Ok(())
}

fn handle_request_line(store: &MemoryStore, line: &str) -> String {
    let parsed: Result<Value, _> = serde_json::from_str(line);
    let request = match parsed {
        Ok(v) => v,
        Err(e) => {
            return error_response("MalformedRequest", &e.to_string());
        }
    };

    let tool = match request.get("tool").and_then(Value::as_str) {
        Some(t) => t.to_string(),
        None => return error_response("MissingArguments", "request is missing a \"tool\" field"),
    };
    let arguments = request.get("arguments").cloned().unwrap_or(json!({}));

    match tools::dispatch(store, &tool, arguments) {
        Ok(result) => json!({"ok": true, "result": result}).to_string(),
        Err(e) => {
            let kind = e
                .downcast_ref::<MemoryError>()
                .map(MemoryError::kind)
                .unwrap_or("Internal");
            error_response(kind, &e.to_string())
        }
    }
}

fn error_response(kind: &str, message: &str) -> String {
    json!({"ok": false, "error": {"kind": kind, "message": message}}).to_string()
}

fn stats(store: &MemoryStore) -> Result<()> {
    let state = store.load_state()?;
    let metadata = std::fs::metadata(store.path()).ok();
    println!("Store: {}", store.path().display());
    println!("  Entities: {}", state.entities.len());
    println!("  Relations: {}", state.relations.len());
    match metadata {
        Some(m) => {
            println!("  Size: {} bytes", m.len());
            if let Ok(modified) = m.modified() {
                println!("  Last modified: {modified:?}");
            }
        }
        None => println!("  (store file does not exist yet)"),
    }
    Ok(())
}

fn run_search(store: &MemoryStore, query: &str) -> Result<()> {
    let result = store.search_nodes(query)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn dump(store: &MemoryStore) -> Result<()> {
    let result = store.read_graph()?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn check(store: &MemoryStore) -> Result<()> {
    let state = store.load_state()?;
    let problems = doctor::run_default_checks(&state, store.path());
    if problems.is_empty() {
        println!("No problems found.");
        return Ok(());
    }
    println!("Found {} problem(s):", problems.len());
    for problem in problems {
        println!("  [{}] {}", problem.check, problem.message);
    }
    Ok(())
}
