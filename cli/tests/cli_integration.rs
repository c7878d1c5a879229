use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn memgraph_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_memgraph-server"))
}

fn tmp_store(name: &str) -> PathBuf {
    let mut base = std::env::temp_dir();
    base.push(format!("memgraph-cli-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&base);
    std::fs::create_dir_all(&base).unwrap();
    base.join("memory.jsonl")
}

/// Runs `serve` against a fresh store, feeding it `lines` on stdin and
/// returning its stdout split into lines.
fn run_serve(store: &PathBuf, lines: &[&str]) -> Vec<String> {
    let mut child = Command::new(memgraph_bin())
        .arg("serve")
        .env("MEMORY_FILE_PATH", store)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn memgraph-server serve");

    {
        let stdin = child.stdin.as_mut().expect("serve stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write request line");
        }
    }

    let output = child.wait_with_output().expect("serve output");
    assert!(
        output.status.success(),
        "serve exited non-zero: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .expect("utf8 stdout")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn serve_create_and_search_round_trip() {
    let store = tmp_store("round-trip");
    let responses = run_serve(
        &store,
        &[
            r#"{"tool":"create_entities","arguments":{"entities":[{"name":"docker-compose","entityType":"tool","observations":["runs multi-container apps"]}]}}"#,
            r#"{"tool":"search_nodes","arguments":{"query":"docker"}}"#,
        ],
    );
    assert_eq!(responses.len(), 2);

    let created: serde_json::Value = serde_json::from_str(&responses[0]).unwrap();
    assert_eq!(created["ok"], true);
    assert_eq!(created["result"][0]["name"], "docker-compose");

    let searched: serde_json::Value = serde_json::from_str(&responses[1]).unwrap();
    assert_eq!(searched["ok"], true);
    assert_eq!(searched["result"]["entities"][0]["name"], "docker-compose");
}

#[test]
fn serve_reports_typed_error_for_unknown_tool() {
    let store = tmp_store("unknown-tool");
    let responses = run_serve(&store, &[r#"{"tool":"not_a_real_tool","arguments":{}}"#]);
    assert_eq!(responses.len(), 1);

    let response: serde_json::Value = serde_json::from_str(&responses[0]).unwrap();
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["kind"], "UnknownTool");
}

#[test]
fn serve_reports_typed_error_for_missing_entity() {
    let store = tmp_store("missing-entity");
    let responses = run_serve(
        &store,
        &[r#"{"tool":"add_observations","arguments":{"observations":[{"entityName":"ghost","contents":["x"]}]}}"#],
    );
    assert_eq!(responses.len(), 1);

    let response: serde_json::Value = serde_json::from_str(&responses[0]).unwrap();
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["kind"], "EntityNotFound");
}

#[test]
fn stats_reports_zero_entities_for_a_fresh_store() {
    let store = tmp_store("stats");
    let out = Command::new(memgraph_bin())
        .arg("stats")
        .env("MEMORY_FILE_PATH", &store)
        .output()
        .expect("run stats");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Entities: 0"));
}

#[test]
fn dump_then_check_round_trip_through_the_binary() {
    let store = tmp_store("dump-check");
    run_serve(
        &store,
        &[r#"{"tool":"create_entities","arguments":{"entities":[{"name":"A","entityType":"note","observations":[]}]}}"#],
    );

    let dump = Command::new(memgraph_bin())
        .arg("dump")
        .env("MEMORY_FILE_PATH", &store)
        .output()
        .expect("run dump");
    assert!(dump.status.success());
    let view: serde_json::Value = serde_json::from_slice(&dump.stdout).unwrap();
    assert_eq!(view["entities"][0]["name"], "A");

    let check = Command::new(memgraph_bin())
        .arg("check")
        .env("MEMORY_FILE_PATH", &store)
        .output()
        .expect("run check");
    assert!(check.status.success());
    assert!(String::from_utf8_lossy(&check.stdout).contains("No problems found"));
}
