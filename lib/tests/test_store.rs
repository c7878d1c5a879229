use memgraph::model::{Entity, Relation};
use memgraph::store;
use tempfile::tempdir;

fn sample_entity(name: &str) -> Entity {
    let mut e = Entity::new(name, "note");
    e.observations.push("a fact".to_string());
    e.created_at = Some(1_000);
    e.updated_at = Some(2_000);
    e
}

#[test]
fn load_of_missing_file_is_empty_graph() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.jsonl");
    let loaded = store::load(&path).unwrap();
    assert!(loaded.entities.is_empty());
    assert!(loaded.relations.is_empty());
}

#[test]
fn round_trip_preserves_order_and_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.jsonl");

    let entities = vec![sample_entity("A"), sample_entity("B")];
    let relations = vec![Relation::new("A", "B", "link")];

    let content = store::serialize(&entities, &relations).unwrap();
    store::atomic_replace(&path, &content, "writer-1").unwrap();

    let loaded = store::load(&path).unwrap();
    assert_eq!(loaded.entities, entities);
    assert_eq!(loaded.relations, relations);
}

#[test]
fn atomic_replace_creates_parent_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("memory.jsonl");
    store::atomic_replace(&path, "", "writer-1").unwrap();
    assert!(path.exists());
}

#[test]
fn atomic_replace_leaves_no_temp_file_on_success() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.jsonl");
    store::atomic_replace(&path, "{}\n", "writer-1").unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn malformed_line_aborts_load_strictly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.jsonl");
    std::fs::write(&path, "not json at all\n").unwrap();
    let result = store::load(&path);
    assert!(result.is_err());
}

#[test]
fn blank_lines_are_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.jsonl");
    let content = format!(
        "{}\n\n{}\n\n",
        serde_json::to_string(&memgraph::Record::Entity(sample_entity("A"))).unwrap(),
        serde_json::to_string(&memgraph::Record::Relation(Relation::new("A", "A", "self"))).unwrap(),
    );
    std::fs::write(&path, content).unwrap();
    let loaded = store::load(&path).unwrap();
    assert_eq!(loaded.entities.len(), 1);
    assert_eq!(loaded.relations.len(), 1);
}
