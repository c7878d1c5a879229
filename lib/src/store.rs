//! Owns the single persisted file. `load` and `atomic_replace` are the only
//! two operations; there is no in-process caching of file contents (SPEC_FULL.md §4.1).

use crate::errors::MemoryError;
use crate::model::{Entity, Record, Relation};
use anyhow::{Context, Result};
use log::{debug, warn};
use rand::Rng;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A parsed store file: entities and relations in on-disk order.
#[derive(Debug, Clone, Default)]
pub struct LoadedStore {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// Load the store file at `path`. A missing file yields an empty store; any
/// other I/O failure or the first malformed line aborts the load (the
/// specification requires strict, not lenient, parsing).
pub fn load(path: &Path) -> Result<LoadedStore> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("store file {} absent, returning empty graph", path.display());
            return Ok(LoadedStore::default());
        }
        Err(e) => {
            warn!("failed to read store file {}: {e}", path.display());
            return Err(MemoryError::StoreIoError {
                path: path.display().to_string(),
                source: e.to_string(),
            }
            .into());
        }
    };

    let mut store = LoadedStore::default();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line).map_err(|e| MemoryError::MalformedRecord {
            line_number: idx + 1,
            source: e.to_string(),
        })?;
        match record {
            Record::Entity(entity) => store.entities.push(entity),
            Record::Relation(relation) => store.relations.push(relation),
        }
    }
    Ok(store)
}

/// Serialize a store in the on-disk format: all entities in insertion order,
/// then all relations in insertion order, one JSON object per line.
pub fn serialize(entities: &[Entity], relations: &[Relation]) -> Result<String> {
    let mut out = String::new();
    for entity in entities {
        let line = serde_json::to_string(&Record::Entity(entity.clone()))
            .context("failed to serialize entity record")?;
        out.push_str(&line);
        out.push('\n');
    }
    for relation in relations {
        let line = serde_json::to_string(&Record::Relation(relation.clone()))
            .context("failed to serialize relation record")?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Atomically replace the store file's contents: write to a sibling temp
/// file disambiguated by `writer_id`, then rename over the live path. The
/// rename is atomic on POSIX for same-directory, same-filesystem paths,
/// which is the property readers rely on to never observe a torn file.
pub fn atomic_replace(path: &Path, content: &str, writer_id: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| MemoryError::StoreIoError {
                path: parent.display().to_string(),
                source: e.to_string(),
            })?;
        }
    }

    let tmp_path = tmp_path_for(path, writer_id);
    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp_path).map_err(|e| MemoryError::StoreIoError {
            path: tmp_path.display().to_string(),
            source: e.to_string(),
        })?;
        file.write_all(content.as_bytes())
            .map_err(|e| MemoryError::StoreIoError {
                path: tmp_path.display().to_string(),
                source: e.to_string(),
            })?;
        file.sync_all().ok();
        fs::rename(&tmp_path, path).map_err(|e| MemoryError::StoreIoError {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        Ok(())
    })();

    if result.is_err() {
        // The rename never happened; the live file is untouched. Abandon the
        // temp file rather than risk deleting something a concurrent writer
        // is mid-way through creating.
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn tmp_path_for(path: &Path, writer_id: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "store".to_string());
    path.with_file_name(format!("{file_name}.tmp.{writer_id}"))
}

/// A short random-ish identifier disambiguating concurrent writers' temp
/// files; combines the process id with a random suffix.
pub fn new_writer_id() -> String {
    let suffix: u32 = rand::rng().random();
    format!("{}-{:08x}", std::process::id(), suffix)
}
