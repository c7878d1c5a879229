//! A non-mutating diagnostics pass over a loaded graph: a small set of
//! independent checks, each producing zero or more `Problem` records
//! (SPEC_FULL.md §4.11). Grounded in the reference stack's environment
//! "doctor" pattern, adapted from RDF import-graph checks to this store's
//! invariants.

use crate::config::LOCK_STALE_TIMEOUT_MS;
use crate::graph::GraphState;
use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub check: &'static str,
    pub message: String,
}

pub trait Check {
    fn name(&self) -> &'static str;
    fn run(&self, state: &GraphState, store_path: &Path, problems: &mut Vec<Problem>);
}

/// A relation whose `from` or `to` does not name a known entity. Can arise
/// because relation creation performs no referential check; this check only
/// surfaces it.
pub struct DanglingRelations;

impl Check for DanglingRelations {
    fn name(&self) -> &'static str {
        "dangling-relation"
    }

    fn run(&self, state: &GraphState, _store_path: &Path, problems: &mut Vec<Problem>) {
        for relation in &state.relations {
            if !state.contains_entity(&relation.from) {
                problems.push(Problem {
                    check: self.name(),
                    message: format!(
                        "relation {}->{} ({}) references missing entity {}",
                        relation.from, relation.to, relation.relation_type, relation.from
                    ),
                });
            }
            if !state.contains_entity(&relation.to) {
                problems.push(Problem {
                    check: self.name(),
                    message: format!(
                        "relation {}->{} ({}) references missing entity {}",
                        relation.from, relation.to, relation.relation_type, relation.to
                    ),
                });
            }
        }
    }
}

/// An entity whose observation list contains a case-sensitive duplicate.
/// Should be unreachable given the mutation contract, but the file format is
/// hand-editable, so this check is defensive.
pub struct DuplicateObservations;

impl Check for DuplicateObservations {
    fn name(&self) -> &'static str {
        "duplicate-observation"
    }

    fn run(&self, state: &GraphState, _store_path: &Path, problems: &mut Vec<Problem>) {
        for entity in &state.entities {
            let mut seen = HashSet::new();
            for observation in &entity.observations {
                if !seen.insert(observation.as_str()) {
                    problems.push(Problem {
                        check: self.name(),
                        message: format!(
                            "entity {} has duplicate observation: {observation}",
                            entity.name
                        ),
                    });
                }
            }
        }
    }
}

/// A `<store>.tmp.*` sibling older than the lock stale timeout, left behind
/// by a writer cancelled before its rename completed (SPEC_FULL.md §5).
pub struct OrphanTempFiles;

impl Check for OrphanTempFiles {
    fn name(&self) -> &'static str {
        "orphan-temp-file"
    }

    fn run(&self, _state: &GraphState, store_path: &Path, problems: &mut Vec<Problem>) {
        let Some(parent) = store_path.parent() else {
            return;
        };
        let Some(file_name) = store_path.file_name().map(|n| n.to_string_lossy().to_string())
        else {
            return;
        };
        let prefix = format!("{file_name}.tmp.");
        let Ok(entries) = std::fs::read_dir(parent) else {
            return;
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&prefix) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or_default();
            if age.as_millis() as u64 > LOCK_STALE_TIMEOUT_MS {
                problems.push(Problem {
                    check: self.name(),
                    message: format!("orphan temp file {}", entry.path().display()),
                });
            }
        }
    }
}

/// Runs the full default check suite over `state`, which was loaded from
/// `store_path`.
pub fn run_default_checks(state: &GraphState, store_path: &Path) -> Vec<Problem> {
    let checks: Vec<Box<dyn Check>> = vec![
        Box::new(DanglingRelations),
        Box::new(DuplicateObservations),
        Box::new(OrphanTempFiles),
    ];
    let mut problems = Vec::new();
    for check in &checks {
        check.run(state, store_path, &mut problems);
    }
    problems
}
