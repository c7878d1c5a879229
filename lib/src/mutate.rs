//! Mutations: create/delete entities, create/delete relations, add/delete
//! observations (SPEC_FULL.md §4.4). Each mutation acquires the lock, loads
//! the graph, applies changes, serializes, atomically replaces the file, and
//! rebuilds the indexes — in that order, on every successful call.

use crate::config::Config;
use crate::errors::MemoryError;
use crate::graph::GraphState;
use crate::lock::FileLock;
use crate::model::{Entity, GraphView, Relation};
use crate::{search, store};
use anyhow::Result;
use chrono::Utc;
use log::{debug, info};
use std::collections::HashSet;
use std::path::PathBuf;

/// A request to append observations to one named entity.
#[derive(Debug, Clone)]
pub struct ObservationRequest {
    pub entity_name: String,
    pub contents: Vec<String>,
}

/// The per-target result of `add_observations`.
#[derive(Debug, Clone)]
pub struct AddedObservations {
    pub entity_name: String,
    pub added_observations: Vec<String>,
}

/// A request to remove specific observations from one named entity.
#[derive(Debug, Clone)]
pub struct ObservationDeletion {
    pub entity_name: String,
    pub observations: Vec<String>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The top-level handle onto a store file. Every public method here is a
/// complete operation: readers just load, writers lock-load-mutate-save.
pub struct MemoryStore {
    path: PathBuf,
    config: Config,
}

impl MemoryStore {
    pub fn new(config: Config) -> Self {
        Self {
            path: config.memory_file_path.clone(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Loads the current graph state without taking the lock. Readers may
    /// observe a momentary in-progress write, but never a torn file, since
    /// writers publish via rename.
    pub fn load_state(&self) -> Result<GraphState> {
        let loaded = store::load(&self.path)?;
        Ok(GraphState::new(loaded.entities, loaded.relations))
    }

    pub fn read_graph(&self) -> Result<GraphView> {
        let state = self.load_state()?;
        Ok(GraphView {
            entities: state.entities,
            relations: state.relations,
        })
    }

    pub fn search_nodes(&self, query: &str) -> Result<GraphView> {
        let state = self.load_state()?;
        Ok(search::search(&state, &self.config, query))
    }

    pub fn open_nodes(&self, names: &[String]) -> Result<GraphView> {
        let state = self.load_state()?;
        Ok(search::open_nodes_view(&state, names))
    }

    /// Runs `body` against a freshly loaded graph state while holding the
    /// store lock, then saves and reindexes if `body`'s outcome reports a
    /// change. An outcome reporting no change skips the write entirely.
    fn with_lock<T>(
        &self,
        body: impl FnOnce(&mut GraphState) -> Result<T>,
    ) -> Result<T>
    where
        T: MutationOutcome,
    {
        let mut lock = FileLock::acquire(&self.path)?;
        let mut state = self.load_state()?;
        let outcome = body(&mut state)?;
        lock.touch().ok();
        if outcome.changed() {
            let content = store::serialize(&state.entities, &state.relations)?;
            let writer_id = store::new_writer_id();
            store::atomic_replace(&self.path, &content, &writer_id)?;
            state.rebuild_indexes();
        }
        drop(lock);
        Ok(outcome)
    }

    pub fn create_entities(&self, proposed: Vec<Entity>) -> Result<Vec<Entity>> {
        debug!("create_entities: {} proposed", proposed.len());
        let outcome = self.with_lock(move |state| {
            let mut added = Vec::new();
            let now = now_ms();
            for mut entity in proposed {
                if state.contains_entity(&entity.name) {
                    continue;
                }
                entity.created_at = Some(now);
                entity.updated_at = Some(now);
                state.entities.push(entity.clone());
                added.push(entity);
            }
            Ok(Created(added))
        })?;
        info!("create_entities: {} added", outcome.0.len());
        Ok(outcome.0)
    }

    pub fn create_relations(&self, proposed: Vec<Relation>) -> Result<Vec<Relation>> {
        debug!("create_relations: {} proposed", proposed.len());
        let outcome = self.with_lock(move |state| {
            let mut seen_in_batch: HashSet<(String, String, String)> = state
                .relations
                .iter()
                .map(|r| (r.from.clone(), r.to.clone(), r.relation_type.clone()))
                .collect();
            let mut added = Vec::new();
            for relation in proposed {
                let key = (
                    relation.from.clone(),
                    relation.to.clone(),
                    relation.relation_type.clone(),
                );
                if seen_in_batch.contains(&key) {
                    continue;
                }
                seen_in_batch.insert(key);
                state.relations.push(relation.clone());
                added.push(relation);
            }
            Ok(Created(added))
        })?;
        info!("create_relations: {} added", outcome.0.len());
        Ok(outcome.0)
    }

    /// Appends new observations to existing entities. If any named entity
    /// does not exist, the entire call fails with `EntityNotFound` before
    /// anything is written (SPEC_FULL.md §4.4, §7).
    pub fn add_observations(
        &self,
        requests: Vec<ObservationRequest>,
    ) -> Result<Vec<AddedObservations>> {
        debug!("add_observations: {} targets", requests.len());
        let outcome = self.with_lock(move |state| {
            for request in &requests {
                if !state.contains_entity(&request.entity_name) {
                    return Err(MemoryError::EntityNotFound {
                        name: request.entity_name.clone(),
                    }
                    .into());
                }
            }

            let now = now_ms();
            let mut results = Vec::new();
            for request in requests {
                let entity = state
                    .entity_mut(&request.entity_name)
                    .expect("existence checked above");
                let existing: HashSet<String> = entity.observations.iter().cloned().collect();
                let mut newly_added = Vec::new();
                for content in request.contents {
                    if !existing.contains(&content) {
                        entity.observations.push(content.clone());
                        newly_added.push(content);
                    }
                }
                if !newly_added.is_empty() {
                    entity.updated_at = Some(now);
                }
                results.push(AddedObservations {
                    entity_name: request.entity_name,
                    added_observations: newly_added,
                });
            }
            Ok(Added(results))
        })?;
        info!("add_observations: {} targets processed", outcome.0.len());
        Ok(outcome.0)
    }

    pub fn delete_entities(&self, names: Vec<String>) -> Result<()> {
        debug!("delete_entities: {} names", names.len());
        self.with_lock(move |state| {
            let to_delete: HashSet<String> = names.into_iter().collect();
            let before = state.entities.len();
            state.entities.retain(|e| !to_delete.contains(&e.name));
            let removed_entities = before - state.entities.len();
            state
                .relations
                .retain(|r| !to_delete.contains(&r.from) && !to_delete.contains(&r.to));
            Ok(Changed(removed_entities > 0))
        })?;
        info!("delete_entities: done");
        Ok(())
    }

    pub fn delete_observations(&self, deletions: Vec<ObservationDeletion>) -> Result<()> {
        debug!("delete_observations: {} targets", deletions.len());
        self.with_lock(move |state| {
            let now = now_ms();
            let mut changed = false;
            for deletion in deletions {
                let Some(entity) = state.entity_mut(&deletion.entity_name) else {
                    continue;
                };
                let to_remove: HashSet<String> = deletion.observations.into_iter().collect();
                let before = entity.observations.len();
                entity.observations.retain(|o| !to_remove.contains(o));
                if entity.observations.len() != before {
                    entity.updated_at = Some(now);
                    changed = true;
                }
            }
            Ok(Changed(changed))
        })?;
        info!("delete_observations: done");
        Ok(())
    }

    pub fn delete_relations(&self, relations: Vec<Relation>) -> Result<()> {
        debug!("delete_relations: {} targets", relations.len());
        self.with_lock(move |state| {
            let to_delete: HashSet<(String, String, String)> = relations
                .into_iter()
                .map(|r| (r.from, r.to, r.relation_type))
                .collect();
            let before = state.relations.len();
            state.relations.retain(|r| {
                !to_delete.contains(&(r.from.clone(), r.to.clone(), r.relation_type.clone()))
            });
            Ok(Changed(state.relations.len() != before))
        })?;
        info!("delete_relations: done");
        Ok(())
    }
}

/// Whether a mutation's outcome requires a save. Plain data carriers
/// (`Created`, `Added`) always save when non-empty; `Changed` is explicit.
trait MutationOutcome {
    fn changed(&self) -> bool;
}

struct Created<T>(Vec<T>);
impl<T> MutationOutcome for Created<T> {
    fn changed(&self) -> bool {
        !self.0.is_empty()
    }
}

struct Added(Vec<AddedObservations>);
impl MutationOutcome for Added {
    fn changed(&self) -> bool {
        self.0.iter().any(|a| !a.added_observations.is_empty())
    }
}

struct Changed(bool);
impl MutationOutcome for Changed {
    fn changed(&self) -> bool {
        self.0
    }
}
