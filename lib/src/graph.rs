//! In-memory graph state: the entity table, the relation list, and the
//! derived indexes rebuilt whole after every load and save (SPEC_FULL.md §2, §4.3).

use crate::indexer;
use crate::model::{Entity, Relation};
use std::collections::{HashMap, HashSet};

/// The complete in-memory knowledge graph plus its derived indexes. Owns all
/// entity and relation records; the indexes below only ever hold references
/// by name.
#[derive(Debug, Default, Clone)]
pub struct GraphState {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    /// name -> position in `entities`, rebuilt with the rest of the index.
    name_index: HashMap<String, usize>,
    /// token -> set of entity names whose indexed text contains the token.
    inverted_index: HashMap<String, HashSet<String>>,
}

impl GraphState {
    pub fn new(entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        let mut state = GraphState {
            entities,
            relations,
            name_index: HashMap::new(),
            inverted_index: HashMap::new(),
        };
        state.rebuild_indexes();
        state
    }

    /// Clears and repopulates the name map and inverted index from the
    /// current entity/relation lists. Called after load and after every
    /// successful save; never maintained incrementally.
    pub fn rebuild_indexes(&mut self) {
        let (name_index, inverted_index) = indexer::build(&self.entities);
        self.name_index = name_index;
        self.inverted_index = inverted_index;
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.name_index.get(name).map(|&idx| &self.entities[idx])
    }

    pub fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        let idx = *self.name_index.get(name)?;
        Some(&mut self.entities[idx])
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn names_matching(&self, token: &str) -> Option<&HashSet<String>> {
        self.inverted_index.get(token)
    }

    /// Degree map: for every entity name appearing as `from` or `to` on any
    /// relation, the count of such endpoint occurrences (a relation touching
    /// the same entity on both ends contributes 2, per SPEC_FULL.md §9).
    pub fn degree_map(&self) -> HashMap<&str, usize> {
        let mut degrees: HashMap<&str, usize> = HashMap::new();
        for relation in &self.relations {
            *degrees.entry(relation.from.as_str()).or_insert(0) += 1;
            *degrees.entry(relation.to.as_str()).or_insert(0) += 1;
        }
        degrees
    }
}
