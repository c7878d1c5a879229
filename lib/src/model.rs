//! Defines the persisted record types: entities and relations, and the
//! tagged wrapper used to read/write them as line-delimited JSON.

use serde::{Deserialize, Serialize};

/// A named node in the knowledge graph.
///
/// `created_at`/`updated_at` are absent on legacy records; callers treat an
/// absent `updated_at` as "unknown" recency (see [`crate::search`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// A directed, typed edge between two entity names, identified by the
/// `(from, to, relation_type)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    #[serde(rename = "relationType")]
    pub relation_type: String,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }

    /// Whether this relation touches the given entity name on either end.
    pub fn touches(&self, name: &str) -> bool {
        self.from == name || self.to == name
    }
}

/// One line of the persisted store file: a discriminated entity or relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Entity(Entity),
    Relation(Relation),
}

/// The full in-memory knowledge graph as returned by `read_graph`,
/// `search_nodes`, and `open_nodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphView {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}
