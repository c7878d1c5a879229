//! The tool surface (SPEC_FULL.md §6.2): a fixed set of named operations,
//! each mapping loosely-typed JSON arguments to a checked Rust struct before
//! touching the graph (§9 design notes).

use crate::errors::MemoryError;
use crate::model::{Entity, GraphView, Relation};
use crate::mutate::{AddedObservations, MemoryStore, ObservationDeletion, ObservationRequest};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct CreateEntitiesArgs {
    entities: Vec<EntityInput>,
}

#[derive(Debug, Deserialize)]
struct EntityInput {
    name: String,
    #[serde(rename = "entityType")]
    entity_type: String,
    #[serde(default)]
    observations: Vec<String>,
}

impl From<EntityInput> for Entity {
    fn from(input: EntityInput) -> Self {
        Entity {
            name: input.name,
            entity_type: input.entity_type,
            observations: input.observations,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateRelationsArgs {
    relations: Vec<RelationInput>,
}

#[derive(Debug, Deserialize)]
struct RelationInput {
    from: String,
    to: String,
    #[serde(rename = "relationType")]
    relation_type: String,
}

impl From<RelationInput> for Relation {
    fn from(input: RelationInput) -> Self {
        Relation {
            from: input.from,
            to: input.to,
            relation_type: input.relation_type,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddObservationsArgs {
    observations: Vec<ObservationInput>,
}

#[derive(Debug, Deserialize)]
struct ObservationInput {
    #[serde(rename = "entityName")]
    entity_name: String,
    contents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteEntitiesArgs {
    #[serde(rename = "entityNames")]
    entity_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteObservationsArgs {
    deletions: Vec<DeletionInput>,
}

#[derive(Debug, Deserialize)]
struct DeletionInput {
    #[serde(rename = "entityName")]
    entity_name: String,
    observations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteRelationsArgs {
    relations: Vec<RelationInput>,
}

#[derive(Debug, Deserialize)]
struct SearchNodesArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct OpenNodesArgs {
    names: Vec<String>,
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| {
        MemoryError::MissingArguments {
            tool: tool.to_string(),
            detail: e.to_string(),
        }
        .into()
    })
}

fn added_observations_to_json(results: Vec<AddedObservations>) -> Value {
    json!(results
        .into_iter()
        .map(|r| json!({
            "entityName": r.entity_name,
            "addedObservations": r.added_observations,
        }))
        .collect::<Vec<_>>())
}

fn graph_view_to_json(view: GraphView) -> Value {
    serde_json::to_value(view).expect("GraphView always serializes")
}

/// Dispatch a tool call by name against the given store. Returns the JSON
/// value the transport layer should write back, or an error the caller maps
/// onto whatever wire-level error shape it uses.
pub fn dispatch(store: &MemoryStore, tool: &str, arguments: Value) -> Result<Value> {
    match tool {
        "create_entities" => {
            let args: CreateEntitiesArgs = parse_args(tool, arguments)?;
            let entities = args.entities.into_iter().map(Entity::from).collect();
            let added = store.create_entities(entities)?;
            Ok(serde_json::to_value(added)?)
        }
        "create_relations" => {
            let args: CreateRelationsArgs = parse_args(tool, arguments)?;
            let relations = args.relations.into_iter().map(Relation::from).collect();
            let added = store.create_relations(relations)?;
            Ok(serde_json::to_value(added)?)
        }
        "add_observations" => {
            let args: AddObservationsArgs = parse_args(tool, arguments)?;
            let requests = args
                .observations
                .into_iter()
                .map(|o| ObservationRequest {
                    entity_name: o.entity_name,
                    contents: o.contents,
                })
                .collect();
            let results = store.add_observations(requests)?;
            Ok(added_observations_to_json(results))
        }
        "delete_entities" => {
            let args: DeleteEntitiesArgs = parse_args(tool, arguments)?;
            store.delete_entities(args.entity_names)?;
            Ok(json!("entities deleted successfully"))
        }
        "delete_observations" => {
            let args: DeleteObservationsArgs = parse_args(tool, arguments)?;
            let deletions = args
                .deletions
                .into_iter()
                .map(|d| ObservationDeletion {
                    entity_name: d.entity_name,
                    observations: d.observations,
                })
                .collect();
            store.delete_observations(deletions)?;
            Ok(json!("observations deleted successfully"))
        }
        "delete_relations" => {
            let args: DeleteRelationsArgs = parse_args(tool, arguments)?;
            let relations = args.relations.into_iter().map(Relation::from).collect();
            store.delete_relations(relations)?;
            Ok(json!("relations deleted successfully"))
        }
        "read_graph" => {
            let view = store.read_graph()?;
            Ok(graph_view_to_json(view))
        }
        "search_nodes" => {
            let args: SearchNodesArgs = parse_args(tool, arguments)?;
            let view = store.search_nodes(&args.query)?;
            Ok(graph_view_to_json(view))
        }
        "open_nodes" => {
            let args: OpenNodesArgs = parse_args(tool, arguments)?;
            let view = store.open_nodes(&args.names)?;
            Ok(graph_view_to_json(view))
        }
        other => Err(MemoryError::UnknownTool {
            name: other.to_string(),
        }
        .into()),
    }
}

/// The fixed list of tool names the surface exposes, for transports that
/// want to advertise a capability list.
pub const TOOL_NAMES: &[&str] = &[
    "create_entities",
    "create_relations",
    "add_observations",
    "delete_entities",
    "delete_observations",
    "delete_relations",
    "read_graph",
    "search_nodes",
    "open_nodes",
];
