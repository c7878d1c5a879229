//! A persistent knowledge-graph retrieval engine that serves as a memory
//! backend for an agent assistant: a labeled multigraph of named entities
//! and directed typed relations, with a context-search pipeline that
//! returns a minimal connected subgraph for a free-text query.
//!
//! Modules are laid out leaf-first: [`model`] and [`config`] have no
//! dependents-of-their-own; [`store`] and [`lock`] sit under [`mutate`];
//! [`indexer`] feeds [`graph`]; [`search`] and [`doctor`] are read-only
//! consumers of [`graph::GraphState`]; [`tools`] is the thin JSON-dispatch
//! layer a transport calls into.

pub mod config;
pub mod doctor;
pub mod errors;
pub mod graph;
pub mod indexer;
pub mod lock;
pub mod model;
pub mod mutate;
pub mod search;
pub mod store;
pub mod tools;

pub use config::Config;
pub use errors::MemoryError;
pub use model::{Entity, GraphView, Record, Relation};
pub use mutate::MemoryStore;
