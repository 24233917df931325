//! anticorrupt-kg: record store, validator, graph snapshot and queries
//!
//! Records are read from YAML files, validated as a whole, and projected
//! into an immutable graph that serves neighbor, traversal, path and
//! free-text queries. An invalid record set never produces a graph.

pub mod config;
pub mod engine;
pub mod graph;
pub mod kb;
pub mod query;
pub mod search;
pub mod store;
pub mod validator;

pub use config::KbConfig;
pub use engine::KnowledgeEngine;
pub use graph::{build_graph, Edge, EdgeLabel, GraphExport, GraphSnapshot, GraphStats, Node, RelationAttrs};
pub use kb::{KnowledgeBase, Table};
pub use query::{Direction, EdgeFilter, Neighbor, Reached, RelationalPath, Step};
pub use search::{MatchTier, SearchHit, SearchIndex, SearchOptions};
pub use store::{LoadedRecords, ParseError, RawRecord, RecordIter, RecordStore};
pub use validator::{validate, CycleGraph, IssueKind, ValidationIssue, ValidationReport, Validated};
