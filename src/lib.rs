//! anticorrupt: command-line surface over the knowledge graph engine.

pub mod format;
