//! Error types for Anticorrupt

use crate::types::EntityKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{} not found: {id}", kind_name(.kind))]
    NotFound {
        kind: Option<EntityKind>,
        id: String,
    },

    #[error("knowledge base failed validation ({errors} error(s)); refusing to serve queries")]
    ValidationFailed { errors: usize },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("graph integrity violated: {0}")]
    Integrity(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn kind_name(kind: &Option<EntityKind>) -> &'static str {
    kind.map(|k| k.as_str()).unwrap_or("entity")
}

impl Error {
    pub fn not_found(kind: Option<EntityKind>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
