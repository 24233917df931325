//! Anticorrupt Core - entity kinds, typed records, shape validation, errors

pub mod error;
pub mod model;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
pub use model::*;
pub use schema::{is_valid_id, validate_shape, FieldError, ShapeError};
pub use types::*;
