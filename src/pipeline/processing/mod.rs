// Pipeline processing: column normalization and headline cleaning

pub mod clean;
pub mod schema;

pub use clean::clean_headline;
pub use schema::{Normalization, SchemaMapping};
