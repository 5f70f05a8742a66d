// Domain data shapes shared across layers
pub mod table;

pub use table::{Field, FieldKind, Row, Table, TableId, Value};
