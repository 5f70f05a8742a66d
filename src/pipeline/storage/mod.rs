// Warehouse port and its adapters

pub mod csv_load;
pub mod in_memory;
pub mod sqlite;
pub mod traits;

pub use csv_load::{parse_csv, CsvLoadOptions, SourceEncoding};
pub use in_memory::InMemoryWarehouse;
pub use sqlite::SqliteWarehouse;
pub use traits::{resolve_write, Warehouse, WriteAction, WriteDisposition, WriteStats};
