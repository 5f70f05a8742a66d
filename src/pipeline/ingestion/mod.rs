// Pipeline ingestion: fetching source objects from bucket storage

pub mod blob;

pub use blob::{BlobStore, FsBlobStore, HttpBlobStore, ObjectRef};
