pub mod common;
pub mod config;
pub mod domain;
pub mod error;
pub mod model;
pub mod observability;
pub mod pipeline;
