// Workflow stages: blob ingestion, text processing, warehouse storage, and the task graph

pub mod dag;
pub mod ingestion;
pub mod processing;
pub mod steps;
pub mod storage;
pub mod workflow;

pub use dag::sentiment_workflow;
pub use workflow::{TaskReport, TaskState, Workflow, WorkflowRun};
