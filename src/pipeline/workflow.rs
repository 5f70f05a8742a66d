//! Explicit task graph with declared edges and a sequential executor.
//!
//! Tasks run one at a time in topological order. Ties between independent
//! tasks are broken by the order in which they were added. When a task fails,
//! every task downstream of it is marked [`TaskState::UpstreamFailed`] and is
//! not executed; tasks on independent branches still run.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::steps::{PipelineStep, StepResult};
use super::storage::Warehouse;
use crate::error::{StageError, WorkflowError};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success,
    Failed,
    UpstreamFailed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::UpstreamFailed => "upstream_failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one task within a run.
#[derive(Debug)]
pub struct TaskReport {
    pub task_id: String,
    pub state: TaskState,
    pub result: Option<StepResult>,
    pub error: Option<StageError>,
    pub duration_ms: u128,
}

/// Result of executing a complete workflow
#[derive(Debug)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tasks: Vec<TaskReport>,
}

impl WorkflowRun {
    fn new(workflow_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            workflow_id: workflow_id.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            tasks: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Success)
    }

    pub fn state(&self, task_id: &str) -> Option<TaskState> {
        self.tasks
            .iter()
            .find(|t| t.task_id == task_id)
            .map(|t| t.state)
    }

    /// First task that failed in execution order, with its error.
    pub fn first_failure(&self) -> Option<(&str, &StageError)> {
        self.tasks
            .iter()
            .find_map(|t| t.error.as_ref().map(|e| (t.task_id.as_str(), e)))
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

pub struct Workflow {
    id: String,
    tasks: Vec<Box<dyn PipelineStep>>,
    /// (upstream, downstream) as indices into `tasks`
    edges: Vec<(usize, usize)>,
}

impl Workflow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.step_name()).collect()
    }

    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .map(|&(up, down)| (self.tasks[up].step_name(), self.tasks[down].step_name()))
            .collect()
    }

    fn index_of(&self, task_id: &str) -> Result<usize, WorkflowError> {
        self.tasks
            .iter()
            .position(|t| t.step_name() == task_id)
            .ok_or_else(|| WorkflowError::UnknownTask(task_id.to_string()))
    }

    /// Register a task under its step name.
    pub fn add_task(&mut self, step: Box<dyn PipelineStep>) -> Result<(), WorkflowError> {
        if self.tasks.iter().any(|t| t.step_name() == step.step_name()) {
            return Err(WorkflowError::DuplicateTask(step.step_name().to_string()));
        }
        self.tasks.push(step);
        Ok(())
    }

    /// Declare that `downstream` runs only after `upstream` succeeded.
    pub fn add_edge(&mut self, upstream: &str, downstream: &str) -> Result<(), WorkflowError> {
        let up = self.index_of(upstream)?;
        let down = self.index_of(downstream)?;
        if up == down {
            return Err(WorkflowError::Cycle(upstream.to_string()));
        }
        if !self.edges.contains(&(up, down)) {
            self.edges.push((up, down));
        }
        Ok(())
    }

    /// `a >> b >> c`
    pub fn chain(&mut self, task_ids: &[&str]) -> Result<(), WorkflowError> {
        for pair in task_ids.windows(2) {
            self.add_edge(pair[0], pair[1])?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        self.order_indices().map(|_| ())
    }

    fn order_indices(&self) -> Result<Vec<usize>, WorkflowError> {
        let n = self.tasks.len();
        let mut in_degree = vec![0usize; n];
        for &(_, down) in &self.edges {
            in_degree[down] += 1;
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &(up, down) in &self.edges {
                if up == next {
                    in_degree[down] -= 1;
                    if in_degree[down] == 0 {
                        ready.insert(down);
                    }
                }
            }
        }

        if order.len() < n {
            let stuck: Vec<&str> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.tasks[i].step_name())
                .collect();
            return Err(WorkflowError::Cycle(stuck.join(", ")));
        }
        Ok(order)
    }

    /// Task ids in the order `run` executes them.
    pub fn execution_order(&self) -> Result<Vec<&str>, WorkflowError> {
        Ok(self
            .order_indices()?
            .into_iter()
            .map(|i| self.tasks[i].step_name())
            .collect())
    }

    /// Execute every task once in topological order.
    ///
    /// Only graph validation errors are returned as `Err`; task failures are
    /// recorded in the returned run.
    pub async fn run(&self, warehouse: &dyn Warehouse) -> Result<WorkflowRun, WorkflowError> {
        let order = self.order_indices()?;
        let mut run = WorkflowRun::new(&self.id);
        let mut states = vec![TaskState::Pending; self.tasks.len()];
        metrics::workflow::run_started();
        info!(workflow = %self.id, run_id = %run.run_id, tasks = order.len(), "🚀 Starting workflow run");

        for (position, idx) in order.into_iter().enumerate() {
            let task = &self.tasks[idx];
            let task_id = task.step_name();

            let blocked = self
                .edges
                .iter()
                .any(|&(up, down)| down == idx && states[up] != TaskState::Success);
            if blocked {
                warn!("⏭️ Skipping '{}': an upstream task did not succeed", task_id);
                states[idx] = TaskState::UpstreamFailed;
                run.tasks.push(TaskReport {
                    task_id: task_id.to_string(),
                    state: TaskState::UpstreamFailed,
                    result: None,
                    error: None,
                    duration_ms: 0,
                });
                continue;
            }

            info!("🔄 Executing task {}/{}: {}", position + 1, self.tasks.len(), task_id);
            let started = Instant::now();
            let span = info_span!("task", workflow = %self.id, task_id = %task_id, run_id = %run.run_id);
            let outcome = task.execute(warehouse).instrument(span).await;
            let duration_ms = started.elapsed().as_millis();

            let report = match outcome {
                Ok(result) => {
                    info!("✅ Task '{}' completed: {}", task_id, result.message);
                    metrics::workflow::task_succeeded(task_id);
                    TaskReport {
                        task_id: task_id.to_string(),
                        state: TaskState::Success,
                        result: Some(result),
                        error: None,
                        duration_ms,
                    }
                }
                Err(e) => {
                    error!("❌ Task '{}' failed: {}", task_id, e);
                    metrics::workflow::task_failed(task_id);
                    TaskReport {
                        task_id: task_id.to_string(),
                        state: TaskState::Failed,
                        result: None,
                        error: Some(e),
                        duration_ms,
                    }
                }
            };
            states[idx] = report.state;
            run.tasks.push(report);
        }

        run.completed_at = Some(Utc::now());
        if run.succeeded() {
            info!(run_id = %run.run_id, "🎉 Workflow '{}' completed successfully", self.id);
        } else {
            error!(run_id = %run.run_id, "💥 Workflow '{}' failed", self.id);
        }
        Ok(run)
    }

    /// Run a single task in isolation against whatever its upstream tables hold.
    pub async fn run_task(
        &self,
        task_id: &str,
        warehouse: &dyn Warehouse,
    ) -> Result<StepResult, WorkflowError> {
        let task = &self.tasks[self.index_of(task_id)?];
        info!("🔄 Running single task '{}'", task_id);
        let span = info_span!("task", workflow = %self.id, task_id = %task_id);
        match task.execute(warehouse).instrument(span).await {
            Ok(result) => {
                metrics::workflow::task_succeeded(task_id);
                Ok(result)
            }
            Err(source) => {
                metrics::workflow::task_failed(task_id);
                Err(WorkflowError::TaskFailed {
                    task_id: task_id.to_string(),
                    source,
                })
            }
        }
    }
}
