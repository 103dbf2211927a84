//! Persistence layer for pipelines, functions and run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;

use crate::core::{FunctionRegistry, PipelineDefinition, RunReport, RunStatus};
use crate::execution::validator::{validate, ValidationResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,

    pub pipeline_id: Uuid,

    pub pipeline_name: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Number of steps that ran
    pub steps_run: usize,

    /// Id of the step that failed, if any
    pub failed_step: Option<String>,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            run_id: report.run_id,
            pipeline_id: report.pipeline_id,
            pipeline_name: report.pipeline_name.clone(),
            status: report.status,
            started_at: report.started_at,
            finished_at: report.finished_at,
            steps_run: report.step_results.len(),
            failed_step: report.failed_step().map(|r| r.step_id.clone()),
        }
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Load every saved pipeline
    async fn load_pipelines(&self) -> Result<Vec<PipelineDefinition>>;

    /// Replace the saved pipelines
    async fn save_pipelines(&self, pipelines: &[PipelineDefinition]) -> Result<()>;

    /// Load the function registry; empty when nothing was saved
    async fn load_functions(&self) -> Result<FunctionRegistry>;

    /// Replace the saved functions
    async fn save_functions(&self, registry: &FunctionRegistry) -> Result<()>;

    /// Record a finished run
    async fn save_run(&self, report: &RunReport) -> Result<()>;

    /// Load a run report by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunReport>>;

    /// List runs newest first, optionally for one pipeline
    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize)
        -> Result<Vec<RunSummary>>;
}

/// Save a pipeline only if it validates against `registry` and its own
/// variable set. A pipeline with the same id is replaced.
///
/// The validation result is returned either way; nothing is written when it
/// carries errors.
pub async fn save_validated_pipeline(
    backend: &dyn PersistenceBackend,
    pipeline: &PipelineDefinition,
    registry: &FunctionRegistry,
) -> Result<ValidationResult> {
    let result = validate(pipeline, registry, &pipeline.variables);
    if !result.is_valid() {
        return Ok(result);
    }

    let mut pipelines = backend.load_pipelines().await?;
    match pipelines.iter_mut().find(|p| p.id == pipeline.id) {
        Some(existing) => *existing = pipeline.clone(),
        None => pipelines.push(pipeline.clone()),
    }
    backend.save_pipelines(&pipelines).await?;

    Ok(result)
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    pipelines: RwLock<Vec<PipelineDefinition>>,
    functions: RwLock<FunctionRegistry>,
    runs: RwLock<Vec<RunReport>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn load_pipelines(&self) -> Result<Vec<PipelineDefinition>> {
        Ok(self.pipelines.read().await.clone())
    }

    async fn save_pipelines(&self, pipelines: &[PipelineDefinition]) -> Result<()> {
        *self.pipelines.write().await = pipelines.to_vec();
        Ok(())
    }

    async fn load_functions(&self) -> Result<FunctionRegistry> {
        Ok(self.functions.read().await.clone())
    }

    async fn save_functions(&self, registry: &FunctionRegistry) -> Result<()> {
        *self.functions.write().await = registry.clone();
        Ok(())
    }

    async fn save_run(&self, report: &RunReport) -> Result<()> {
        let mut runs = self.runs.write().await;
        match runs.iter_mut().find(|r| r.run_id == report.run_id) {
            Some(existing) => *existing = report.clone(),
            None => runs.push(report.clone()),
        }
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunReport>> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn list_runs(
        &self,
        pipeline_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut summaries: Vec<RunSummary> = runs
            .iter()
            .filter(|r| pipeline_name.map_or(true, |name| r.pipeline_name == name))
            .map(RunSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        summaries.truncate(limit);
        Ok(summaries)
    }
}
