//! SQLite-based persistence store

use crate::core::{FunctionRegistry, PipelineDefinition, RunReport, RunStatus};
use crate::persistence::{PersistenceBackend, RunSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const PIPELINES_KEY: &str = "pipelines";
const FUNCTIONS_KEY: &str = "functions";

/// SQLite store.
///
/// Pipelines and functions are kept as JSON documents under fixed keys; runs
/// get one row each, with the full report alongside the columns used for
/// listing.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`; `:memory:` opens
    /// a private in-memory database
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .with_context(|| format!("Invalid database path {}", db_path))?
            .create_if_missing(true);

        // One long-lived connection, so an in-memory database survives
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("fnpipe");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        let db_path = db_dir.join("fnpipe.db");
        Self::new(&db_path.to_string_lossy()).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                pipeline_id TEXT NOT NULL,
                pipeline_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                steps_run INTEGER NOT NULL DEFAULT 0,
                failed_step TEXT,
                report TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_runs_pipeline_name ON runs(pipeline_name)",
            "CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to initialize database schema")?;
        }

        Ok(())
    }

    async fn load_document(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT body FROM documents WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load {}", key))?;

        Ok(row.map(|row| row.get("body")))
    }

    async fn save_document(&self, key: &str, body: String) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents (key, body, updated_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(key)
        .bind(body)
        .bind(Self::to_naive(Utc::now()))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save {}", key))?;

        debug!("Saved document {}", key);
        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn parse_status(status: &str) -> Result<RunStatus> {
        Ok(match status {
            "Pending" => RunStatus::Pending,
            "Running" => RunStatus::Running,
            "Succeeded" => RunStatus::Succeeded,
            "Failed" => RunStatus::Failed,
            "Aborted" => RunStatus::Aborted,
            other => anyhow::bail!("Unknown run status in database: {}", other),
        })
    }

    fn summary_from_row(row: &SqliteRow) -> Result<RunSummary> {
        Ok(RunSummary {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            pipeline_id: Uuid::parse_str(&row.get::<String, _>("pipeline_id"))?,
            pipeline_name: row.get("pipeline_name"),
            status: Self::parse_status(&row.get::<String, _>("status"))?,
            started_at: Self::from_naive(row.get("started_at")),
            finished_at: Self::from_naive(row.get("finished_at")),
            steps_run: row.get::<i64, _>("steps_run") as usize,
            failed_step: row.get("failed_step"),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStore {
    async fn load_pipelines(&self) -> Result<Vec<PipelineDefinition>> {
        match self.load_document(PIPELINES_KEY).await? {
            Some(body) => serde_json::from_str(&body).context("Corrupt pipelines document"),
            None => Ok(Vec::new()),
        }
    }

    async fn save_pipelines(&self, pipelines: &[PipelineDefinition]) -> Result<()> {
        let body = serde_json::to_string(pipelines).context("Failed to serialize pipelines")?;
        self.save_document(PIPELINES_KEY, body).await
    }

    async fn load_functions(&self) -> Result<FunctionRegistry> {
        match self.load_document(FUNCTIONS_KEY).await? {
            Some(body) => serde_json::from_str(&body).context("Corrupt functions document"),
            None => Ok(FunctionRegistry::new()),
        }
    }

    async fn save_functions(&self, registry: &FunctionRegistry) -> Result<()> {
        let body = serde_json::to_string(registry).context("Failed to serialize functions")?;
        self.save_document(FUNCTIONS_KEY, body).await
    }

    async fn save_run(&self, report: &RunReport) -> Result<()> {
        let summary = RunSummary::from(report);
        let body = serde_json::to_string(report).context("Failed to serialize run report")?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, pipeline_id, pipeline_name, status, started_at, finished_at, steps_run, failed_step, report)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(summary.run_id.to_string())
        .bind(summary.pipeline_id.to_string())
        .bind(&summary.pipeline_name)
        .bind(format!("{:?}", summary.status))
        .bind(Self::to_naive(summary.started_at))
        .bind(Self::to_naive(summary.finished_at))
        .bind(summary.steps_run as i64)
        .bind(&summary.failed_step)
        .bind(body)
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunReport>> {
        let row = sqlx::query("SELECT report FROM runs WHERE id = ?1")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load run")?;

        row.map(|row| {
            serde_json::from_str(&row.get::<String, _>("report")).context("Corrupt run report")
        })
        .transpose()
    }

    async fn list_runs(
        &self,
        pipeline_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pipeline_id, pipeline_name, status, started_at, finished_at, steps_run, failed_step
            FROM runs
            WHERE ?1 IS NULL OR pipeline_name = ?1
            ORDER BY started_at DESC
            LIMIT ?2
            "#,
        )
        .bind(pipeline_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::summary_from_row).collect()
    }
}
