//! CLI output formatting

use crate::{
    core::{FunctionDefinition, PipelineDefinition, RunReport, RunStatus, StepResult},
    execution::{ExecutionEvent, ValidationError},
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over a run's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let template = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(template.progress_chars("#>-"));
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run status for display
pub fn format_run_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Aborted => style("ABORTED").yellow().to_string(),
    }
}

fn status_icon(status: RunStatus) -> Emoji<'static, 'static> {
    match status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Aborted => WARN,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// `name(arg: Type, ...) -> Type`
pub fn format_signature(function: &FunctionDefinition) -> String {
    let args: Vec<String> = function
        .arguments
        .iter()
        .map(|a| format!("{}: {}", a.name, a.value_type))
        .collect();
    match function.returns() {
        Some(ret) => format!("{}({}) -> {}", function.name, args.join(", "), ret),
        None => format!("{}({})", function.name, args.join(", ")),
    }
}

/// Format one step result line
pub fn format_step_result(result: &StepResult) -> String {
    if result.is_success() {
        let produced = result
            .produced_value
            .as_ref()
            .map(|v| format!(" = {}", style(v.render()).cyan()))
            .unwrap_or_default();
        format!(
            "{} {} {}{}",
            CHECK,
            style(&result.step_id).green(),
            style(&result.function_name).dim(),
            produced
        )
    } else {
        format!(
            "{} {} {}: {}",
            CROSS,
            style(&result.step_id).red(),
            style(&result.function_name).dim(),
            style(result.error.as_deref().unwrap_or("failed")).red()
        )
    }
}

/// Format a validation error, prefixed with its step when it has one
pub fn format_validation_error(error: &ValidationError) -> String {
    match error.step_id() {
        Some(step_id) => format!(
            "{} [{}] {} {}",
            CROSS,
            style(error.kind()).yellow(),
            style(step_id).bold(),
            error
        ),
        None => format!("{} [{}] {}", CROSS, style(error.kind()).yellow(), error),
    }
}

/// Format a run summary for history listings
pub fn format_run_summary(summary: &RunSummary) -> String {
    let failed = summary
        .failed_step
        .as_ref()
        .map(|s| format!(" at {}", style(s).red()))
        .unwrap_or_default();

    format!(
        "{} {} - {} - {} ({} step(s){}) - {}",
        status_icon(summary.status),
        style(short_id(&summary.run_id)).dim(),
        style(&summary.pipeline_name).bold(),
        format_run_status(summary.status),
        summary.steps_run,
        failed,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Format a saved pipeline for listings
pub fn format_pipeline(pipeline: &PipelineDefinition) -> String {
    let last_run = pipeline
        .last_run
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let status = if pipeline.is_active() {
        style("active").green()
    } else {
        style("inactive").dim()
    };

    format!(
        "{} [{}] {} step(s), last run {}",
        style(&pipeline.name).bold(),
        status,
        style(pipeline.steps.len()).cyan(),
        style(last_run).dim()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Running {} ({} step(s), {})",
            ROCKET,
            style(pipeline_name).bold(),
            total_steps,
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::StepStarted {
            step_id,
            function_name,
        } => format!(
            "{} {} {}",
            SPINNER,
            style(step_id).cyan(),
            style(function_name).dim()
        ),
        ExecutionEvent::StepSucceeded {
            step_id,
            produced_value,
        } => match produced_value {
            Some(value) => format!(
                "{} {} = {}",
                CHECK,
                style(step_id).green(),
                style(value.render()).cyan()
            ),
            None => format!("{} {}", CHECK, style(step_id).green()),
        },
        ExecutionEvent::StepFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::RunFinished { run_id, status } => format!(
            "{} Run ({}) {}",
            status_icon(*status),
            style(short_id(run_id)).dim(),
            format_run_status(*status)
        ),
    }
}

/// Multi-line report of a finished run
pub fn format_report(report: &RunReport) -> String {
    let mut lines = vec![
        format!("{} Run {}", INFO, style(report.run_id).cyan()),
        format!("  Pipeline: {}", style(&report.pipeline_name).bold()),
        format!("  Status: {}", format_run_status(report.status)),
        format!("  Started: {}", style(report.started_at.to_rfc3339()).dim()),
    ];
    if let Ok(duration) = report.duration().to_std() {
        lines.push(format!("  Duration: {}", style(format_duration(duration)).dim()));
    }
    if report.was_cancelled() {
        lines.push(format!("  {} Cancelled", WARN));
    }
    for error in report.validation_errors() {
        lines.push(format!("  {}", format_validation_error(error)));
    }
    for result in &report.step_results {
        lines.push(format!("  {}", format_step_result(result)));
    }
    lines.join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{:03}s", secs, millis % 1000)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
