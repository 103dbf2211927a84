use anyhow::{Context, Result};
use fnpipe::cli::commands::{
    FunctionsCommand, HistoryCommand, ImportCommand, ListCommand, RunCommand, ValidateCommand,
};
use fnpipe::cli::output::*;
use fnpipe::cli::{Cli, Command};
use fnpipe::core::config::WorkspaceConfig;
use fnpipe::core::{FunctionRegistry, PipelineDefinition, VariableEnvironment};
use fnpipe::execution::{validate, CancelToken, ExecutionEngine, ExecutionEvent};
use fnpipe::persistence::{save_validated_pipeline, InMemoryPersistence, PersistenceBackend};
use fnpipe::runtime::ScriptInvoker;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let ok = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_workspace(cmd)?,
        Command::Import(cmd) => import_workspace(cmd, &cli).await?,
        Command::List(cmd) => list_pipelines(cmd, &cli).await?,
        Command::Functions(cmd) => list_functions(cmd, &cli).await?,
        Command::History(cmd) => show_history(cmd, &cli).await?,
    };

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_store(cli: &Cli) -> Result<Arc<dyn PersistenceBackend>> {
    let store = match &cli.db {
        Some(path) => fnpipe::persistence::SqliteStore::new(path).await?,
        None => fnpipe::persistence::SqliteStore::with_default_path().await?,
    };
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store(_cli: &Cli) -> Result<Arc<dyn PersistenceBackend>> {
    warn!("Built without the sqlite feature; nothing will be persisted");
    Ok(Arc::new(InMemoryPersistence::new()))
}

/// Pick the pipeline to run: by name, or the only one there is
fn select_pipeline(
    pipelines: Vec<PipelineDefinition>,
    name: Option<&str>,
) -> Result<PipelineDefinition> {
    match name {
        Some(name) => pipelines
            .into_iter()
            .find(|p| p.name == name)
            .with_context(|| format!("No pipeline named '{}'", name)),
        None if pipelines.len() > 1 => {
            let names: Vec<_> = pipelines.iter().map(|p| p.name.as_str()).collect();
            anyhow::bail!(
                "Several pipelines defined ({}); choose one with --pipeline",
                names.join(", ")
            )
        }
        None => pipelines.into_iter().next().context("No pipelines defined"),
    }
}

/// Apply `--var` overrides to a run's environment
fn apply_overrides(env: &mut VariableEnvironment, overrides: &[(String, String)]) -> Result<()> {
    for (name, raw) in overrides {
        let declared = env
            .lookup(name)
            .with_context(|| format!("Cannot override '{}'", name))?
            .value_type;
        let value = declared
            .parse(raw)
            .with_context(|| format!("Invalid override for '{}'", name))?;
        env.write(name, value)
            .with_context(|| format!("Cannot override '{}'", name))?;
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(name).cyan(),
            style(raw).dim()
        );
    }
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<bool> {
    let needs_store = cmd.file.is_none() || !cmd.no_history;
    let store: Arc<dyn PersistenceBackend> = if needs_store {
        open_store(cli).await?
    } else {
        Arc::new(InMemoryPersistence::new())
    };

    // Load pipeline and functions
    let (registry, pipelines, from_store) = match &cmd.file {
        Some(file) => {
            let config = WorkspaceConfig::from_file(file)
                .context("Failed to load workspace config")?;
            (config.to_registry()?, config.to_pipelines()?, false)
        }
        None => (store.load_functions().await?, store.load_pipelines().await?, true),
    };
    let pipeline = select_pipeline(pipelines, cmd.pipeline.as_deref())?;

    println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());

    let mut environment = pipeline.variables.snapshot();
    apply_overrides(&mut environment, &cmd.variables)?;

    // Create execution engine
    let engine = ExecutionEngine::new(ScriptInvoker::new());

    // Set up event handler for console output
    let progress = create_progress_bar(pipeline.steps.len());
    let bar = progress.clone();
    engine
        .add_event_handler(move |event| {
            bar.println(format_execution_event(&event));
            match event {
                ExecutionEvent::StepSucceeded { .. } | ExecutionEvent::StepFailed { .. } => {
                    bar.inc(1)
                }
                ExecutionEvent::RunFinished { .. } => bar.finish_and_clear(),
                _ => {}
            }
        })
        .await;

    // Ctrl-C stops the run at the next step boundary
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let report = engine
        .execute(&pipeline, &registry, &environment, &cancel)
        .await;
    progress.finish_and_clear();

    // Save to history
    if !cmd.no_history {
        store.save_run(&report).await?;
        if from_store {
            let mut pipelines = store.load_pipelines().await?;
            for saved in pipelines.iter_mut() {
                saved.record_run(&report);
            }
            store.save_pipelines(&pipelines).await?;
        }
        info!("Run {} saved to history", report.run_id);
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_report(&report));
    }

    if report.is_success() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&pipeline.name).bold(),
            format_run_status(report.status)
        );
        if let Some(failed) = report.failed_step() {
            error!(
                "Step {} failed: {}",
                failed.step_id,
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(report.is_success())
}

fn validate_workspace(cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating workspace...", INFO);

    let config = match WorkspaceConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Workspace file is invalid:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            return Ok(false);
        }
    };

    let registry = config.to_registry()?;
    let pipelines = config.to_pipelines()?;

    let mut all_valid = true;
    let mut json_data = Vec::new();
    for pipeline in &pipelines {
        let result = validate(pipeline, &registry, &pipeline.variables);
        all_valid &= result.is_valid();

        if cmd.json {
            json_data.push(serde_json::json!({
                "pipeline": pipeline.name,
                "valid": result.is_valid(),
                "errors": result.errors,
            }));
            continue;
        }

        if result.is_valid() {
            println!(
                "{} {} ({} step(s))",
                CHECK,
                style(&pipeline.name).bold(),
                style(pipeline.steps.len()).cyan()
            );
        } else {
            println!("{} {}", CROSS, style(&pipeline.name).bold());
            for error in &result.errors {
                println!("  {}", format_validation_error(error));
            }
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!(
            "  Functions: {}  Variables: {}  Devices: {}",
            style(registry.len()).cyan(),
            style(config.to_environment()?.len()).cyan(),
            style(config.devices().len()).cyan()
        );
    }

    Ok(all_valid)
}

async fn import_workspace(cmd: &ImportCommand, cli: &Cli) -> Result<bool> {
    let config = WorkspaceConfig::from_file(&cmd.file).context("Failed to load workspace config")?;
    let store = open_store(cli).await?;

    // Merge functions into the saved registry
    let mut registry: FunctionRegistry = store.load_functions().await?;
    for function in config.to_registry()?.iter() {
        registry
            .upsert(function.clone())
            .with_context(|| format!("Cannot import function '{}'", function.name))?;
    }
    store.save_functions(&registry).await?;
    println!(
        "{} Saved {} function(s)",
        CHECK,
        style(registry.len()).cyan()
    );

    // Pipelines keep their saved id when re-imported by name
    let saved = store.load_pipelines().await?;
    let mut all_saved = true;
    for (mut pipeline, pipeline_config) in config.to_pipelines()?.into_iter().zip(&config.pipelines) {
        if pipeline_config.id.is_none() {
            if let Some(existing) = saved.iter().find(|p| p.name == pipeline.name) {
                pipeline.id = existing.id;
                pipeline.last_run = existing.last_run;
            }
        }

        let result = save_validated_pipeline(store.as_ref(), &pipeline, &registry).await?;
        if result.is_valid() {
            println!("{} Saved pipeline {}", CHECK, style(&pipeline.name).bold());
        } else {
            all_saved = false;
            println!(
                "{} Pipeline {} was not saved:",
                CROSS,
                style(&pipeline.name).bold()
            );
            for error in &result.errors {
                println!("  {}", format_validation_error(error));
            }
        }
    }

    Ok(all_saved)
}

async fn list_pipelines(cmd: &ListCommand, cli: &Cli) -> Result<bool> {
    let store = open_store(cli).await?;
    let pipelines = store.load_pipelines().await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&pipelines)?);
        return Ok(true);
    }

    if pipelines.is_empty() {
        println!("{} No saved pipelines", INFO);
        return Ok(true);
    }

    println!("{} Saved pipelines:", INFO);
    for pipeline in &pipelines {
        println!("  {}", format_pipeline(pipeline));
    }

    Ok(true)
}

async fn list_functions(cmd: &FunctionsCommand, cli: &Cli) -> Result<bool> {
    let store = open_store(cli).await?;
    let registry = store.load_functions().await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(true);
    }

    if registry.is_empty() {
        println!("{} No saved functions", INFO);
        return Ok(true);
    }

    println!("{} Saved functions:", INFO);
    for function in registry.iter() {
        println!("  {}", style(format_signature(function)).bold());
        if !function.description.is_empty() {
            println!("    {}", style(&function.description).dim());
        }
        if cmd.body {
            for line in function.body.lines() {
                println!("    | {}", line);
            }
        }
    }

    Ok(true)
}

async fn show_history(cmd: &HistoryCommand, cli: &Cli) -> Result<bool> {
    let store = open_store(cli).await?;

    // If a specific run is requested
    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        return match store.load_run(run_id).await? {
            Some(report) if cmd.json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(true)
            }
            Some(report) => {
                println!("{}", format_report(&report));
                Ok(true)
            }
            None => {
                println!("{} Run not found", WARN);
                Ok(false)
            }
        };
    }

    let runs = store
        .list_runs(cmd.pipeline.as_deref(), cmd.limit)
        .await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(true);
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(true)
}
