//! Main execution engine - runs a pipeline step by step and reports the outcome

use crate::{
    core::{
        function::{FunctionDefinition, FunctionRegistry},
        pipeline::{PipelineDefinition, PipelineStep},
        state::{AbortReason, RunReport, RunState, RunStatus, StepResult, StepStatus},
        types::{Value, ValueType},
        variable::VariableEnvironment,
    },
    execution::validator::validate,
    runtime::{FunctionInvoker, InvocationFault},
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Name of the system variable refreshed at the start of every run
pub const TIMESTAMP_VARIABLE: &str = "timestamp";

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        step_id: String,
        function_name: String,
    },
    StepSucceeded {
        step_id: String,
        produced_value: Option<Value>,
    },
    StepFailed {
        step_id: String,
        error: String,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Shared flag that stops a run at the next step boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Set the `timestamp` system variable to the run start time
    pub refresh_timestamp: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_timestamp: true,
        }
    }
}

/// Pipeline execution engine
pub struct ExecutionEngine<I> {
    invoker: I,
    config: EngineConfig,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<I: FunctionInvoker> ExecutionEngine<I> {
    pub fn new(invoker: I) -> Self {
        Self::with_config(invoker, EngineConfig::default())
    }

    pub fn with_config(invoker: I, config: EngineConfig) -> Self {
        Self {
            invoker,
            config,
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Run a pipeline against its own saved variable set
    pub async fn execute_saved(
        &self,
        pipeline: &PipelineDefinition,
        registry: &FunctionRegistry,
        cancel: &CancelToken,
    ) -> RunReport {
        self.execute(pipeline, registry, &pipeline.variables, cancel).await
    }

    /// Run a pipeline.
    ///
    /// The run works on private copies of `registry` and `environment`; the
    /// caller's values are never modified. Steps run strictly in order and
    /// the first runtime fault stops the run.
    pub async fn execute(
        &self,
        pipeline: &PipelineDefinition,
        registry: &FunctionRegistry,
        environment: &VariableEnvironment,
        cancel: &CancelToken,
    ) -> RunReport {
        let registry = registry.clone();
        let mut env = environment.snapshot();
        let mut state = RunState::new();
        state.start(pipeline.steps.len());

        info!("Starting run of {} ({})", pipeline.name, state.run_id);
        self.emit_event(ExecutionEvent::RunStarted {
            run_id: state.run_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: pipeline.steps.len(),
        })
        .await;

        if self.config.refresh_timestamp {
            refresh_timestamp(&mut env);
        }

        let validation = validate(pipeline, &registry, &env);
        if !validation.is_valid() {
            warn!(
                "Run of {} aborted: {} validation error(s)",
                pipeline.name,
                validation.errors.len()
            );
            return self
                .finish(
                    state,
                    RunStatus::Aborted,
                    Some(AbortReason::Validation(validation.errors)),
                    pipeline,
                    env,
                )
                .await;
        }

        for step in &pipeline.steps {
            if cancel.is_cancelled() {
                info!("Run of {} cancelled before step {}", pipeline.name, step.id);
                return self
                    .finish(state, RunStatus::Aborted, Some(AbortReason::Cancelled), pipeline, env)
                    .await;
            }

            let started_at = Utc::now();
            self.emit_event(ExecutionEvent::StepStarted {
                step_id: step.id.clone(),
                function_name: step.function_name.clone(),
            })
            .await;

            match self.execute_step(step, &registry, &mut env).await {
                Ok(produced_value) => {
                    info!("Step {} completed successfully", step.id);
                    state.record(StepResult {
                        step_id: step.id.clone(),
                        function_name: step.function_name.clone(),
                        status: StepStatus::Succeeded,
                        error: None,
                        produced_value: produced_value.clone(),
                        started_at,
                        finished_at: Utc::now(),
                    });
                    self.emit_event(ExecutionEvent::StepSucceeded {
                        step_id: step.id.clone(),
                        produced_value,
                    })
                    .await;
                }
                Err(fault) => {
                    error!("Step {} failed: {}", step.id, fault);
                    let error = fault.to_string();
                    state.record(StepResult {
                        step_id: step.id.clone(),
                        function_name: step.function_name.clone(),
                        status: StepStatus::Failed,
                        error: Some(error.clone()),
                        produced_value: None,
                        started_at,
                        finished_at: Utc::now(),
                    });
                    self.emit_event(ExecutionEvent::StepFailed {
                        step_id: step.id.clone(),
                        error,
                    })
                    .await;
                    return self
                        .finish(state, RunStatus::Failed, None, pipeline, env)
                        .await;
                }
            }
        }

        self.finish(state, RunStatus::Succeeded, None, pipeline, env)
            .await
    }

    /// Execute a single step against the run's environment
    async fn execute_step(
        &self,
        step: &PipelineStep,
        registry: &FunctionRegistry,
        env: &mut VariableEnvironment,
    ) -> Result<Option<Value>, InvocationFault> {
        let function = registry
            .resolve(&step.function_name)
            .map_err(|_| InvocationFault::Unavailable(step.function_name.clone()))?;

        let args = gather_arguments(step, function, env)?;
        debug!("Invoking {} with {} argument(s)", function.name, args.len());

        let produced = self.invoker.invoke(function, &args).await?;

        if let Some(value) = &produced {
            if !value.is_finite() {
                return Err(InvocationFault::UnsupportedValue {
                    function: function.name.clone(),
                    detail: format!("non-finite number in {}", value.render()),
                });
            }
        }

        if let (Some(value), Some(expected)) = (&produced, function.returns()) {
            check_return_type(function, expected, value)?;
        }

        if let Some(target) = step.return_target() {
            let value = produced
                .clone()
                .ok_or_else(|| InvocationFault::MissingReturnValue(function.name.clone()))?;
            env.write(target, value)?;
            debug!("Stored return value of {} in {}", function.name, target);
        }

        Ok(produced)
    }

    async fn finish(
        &self,
        state: RunState,
        status: RunStatus,
        abort_reason: Option<AbortReason>,
        pipeline: &PipelineDefinition,
        env: VariableEnvironment,
    ) -> RunReport {
        let report = state.finish(status, abort_reason, pipeline.id, pipeline.name.clone(), env);

        info!("Run of {} finished: {:?}", pipeline.name, status);
        self.emit_event(ExecutionEvent::RunFinished {
            run_id: report.run_id,
            status,
        })
        .await;

        report
    }
}

/// Argument values in the function's declaration order
fn gather_arguments(
    step: &PipelineStep,
    function: &FunctionDefinition,
    env: &VariableEnvironment,
) -> Result<Vec<Value>, InvocationFault> {
    function
        .arguments
        .iter()
        .map(|arg| {
            let variable = step.argument_mappings.get(&arg.name).ok_or_else(|| {
                InvocationFault::Unbound {
                    argument: arg.name.clone(),
                }
            })?;
            env.value(variable)
                .cloned()
                .ok_or_else(|| InvocationFault::UnsetArgument {
                    argument: arg.name.clone(),
                    variable: variable.clone(),
                })
        })
        .collect()
}

fn check_return_type(
    function: &FunctionDefinition,
    expected: ValueType,
    value: &Value,
) -> Result<(), InvocationFault> {
    if value.value_type() == expected {
        Ok(())
    } else {
        Err(InvocationFault::WrongReturnType {
            function: function.name.clone(),
            expected,
            actual: value.value_type(),
        })
    }
}

fn refresh_timestamp(env: &mut VariableEnvironment) {
    let eligible = env
        .lookup(TIMESTAMP_VARIABLE)
        .map(|v| v.is_system() && v.value_type == ValueType::Number)
        .unwrap_or(false);

    if eligible {
        let now = Utc::now().timestamp_millis() as f64;
        if let Err(e) = env.refresh_system(TIMESTAMP_VARIABLE, Value::Number(now)) {
            warn!("Could not refresh {}: {}", TIMESTAMP_VARIABLE, e);
        }
    }
}
