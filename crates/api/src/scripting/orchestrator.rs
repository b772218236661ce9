//! Central script run orchestrator.
//!
//! Coordinates catalog lookup, parameter validation, launch planning,
//! streaming execution, progress reduction, event publishing and history
//! recording. Held in [`AppState`](crate::state::AppState) as an
//! `Arc<RunOrchestrator>`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vlabs_core::error::CoreError;
use vlabs_core::progress::{classify_line, ProgressSnapshot, ProgressTracker, StreamLine};
use vlabs_core::scripting::launcher::{
    apply_defaults, build_arguments, mask_parameters, validate_parameters,
};
use vlabs_core::scripting::manifest::safe_relative_path;
use vlabs_core::scripting::subprocess::run_streaming;
use vlabs_core::scripting::{
    LaunchPlan, OutputLine, RunExit, RunMode, RunStatus, ScriptCatalog, ScriptDescriptor,
    ScriptError,
};
use vlabs_core::types::{ClientId, RunId, Timestamp};
use vlabs_db::models::{OutputTail, RunRecord};
use vlabs_db::HistoryStore;
use vlabs_events::{EventBus, RunEvent, RunEventKind};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// How scripts are launched.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub run_mode: RunMode,
    pub python_bin: String,
    pub python_image: String,
    pub default_timeout: Duration,
}

impl LaunchSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            run_mode: config.run_mode,
            python_bin: config.python_bin.clone(),
            python_image: config.python_image.clone(),
            default_timeout: config.run_timeout(),
        }
    }
}

/// A request to start a script.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub script_id: String,
    pub parameters: Map<String, Value>,
    /// WebSocket client that should receive the live frames.
    pub client_id: Option<ClientId>,
}

/// Public view of a run in progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRunInfo {
    pub run_id: RunId,
    pub script_id: String,
    #[serde(rename = "wsClientId")]
    pub client_id: Option<ClientId>,
    pub command: String,
    pub started_at: Timestamp,
    /// Live status, step list and percent.
    pub progress: ProgressSnapshot,
}

struct ActiveRun {
    info: ActiveRunInfo,
    cancel: CancellationToken,
}

/// Everything one background run needs.
struct RunContext {
    run_id: RunId,
    script_id: String,
    client_id: Option<ClientId>,
    plan: LaunchPlan,
    masked_parameters: Value,
    timeout: Duration,
    cancel: CancellationToken,
    started_at: Timestamp,
}

/// Mutable state accumulated while output streams in.
struct RunProgress {
    tracker: ProgressTracker,
    tail: OutputTail,
    result: Option<Value>,
}

/// Starts, tracks and cancels script runs.
pub struct RunOrchestrator {
    catalog: Arc<ScriptCatalog>,
    history: Arc<HistoryStore>,
    event_bus: Arc<EventBus>,
    settings: LaunchSettings,
    active: RwLock<HashMap<RunId, ActiveRun>>,
    tasks: TaskTracker,
}

impl RunOrchestrator {
    pub fn new(
        catalog: Arc<ScriptCatalog>,
        history: Arc<HistoryStore>,
        event_bus: Arc<EventBus>,
        settings: LaunchSettings,
    ) -> Self {
        Self {
            catalog,
            history,
            event_bus,
            settings,
            active: RwLock::new(HashMap::new()),
            tasks: TaskTracker::new(),
        }
    }

    /// Validate `request`, spawn the run in the background and return its id.
    ///
    /// Lookup and validation failures are returned directly; anything that
    /// goes wrong after this point is reported through run events and the
    /// history record.
    pub async fn start_run(self: &Arc<Self>, request: RunRequest) -> AppResult<RunId> {
        let script = self.catalog.get(&request.script_id).ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "script",
                id: request.script_id.clone(),
            })
        })?;

        let mut parameters = request.parameters;
        apply_defaults(script, &mut parameters);
        validate_parameters(script, &parameters)?;

        let run_id = uuid::Uuid::new_v4();
        let plan = self.plan_for(run_id, script, build_arguments(&parameters))?;
        let timeout = script
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.settings.default_timeout);

        let ctx = RunContext {
            run_id,
            script_id: script.id.clone(),
            client_id: request.client_id,
            masked_parameters: Value::Object(mask_parameters(&parameters)),
            plan,
            timeout,
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
        };
        self.active.write().await.insert(
            run_id,
            ActiveRun {
                info: ActiveRunInfo {
                    run_id,
                    script_id: ctx.script_id.clone(),
                    client_id: ctx.client_id,
                    command: ctx.plan.display(),
                    started_at: ctx.started_at,
                    progress: ProgressSnapshot::default(),
                },
                cancel: ctx.cancel.clone(),
            },
        );

        tracing::info!(
            run_id = %run_id,
            script_id = %ctx.script_id,
            command = %ctx.plan.display(),
            timeout_secs = ctx.timeout.as_secs(),
            "Starting script run"
        );

        let this = Arc::clone(self);
        self.tasks.spawn(async move { this.execute(ctx).await });

        Ok(run_id)
    }

    /// Request cancellation of an active run.
    pub async fn cancel(&self, run_id: RunId) -> AppResult<()> {
        let active = self.active.read().await;
        let run = active.get(&run_id).ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "run",
                id: run_id.to_string(),
            })
        })?;
        tracing::info!(run_id = %run_id, script_id = %run.info.script_id, "Cancelling script run");
        run.cancel.cancel();
        Ok(())
    }

    /// Runs currently in flight, oldest first.
    pub async fn active_runs(&self) -> Vec<ActiveRunInfo> {
        let mut runs: Vec<ActiveRunInfo> = self
            .active
            .read()
            .await
            .values()
            .map(|r| r.info.clone())
            .collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    /// Cancel every active run and wait up to `timeout` for them to finish.
    pub async fn shutdown(&self, timeout: Duration) {
        let count = {
            let active = self.active.read().await;
            for run in active.values() {
                run.cancel.cancel();
            }
            active.len()
        };
        self.tasks.close();
        if tokio::time::timeout(timeout, self.tasks.wait()).await.is_err() {
            tracing::warn!(count, "Timed out waiting for script runs to stop");
        } else {
            tracing::info!(count, "All script runs stopped");
        }
    }

    fn plan_for(
        &self,
        run_id: RunId,
        script: &ScriptDescriptor,
        args: Vec<String>,
    ) -> AppResult<LaunchPlan> {
        let relative = safe_relative_path(&script.path)?;
        let scripts_dir = absolute(self.catalog.scripts_dir());
        let plan = match self.settings.run_mode {
            RunMode::Local => {
                LaunchPlan::python(&self.settings.python_bin, &scripts_dir.join(relative), args)
            }
            RunMode::Docker => LaunchPlan::docker(
                &self.settings.python_image,
                &scripts_dir,
                relative,
                args,
                &format!("vlabs-{run_id}"),
            ),
        };
        Ok(plan)
    }

    // -----------------------------------------------------------------------
    // Background run
    // -----------------------------------------------------------------------

    async fn execute(&self, ctx: RunContext) {
        self.publish(
            &ctx,
            RunEventKind::Started {
                command: ctx.plan.display(),
                parameters: ctx.masked_parameters.clone(),
            },
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
        let mut progress = RunProgress {
            tracker: ProgressTracker::new(),
            tail: OutputTail::default(),
            result: None,
        };

        let consume = async {
            while let Some(line) = rx.recv().await {
                self.handle_line(&ctx, &mut progress, line).await;
            }
        };
        let (outcome, ()) = tokio::join!(
            run_streaming(&ctx.plan, ctx.timeout, tx, ctx.cancel.clone()),
            consume
        );

        let (status, exit_code, error) = match &outcome {
            Ok(RunExit { exit_code, .. }) => {
                let status = RunStatus::from(progress.tracker.finish(*exit_code));
                let error = (status == RunStatus::Failed)
                    .then(|| progress.tracker.errors().last().cloned())
                    .flatten();
                (status, *exit_code, error)
            }
            Err(e) => {
                // The child was killed or never ran.
                progress.tracker.finish(None);
                let status = match e {
                    ScriptError::Timeout { .. } => RunStatus::TimedOut,
                    ScriptError::Cancelled { .. } => RunStatus::Cancelled,
                    ScriptError::NotFound(_) | ScriptError::IoError(_) => RunStatus::Failed,
                };
                self.publish(
                    &ctx,
                    RunEventKind::Error {
                        message: e.to_string(),
                    },
                );
                (status, None, Some(e.to_string()))
            }
        };

        let finished_at = Utc::now();
        let duration_ms = match &outcome {
            Ok(exit) => exit.duration_ms,
            Err(_) => (finished_at - ctx.started_at).num_milliseconds().max(0) as u64,
        };
        let snapshot = progress.tracker.snapshot();

        match status {
            RunStatus::Completed => {
                tracing::info!(run_id = %ctx.run_id, duration_ms, "Script run completed")
            }
            _ => tracing::warn!(
                run_id = %ctx.run_id,
                status = status.as_str(),
                exit_code = ?exit_code,
                error = ?error,
                "Script run did not complete"
            ),
        }

        let record = RunRecord {
            run_id: ctx.run_id,
            script_id: ctx.script_id.clone(),
            parameters: ctx.masked_parameters.clone(),
            status,
            exit_code,
            started_at: ctx.started_at,
            finished_at: Some(finished_at),
            duration_ms: Some(duration_ms),
            percent: snapshot.percent,
            progress: snapshot.clone(),
            result: progress.result.take(),
            error,
            output_tail: progress.tail.into_vec(),
        };
        self.active.write().await.remove(&ctx.run_id);
        if let Err(e) = self.history.record(record).await {
            tracing::error!(run_id = %ctx.run_id, error = %e, "Failed to record run history");
        }

        self.publish(
            &ctx,
            RunEventKind::Finished {
                status,
                exit_code,
                duration_ms,
                progress: snapshot,
            },
        );
    }

    async fn handle_line(&self, ctx: &RunContext, progress: &mut RunProgress, line: OutputLine) {
        progress.tail.push(line.text.as_str());

        for item in classify_line(&line.text) {
            match item {
                StreamLine::Log(text) => self.publish(
                    ctx,
                    RunEventKind::Output {
                        stream: line.stream,
                        line: text,
                    },
                ),
                StreamLine::Progress(event) => {
                    if progress.tracker.apply(&event) {
                        if let Some(run) = self.active.write().await.get_mut(&ctx.run_id) {
                            run.info.progress = progress.tracker.snapshot();
                        }
                    }
                    let percent = progress.tracker.percent();
                    self.publish(ctx, RunEventKind::Progress { event, percent });
                }
                StreamLine::Result(data) => {
                    progress.result = Some(data.clone());
                    self.publish(ctx, RunEventKind::Result { data });
                }
            }
        }
    }

    fn publish(&self, ctx: &RunContext, kind: RunEventKind) {
        self.event_bus.publish(
            RunEvent::new(ctx.run_id, ctx.script_id.clone(), kind).with_client(ctx.client_id),
        );
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
