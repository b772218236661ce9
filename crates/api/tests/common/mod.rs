#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vlabs_api::config::ServerConfig;
use vlabs_api::router::build_app_router;
use vlabs_api::scripting::{LaunchSettings, RunOrchestrator};
use vlabs_api::state::AppState;
use vlabs_api::ws::{RunRelay, WsManager};
use vlabs_core::scripting::{RunMode, ScriptCatalog};
use vlabs_core::types::RunId;
use vlabs_db::models::RunRecord;
use vlabs_db::HistoryStore;
use vlabs_events::EventBus;

const MANIFEST: &str = r#"
scripts:
  - id: progress_demo
    displayName: Progress demo
    path: demo/progress.sh
    capabilities:
      deviceAuth: true
    parameters:
      - name: hostname
        type: text
        required: true
      - name: password
        type: password
  - id: failing
    displayName: Failing script
    path: demo/fail.sh
  - id: slow
    displayName: Slow template push
    path: demo/slow.sh
    capabilities:
      templateGeneration: true
  - id: missing_file
    path: demo/does_not_exist.sh
  - id: hanging
    displayName: Hanging commit
    path: demo/hang.sh
    timeoutSecs: 1
  - id: reported_error
    displayName: Reported error
    path: demo/reported_error.sh
"#;

const PROGRESS_SCRIPT: &str = r#"echo "Connecting to device"
echo '{"event_type":"OPERATION_START","message":"Begin","data":{"total_steps":2}}'
echo '{"event_type":"STEP_COMPLETE","message":"Collected facts","data":{"step":1,"total_steps":2}}'
echo 'JSON_PROGRESS: {"event_type":"STEP_COMPLETE","message":"Compared snapshots","data":{"step":2,"total_steps":2}}'
echo 'JSON_RESULT: {"passed":2,"failed":0}'
echo "args: $*"
"#;

const FAIL_SCRIPT: &str = "echo 'Authentication failed' >&2\nexit 3\n";

const SLOW_SCRIPT: &str = "echo 'Rendering template'\nexec sleep 30\n";

const HANG_SCRIPT: &str = "echo 'Waiting for commit confirmation'\nexec sleep 30\n";

const REPORTED_ERROR_SCRIPT: &str = r#"echo '{"event_type":"STEP_COMPLETE","message":"Connected","data":{"step":1,"total_steps":2}}'
echo 'WARN template var { missing {"event_type":"ERROR","message":"SSH timeout"}'
exit 0
"#;

/// Scratch scripts directory, history file and the wired-up application.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

/// Build a test `ServerConfig` rooted in `dir`.
///
/// Scripts run through `sh` so the fixtures need no Python interpreter.
pub fn test_config(dir: &TempDir) -> ServerConfig {
    let scripts_dir = dir.path().join("scripts");
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        scripts_manifest: scripts_dir.join("scripts.yaml"),
        scripts_dir,
        history_file: dir.path().join("data/script_history.json"),
        history_max: 50,
        run_mode: RunMode::Local,
        python_image: "vlabs-python-runner".to_string(),
        python_bin: "sh".to_string(),
        run_timeout_secs: 60,
    }
}

fn write_fixtures(dir: &TempDir) {
    let demo = dir.path().join("scripts/demo");
    std::fs::create_dir_all(&demo).expect("create scripts dir");
    std::fs::write(dir.path().join("scripts/scripts.yaml"), MANIFEST).expect("write manifest");
    std::fs::write(demo.join("progress.sh"), PROGRESS_SCRIPT).expect("write progress.sh");
    std::fs::write(demo.join("fail.sh"), FAIL_SCRIPT).expect("write fail.sh");
    std::fs::write(demo.join("slow.sh"), SLOW_SCRIPT).expect("write slow.sh");
    std::fs::write(demo.join("hang.sh"), HANG_SCRIPT).expect("write hang.sh");
    std::fs::write(demo.join("reported_error.sh"), REPORTED_ERROR_SCRIPT)
        .expect("write reported_error.sh");
}

/// Build the full application with the same router and middleware stack
/// that `main.rs` uses, plus a running relay task.
pub async fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixtures(&dir);
    let config = test_config(&dir);

    let catalog = Arc::new(
        ScriptCatalog::load(&config.scripts_dir, &config.scripts_manifest).expect("catalog"),
    );
    let history = Arc::new(HistoryStore::open(&config.history_file, config.history_max).await);
    let ws_manager = Arc::new(WsManager::new());
    let event_bus = Arc::new(EventBus::default());
    tokio::spawn(RunRelay::new(Arc::clone(&ws_manager)).run(event_bus.subscribe()));

    let orchestrator = Arc::new(RunOrchestrator::new(
        Arc::clone(&catalog),
        Arc::clone(&history),
        Arc::clone(&event_bus),
        LaunchSettings::from_config(&config),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager,
        event_bus,
        catalog,
        history,
        orchestrator,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        dir,
    }
}

/// Serve `router` on an ephemeral port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

pub fn scripts_dir(app: &TestApp) -> PathBuf {
    app.dir.path().join("scripts")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(router: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    router
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response")
}

pub async fn get(router: Router, uri: &str) -> Response<Body> {
    send(router, Method::GET, uri, None).await
}

pub async fn post_json(router: Router, uri: &str, body: Value) -> Response<Body> {
    send(router, Method::POST, uri, Some(body)).await
}

pub async fn delete(router: Router, uri: &str) -> Response<Body> {
    send(router, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// Poll the history store until `run_id` is recorded.
pub async fn wait_for_history(state: &AppState, run_id: RunId) -> RunRecord {
    for _ in 0..200 {
        if let Some(record) = state.history.get(run_id).await {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("run {run_id} was not recorded in history");
}

/// Poll until `run_id` shows up in the active run list.
pub async fn wait_until_active(state: &AppState, run_id: RunId) {
    for _ in 0..100 {
        if state
            .orchestrator
            .active_runs()
            .await
            .iter()
            .any(|r| r.run_id == run_id)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run {run_id} never became active");
}
