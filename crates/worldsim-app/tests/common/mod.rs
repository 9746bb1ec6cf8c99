#![allow(dead_code)]

use std::collections::HashMap;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};

#[derive(Default)]
pub struct Backend {
    pub statuses: HashMap<String, &'static str>,
    pub created: Vec<Value>,
}

pub type SharedBackend = Arc<Mutex<Backend>>;

type Reply = (StatusCode, Json<Value>);

pub async fn spawn_backend() -> (String, SharedBackend) {
    let backend: SharedBackend = Arc::default();
    let app = Router::new()
        .route("/api/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/api/simulation/create", post(create))
        .route("/api/simulation/:id/pause", post(pause))
        .route("/api/simulation/:id/state", get(state))
        .route("/api/simulation/:id/logs", get(logs))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend");
    });
    (format!("http://{addr}"), backend)
}

async fn create(State(backend): State<SharedBackend>, Json(body): Json<Value>) -> Reply {
    let mut backend = backend.lock().unwrap();
    let id = format!("sim-{}", backend.created.len() + 1);
    backend.statuses.insert(id.clone(), "RUNNING");
    backend.created.push(body);
    (StatusCode::OK, Json(json!({ "simulationId": id })))
}

async fn pause(State(backend): State<SharedBackend>, Path(id): Path<String>) -> Reply {
    let mut backend = backend.lock().unwrap();
    match backend.statuses.get_mut(&id) {
        Some(status) => {
            *status = "PAUSED";
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Simulation not found" })),
        ),
    }
}

async fn state(State(backend): State<SharedBackend>, Path(id): Path<String>) -> Reply {
    let backend = backend.lock().unwrap();
    let Some(status) = backend.statuses.get(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Simulation not found" })),
        );
    };
    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "worldName": "Terra Novus",
            "year": 2050,
            "tick": 7,
            "metrics": { "stabilityIndex": 64, "conflictLevel": 18 },
            "countries": [
                { "id": "c1", "name": "Aurel", "power": 82, "stability": 19,
                  "technology": 70, "resources": 40, "population": 12000000 }
            ]
        })),
    )
}

async fn logs(Path(_id): Path<String>) -> Json<Value> {
    Json(json!({
        "logs": [
            { "eventType": "SIMULATION_START", "tick": 0, "description": "The world awakens" },
            { "eventType": "WAR", "tick": 4, "description": "Aurel invades Borea" }
        ]
    }))
}

/// Run the `worldsim` binary on the blocking pool so the fake backend keeps
/// serving while the child process talks to it.
pub async fn run_cli(base_url: &str, args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_worldsim"));
    command
        .arg("--base-url")
        .arg(base_url)
        .args(args)
        .env_remove("WORLDSIM_TERMINAL_HEADLESS")
        .env("RUST_LOG", "off");
    for (key, value) in envs {
        command.env(key, value);
    }
    tokio::task::spawn_blocking(move || command.output().expect("spawn worldsim"))
        .await
        .expect("join")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
