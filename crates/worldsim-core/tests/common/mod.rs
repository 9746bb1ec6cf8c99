#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Map, Value, json};
use worldsim_core::{
    ApiError, CreateSimulationRequest, CreateSimulationResponse, EventType, LogEntry,
    LogsResponse, SimulationApi, SimulationId, SimulationState, SimulationStatus,
};

/// In-memory backend double that records every call it receives.
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<String>>,
    status: Mutex<Option<SimulationStatus>>,
    logs: Mutex<Vec<LogEntry>>,
    fail_state: Mutex<bool>,
    fail_actions: Mutex<bool>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs(self, logs: Vec<LogEntry>) -> Self {
        *self.logs.lock().unwrap() = logs;
        self
    }

    pub fn set_fail_state(&self, fail: bool) {
        *self.fail_state.lock().unwrap() = fail;
    }

    pub fn set_fail_actions(&self, fail: bool) {
        *self.fail_actions.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn action(&self, id: &SimulationId, status: SimulationStatus) -> Result<Value, ApiError> {
        if *self.fail_actions.lock().unwrap() {
            return Err(ApiError::Status {
                operation: "control action",
                status: 503,
                body: "busy".into(),
            });
        }
        *self.status.lock().unwrap() = Some(status);
        Ok(json!({ "simulationId": id.as_str(), "status": status.as_str() }))
    }
}

#[async_trait]
impl SimulationApi for MockApi {
    async fn create_simulation(
        &self,
        request: &CreateSimulationRequest,
    ) -> Result<CreateSimulationResponse, ApiError> {
        self.record(format!("create:{}", request.api_keys.leaders.len()));
        *self.status.lock().unwrap() = Some(SimulationStatus::Running);
        Ok(CreateSimulationResponse {
            simulation_id: "sim-mock".into(),
            extra: Map::new(),
        })
    }

    async fn pause_simulation(&self, id: &SimulationId) -> Result<Value, ApiError> {
        self.record(format!("pause:{id}"));
        self.action(id, SimulationStatus::Paused)
    }

    async fn resume_simulation(&self, id: &SimulationId) -> Result<Value, ApiError> {
        self.record(format!("resume:{id}"));
        self.action(id, SimulationStatus::Running)
    }

    async fn simulation_state(&self, id: &SimulationId) -> Result<SimulationState, ApiError> {
        self.record(format!("state:{id}"));
        if *self.fail_state.lock().unwrap() {
            return Err(ApiError::transport("simulation state", "connection refused"));
        }
        let status = self.status.lock().unwrap().unwrap_or(SimulationStatus::Running);
        Ok(SimulationState {
            status,
            world_name: "Terra Novus".into(),
            ..SimulationState::default()
        })
    }

    async fn simulation_logs(
        &self,
        id: &SimulationId,
        limit: usize,
    ) -> Result<LogsResponse, ApiError> {
        self.record(format!("logs:{id}:{limit}"));
        Ok(LogsResponse {
            logs: self.logs.lock().unwrap().clone(),
        })
    }

    async fn simulation_report(&self, id: &SimulationId) -> Result<Value, ApiError> {
        self.record(format!("report:{id}"));
        Ok(json!({}))
    }

    async fn list_simulations(&self) -> Result<Value, ApiError> {
        self.record("list".into());
        Ok(json!([]))
    }

    async fn health(&self) -> Result<Value, ApiError> {
        self.record("health".into());
        Ok(json!({ "status": "ok" }))
    }
}

pub fn log_entry(kind: EventType, tick: u64) -> LogEntry {
    LogEntry {
        event_type: kind,
        tick: Some(tick),
        ..LogEntry::default()
    }
}

/// Recorded state of the fake HTTP backend.
#[derive(Default)]
pub struct BackendState {
    pub statuses: HashMap<String, &'static str>,
    pub created: Vec<Value>,
    pub log_limits: Vec<usize>,
    next_id: u32,
}

pub type SharedBackend = Arc<Mutex<BackendState>>;

/// Serve the `/api/*` surface on an ephemeral port. Returns the base URL.
pub async fn spawn_backend() -> (String, SharedBackend) {
    let backend: SharedBackend = Arc::default();
    let app = Router::new()
        .route("/api/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/api/simulations", get(list))
        .route("/api/simulation/create", post(create))
        .route("/api/simulation/:id/pause", post(pause))
        .route("/api/simulation/:id/resume", post(resume))
        .route("/api/simulation/:id/state", get(state))
        .route("/api/simulation/:id/logs", get(logs))
        .route("/api/simulation/:id/report", get(report))
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

type Reply = (StatusCode, Json<Value>);

fn not_found(id: &str) -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Simulation {id} not found") })),
    )
}

async fn list(State(backend): State<SharedBackend>) -> Json<Value> {
    let backend = backend.lock().unwrap();
    let mut ids: Vec<&String> = backend.statuses.keys().collect();
    ids.sort();
    Json(json!({ "simulations": ids }))
}

async fn create(State(backend): State<SharedBackend>, Json(body): Json<Value>) -> Reply {
    if body["apiKeys"]["overseer"] == "rejected" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid overseer key" })),
        );
    }
    let mut backend = backend.lock().unwrap();
    backend.next_id += 1;
    let id = format!("sim-{}", backend.next_id);
    backend.statuses.insert(id.clone(), "RUNNING");
    backend.created.push(body);
    (
        StatusCode::OK,
        Json(json!({ "simulationId": id, "message": "Simulation started" })),
    )
}

fn set_status(backend: &SharedBackend, id: &str, status: &'static str) -> Reply {
    let mut backend = backend.lock().unwrap();
    match backend.statuses.get_mut(id) {
        Some(current) => {
            *current = status;
            (StatusCode::OK, Json(json!({ "success": true, "status": status })))
        }
        None => not_found(id),
    }
}

async fn pause(State(backend): State<SharedBackend>, Path(id): Path<String>) -> Reply {
    set_status(&backend, &id, "PAUSED")
}

async fn resume(State(backend): State<SharedBackend>, Path(id): Path<String>) -> Reply {
    set_status(&backend, &id, "RUNNING")
}

async fn state(State(backend): State<SharedBackend>, Path(id): Path<String>) -> Reply {
    let backend = backend.lock().unwrap();
    let Some(status) = backend.statuses.get(&id) else {
        return not_found(&id);
    };
    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "worldName": "Terra Novus",
            "year": 2050,
            "tick": 7,
            "description": "A continent of rival ideologies",
            "metrics": {
                "stabilityIndex": 64,
                "conflictLevel": 18,
                "explanation": "Uneasy balance",
                "hiddenCosts": "Surveillance"
            },
            "countries": [
                { "id": "c1", "name": "Aurel", "ideology": "Technocracy", "power": 82,
                  "stability": 19, "technology": 70, "resources": 40,
                  "population": 12000000, "alliances": [] },
                { "id": "c2", "name": "Borea", "ideology": "Commune", "power": 35,
                  "stability": 66, "technology": 30, "resources": 75,
                  "population": 3400000, "alliances": ["c3"] }
            ]
        })),
    )
}

async fn logs(
    State(backend): State<SharedBackend>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    let mut backend = backend.lock().unwrap();
    if !backend.statuses.contains_key(&id) {
        return not_found(&id);
    }
    let limit = params
        .get("limit")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(0);
    backend.log_limits.push(limit);
    (
        StatusCode::OK,
        Json(json!({
            "logs": [
                { "eventType": "SIMULATION_START", "year": 2045, "tick": 0,
                  "description": "The world awakens", "timestamp": "2024-05-01T12:00:00Z" },
                { "eventType": "WAR", "year": 2049, "tick": 4,
                  "description": "Aurel invades Borea",
                  "overseerInsights": { "explanation": "Resource pressure" } },
                { "eventType": "ALLIANCE", "year": 2050, "tick": 5,
                  "events": [{ "type": "PEACE", "description": "Ceasefire" }] }
            ]
        })),
    )
}

async fn report(State(backend): State<SharedBackend>, Path(id): Path<String>) -> Reply {
    let backend = backend.lock().unwrap();
    match backend.statuses.get(&id) {
        Some(status) => (
            StatusCode::OK,
            Json(json!({ "simulationId": id, "finalStatus": status })),
        ),
        None => not_found(&id),
    }
}
