//! HTTP client for the `/api/simulation/*` backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::model::{
    CreateSimulationRequest, CreateSimulationResponse, LogsResponse, SimulationId,
    SimulationState,
};

const CREATE_FALLBACK_MESSAGE: &str = "Failed to create simulation";

/// One method per backend operation. Panels and the feed only see this trait,
/// so tests can drive them with an in-memory double.
#[async_trait]
pub trait SimulationApi: Send + Sync {
    async fn create_simulation(
        &self,
        request: &CreateSimulationRequest,
    ) -> Result<CreateSimulationResponse, ApiError>;

    async fn pause_simulation(&self, id: &SimulationId) -> Result<Value, ApiError>;

    async fn resume_simulation(&self, id: &SimulationId) -> Result<Value, ApiError>;

    async fn simulation_state(&self, id: &SimulationId) -> Result<SimulationState, ApiError>;

    async fn simulation_logs(
        &self,
        id: &SimulationId,
        limit: usize,
    ) -> Result<LogsResponse, ApiError>;

    async fn simulation_report(&self, id: &SimulationId) -> Result<Value, ApiError>;

    async fn list_simulations(&self) -> Result<Value, ApiError>;

    async fn health(&self) -> Result<Value, ApiError>;
}

/// [`SimulationApi`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpSimulationApi {
    client: Client,
    base_url: String,
}

impl HttpSimulationApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ApiError::transport("client setup", err))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn get<T>(&self, operation: &'static str, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(operation, %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ApiError::transport(operation, err))?;
        parse_response(operation, response).await
    }

    async fn post_empty(&self, operation: &'static str, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(operation, %url, "POST");
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|err| ApiError::transport(operation, err))?;
        parse_response(operation, response).await
    }
}

#[async_trait]
impl SimulationApi for HttpSimulationApi {
    async fn create_simulation(
        &self,
        request: &CreateSimulationRequest,
    ) -> Result<CreateSimulationResponse, ApiError> {
        const OPERATION: &str = "create simulation";
        let url = self.url("/api/simulation/create");
        debug!(
            operation = OPERATION,
            %url,
            leaders = request.api_keys.leaders.len(),
            duration_hours = request.duration_hours,
            tick_interval_minutes = request.tick_interval_minutes,
            "POST"
        );
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| ApiError::transport(OPERATION, err))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Create(create_error_message(&body)));
        }

        response
            .json::<CreateSimulationResponse>()
            .await
            .map_err(|err| ApiError::decode(OPERATION, err))
    }

    async fn pause_simulation(&self, id: &SimulationId) -> Result<Value, ApiError> {
        self.post_empty("pause simulation", &format!("/api/simulation/{id}/pause"))
            .await
    }

    async fn resume_simulation(&self, id: &SimulationId) -> Result<Value, ApiError> {
        self.post_empty("resume simulation", &format!("/api/simulation/{id}/resume"))
            .await
    }

    async fn simulation_state(&self, id: &SimulationId) -> Result<SimulationState, ApiError> {
        self.get("simulation state", &format!("/api/simulation/{id}/state"))
            .await
    }

    async fn simulation_logs(
        &self,
        id: &SimulationId,
        limit: usize,
    ) -> Result<LogsResponse, ApiError> {
        self.get(
            "simulation logs",
            &format!("/api/simulation/{id}/logs?limit={limit}"),
        )
        .await
    }

    async fn simulation_report(&self, id: &SimulationId) -> Result<Value, ApiError> {
        self.get("simulation report", &format!("/api/simulation/{id}/report"))
            .await
    }

    async fn list_simulations(&self) -> Result<Value, ApiError> {
        self.get("list simulations", "/api/simulations").await
    }

    async fn health(&self) -> Result<Value, ApiError> {
        self.get("health check", "/api/health").await
    }
}

async fn parse_response<T>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::decode(operation, err))
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unavailable>".to_string());
        Err(ApiError::Status {
            operation,
            status: status.as_u16(),
            body,
        })
    }
}

/// Message for a refused creation: the body's `error` field when present.
fn create_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| CREATE_FALLBACK_MESSAGE.to_string())
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
