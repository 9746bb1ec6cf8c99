//! Error types shared by the API client and the panels.

use thiserror::Error;

/// Failures talking to the simulation backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("request to {operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    /// Simulation creation was refused; carries the backend's `error` field.
    #[error("{0}")]
    Create(String),
    /// Any other operation answered with a non-2xx status.
    #[error("{operation} returned {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    /// The response body was not the JSON shape we expected.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation,
            message: err.to_string(),
        }
    }

    pub fn decode(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            operation,
            message: err.to_string(),
        }
    }
}

/// Client-side validation failures raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("Overseer API key is required")]
    MissingOverseer,
    #[error("At least one leader API key is required")]
    MissingLeader,
    #[error("a simulation is already being created")]
    AlreadySubmitting,
}

/// Everything that can stop the setup panel from starting a simulation.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Invalid(#[from] SetupError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
