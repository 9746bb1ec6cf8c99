//! Client-side core for the world simulation console.
//!
//! Everything here is a thin consumer of the remote `/api/simulation/*`
//! backend: typed HTTP calls, the view models mirrored from its responses, and
//! the state of the setup, control, dashboard, and event panels.

pub mod api;
pub mod config;
pub mod control;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod feed;
pub mod model;
pub mod session;
pub mod setup;

pub use api::{HttpSimulationApi, SimulationApi};
pub use config::{ClientConfig, PollConfig};
pub use control::{ActionOutcome, ControlAction, ControlPanel};
pub use dashboard::{DashboardPhase, WorldDashboard, WorldSummary};
pub use error::{ApiError, SetupError, StartError};
pub use events::{EventFilter, EventLog, filter_entries};
pub use feed::{
    Epoch, FeedEvent, FeedReceiver, FeedSender, FeedUpdate, SimulationFeed, feed_channel,
};
pub use model::{
    ApiKeys, Country, CreateSimulationRequest, CreateSimulationResponse, EventSeverity, EventType,
    LogEntry, LogsResponse, Metrics, PowerRank, SimulationId, SimulationState, SimulationStatus,
    StabilityBand,
};
pub use session::{ActiveSimulation, NEW_SIMULATION_PROMPT, Session, View};
pub use setup::{SetupField, SetupForm, SetupPhase, estimated_years, validate_keys};
