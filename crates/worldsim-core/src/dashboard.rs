//! World dashboard: aggregate metrics and per-country cards.

use tracing::warn;

use crate::error::ApiError;
use crate::model::{Country, Metrics, SimulationState};

/// What the dashboard can show right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DashboardPhase<'a> {
    Loading,
    /// The first fetch failed and nothing has been received since.
    Unavailable,
    Ready(&'a SimulationState),
}

/// Headline numbers derived from one state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    pub stability_index: f64,
    pub conflict_level: f64,
    pub survival_rate: f64,
    pub surviving_nations: usize,
    pub total_nations: usize,
    pub average_technology: Option<f64>,
    pub collapsed_nations: usize,
}

impl WorldSummary {
    pub fn from_state(state: &SimulationState) -> Self {
        let metrics: Metrics = state.metrics_or_default();
        Self {
            stability_index: metrics.stability_index(),
            conflict_level: metrics.conflict_level(),
            survival_rate: metrics.survival_rate(),
            surviving_nations: state.surviving_nations(),
            total_nations: state.countries.len(),
            average_technology: state.average_technology(),
            collapsed_nations: state.countries.iter().filter(|c| c.is_collapsed()).count(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorldDashboard {
    state: Option<SimulationState>,
    settled: bool,
}

impl WorldDashboard {
    pub fn apply_state(&mut self, state: SimulationState) {
        self.state = Some(state);
        self.settled = true;
    }

    pub fn record_poll_failure(&mut self, error: &ApiError) {
        warn!(%error, "failed to fetch world state");
        self.settled = true;
    }

    pub fn phase(&self) -> DashboardPhase<'_> {
        match (&self.state, self.settled) {
            (Some(state), _) => DashboardPhase::Ready(state),
            (None, true) => DashboardPhase::Unavailable,
            (None, false) => DashboardPhase::Loading,
        }
    }

    /// Recomputed on every call.
    pub fn summary(&self) -> Option<WorldSummary> {
        self.state.as_ref().map(WorldSummary::from_state)
    }

    pub fn countries(&self) -> &[Country] {
        self.state
            .as_ref()
            .map(|state| state.countries.as_slice())
            .unwrap_or_default()
    }
}
