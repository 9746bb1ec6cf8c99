//! Control panel: current status, headline metrics, pause/resume.

use tracing::{info, warn};

use crate::api::SimulationApi;
use crate::error::ApiError;
use crate::model::{SimulationId, SimulationState, SimulationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
}

impl ControlAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }

    /// Status assumed locally once the backend accepts the action.
    pub fn target_status(&self) -> SimulationStatus {
        match self {
            Self::Pause => SimulationStatus::Paused,
            Self::Resume => SimulationStatus::Running,
        }
    }

    pub async fn send(&self, api: &dyn SimulationApi, id: &SimulationId) -> Result<(), ApiError> {
        match self {
            Self::Pause => api.pause_simulation(id).await.map(drop),
            Self::Resume => api.resume_simulation(id).await.map(drop),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action was not allowed in the current state; nothing was sent.
    Refused,
    Applied,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct ControlPanel {
    status: SimulationStatus,
    world: Option<SimulationState>,
    in_flight: Option<ControlAction>,
}

impl ControlPanel {
    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn world(&self) -> Option<&SimulationState> {
        self.world.as_ref()
    }

    pub fn in_flight(&self) -> Option<ControlAction> {
        self.in_flight
    }

    /// Replace the held state wholesale with a fresh fetch.
    pub fn apply_state(&mut self, state: SimulationState) {
        self.status = state.status;
        self.world = Some(state);
    }

    /// A failed refresh keeps whatever was shown before.
    pub fn record_poll_failure(&self, error: &ApiError) {
        warn!(%error, "failed to fetch simulation status");
    }

    pub fn can_pause(&self) -> bool {
        self.in_flight.is_none() && self.status == SimulationStatus::Running
    }

    pub fn can_resume(&self) -> bool {
        self.in_flight.is_none()
            && !matches!(
                self.status,
                SimulationStatus::Running | SimulationStatus::Completed
            )
    }

    pub fn can(&self, action: ControlAction) -> bool {
        match action {
            ControlAction::Pause => self.can_pause(),
            ControlAction::Resume => self.can_resume(),
        }
    }

    /// Mark `action` as in flight if it is currently allowed.
    pub fn begin(&mut self, action: ControlAction) -> bool {
        if !self.can(action) {
            return false;
        }
        self.in_flight = Some(action);
        true
    }

    /// Settle an in-flight action: optimistic status on success, a logged
    /// warning and no rollback on failure.
    pub fn finish(&mut self, action: ControlAction, result: Result<(), ApiError>) -> ActionOutcome {
        if self.in_flight == Some(action) {
            self.in_flight = None;
        }
        match result {
            Ok(()) => {
                info!(action = action.label(), "control action accepted");
                self.status = action.target_status();
                ActionOutcome::Applied
            }
            Err(error) => {
                warn!(action = action.label(), %error, "control action failed");
                ActionOutcome::Failed
            }
        }
    }

    /// Run an action to completion against `api`.
    pub async fn perform(
        &mut self,
        api: &dyn SimulationApi,
        id: &SimulationId,
        action: ControlAction,
    ) -> ActionOutcome {
        if !self.begin(action) {
            return ActionOutcome::Refused;
        }
        let result = action.send(api, id).await;
        self.finish(action, result)
    }
}
