//! Root session state: which view is showing and the transient error banner.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::api::SimulationApi;
use crate::control::{ActionOutcome, ControlPanel};
use crate::dashboard::WorldDashboard;
use crate::error::ApiError;
use crate::events::EventLog;
use crate::feed::{Epoch, FeedEvent, FeedUpdate};
use crate::model::{CreateSimulationRequest, CreateSimulationResponse, SimulationId};
use crate::setup::SetupForm;

pub const NEW_SIMULATION_PROMPT: &str =
    "Start a new simulation? Current simulation will continue in background.";

/// Live panels for one simulation.
#[derive(Debug, Clone)]
pub struct ActiveSimulation {
    id: SimulationId,
    epoch: Epoch,
    pub control: ControlPanel,
    pub dashboard: WorldDashboard,
    pub events: EventLog,
}

impl ActiveSimulation {
    fn new(id: SimulationId, epoch: Epoch) -> Self {
        Self {
            id,
            epoch,
            control: ControlPanel::default(),
            dashboard: WorldDashboard::default(),
            events: EventLog::default(),
        }
    }

    pub fn id(&self) -> &SimulationId {
        &self.id
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Route one feed event to the panels that consume it.
    pub fn apply(&mut self, event: FeedEvent) -> Option<ActionOutcome> {
        match event {
            FeedEvent::State(Ok(state)) => {
                self.control.apply_state(state.clone());
                self.dashboard.apply_state(state);
                None
            }
            FeedEvent::State(Err(error)) => {
                self.control.record_poll_failure(&error);
                self.dashboard.record_poll_failure(&error);
                None
            }
            FeedEvent::Logs(Ok(entries)) => {
                self.events.apply_logs(entries);
                None
            }
            FeedEvent::Logs(Err(error)) => {
                self.events.record_poll_failure(&error);
                None
            }
            FeedEvent::Action { action, result } => Some(self.control.finish(action, result)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum View {
    Setup(SetupForm),
    Active(ActiveSimulation),
}

#[derive(Debug, Clone)]
struct Banner {
    message: String,
    raised_at: Instant,
}

#[derive(Debug, Clone)]
pub struct Session {
    view: View,
    epoch: Epoch,
    banner: Option<Banner>,
    banner_ttl: Duration,
}

impl Session {
    pub fn new(banner_ttl: Duration) -> Self {
        Self {
            view: View::Setup(SetupForm::default()),
            epoch: 0,
            banner: None,
            banner_ttl,
        }
    }

    /// Start directly in the live view for an existing simulation.
    pub fn watching(id: SimulationId, banner_ttl: Duration) -> Self {
        let mut session = Self::new(banner_ttl);
        session.epoch = 1;
        session.view = View::Active(ActiveSimulation::new(id, session.epoch));
        session
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn setup(&self) -> Option<&SetupForm> {
        match &self.view {
            View::Setup(form) => Some(form),
            View::Active(_) => None,
        }
    }

    pub fn setup_mut(&mut self) -> Option<&mut SetupForm> {
        match &mut self.view {
            View::Setup(form) => Some(form),
            View::Active(_) => None,
        }
    }

    pub fn active(&self) -> Option<&ActiveSimulation> {
        match &self.view {
            View::Active(active) => Some(active),
            View::Setup(_) => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveSimulation> {
        match &mut self.view {
            View::Active(active) => Some(active),
            View::Setup(_) => None,
        }
    }

    /// Switch to the live view. Only valid from the setup view.
    pub fn activate(&mut self, id: SimulationId) -> Option<Epoch> {
        if matches!(self.view, View::Active(_)) {
            return None;
        }
        self.epoch += 1;
        info!(simulation = %id, epoch = self.epoch, "simulation view active");
        self.view = View::Active(ActiveSimulation::new(id, self.epoch));
        Some(self.epoch)
    }

    /// Leave the live view after the user confirmed. The backend run keeps
    /// going; only this client stops watching it.
    pub fn abandon(&mut self) -> Option<SimulationId> {
        let View::Active(active) = &self.view else {
            return None;
        };
        let id = active.id.clone();
        self.epoch += 1;
        info!(simulation = %id, "left simulation; it continues on the backend");
        self.view = View::Setup(SetupForm::default());
        Some(id)
    }

    /// Apply a feed update if it belongs to the current live view.
    pub fn apply(&mut self, update: FeedUpdate) -> Option<ActionOutcome> {
        let current = self.epoch;
        match &mut self.view {
            View::Active(active) if update.epoch == current => active.apply(update.event),
            _ => {
                debug!(
                    update_epoch = update.epoch,
                    current_epoch = current,
                    "discarding stale feed update"
                );
                None
            }
        }
    }

    pub fn raise_error(&mut self, message: impl Into<String>, now: Instant) {
        self.banner = Some(Banner {
            message: message.into(),
            raised_at: now,
        });
    }

    /// Banner text if it has not yet expired at `now`.
    pub fn banner(&self, now: Instant) -> Option<&str> {
        self.banner
            .as_ref()
            .filter(|banner| now.duration_since(banner.raised_at) < self.banner_ttl)
            .map(|banner| banner.message.as_str())
    }

    pub fn clear_expired_banner(&mut self, now: Instant) {
        if self.banner(now).is_none() {
            self.banner = None;
        }
    }

    /// Validate the setup form and mark it submitting. Validation failures go
    /// to the banner and nothing is returned.
    pub fn begin_setup_submit(&mut self, now: Instant) -> Option<CreateSimulationRequest> {
        let form = self.setup_mut()?;
        match form.begin_submit() {
            Ok(request) => {
                self.banner = None;
                Some(request)
            }
            Err(err) => {
                self.raise_error(err.to_string(), now);
                None
            }
        }
    }

    /// Settle a creation call started by [`Session::begin_setup_submit`].
    pub fn finish_setup_submit(
        &mut self,
        result: Result<CreateSimulationResponse, ApiError>,
        now: Instant,
    ) -> Option<(SimulationId, Epoch)> {
        if let Some(form) = self.setup_mut() {
            form.finish_submit();
        }
        match result {
            Ok(created) => {
                let id = created.simulation_id;
                self.activate(id.clone()).map(|epoch| (id, epoch))
            }
            Err(err) => {
                self.raise_error(err.to_string(), now);
                None
            }
        }
    }

    /// Full setup round trip against `api`.
    pub async fn submit_setup(&mut self, api: &dyn SimulationApi) -> Option<(SimulationId, Epoch)> {
        let request = self.begin_setup_submit(Instant::now())?;
        let result = api.create_simulation(&request).await;
        self.finish_setup_submit(result, Instant::now())
    }
}
