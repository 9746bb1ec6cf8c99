//! Setup form: credential slots, run parameters, and submission validation.

use std::ops::RangeInclusive;

use tracing::{info, warn};

use crate::api::SimulationApi;
use crate::error::{SetupError, StartError};
use crate::model::{ApiKeys, CreateSimulationRequest, SimulationId};

pub const MIN_LEADERS: usize = 1;
pub const MAX_LEADERS: usize = 5;
const INITIAL_LEADER_SLOTS: usize = 3;

pub const DURATION_HOURS_RANGE: RangeInclusive<u32> = 1..=168;
pub const TICK_INTERVAL_MINUTES_RANGE: RangeInclusive<u32> = 1..=60;
pub const DEFAULT_DURATION_HOURS: u32 = 72;
pub const DEFAULT_TICK_INTERVAL_MINUTES: u32 = 5;

/// Simulated years a run will cover; one tick is one year.
pub fn estimated_years(duration_hours: u32, tick_interval_minutes: u32) -> u64 {
    u64::from(duration_hours) * 60 / u64::from(tick_interval_minutes.max(1))
}

/// Check required credentials and drop blank leader slots.
///
/// Optional roles are forwarded exactly as given.
pub fn validate_keys(keys: &ApiKeys) -> Result<ApiKeys, SetupError> {
    if keys.overseer.trim().is_empty() {
        return Err(SetupError::MissingOverseer);
    }
    let leaders: Vec<String> = keys
        .leaders
        .iter()
        .filter(|key| !key.trim().is_empty())
        .cloned()
        .collect();
    if leaders.is_empty() {
        return Err(SetupError::MissingLeader);
    }
    Ok(ApiKeys {
        leaders,
        ..keys.clone()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupPhase {
    #[default]
    Editing,
    Submitting,
}

/// Focusable inputs of the form, in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupField {
    Overseer,
    Leader(usize),
    Thinker,
    Strategist,
    DurationHours,
    TickInterval,
}

impl SetupField {
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            Self::Overseer | Self::Leader(_) | Self::Thinker | Self::Strategist
        )
    }
}

#[derive(Debug, Clone)]
pub struct SetupForm {
    pub overseer: String,
    leaders: Vec<String>,
    pub thinker: String,
    pub strategist: String,
    duration_hours: u32,
    tick_interval_minutes: u32,
    phase: SetupPhase,
}

impl Default for SetupForm {
    fn default() -> Self {
        Self {
            overseer: String::new(),
            leaders: vec![String::new(); INITIAL_LEADER_SLOTS],
            thinker: String::new(),
            strategist: String::new(),
            duration_hours: DEFAULT_DURATION_HOURS,
            tick_interval_minutes: DEFAULT_TICK_INTERVAL_MINUTES,
            phase: SetupPhase::Editing,
        }
    }
}

impl SetupForm {
    pub fn phase(&self) -> SetupPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == SetupPhase::Submitting
    }

    pub fn leaders(&self) -> &[String] {
        &self.leaders
    }

    pub fn can_add_leader(&self) -> bool {
        self.leaders.len() < MAX_LEADERS
    }

    pub fn add_leader(&mut self) -> bool {
        if !self.can_add_leader() {
            return false;
        }
        self.leaders.push(String::new());
        true
    }

    pub fn remove_leader(&mut self, index: usize) -> bool {
        if self.leaders.len() <= MIN_LEADERS || index >= self.leaders.len() {
            return false;
        }
        self.leaders.remove(index);
        true
    }

    pub fn set_leader(&mut self, index: usize, value: impl Into<String>) -> bool {
        match self.leaders.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn duration_hours(&self) -> u32 {
        self.duration_hours
    }

    pub fn set_duration_hours(&mut self, hours: u32) {
        self.duration_hours = clamp_to(hours, &DURATION_HOURS_RANGE);
    }

    pub fn adjust_duration_hours(&mut self, delta: i64) {
        self.set_duration_hours(offset(self.duration_hours, delta));
    }

    pub fn tick_interval_minutes(&self) -> u32 {
        self.tick_interval_minutes
    }

    pub fn set_tick_interval_minutes(&mut self, minutes: u32) {
        self.tick_interval_minutes = clamp_to(minutes, &TICK_INTERVAL_MINUTES_RANGE);
    }

    pub fn adjust_tick_interval_minutes(&mut self, delta: i64) {
        self.set_tick_interval_minutes(offset(self.tick_interval_minutes, delta));
    }

    pub fn estimated_years(&self) -> u64 {
        estimated_years(self.duration_hours, self.tick_interval_minutes)
    }

    /// Inputs in navigation order for the current number of leader slots.
    pub fn fields(&self) -> Vec<SetupField> {
        let mut fields = Vec::with_capacity(self.leaders.len() + 5);
        fields.push(SetupField::Overseer);
        fields.extend((0..self.leaders.len()).map(SetupField::Leader));
        fields.extend([
            SetupField::Thinker,
            SetupField::Strategist,
            SetupField::DurationHours,
            SetupField::TickInterval,
        ]);
        fields
    }

    /// Text buffer behind a credential field; numeric fields have none.
    pub fn text_mut(&mut self, field: SetupField) -> Option<&mut String> {
        match field {
            SetupField::Overseer => Some(&mut self.overseer),
            SetupField::Leader(index) => self.leaders.get_mut(index),
            SetupField::Thinker => Some(&mut self.thinker),
            SetupField::Strategist => Some(&mut self.strategist),
            SetupField::DurationHours | SetupField::TickInterval => None,
        }
    }

    pub fn text(&self, field: SetupField) -> Option<&str> {
        match field {
            SetupField::Overseer => Some(&self.overseer),
            SetupField::Leader(index) => self.leaders.get(index).map(String::as_str),
            SetupField::Thinker => Some(&self.thinker),
            SetupField::Strategist => Some(&self.strategist),
            SetupField::DurationHours | SetupField::TickInterval => None,
        }
    }

    pub fn api_keys(&self) -> ApiKeys {
        ApiKeys {
            overseer: self.overseer.clone(),
            leaders: self.leaders.clone(),
            thinker: Some(self.thinker.clone()),
            strategist: Some(self.strategist.clone()),
        }
    }

    pub fn validate(&self) -> Result<CreateSimulationRequest, SetupError> {
        Ok(CreateSimulationRequest {
            api_keys: validate_keys(&self.api_keys())?,
            duration_hours: self.duration_hours,
            tick_interval_minutes: self.tick_interval_minutes,
        })
    }

    /// Validate and move to `Submitting`. The caller must follow up with
    /// [`SetupForm::finish_submit`] once the creation call settles.
    pub fn begin_submit(&mut self) -> Result<CreateSimulationRequest, SetupError> {
        if self.is_submitting() {
            return Err(SetupError::AlreadySubmitting);
        }
        let request = self.validate()?;
        self.phase = SetupPhase::Submitting;
        Ok(request)
    }

    pub fn finish_submit(&mut self) {
        self.phase = SetupPhase::Editing;
    }

    /// Validate, create the simulation, and return to editing either way.
    pub async fn submit(&mut self, api: &dyn SimulationApi) -> Result<SimulationId, StartError> {
        let request = self.begin_submit()?;
        let result = api.create_simulation(&request).await;
        self.finish_submit();
        match result {
            Ok(created) => {
                info!(simulation = %created.simulation_id, "simulation created");
                Ok(created.simulation_id)
            }
            Err(err) => {
                warn!(error = %err, "simulation creation failed");
                Err(err.into())
            }
        }
    }
}

fn clamp_to(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

fn offset(value: u32, delta: i64) -> u32 {
    (value as i64 + delta).clamp(0, u32::MAX as i64) as u32
}
