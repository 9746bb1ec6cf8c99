//! Wire types mirrored from the simulation backend, plus the display values
//! derived from them on the client.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Countries below this stability are shown as collapsed.
pub const COLLAPSE_THRESHOLD: f64 = 20.0;

/// An explicit `null` decodes the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Opaque backend handle for one simulation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(String);

impl SimulationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SimulationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SimulationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status reported by the backend.
///
/// `Loading` never comes from the server; it is the value panels hold until
/// their first successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SimulationStatus {
    #[default]
    Loading,
    Running,
    Paused,
    Completed,
    Failed,
    Unknown,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Running => "▶",
            Self::Paused => "⏸",
            Self::Completed => "🏁",
            Self::Failed => "✖",
            Self::Loading | Self::Unknown => "⏳",
        }
    }
}

impl From<String> for SimulationStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "LOADING" => Self::Loading,
            "RUNNING" => Self::Running,
            "PAUSED" => Self::Paused,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl From<SimulationStatus> for String {
    fn from(status: SimulationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate metrics computed by the overseer on the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metrics {
    pub stability_index: Option<f64>,
    pub survival_rate: Option<f64>,
    pub conflict_level: Option<f64>,
    pub explanation: Option<String>,
    pub hidden_costs: Option<String>,
}

impl Metrics {
    pub fn stability_index(&self) -> f64 {
        self.stability_index.unwrap_or(0.0)
    }

    pub fn survival_rate(&self) -> f64 {
        self.survival_rate.unwrap_or(100.0)
    }

    pub fn conflict_level(&self) -> f64 {
        self.conflict_level.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Country {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub ideology: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub power: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub stability: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub technology: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub resources: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub population: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub alliances: Vec<Value>,
}

/// Colour band used for a country's stability bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityBand {
    Healthy,
    Strained,
    Critical,
}

/// Glyph tier derived from a country's power score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerRank {
    Dominant,
    Major,
    Regional,
    Minor,
}

impl PowerRank {
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Dominant => "🌟",
            Self::Major => "⭐",
            Self::Regional => "✨",
            Self::Minor => "💫",
        }
    }
}

impl Country {
    pub fn is_collapsed(&self) -> bool {
        self.stability < COLLAPSE_THRESHOLD
    }

    /// Counted towards "surviving nations". Note that a country sitting exactly
    /// on the threshold is neither collapsed nor surviving.
    pub fn is_surviving(&self) -> bool {
        self.stability > COLLAPSE_THRESHOLD
    }

    pub fn stability_band(&self) -> StabilityBand {
        if self.stability >= 70.0 {
            StabilityBand::Healthy
        } else if self.stability >= 40.0 {
            StabilityBand::Strained
        } else {
            StabilityBand::Critical
        }
    }

    pub fn power_rank(&self) -> PowerRank {
        if self.power >= 80.0 {
            PowerRank::Dominant
        } else if self.power >= 60.0 {
            PowerRank::Major
        } else if self.power >= 40.0 {
            PowerRank::Regional
        } else {
            PowerRank::Minor
        }
    }

    pub fn population_label(&self) -> String {
        format!("{:.1}M citizens", self.population / 1_000_000.0)
    }
}

/// Full world snapshot returned by `GET /api/simulation/:id/state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationState {
    #[serde(deserialize_with = "null_as_default")]
    pub status: SimulationStatus,
    #[serde(deserialize_with = "null_as_default")]
    pub world_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub year: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub tick: u64,
    pub metrics: Option<Metrics>,
    #[serde(deserialize_with = "null_as_default")]
    pub countries: Vec<Country>,
    pub description: Option<String>,
}

impl SimulationState {
    /// Metrics with display fallbacks applied when the backend omitted them.
    pub fn metrics_or_default(&self) -> Metrics {
        self.metrics.clone().unwrap_or_default()
    }

    pub fn surviving_nations(&self) -> usize {
        self.countries.iter().filter(|c| c.is_surviving()).count()
    }

    /// Mean technology across all countries, rounded; `None` when the world
    /// has no countries yet.
    pub fn average_technology(&self) -> Option<f64> {
        if self.countries.is_empty() {
            return None;
        }
        let total: f64 = self.countries.iter().map(|c| c.technology).sum();
        Some((total / self.countries.len() as f64).round())
    }
}

/// Event category attached to each log entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    War,
    Peace,
    Alliance,
    AllianceBroken,
    Collapse,
    Innovation,
    Rebellion,
    Reform,
    Espionage,
    NaturalDisaster,
    ResourceDiscovery,
    TickSummary,
    SimulationStart,
    SimulationEnd,
    Other(String),
}

/// Severity class driving the colour of an event in the chronicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Critical,
    Positive,
    Warning,
    Neutral,
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::War => "WAR",
            Self::Peace => "PEACE",
            Self::Alliance => "ALLIANCE",
            Self::AllianceBroken => "ALLIANCE_BROKEN",
            Self::Collapse => "COLLAPSE",
            Self::Innovation => "INNOVATION",
            Self::Rebellion => "REBELLION",
            Self::Reform => "REFORM",
            Self::Espionage => "ESPIONAGE",
            Self::NaturalDisaster => "NATURAL_DISASTER",
            Self::ResourceDiscovery => "RESOURCE_DISCOVERY",
            Self::TickSummary => "TICK_SUMMARY",
            Self::SimulationStart => "SIMULATION_START",
            Self::SimulationEnd => "SIMULATION_END",
            Self::Other(raw) => raw,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::War => "⚔",
            Self::Peace => "🕊",
            Self::Alliance => "🤝",
            Self::AllianceBroken => "💔",
            Self::Collapse => "💥",
            Self::Innovation => "💡",
            Self::Rebellion => "⚡",
            Self::Reform => "📜",
            Self::Espionage => "🕵",
            Self::NaturalDisaster => "🌪",
            Self::ResourceDiscovery => "💎",
            Self::TickSummary => "📅",
            Self::SimulationStart => "🚀",
            Self::SimulationEnd => "🏁",
            Self::Other(_) => "📰",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::War | Self::Collapse | Self::Rebellion | Self::NaturalDisaster => {
                EventSeverity::Critical
            }
            Self::Alliance | Self::Peace | Self::Innovation => EventSeverity::Positive,
            Self::Espionage | Self::AllianceBroken => EventSeverity::Warning,
            _ => EventSeverity::Neutral,
        }
    }
}

impl Default for EventType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for EventType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "WAR" => Self::War,
            "PEACE" => Self::Peace,
            "ALLIANCE" => Self::Alliance,
            "ALLIANCE_BROKEN" => Self::AllianceBroken,
            "COLLAPSE" => Self::Collapse,
            "INNOVATION" => Self::Innovation,
            "REBELLION" => Self::Rebellion,
            "REFORM" => Self::Reform,
            "ESPIONAGE" => Self::Espionage,
            "NATURAL_DISASTER" => Self::NaturalDisaster,
            "RESOURCE_DISCOVERY" => Self::ResourceDiscovery,
            "TICK_SUMMARY" => Self::TickSummary,
            "SIMULATION_START" => Self::SimulationStart,
            "SIMULATION_END" => Self::SimulationEnd,
            _ => Self::Other(raw),
        }
    }
}

impl From<EventType> for String {
    fn from(kind: EventType) -> Self {
        match kind {
            EventType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubEvent {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: EventType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverseerInsights {
    pub explanation: Option<String>,
    pub hidden_costs: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhilosophicalInsight {
    pub moral_analysis: Option<String>,
    pub philosophical_question: Option<String>,
}

/// One chronicle entry from `GET /api/simulation/:id/logs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub event_type: EventType,
    pub year: Option<i64>,
    pub tick: Option<u64>,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub events: Vec<SubEvent>,
    pub overseer_insights: Option<OverseerInsights>,
    pub philosophical_insight: Option<PhilosophicalInsight>,
    /// RFC 3339 string or epoch milliseconds; both appear in practice.
    pub timestamp: Option<Value>,
}

impl LogEntry {
    /// Timestamp rendered in the local timezone, falling back to the raw value
    /// when it cannot be parsed.
    pub fn local_timestamp(&self) -> Option<String> {
        let raw = self.timestamp.as_ref()?;
        let parsed = match raw {
            Value::String(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|ts| ts.with_timezone(&Local)),
            Value::Number(number) => number
                .as_i64()
                .and_then(|millis| Local.timestamp_millis_opt(millis).single()),
            _ => None,
        };
        match parsed {
            Some(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => match raw {
                Value::String(text) => Some(text.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub logs: Vec<LogEntry>,
}

/// Provider credentials forwarded verbatim to the backend on creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeys {
    pub overseer: String,
    pub leaders: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategist: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSimulationRequest {
    pub api_keys: ApiKeys,
    pub duration_hours: u32,
    pub tick_interval_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSimulationResponse {
    pub simulation_id: SimulationId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn country(stability: f64, technology: f64) -> Country {
        Country {
            stability,
            technology,
            ..Country::default()
        }
    }

    #[test]
    fn state_decodes_camel_case_payload() {
        let payload = json!({
            "status": "RUNNING",
            "worldName": "Terra Novus",
            "year": 2051,
            "tick": 12,
            "metrics": { "stabilityIndex": 61.5, "conflictLevel": 22 },
            "countries": [
                { "id": "c1", "name": "Aurel", "stability": 55, "technology": 40,
                  "population": 12500000, "alliances": ["c2"] }
            ],
            "description": "A fractured continent"
        });
        let state: SimulationState = serde_json::from_value(payload).expect("decode");
        assert_eq!(state.status, SimulationStatus::Running);
        assert_eq!(state.world_name, "Terra Novus");
        assert_eq!(state.tick, 12);
        assert_eq!(state.countries[0].alliances.len(), 1);
        assert_eq!(state.countries[0].population_label(), "12.5M citizens");
        let metrics = state.metrics_or_default();
        assert_eq!(metrics.stability_index(), 61.5);
        assert_eq!(metrics.survival_rate(), 100.0);
        assert_eq!(metrics.conflict_level(), 22.0);
    }

    #[test]
    fn unrecognised_status_is_unknown() {
        let state: SimulationState =
            serde_json::from_value(json!({ "status": "REWINDING" })).expect("decode");
        assert_eq!(state.status, SimulationStatus::Unknown);
        assert_eq!(SimulationState::default().status, SimulationStatus::Loading);
    }

    #[test]
    fn collapse_threshold_is_strict() {
        assert!(country(19.0, 0.0).is_collapsed());
        assert!(!country(20.0, 0.0).is_collapsed());
        assert!(!country(20.0, 0.0).is_surviving());
        assert!(country(20.5, 0.0).is_surviving());
    }

    #[test]
    fn derived_world_aggregates() {
        let state = SimulationState {
            countries: vec![country(10.0, 30.0), country(50.0, 45.0), country(90.0, 50.0)],
            ..SimulationState::default()
        };
        assert_eq!(state.surviving_nations(), 2);
        assert_eq!(state.average_technology(), Some(42.0));
        assert_eq!(SimulationState::default().average_technology(), None);
    }

    #[test]
    fn bands_and_ranks_follow_thresholds() {
        assert_eq!(country(70.0, 0.0).stability_band(), StabilityBand::Healthy);
        assert_eq!(country(40.0, 0.0).stability_band(), StabilityBand::Strained);
        assert_eq!(country(39.9, 0.0).stability_band(), StabilityBand::Critical);

        let mut c = Country::default();
        c.power = 80.0;
        assert_eq!(c.power_rank(), PowerRank::Dominant);
        c.power = 61.0;
        assert_eq!(c.power_rank(), PowerRank::Major);
        c.power = 40.0;
        assert_eq!(c.power_rank(), PowerRank::Regional);
        c.power = 5.0;
        assert_eq!(c.power_rank(), PowerRank::Minor);
    }

    #[test]
    fn event_lookup_falls_back_for_unknown_types() {
        let war = EventType::from("WAR".to_string());
        assert_eq!(war, EventType::War);
        assert_eq!(war.severity(), EventSeverity::Critical);
        assert_eq!(EventType::AllianceBroken.severity(), EventSeverity::Warning);
        assert_eq!(EventType::Peace.severity(), EventSeverity::Positive);
        assert_eq!(EventType::Reform.severity(), EventSeverity::Neutral);

        let odd = EventType::from("PLAGUE".to_string());
        assert_eq!(odd.icon(), "📰");
        assert_eq!(odd.severity(), EventSeverity::Neutral);
        assert_eq!(odd.as_str(), "PLAGUE");
    }

    #[test]
    fn log_entry_decodes_nested_insights() {
        let payload = json!({
            "eventType": "ALLIANCE",
            "year": 2050,
            "tick": 3,
            "events": [{ "type": "WAR", "description": "Border skirmish" }],
            "overseerInsights": { "explanation": "Tension rising", "hiddenCosts": "Trade" },
            "philosophicalInsight": { "philosophicalQuestion": "Is order worth it?" },
            "timestamp": "2024-05-01T12:00:00Z"
        });
        let entry: LogEntry = serde_json::from_value(payload).expect("decode");
        assert_eq!(entry.event_type, EventType::Alliance);
        assert_eq!(entry.events[0].kind, EventType::War);
        assert_eq!(
            entry.overseer_insights.as_ref().and_then(|o| o.hidden_costs.as_deref()),
            Some("Trade")
        );
        assert!(entry.local_timestamp().is_some());
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let state: SimulationState = serde_json::from_value(json!({
            "status": "RUNNING",
            "worldName": null,
            "countries": [
                { "name": "Aurel", "stability": null, "alliances": null }
            ]
        }))
        .expect("decode state");
        assert_eq!(state.world_name, "");
        assert!(state.countries[0].alliances.is_empty());
        assert_eq!(state.countries[0].stability, 0.0);

        let state: SimulationState =
            serde_json::from_value(json!({ "status": null, "countries": null }))
                .expect("decode state");
        assert!(state.countries.is_empty());
        assert_eq!(state.average_technology(), None);

        let logs: LogsResponse = serde_json::from_value(json!({
            "logs": [
                { "eventType": "WAR", "events": null },
                { "eventType": null, "events": [{ "type": null }] }
            ]
        }))
        .expect("decode logs");
        assert!(logs.logs[0].events.is_empty());
        assert_eq!(logs.logs[1].event_type, EventType::default());
        assert_eq!(logs.logs[1].events[0].kind, EventType::default());

        let logs: LogsResponse =
            serde_json::from_value(json!({ "logs": null })).expect("decode logs");
        assert!(logs.logs.is_empty());
    }

    #[test]
    fn unparseable_timestamp_is_shown_raw() {
        let entry = LogEntry {
            timestamp: Some(json!("sometime")),
            ..LogEntry::default()
        };
        assert_eq!(entry.local_timestamp().as_deref(), Some("sometime"));
        assert_eq!(LogEntry::default().local_timestamp(), None);
    }

    #[test]
    fn api_keys_skip_absent_optional_roles() {
        let keys = ApiKeys {
            overseer: "o".into(),
            leaders: vec!["l1".into()],
            thinker: None,
            strategist: Some(String::new()),
        };
        let value = serde_json::to_value(&keys).expect("encode");
        assert!(value.get("thinker").is_none());
        assert_eq!(value["strategist"], json!(""));
    }
}
