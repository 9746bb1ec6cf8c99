//! Event chronicle: the latest window of log entries and a category filter.

use tracing::warn;

use crate::error::ApiError;
use crate::model::{EventType, LogEntry};

/// Category filter applied locally to the fetched window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Only(EventType),
}

impl EventFilter {
    /// Filters offered in the chronicle header, in display order.
    pub fn presets() -> [EventFilter; 5] {
        [
            EventFilter::All,
            EventFilter::Only(EventType::War),
            EventFilter::Only(EventType::Alliance),
            EventFilter::Only(EventType::Collapse),
            EventFilter::Only(EventType::Innovation),
        ]
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_uppercase();
        if raw.is_empty() || raw == "ALL" {
            EventFilter::All
        } else {
            EventFilter::Only(EventType::from(raw))
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(kind) => &entry.event_type == kind,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventFilter::All => "All",
            EventFilter::Only(EventType::War) => "Wars",
            EventFilter::Only(EventType::Alliance) => "Alliances",
            EventFilter::Only(EventType::Collapse) => "Collapses",
            EventFilter::Only(EventType::Innovation) => "Innovations",
            EventFilter::Only(_) => "Custom",
        }
    }

    /// Next preset after this one, wrapping around.
    pub fn next(&self) -> EventFilter {
        let presets = Self::presets();
        let position = presets.iter().position(|preset| preset == self);
        match position {
            Some(index) => presets[(index + 1) % presets.len()].clone(),
            None => EventFilter::All,
        }
    }
}

/// Select the entries visible under `filter`, preserving order.
pub fn filter_entries<'a>(
    entries: &'a [LogEntry],
    filter: &'a EventFilter,
) -> impl Iterator<Item = &'a LogEntry> + 'a {
    entries.iter().filter(move |entry| filter.matches(entry))
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    loaded: bool,
    filter: EventFilter,
}

impl EventLog {
    pub fn is_loading(&self) -> bool {
        !self.loaded
    }

    /// Replace the whole window; entries that fell out of it disappear.
    pub fn apply_logs(&mut self, entries: Vec<LogEntry>) {
        self.entries = entries;
        self.loaded = true;
    }

    pub fn record_poll_failure(&mut self, error: &ApiError) {
        warn!(%error, "failed to fetch simulation logs");
        self.loaded = true;
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Changing the filter only changes what is rendered; no fetch is issued.
    pub fn set_filter(&mut self, filter: EventFilter) {
        self.filter = filter;
    }

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn visible(&self) -> impl Iterator<Item = &LogEntry> {
        filter_entries(&self.entries, &self.filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: EventType, tick: u64) -> LogEntry {
        LogEntry {
            event_type: kind,
            tick: Some(tick),
            ..LogEntry::default()
        }
    }

    fn sample() -> Vec<LogEntry> {
        vec![
            entry(EventType::War, 1),
            entry(EventType::Alliance, 2),
            entry(EventType::Peace, 3),
            entry(EventType::War, 4),
        ]
    }

    #[test]
    fn war_filter_keeps_only_wars_in_order() {
        let mut log = EventLog::default();
        log.apply_logs(sample());
        log.set_filter(EventFilter::parse("war"));
        let ticks: Vec<u64> = log.visible().filter_map(|e| e.tick).collect();
        assert_eq!(ticks, vec![1, 4]);
    }

    #[test]
    fn all_filter_returns_everything_in_order() {
        let mut log = EventLog::default();
        log.apply_logs(sample());
        let ticks: Vec<u64> = log.visible().filter_map(|e| e.tick).collect();
        assert_eq!(ticks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn filter_with_no_matches_is_empty() {
        let entries = sample();
        let filter = EventFilter::Only(EventType::Collapse);
        assert_eq!(filter_entries(&entries, &filter).count(), 0);
    }

    #[test]
    fn new_window_replaces_old_entries() {
        let mut log = EventLog::default();
        assert!(log.is_loading());
        log.apply_logs(sample());
        log.apply_logs(vec![entry(EventType::Reform, 9)]);
        assert!(!log.is_loading());
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn presets_cycle_and_wrap() {
        let mut log = EventLog::default();
        let mut labels = Vec::new();
        for _ in 0..6 {
            labels.push(log.filter().label());
            log.cycle_filter();
        }
        assert_eq!(
            labels,
            vec!["All", "Wars", "Alliances", "Collapses", "Innovations", "All"]
        );
        assert_eq!(EventFilter::parse("PEACE").next(), EventFilter::All);
    }
}
