//! One-shot CLI commands: call the backend once and print the result.

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use serde_json::Value;
use worldsim_core::setup::MAX_LEADERS;
use worldsim_core::{
    ApiKeys, CreateSimulationRequest, EventFilter, EventSeverity, LogEntry, SimulationApi,
    SimulationId, SimulationState, WorldSummary, estimated_years, filter_entries, validate_keys,
};

const NAME_COLUMN: usize = 22;
const COLLAPSED_BADGE: &str = "COLLAPSED";

/// Credentials and run parameters collected from the command line.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub keys: ApiKeys,
    pub duration_hours: u32,
    pub tick_interval_minutes: u32,
}

pub async fn create_command(api: &dyn SimulationApi, options: CreateOptions) -> Result<()> {
    if options.keys.leaders.len() > MAX_LEADERS {
        bail!("at most {MAX_LEADERS} leader keys are accepted");
    }
    let request = CreateSimulationRequest {
        api_keys: validate_keys(&options.keys)?,
        duration_hours: options.duration_hours,
        tick_interval_minutes: options.tick_interval_minutes,
    };
    let created = api
        .create_simulation(&request)
        .await
        .context("failed to create simulation")?;
    println!(
        "{} {}",
        "created".green().bold(),
        created.simulation_id.as_str().bold()
    );
    println!(
        "{} {}h at {} min/tick (~{} simulated years)",
        "run".dimmed(),
        request.duration_hours,
        request.tick_interval_minutes,
        estimated_years(request.duration_hours, request.tick_interval_minutes)
    );
    Ok(())
}

pub async fn pause_command(api: &dyn SimulationApi, id: &SimulationId) -> Result<()> {
    let value = api
        .pause_simulation(id)
        .await
        .with_context(|| format!("failed to pause {id}"))?;
    print_json(&value)
}

pub async fn resume_command(api: &dyn SimulationApi, id: &SimulationId) -> Result<()> {
    let value = api
        .resume_simulation(id)
        .await
        .with_context(|| format!("failed to resume {id}"))?;
    print_json(&value)
}

pub async fn report_command(api: &dyn SimulationApi, id: &SimulationId) -> Result<()> {
    let value = api
        .simulation_report(id)
        .await
        .with_context(|| format!("failed to fetch report for {id}"))?;
    print_json(&value)
}

pub async fn list_command(api: &dyn SimulationApi) -> Result<()> {
    let value = api
        .list_simulations()
        .await
        .context("failed to list simulations")?;
    print_json(&value)
}

pub async fn health_command(api: &dyn SimulationApi) -> Result<()> {
    let value = api.health().await.context("health check failed")?;
    print_json(&value)
}

pub async fn state_command(api: &dyn SimulationApi, id: &SimulationId) -> Result<()> {
    let state = api
        .simulation_state(id)
        .await
        .with_context(|| format!("failed to fetch state for {id}"))?;
    print!("{}", format_state(&state));
    Ok(())
}

pub async fn logs_command(
    api: &dyn SimulationApi,
    id: &SimulationId,
    limit: usize,
    filter: &EventFilter,
) -> Result<()> {
    let response = api
        .simulation_logs(id, limit)
        .await
        .with_context(|| format!("failed to fetch logs for {id}"))?;
    let mut shown = 0usize;
    for entry in filter_entries(&response.logs, filter) {
        print!("{}", format_log_entry(entry));
        shown += 1;
    }
    if shown == 0 {
        println!("{}", "No events to display".yellow());
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value).context("failed to format response JSON")?;
    println!("{}", pretty.cyan());
    Ok(())
}

/// Headline numbers, overseer assessment, and one row per country.
pub fn format_state(state: &SimulationState) -> String {
    let summary = WorldSummary::from_state(state);
    let metrics = state.metrics_or_default();
    let mut out = String::new();

    out.push_str(&format!(
        "{} {}  {} {}\n",
        "🌍",
        state.world_name.bold(),
        state.status.icon(),
        state.status.as_str().bold().cyan()
    ));
    out.push_str(&format!(
        "{} {}  {} {}\n",
        "year".dimmed(),
        state.year,
        "tick".dimmed(),
        state.tick
    ));
    if let Some(description) = state.description.as_deref() {
        out.push_str(&format!("{}\n", description.italic()));
    }
    out.push_str(&format!(
        "{} {:.0}  {} {:.0}  {} {:.0}\n",
        "stability".dimmed(),
        summary.stability_index,
        "conflict".dimmed(),
        summary.conflict_level,
        "survival".dimmed(),
        summary.survival_rate
    ));
    out.push_str(&format!(
        "{} {}/{}  {} {}\n",
        "surviving nations".dimmed(),
        summary.surviving_nations,
        summary.total_nations,
        "avg technology".dimmed(),
        average_label(summary.average_technology)
    ));
    if let Some(explanation) = metrics.explanation.as_deref() {
        out.push_str(&format!("{} {}\n", "overseer".magenta().bold(), explanation));
    }
    if let Some(costs) = metrics.hidden_costs.as_deref() {
        out.push_str(&format!("{} {}\n", "hidden costs".magenta(), costs));
    }

    // Cells are padded before styling; escape codes would count towards the width.
    if !state.countries.is_empty() {
        out.push_str(&format!(
            "\n{:<4}{} {} {} {} {}  {}\n",
            "",
            format!("{:<NAME_COLUMN$}", "NATION").bold().cyan(),
            format!("{:>5}", "POW").bold().cyan(),
            format!("{:>5}", "STAB").bold().cyan(),
            format!("{:>5}", "TECH").bold().cyan(),
            format!("{:>5}", "RES").bold().cyan(),
            "POPULATION".bold().cyan()
        ));
    }
    for country in &state.countries {
        let mut width = country.name.chars().count();
        let mut name = country.name.clone();
        if country.is_collapsed() {
            name.push_str(&format!(" {}", COLLAPSED_BADGE.red().bold()));
            width += COLLAPSED_BADGE.len() + 1;
        }
        name.push_str(&" ".repeat(NAME_COLUMN.saturating_sub(width)));
        out.push_str(&format!(
            "{:<4}{} {:>5.0} {:>5.0} {:>5.0} {:>5.0}  {}\n",
            country.power_rank().glyph(),
            name,
            country.power,
            country.stability,
            country.technology,
            country.resources,
            country.population_label()
        ));
    }
    out
}

/// One chronicle entry and its nested insights, indented under a header line.
pub fn format_log_entry(entry: &LogEntry) -> String {
    let kind = entry.event_type.as_str();
    let header = match entry.event_type.severity() {
        EventSeverity::Critical => kind.red().bold().to_string(),
        EventSeverity::Positive => kind.green().bold().to_string(),
        EventSeverity::Warning => kind.yellow().bold().to_string(),
        EventSeverity::Neutral => kind.bold().to_string(),
    };
    let mut out = format!("{} {}", entry.event_type.icon(), header);
    if let Some(year) = entry.year {
        out.push_str(&format!("  year {year}"));
    }
    if let Some(tick) = entry.tick {
        out.push_str(&format!("  tick {tick}"));
    }
    if let Some(timestamp) = entry.local_timestamp() {
        out.push_str(&format!("  {}", timestamp.dimmed()));
    }
    out.push('\n');

    if let Some(description) = entry.description.as_deref() {
        out.push_str(&format!("    {description}\n"));
    }
    if let Some(content) = entry.content.as_deref() {
        out.push_str(&format!("    {}\n", content.dimmed()));
    }
    for sub in &entry.events {
        out.push_str(&format!(
            "    • {} {}\n",
            sub.kind.icon(),
            sub.description.as_deref().unwrap_or(sub.kind.as_str())
        ));
    }
    if let Some(insights) = &entry.overseer_insights {
        if let Some(explanation) = insights.explanation.as_deref() {
            out.push_str(&format!("    {} {}\n", "overseer:".magenta(), explanation));
        }
        if let Some(costs) = insights.hidden_costs.as_deref() {
            out.push_str(&format!("    {} {}\n", "hidden costs:".magenta(), costs));
        }
    }
    if let Some(insight) = &entry.philosophical_insight {
        if let Some(analysis) = insight.moral_analysis.as_deref() {
            out.push_str(&format!("    {} {}\n", "reflection:".blue(), analysis));
        }
        if let Some(question) = insight.philosophical_question.as_deref() {
            out.push_str(&format!("    {} {}\n", "question:".blue(), question.italic()));
        }
    }
    out
}

/// Rounded average, or an en dash when there is nothing to average.
pub fn average_label(value: Option<f64>) -> String {
    value
        .map(|avg| format!("{avg:.0}"))
        .unwrap_or_else(|| "–".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use worldsim_core::{Country, EventType, Metrics, SimulationStatus};

    #[test]
    fn state_summary_lists_nations_and_collapse() {
        let state = SimulationState {
            status: SimulationStatus::Paused,
            world_name: "Terra Novus".into(),
            year: 2050,
            tick: 7,
            metrics: Some(Metrics {
                stability_index: Some(64.0),
                explanation: Some("Uneasy balance".into()),
                ..Metrics::default()
            }),
            countries: vec![
                Country {
                    name: "Aurel".into(),
                    stability: 12.0,
                    technology: 40.0,
                    population: 2_500_000.0,
                    ..Country::default()
                },
                Country {
                    name: "Borea".into(),
                    stability: 70.0,
                    technology: 61.0,
                    ..Country::default()
                },
            ],
            ..SimulationState::default()
        };
        let text = format_state(&state);
        assert!(text.contains("Terra Novus"));
        assert!(text.contains("PAUSED"));
        assert!(text.contains("Uneasy balance"));
        assert!(text.contains("COLLAPSED"));
        assert!(text.contains("2.5M citizens"));
        assert!(text.contains("1/2"));
    }

    fn strip_ansi(text: &str) -> String {
        let mut plain = String::new();
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch == '\u{1b}' {
                for code in chars.by_ref() {
                    if code == 'm' {
                        break;
                    }
                }
            } else {
                plain.push(ch);
            }
        }
        plain
    }

    #[test]
    fn nation_columns_line_up_with_styled_cells() {
        let nation = |name: &str, stability: f64| Country {
            name: name.into(),
            power: 55.0,
            stability,
            ..Country::default()
        };
        let state = SimulationState {
            countries: vec![nation("Aurel", 5.0), nation("Borea", 80.0)],
            ..SimulationState::default()
        };
        let text = format_state(&state);
        assert!(text.contains('\u{1b}'));

        let plain = strip_ansi(&text);
        let column_of = |needle: &str| {
            plain
                .lines()
                .find(|line| line.contains(needle))
                .and_then(|line| line.find(needle).map(|at| line[..at].chars().count()))
                .expect("row present")
        };
        let rows: Vec<&str> = plain
            .lines()
            .filter(|line| line.contains("Aurel") || line.contains("Borea"))
            .collect();
        assert_eq!(rows.len(), 2);
        let pow_column = |row: &str| row.find("55").map(|at| row[..at].chars().count());
        assert_eq!(pow_column(rows[0]), pow_column(rows[1]));
        assert_eq!(column_of("NATION"), column_of("Aurel"));
        assert_eq!(
            column_of("POW") + "POW".len(),
            pow_column(rows[0]).expect("power cell") + "55".len()
        );
    }

    #[test]
    fn empty_world_shows_dash_for_technology() {
        assert_eq!(average_label(None), "–");
        assert_eq!(average_label(Some(41.6)), "42");
        let text = format_state(&SimulationState::default());
        assert!(text.contains("–"));
    }

    #[test]
    fn log_entry_includes_nested_insights() {
        let entry: LogEntry = serde_json::from_value(json!({
            "eventType": "WAR",
            "year": 2049,
            "tick": 4,
            "description": "Aurel invades Borea",
            "events": [{ "type": "PEACE", "description": "Ceasefire" }],
            "overseerInsights": { "hiddenCosts": "Famine" },
            "philosophicalInsight": { "philosophicalQuestion": "Was it inevitable?" }
        }))
        .expect("decode");
        assert_eq!(entry.event_type, EventType::War);

        let text = format_log_entry(&entry);
        assert!(text.starts_with("⚔"));
        assert!(text.contains("year 2049"));
        assert!(text.contains("Aurel invades Borea"));
        assert!(text.contains("Ceasefire"));
        assert!(text.contains("Famine"));
        assert!(text.contains("Was it inevitable?"));
    }
}
