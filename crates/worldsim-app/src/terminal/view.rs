use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use worldsim_core::setup::MAX_LEADERS;
use worldsim_core::{
    ActiveSimulation, ControlAction, Country, DashboardPhase, LogEntry, NEW_SIMULATION_PROMPT,
    SetupField, SetupForm, View, WorldSummary,
};

use super::{ConsoleApp, LivePanel, Palette, PanelScroll, Prompt};
use crate::commands::average_label;

const METER_WIDTH: usize = 20;
const SETUP_HINTS: &str = concat!(
    "Tab/Shift-Tab move · ←/→ adjust · Ctrl-A add leader · Ctrl-X remove leader",
    " · Enter start · Esc quit"
);
const LIVE_HINTS: &str = concat!(
    "p pause · r resume · f filter · Tab switch panel · ↑/↓ PgUp/PgDn scroll",
    " · n new · q quit"
);
const CARD_METER_WIDTH: usize = 8;

pub(super) fn draw(frame: &mut Frame<'_>, app: &ConsoleApp) {
    let banner = app.session.banner(app.now);
    let mut constraints = vec![Constraint::Length(3)];
    if banner.is_some() {
        constraints.push(Constraint::Length(1));
    }
    constraints.extend([Constraint::Min(0), Constraint::Length(1)]);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    draw_header(frame, rows[0], app);
    let body = if let Some(message) = banner {
        let line = Line::styled(format!(" ⚠ {message}"), app.palette.banner_style());
        frame.render_widget(Paragraph::new(line), rows[1]);
        rows[2]
    } else {
        rows[1]
    };

    match app.session.view() {
        View::Setup(form) => draw_setup(frame, body, form, app.focus, &app.palette),
        View::Active(active) => draw_active(frame, body, active, app),
    }
    draw_footer(frame, rows[rows.len() - 1], app);

    if app.prompt == Some(Prompt::NewSimulation) {
        draw_prompt(frame, &app.palette);
    }
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &ConsoleApp) {
    let mut spans = vec![
        Span::styled("🌍 World Simulation ", app.palette.header_style()),
        Span::styled(format!("backend {}", app.base_url), app.palette.dim_style()),
    ];
    if let Some(active) = app.session.active() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("simulation {}", active.id()),
            app.palette.fg(Color::LightMagenta),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &ConsoleApp) {
    let hints = match app.session.view() {
        View::Setup(_) => SETUP_HINTS,
        View::Active(_) => LIVE_HINTS,
    };
    frame.render_widget(
        Paragraph::new(Line::styled(hints, app.palette.dim_style())),
        area,
    );
}

fn field_label(field: SetupField) -> String {
    match field {
        SetupField::Overseer => "Overseer key".to_string(),
        SetupField::Leader(index) => format!("Leader {} key", index + 1),
        SetupField::Thinker => "Thinker key (optional)".to_string(),
        SetupField::Strategist => "Strategist key (optional)".to_string(),
        SetupField::DurationHours => "Duration".to_string(),
        SetupField::TickInterval => "Tick interval".to_string(),
    }
}

fn draw_setup(
    frame: &mut Frame<'_>,
    area: Rect,
    form: &SetupForm,
    focus: usize,
    palette: &Palette,
) {
    let mut lines = Vec::new();
    for (index, field) in form.fields().into_iter().enumerate() {
        let focused = index == focus;
        let marker = if focused { "›" } else { " " };
        let value = match field {
            SetupField::DurationHours => format!("◀ {} hours ▶", form.duration_hours()),
            SetupField::TickInterval => {
                format!("◀ {} minutes ▶", form.tick_interval_minutes())
            }
            other => mask(form.text(other).unwrap_or_default()),
        };
        let style = if focused {
            palette.focus_style()
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{marker} {:<28}", field_label(field))),
            Span::styled(value, style),
        ]));
    }

    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::styled("Estimated simulated years: ", palette.dim_style()),
        Span::styled(form.estimated_years().to_string(), palette.header_style()),
        Span::styled("  (one year per tick)", palette.dim_style()),
    ]));
    lines.push(Line::styled(
        format!("Leader slots {}/{}", form.leaders().len(), MAX_LEADERS),
        palette.dim_style(),
    ));
    lines.push(Line::raw(""));
    if form.is_submitting() {
        lines.push(Line::styled("⏳ Initializing World...", palette.header_style()));
    } else {
        lines.push(Line::styled(
            "Press Enter to start the simulation",
            palette.dim_style(),
        ));
    }

    let block = Block::default()
        .title(palette.title(" New Simulation "))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Credentials are never echoed; only their length shows.
fn mask(text: &str) -> String {
    if text.is_empty() {
        "(not set)".to_string()
    } else {
        "•".repeat(text.chars().count())
    }
}

fn draw_active(frame: &mut Frame<'_>, area: Rect, active: &ActiveSimulation, app: &ConsoleApp) {
    let palette = &app.palette;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(area);
    draw_control(frame, rows[0], active, palette);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(rows[1]);
    let world = panel_block(
        " World ".to_string(),
        app.live_focus == LivePanel::World,
        palette,
    );
    draw_dashboard(
        frame,
        columns[0],
        world,
        active,
        palette,
        &app.world_scroll,
    );
    let chronicle = panel_block(
        format!(" Chronicle · {} [f] ", active.events.filter().label()),
        app.live_focus == LivePanel::Chronicle,
        palette,
    );
    draw_events(
        frame,
        columns[1],
        chronicle,
        active,
        palette,
        &app.chronicle_scroll,
    );
}

fn panel_block(title: String, focused: bool, palette: &Palette) -> Block<'static> {
    let block = Block::default()
        .title(palette.title(title))
        .borders(Borders::ALL);
    if focused {
        block.border_style(palette.fg(Color::Cyan))
    } else {
        block.border_style(palette.dim_style())
    }
}

/// Render `lines` inside `block`, scrolled by `scroll`, and record how far the
/// content can scroll at this size.
fn draw_scrolled(
    frame: &mut Frame<'_>,
    area: Rect,
    block: Block<'static>,
    lines: Vec<Line<'static>>,
    scroll: &PanelScroll,
) {
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    scroll.set_limit(paragraph.line_count(inner.width), inner.height);
    frame.render_widget(paragraph.scroll((scroll.offset(), 0)), inner);
}

fn meter(
    label: &str,
    value: f64,
    width: usize,
    color: Color,
    palette: &Palette,
) -> Vec<Span<'static>> {
    let clamped = value.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    vec![
        Span::raw(format!("{label:<10}")),
        Span::styled("█".repeat(filled), palette.meter_style(color)),
        Span::styled("░".repeat(width - filled), palette.dim_style()),
        Span::raw(format!(" {value:>3.0}")),
    ]
}

fn draw_control(frame: &mut Frame<'_>, area: Rect, active: &ActiveSimulation, palette: &Palette) {
    let control = &active.control;
    let status = control.status();
    let mut heading = vec![Span::styled(
        format!("{} {}", status.icon(), status.as_str()),
        palette.status_style(status),
    )];
    let mut lines = Vec::new();

    match control.world() {
        Some(world) => {
            heading.push(Span::raw("  "));
            heading.push(Span::styled(
                world.world_name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            heading.push(Span::styled(
                format!("  Year {} · Tick {}", world.year, world.tick),
                palette.dim_style(),
            ));
            lines.push(Line::from(heading));
            let summary = WorldSummary::from_state(world);
            lines.push(Line::from(meter(
                "Stability",
                summary.stability_index,
                METER_WIDTH,
                Color::Green,
                palette,
            )));
            lines.push(Line::from(meter(
                "Survival",
                summary.survival_rate,
                METER_WIDTH,
                Color::Blue,
                palette,
            )));
            lines.push(Line::from(meter(
                "Conflict",
                summary.conflict_level,
                METER_WIDTH,
                Color::Red,
                palette,
            )));
        }
        None => {
            heading.push(Span::styled("  Loading simulation...", palette.dim_style()));
            lines.push(Line::from(heading));
            lines.extend([Line::raw(""), Line::raw(""), Line::raw("")]);
        }
    }

    let button = |action: ControlAction, key: char, label: &str, busy: &str| {
        let text = match control.in_flight() {
            Some(pending) if pending == action => format!("[{key}] {busy}"),
            _ => format!("[{key}] {label}"),
        };
        let style = if control.can(action) {
            palette.header_style()
        } else {
            palette.dim_style()
        };
        Span::styled(text, style)
    };
    lines.push(Line::from(vec![
        button(ControlAction::Pause, 'p', "Pause", "Pausing..."),
        Span::raw("   "),
        button(ControlAction::Resume, 'r', "Resume", "Resuming..."),
    ]));

    let block = Block::default()
        .title(palette.title(" Control "))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_dashboard(
    frame: &mut Frame<'_>,
    area: Rect,
    block: Block<'static>,
    active: &ActiveSimulation,
    palette: &Palette,
    scroll: &PanelScroll,
) {
    let state = match active.dashboard.phase() {
        DashboardPhase::Loading => {
            let text = Paragraph::new("Loading world state...").block(block);
            frame.render_widget(text, area);
            return;
        }
        DashboardPhase::Unavailable => {
            let text = Paragraph::new(Line::styled(
                "World state unavailable",
                palette.fg(Color::Red),
            ))
            .block(block);
            frame.render_widget(text, area);
            return;
        }
        DashboardPhase::Ready(state) => state,
    };

    let summary = WorldSummary::from_state(state);
    let metrics = state.metrics_or_default();
    let mut lines = vec![Line::styled(
        state.world_name.clone(),
        palette.header_style(),
    )];
    if let Some(description) = state.description.as_deref() {
        lines.push(Line::styled(
            description.to_string(),
            palette.dim_style().add_modifier(Modifier::ITALIC),
        ));
    }
    lines.push(Line::from(format!(
        "Stability index {:.0}  ·  Surviving nations {}/{}",
        summary.stability_index,
        summary.surviving_nations,
        summary.total_nations
    )));
    lines.push(Line::from(format!(
        "Conflict {:.0}  ·  Avg technology {}",
        summary.conflict_level,
        average_label(summary.average_technology)
    )));
    if let Some(explanation) = metrics.explanation.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("Overseer: ", palette.fg(Color::Magenta)),
            Span::raw(explanation.to_string()),
        ]));
    }
    if let Some(costs) = metrics.hidden_costs.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("Hidden costs: ", palette.fg(Color::Magenta)),
            Span::raw(costs.to_string()),
        ]));
    }

    for country in &state.countries {
        lines.push(Line::raw(""));
        lines.extend(country_card(country, palette));
    }

    draw_scrolled(frame, area, block, lines, scroll);
}

fn country_card(country: &Country, palette: &Palette) -> Vec<Line<'static>> {
    let mut title = vec![
        Span::raw(format!("{} ", country.power_rank().glyph())),
        Span::styled(
            country.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    if country.is_collapsed() {
        title.push(Span::styled(
            " COLLAPSED",
            palette.fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    if let Some(ideology) = country.ideology.as_deref() {
        title.push(Span::styled(format!("  {ideology}"), palette.dim_style()));
    }

    let mut lines = vec![Line::from(title)];
    if let Some(description) = country.description.as_deref() {
        lines.push(Line::styled(format!("  {description}"), palette.dim_style()));
    }

    let stability_color = palette.band_color(country.stability_band());
    let mut bars = vec![Span::raw("  ")];
    bars.extend(meter("power", country.power, CARD_METER_WIDTH, Color::Cyan, palette));
    bars.push(Span::raw("  "));
    bars.extend(meter(
        "stability",
        country.stability,
        CARD_METER_WIDTH,
        stability_color,
        palette,
    ));
    lines.push(Line::from(bars));

    let mut bars = vec![Span::raw("  ")];
    bars.extend(meter("tech", country.technology, CARD_METER_WIDTH, Color::Blue, palette));
    bars.push(Span::raw("  "));
    bars.extend(meter(
        "resources",
        country.resources,
        CARD_METER_WIDTH,
        Color::Yellow,
        palette,
    ));
    lines.push(Line::from(bars));

    lines.push(Line::styled(
        format!(
            "  {} · {} alliances",
            country.population_label(),
            country.alliances.len()
        ),
        palette.dim_style(),
    ));
    lines
}

fn draw_events(
    frame: &mut Frame<'_>,
    area: Rect,
    block: Block<'static>,
    active: &ActiveSimulation,
    palette: &Palette,
    scroll: &PanelScroll,
) {
    let events = &active.events;
    if events.is_loading() {
        frame.render_widget(Paragraph::new("Loading events...").block(block), area);
        return;
    }
    let lines: Vec<Line<'static>> = events
        .visible()
        .flat_map(|entry| event_lines(entry, palette))
        .collect();
    if lines.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::styled("No events to display", palette.dim_style())).block(block),
            area,
        );
        return;
    }
    draw_scrolled(frame, area, block, lines, scroll);
}

fn event_lines(entry: &LogEntry, palette: &Palette) -> Vec<Line<'static>> {
    let mut heading = vec![Span::styled(
        format!("{} {}", entry.event_type.icon(), entry.event_type.as_str()),
        palette.severity_style(entry.event_type.severity()),
    )];
    let mut when = Vec::new();
    if let Some(year) = entry.year {
        when.push(format!("Year {year}"));
    }
    if let Some(tick) = entry.tick {
        when.push(format!("Tick {tick}"));
    }
    if !when.is_empty() {
        heading.push(Span::styled(format!("  {}", when.join(" · ")), palette.dim_style()));
    }
    if let Some(timestamp) = entry.local_timestamp() {
        heading.push(Span::styled(format!("  {timestamp}"), palette.dim_style()));
    }

    let mut lines = vec![Line::from(heading)];
    if let Some(description) = entry.description.as_deref() {
        lines.push(Line::raw(format!("  {description}")));
    }
    if let Some(content) = entry.content.as_deref() {
        lines.push(Line::styled(format!("  {content}"), palette.dim_style()));
    }
    for sub in &entry.events {
        lines.push(Line::raw(format!(
            "  • {} {}",
            sub.kind.icon(),
            sub.description.as_deref().unwrap_or(sub.kind.as_str())
        )));
    }
    if let Some(insights) = &entry.overseer_insights {
        if let Some(explanation) = insights.explanation.as_deref() {
            lines.push(Line::styled(
                format!("  Overseer: {explanation}"),
                palette.fg(Color::Magenta),
            ));
        }
        if let Some(costs) = insights.hidden_costs.as_deref() {
            lines.push(Line::styled(
                format!("  Hidden costs: {costs}"),
                palette.fg(Color::Magenta),
            ));
        }
    }
    if let Some(insight) = &entry.philosophical_insight {
        if let Some(analysis) = insight.moral_analysis.as_deref() {
            lines.push(Line::styled(
                format!("  Reflection: {analysis}"),
                palette.fg(Color::Blue),
            ));
        }
        if let Some(question) = insight.philosophical_question.as_deref() {
            lines.push(Line::styled(
                format!("  {question}"),
                palette.fg(Color::Blue).add_modifier(Modifier::ITALIC),
            ));
        }
    }
    lines.push(Line::raw(""));
    lines
}

fn draw_prompt(frame: &mut Frame<'_>, palette: &Palette) {
    let size = frame.area();
    let width = size.width.min(64);
    let height = 6.min(size.height);
    let area = Rect::new(
        size.x + (size.width - width) / 2,
        size.y + (size.height - height) / 2,
        width,
        height,
    );
    let lines = vec![
        Line::raw(NEW_SIMULATION_PROMPT),
        Line::raw(""),
        Line::styled("[y] Yes    [n] No", palette.header_style()),
    ];
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(palette.title(" New Simulation "))
            .borders(Borders::ALL),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}
