//! Interactive terminal console: setup form, then the live simulation panels.

mod view;

use std::{
    cell::Cell,
    fs,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{CrosstermBackend, TestBackend},
    buffer::Buffer,
    style::{Color, Modifier, Style},
    text::Span,
};
use serde::Serialize;
use supports_color::{ColorLevel, Stream, on_cached};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use worldsim_core::{
    ApiError, ClientConfig, ControlAction, CreateSimulationResponse, Epoch, EventSeverity,
    FeedReceiver, FeedSender, PollConfig, Session, SetupField, SimulationApi, SimulationFeed,
    SimulationId, SimulationStatus, StabilityBand, View, feed_channel,
};

pub const HEADLESS_ENV: &str = "WORLDSIM_TERMINAL_HEADLESS";
const HEADLESS_FRAMES_ENV: &str = "WORLDSIM_TERMINAL_HEADLESS_FRAMES";
const HEADLESS_REPORT_ENV: &str = "WORLDSIM_TERMINAL_HEADLESS_REPORT";

const UI_TICK_MILLIS: u64 = 100;
const DEFAULT_HEADLESS_FRAMES: usize = 12;
const MAX_HEADLESS_FRAMES: usize = 600;
const HEADLESS_WIDTH: u16 = 120;
const HEADLESS_HEIGHT: u16 = 48;

/// Entry point for the `console` and `watch` commands.
pub struct Console {
    api: Arc<dyn SimulationApi>,
    config: ClientConfig,
    watch: Option<SimulationId>,
}

impl Console {
    pub fn new(api: Arc<dyn SimulationApi>, config: ClientConfig) -> Self {
        Self {
            api,
            config,
            watch: None,
        }
    }

    /// Open straight into the live panels of an existing simulation.
    pub fn watching(mut self, id: SimulationId) -> Self {
        self.watch = Some(id);
        self
    }

    pub async fn run(self) -> Result<()> {
        tokio::task::spawn_blocking(move || self.run_blocking()).await??;
        Ok(())
    }

    fn run_blocking(self) -> Result<()> {
        let handle = Handle::current();
        if std::env::var_os(HEADLESS_ENV).is_some() {
            let report = self.run_headless(handle)?;
            info!(
                target = "worldsim::terminal",
                frames = report.frames,
                view = report.view,
                simulation = report.simulation.as_deref().unwrap_or("-"),
                status = report.status.as_deref().unwrap_or("-"),
                events = report.events,
                "Terminal headless run completed"
            );
            return Ok(());
        }

        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide).context("failed to enter alternate screen")?;
        let _cleanup = TerminalCleanup;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

        let mut app = ConsoleApp::new(self.api, &self.config, self.watch, handle);
        let result = run_event_loop(&mut terminal, &mut app);
        terminal.show_cursor().ok();
        result
    }

    fn run_headless(self, handle: Handle) -> Result<HeadlessReport> {
        let backend = TestBackend::new(HEADLESS_WIDTH, HEADLESS_HEIGHT);
        let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
        let mut app = ConsoleApp::new(self.api, &self.config, self.watch, handle);
        let frames = headless_frame_budget();

        for _ in 0..frames {
            app.tick(Instant::now());
            terminal.draw(|frame| app.draw(frame))?;
            std::thread::sleep(Duration::from_millis(UI_TICK_MILLIS));
        }
        app.tick(Instant::now());
        terminal.draw(|frame| app.draw(frame))?;

        let report = HeadlessReport::capture(&app, frames, terminal.backend().buffer());
        if let Some(path) = report_file_path_from_env() {
            report.write_json(&path).with_context(|| {
                format!("failed to write headless report to {}", path.display())
            })?;
        }
        Ok(report)
    }
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut ConsoleApp,
) -> Result<()> {
    loop {
        app.tick(Instant::now());
        terminal
            .draw(|frame| app.draw(frame))
            .context("failed to draw console")?;

        if event::poll(Duration::from_millis(UI_TICK_MILLIS))
            .context("failed to poll terminal events")?
            && let Event::Key(key) = event::read().context("failed to read terminal event")?
            && key.kind == KeyEventKind::Press
            && app.handle_key(key)
        {
            break;
        }
    }
    app.shutdown();
    Ok(())
}

fn headless_frame_budget() -> usize {
    std::env::var(HEADLESS_FRAMES_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .map(|value| value.min(MAX_HEADLESS_FRAMES))
        .unwrap_or(DEFAULT_HEADLESS_FRAMES)
}

fn report_file_path_from_env() -> Option<PathBuf> {
    std::env::var_os(HEADLESS_REPORT_ENV).and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}

struct TerminalCleanup;

impl Drop for TerminalCleanup {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen, Show);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    NewSimulation,
}

/// Live panel that receives the scroll keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LivePanel {
    #[default]
    World,
    Chronicle,
}

impl LivePanel {
    fn toggle(self) -> Self {
        match self {
            Self::World => Self::Chronicle,
            Self::Chronicle => Self::World,
        }
    }
}

const PAGE_LINES: i32 = 10;

/// Vertical scroll of one live panel. The limit is refreshed on every draw
/// from the rendered height of the panel's content.
#[derive(Debug, Default)]
struct PanelScroll {
    offset: u16,
    limit: Cell<u16>,
}

impl PanelScroll {
    fn offset(&self) -> u16 {
        self.offset.min(self.limit.get())
    }

    fn set_limit(&self, content_height: usize, viewport_height: u16) {
        let limit = content_height.saturating_sub(viewport_height as usize);
        self.limit.set(u16::try_from(limit).unwrap_or(u16::MAX));
    }

    fn scroll_by(&mut self, delta: i32) {
        let next = i32::from(self.offset()) + delta;
        self.offset = next.clamp(0, i32::from(self.limit.get())) as u16;
    }

    fn to_end(&mut self) {
        self.offset = self.limit.get();
    }

    fn reset(&mut self) {
        self.offset = 0;
    }
}

type CreateResult = Result<CreateSimulationResponse, ApiError>;

/// A creation request running on the runtime while the form shows its busy
/// state.
struct PendingCreate {
    result: oneshot::Receiver<CreateResult>,
    task: JoinHandle<()>,
}

struct ConsoleApp {
    api: Arc<dyn SimulationApi>,
    handle: Handle,
    poll: PollConfig,
    base_url: String,
    session: Session,
    feed: Option<SimulationFeed>,
    updates: FeedSender,
    inbox: FeedReceiver,
    focus: usize,
    live_focus: LivePanel,
    world_scroll: PanelScroll,
    chronicle_scroll: PanelScroll,
    prompt: Option<Prompt>,
    pending_create: Option<PendingCreate>,
    palette: Palette,
    now: Instant,
}

impl ConsoleApp {
    fn new(
        api: Arc<dyn SimulationApi>,
        config: &ClientConfig,
        watch: Option<SimulationId>,
        handle: Handle,
    ) -> Self {
        let (updates, inbox) = feed_channel();
        let session = match &watch {
            Some(id) => Session::watching(id.clone(), config.banner_ttl),
            None => Session::new(config.banner_ttl),
        };
        let mut app = Self {
            api,
            handle,
            poll: config.poll.clone(),
            base_url: config.base_url.clone(),
            session,
            feed: None,
            updates,
            inbox,
            focus: 0,
            live_focus: LivePanel::default(),
            world_scroll: PanelScroll::default(),
            chronicle_scroll: PanelScroll::default(),
            prompt: None,
            pending_create: None,
            palette: Palette::detect(),
            now: Instant::now(),
        };
        if let Some(id) = watch {
            let epoch = app.session.epoch();
            app.start_feed(id, epoch);
        }
        app
    }

    fn start_feed(&mut self, id: SimulationId, epoch: Epoch) {
        let _runtime = self.handle.enter();
        self.feed = Some(SimulationFeed::start(
            Arc::clone(&self.api),
            id,
            epoch,
            &self.poll,
            self.updates.clone(),
        ));
    }

    /// Fold in everything the feed delivered since the last frame, and settle
    /// a finished creation request.
    fn tick(&mut self, now: Instant) {
        self.now = now;
        self.poll_pending_create(now);
        while let Ok(update) = self.inbox.try_recv() {
            if let Some(outcome) = self.session.apply(update) {
                debug!(?outcome, "control action settled");
            }
        }
        self.session.clear_expired_banner(now);
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        view::draw(frame, self);
    }

    /// Returns `true` when the console should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        if let Some(prompt) = self.prompt {
            self.handle_prompt_key(prompt, key);
            return false;
        }
        match self.session.view() {
            View::Setup(_) => self.handle_setup_key(key),
            View::Active(_) => self.handle_live_key(key),
        }
    }

    fn handle_prompt_key(&mut self, prompt: Prompt, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.prompt = None;
                match prompt {
                    Prompt::NewSimulation => self.leave_simulation(),
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.prompt = None;
            }
            _ => {}
        }
    }

    fn handle_setup_key(&mut self, key: KeyEvent) -> bool {
        let Some(form) = self.session.setup_mut() else {
            return false;
        };
        if key.code == KeyCode::Esc {
            return true;
        }
        if form.is_submitting() || self.pending_create.is_some() {
            return false;
        }

        let fields = form.fields();
        self.focus = self.focus.min(fields.len().saturating_sub(1));
        let focused = fields[self.focus];
        let control = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                self.focus = (self.focus + 1) % fields.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = (self.focus + fields.len() - 1) % fields.len();
            }
            KeyCode::Char('a') if control => {
                if form.add_leader() {
                    let slot = form.leaders().len() - 1;
                    self.focus = form
                        .fields()
                        .iter()
                        .position(|field| *field == SetupField::Leader(slot))
                        .unwrap_or(self.focus);
                }
            }
            KeyCode::Char('x') if control => {
                if let SetupField::Leader(index) = focused
                    && form.remove_leader(index)
                {
                    self.focus = self.focus.min(form.fields().len() - 1);
                }
            }
            KeyCode::Left | KeyCode::Right => {
                let delta = if key.code == KeyCode::Left { -1 } else { 1 };
                match focused {
                    SetupField::DurationHours => form.adjust_duration_hours(delta),
                    SetupField::TickInterval => form.adjust_tick_interval_minutes(delta),
                    _ => {}
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = form.text_mut(focused) {
                    text.pop();
                }
            }
            KeyCode::Char(ch) if !control => {
                if let Some(text) = form.text_mut(focused) {
                    text.push(ch);
                }
            }
            KeyCode::Enter => self.submit_setup(),
            _ => {}
        }
        false
    }

    fn handle_live_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return true,
            KeyCode::Char('p') => self.request_action(ControlAction::Pause),
            KeyCode::Char('r') => self.request_action(ControlAction::Resume),
            KeyCode::Char('f') => {
                if let Some(active) = self.session.active_mut() {
                    active.events.cycle_filter();
                    self.chronicle_scroll.reset();
                }
            }
            KeyCode::Char('n') => self.prompt = Some(Prompt::NewSimulation),
            KeyCode::Tab | KeyCode::BackTab => self.live_focus = self.live_focus.toggle(),
            KeyCode::Up | KeyCode::Char('k') => self.focused_scroll().scroll_by(-1),
            KeyCode::Down | KeyCode::Char('j') => self.focused_scroll().scroll_by(1),
            KeyCode::PageUp => self.focused_scroll().scroll_by(-PAGE_LINES),
            KeyCode::PageDown => self.focused_scroll().scroll_by(PAGE_LINES),
            KeyCode::Home => self.focused_scroll().reset(),
            KeyCode::End => self.focused_scroll().to_end(),
            _ => {}
        }
        false
    }

    fn focused_scroll(&mut self) -> &mut PanelScroll {
        match self.live_focus {
            LivePanel::World => &mut self.world_scroll,
            LivePanel::Chronicle => &mut self.chronicle_scroll,
        }
    }

    fn request_action(&mut self, action: ControlAction) {
        let Some(active) = self.session.active_mut() else {
            return;
        };
        if !active.control.begin(action) {
            debug!(action = action.label(), "control action not available");
            return;
        }
        if let Some(feed) = self.feed.as_mut() {
            feed.dispatch(action);
        }
    }

    fn leave_simulation(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.stop();
        }
        self.session.abandon();
        self.focus = 0;
        self.live_focus = LivePanel::default();
        self.world_scroll.reset();
        self.chronicle_scroll.reset();
    }

    /// Validate the form and start the creation call in the background.
    fn submit_setup(&mut self) {
        let Some(request) = self.session.begin_setup_submit(self.now) else {
            return;
        };
        let (sender, result) = oneshot::channel();
        let api = Arc::clone(&self.api);
        let task = self.handle.spawn(async move {
            let _ = sender.send(api.create_simulation(&request).await);
        });
        self.pending_create = Some(PendingCreate { result, task });
    }

    fn poll_pending_create(&mut self, now: Instant) {
        let Some(pending) = self.pending_create.as_mut() else {
            return;
        };
        let result = match pending.result.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => {
                warn!("simulation creation task ended without a result");
                Err(ApiError::transport("create simulation", "request was abandoned"))
            }
        };
        self.pending_create = None;
        if let Some((id, epoch)) = self.session.finish_setup_submit(result, now) {
            self.start_feed(id, epoch);
        }
    }

    fn shutdown(&mut self) {
        if let Some(pending) = self.pending_create.take() {
            pending.task.abort();
        }
        if let Some(mut feed) = self.feed.take() {
            feed.stop();
        }
    }
}

#[derive(Debug, Serialize)]
struct HeadlessReport {
    frames: usize,
    view: &'static str,
    simulation: Option<String>,
    status: Option<String>,
    events: usize,
    banner: Option<String>,
    screen: Vec<String>,
}

impl HeadlessReport {
    fn capture(app: &ConsoleApp, frames: usize, buffer: &Buffer) -> Self {
        let active = app.session.active();
        Self {
            frames,
            view: if active.is_some() { "active" } else { "setup" },
            simulation: active.map(|a| a.id().to_string()),
            status: active.map(|a| a.control.status().as_str().to_string()),
            events: active.map(|a| a.events.entries().len()).unwrap_or(0),
            banner: app.session.banner(app.now).map(str::to_string),
            screen: buffer_lines(buffer),
        }
    }

    fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

fn buffer_lines(buffer: &Buffer) -> Vec<String> {
    let area = buffer.area;
    (area.y..area.y + area.height)
        .map(|y| {
            (area.x..area.x + area.width)
                .filter_map(|x| buffer.cell((x, y)).map(|cell| cell.symbol()))
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

struct Palette {
    level: Option<ColorLevel>,
}

impl Palette {
    fn detect() -> Self {
        Self {
            level: on_cached(Stream::Stdout),
        }
    }

    fn has_color(&self) -> bool {
        self.level.is_some()
    }

    fn fg(&self, color: Color) -> Style {
        if self.has_color() {
            Style::default().fg(color)
        } else {
            Style::default()
        }
    }

    fn header_style(&self) -> Style {
        self.fg(Color::Cyan).add_modifier(Modifier::BOLD)
    }

    fn title<T: Into<String>>(&self, title: T) -> Span<'static> {
        Span::styled(title.into(), self.header_style())
    }

    fn dim_style(&self) -> Style {
        self.fg(Color::DarkGray)
    }

    fn focus_style(&self) -> Style {
        Style::default().add_modifier(Modifier::REVERSED)
    }

    fn banner_style(&self) -> Style {
        if self.has_color() {
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        }
    }

    fn status_style(&self, status: SimulationStatus) -> Style {
        let color = match status {
            SimulationStatus::Running => Color::Green,
            SimulationStatus::Paused => Color::Yellow,
            SimulationStatus::Completed => Color::Blue,
            SimulationStatus::Failed => Color::Red,
            SimulationStatus::Loading | SimulationStatus::Unknown => Color::Gray,
        };
        self.fg(color).add_modifier(Modifier::BOLD)
    }

    fn band_color(&self, band: StabilityBand) -> Color {
        match band {
            StabilityBand::Healthy => Color::Green,
            StabilityBand::Strained => Color::Yellow,
            StabilityBand::Critical => Color::Red,
        }
    }

    fn severity_style(&self, severity: EventSeverity) -> Style {
        let style = self.fg(match severity {
            EventSeverity::Critical => Color::Red,
            EventSeverity::Positive => Color::Green,
            EventSeverity::Warning => Color::Yellow,
            EventSeverity::Neutral => Color::Cyan,
        });
        style.add_modifier(Modifier::BOLD)
    }

    fn meter_style(&self, color: Color) -> Style {
        self.fg(color)
    }
}
