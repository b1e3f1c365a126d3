use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use tracing_subscriber::EnvFilter;

use gridiron_terminal::config::{EngineConfig, FeedSource};
use gridiron_terminal::engine::{DriveRequest, LiveGameEngine};
use gridiron_terminal::fake_feed::FakeFeed;
use gridiron_terminal::fetch::{EspnFeed, GameFeed};
use gridiron_terminal::state::{AppState, AthleteRef, Drive, HomeAway, Lane};

const ALERT_TTL: Duration = Duration::from_secs(6);
const FAKE_GAME_ID: &str = "sim-1";

struct App {
    engine: LiveGameEngine,
    game_id: Option<String>,
    alert: Option<(String, Instant)>,
    should_quit: bool,
}

impl App {
    fn new(engine: LiveGameEngine, game_id: Option<String>) -> Self {
        let mut app = Self {
            engine,
            game_id: None,
            alert: None,
            should_quit: false,
        };
        match game_id {
            Some(id) => app.select_game(&id),
            None => app
                .engine
                .state_mut()
                .push_log("[INFO] Set GAME_ID to track a game"),
        }
        app
    }

    fn select_game(&mut self, game_id: &str) {
        self.engine.select_game(game_id);
        self.game_id = Some(game_id.to_string());
    }

    fn on_key(&mut self, key: KeyEvent) {
        let overlay_open = self.engine.state().open_drive.is_some();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => {
                if overlay_open {
                    let state = self.engine.state_mut();
                    state.drive_scroll = state.drive_scroll.saturating_add(1);
                } else {
                    self.engine.state_mut().select_next_drive();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if overlay_open {
                    let state = self.engine.state_mut();
                    state.drive_scroll = state.drive_scroll.saturating_sub(1);
                } else {
                    self.engine.state_mut().select_prev_drive();
                }
            }
            KeyCode::Enter | KeyCode::Char('d') if !overlay_open => self.open_selected_drive(),
            KeyCode::Char('b') | KeyCode::Esc if overlay_open => self.close_drive(),
            KeyCode::Char('r') => {
                self.engine.refresh();
                self.engine.state_mut().push_log("[INFO] Refresh requested");
            }
            KeyCode::Char('?') => {
                let state = self.engine.state_mut();
                state.help_overlay = !state.help_overlay;
            }
            _ => {}
        }
    }

    fn open_selected_drive(&mut self) {
        let Some(drive_id) = self.engine.state().selected_drive().map(|d| d.id.clone()) else {
            return;
        };
        if let DriveRequest::Pending = self.engine.open_drive(&drive_id) {
            self.engine
                .state_mut()
                .push_log(format!("[INFO] Loading plays for drive {drive_id}"));
        }
        let state = self.engine.state_mut();
        state.open_drive = Some(drive_id);
        state.drive_scroll = 0;
        self.engine.set_overlay_open(true);
    }

    fn close_drive(&mut self) {
        self.engine.state_mut().open_drive = None;
        self.engine.set_overlay_open(false);
    }

    fn tick(&mut self) {
        self.engine.pump();
        if let Some(msg) = self.engine.take_alert() {
            self.alert = Some((msg, Instant::now()));
        }
        if let Some((_, at)) = self.alert.as_ref()
            && at.elapsed() >= ALERT_TTL
        {
            self.alert = None;
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = EngineConfig::from_env();
    init_logging(&config.log_file);

    let (feed, game_id): (Arc<dyn GameFeed>, Option<String>) = match config.source {
        FeedSource::Fake => (
            Arc::new(FakeFeed::new()),
            config.game_id.clone().or(Some(FAKE_GAME_ID.to_string())),
        ),
        FeedSource::Espn => {
            match EspnFeed::new(&config.league, config.cache_ttl, config.request_timeout) {
                Ok(feed) => (Arc::new(feed), config.game_id.clone()),
                Err(err) => {
                    eprintln!("error: {err:#}");
                    return Ok(());
                }
            }
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let engine = LiveGameEngine::spawn(&config, feed);
    let mut app = App::new(engine, game_id);
    let res = run_app(&mut terminal, &mut app);
    app.engine.shutdown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn init_logging(path: &str) {
    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gridiron_terminal=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        app.tick();
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let state = app.engine.state();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(6),
            Constraint::Length(7),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_field(frame, chunks[1], app);
    render_drives(frame, chunks[2], state);
    render_console(frame, chunks[3], state);

    let footer = match app.alert.as_ref() {
        Some((msg, _)) => Paragraph::new(format!("! {msg}"))
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        None => Paragraph::new(footer_text(state)),
    };
    frame.render_widget(footer, chunks[4]);

    if let Some(drive_id) = state.open_drive.as_deref() {
        render_drive_overlay(frame, frame.size(), app, drive_id);
    }
    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let Some(game) = state.game.as_ref() else {
        let label = match state.game_id.as_deref() {
            Some(id) if state.is_loading(Lane::Summary) => format!("Loading game {id}..."),
            Some(id) => format!("Game {id}"),
            None => "No game selected".to_string(),
        };
        return format!("GRIDIRON TERMINAL | {label}\n");
    };
    let status = if game.status.completed || game.status.is_scheduled() {
        game.status.description.clone()
    } else {
        format!("Q{} {}", game.status.period, game.status.display_clock)
    };
    let situation = state
        .situation
        .as_ref()
        .and_then(|s| s.down_distance_text.clone().or(s.short_down_distance_text.clone()))
        .unwrap_or_default();
    format!(
        "GRIDIRON TERMINAL | {} {}  @  {} {} | {status} | {situation}",
        game.away.abbreviation, game.away.score, game.home.abbreviation, game.home.score,
    )
}

fn footer_text(state: &AppState) -> String {
    if state.open_drive.is_some() {
        "b/Esc Close | j/k Scroll | r Refresh | ? Help | q Quit".to_string()
    } else {
        "Enter/d Drive | j/k/↑/↓ Move | r Refresh | ? Help | q Quit".to_string()
    }
}

fn render_field(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title("Field").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let state = app.engine.state();
    let field = app
        .game_id
        .as_deref()
        .and_then(|id| app.engine.field_state(id));
    let Some(field) = field else {
        frame.render_widget(Paragraph::new("No active possession"), inner);
        return;
    };

    let width = inner.width.saturating_sub(2).max(10) as usize;
    let pos = ((field.field_percent / 100.0) * (width - 1) as f32).round() as usize;
    let mut bar: Vec<char> = vec!['-'; width];
    bar[width / 2] = '|';
    bar[pos.min(width - 1)] = '●';
    let bar: String = bar.into_iter().collect();

    let matchup = state.matchup().unwrap_or_default();
    let offense = match field.possession_side {
        Some(HomeAway::Home) => matchup.home_abbr.clone(),
        Some(HomeAway::Away) => matchup.away_abbr.clone(),
        None => field.possession_team_id.clone().unwrap_or_default(),
    };
    let line = format!(
        "{} ball on {} | {}",
        offense,
        field.yard_line_text.clone().unwrap_or_else(|| field.yard_line.to_string()),
        field.down_distance_text.clone().unwrap_or_default()
    );
    let text = format!(
        "{:<4}[{bar}]{:>4}\n{line}",
        matchup.away_abbr, matchup.home_abbr
    );
    frame.render_widget(Paragraph::new(text), inner);
}

fn drive_line(drive: &Drive) -> String {
    let team = drive.team.abbreviation.as_deref().or(drive.team.id.as_deref()).unwrap_or("?");
    let result = if drive.is_in_progress() {
        "In progress".to_string()
    } else {
        drive.result.clone().unwrap_or_default()
    };
    let plays = drive
        .play_count()
        .map(|n| format!("{n} plays"))
        .unwrap_or_default();
    let yards = drive.yards.map(|y| format!("{y} yds")).unwrap_or_default();
    format!("{team:<5} {result:<16} {plays:<10} {yards}")
}

fn render_drives(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = if state.is_loading(Lane::Drives) {
        "Drives (loading)"
    } else {
        "Drives"
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let drives = state.drives.drives();
    if drives.is_empty() {
        frame.render_widget(Paragraph::new("No drives yet"), inner);
        return;
    }
    let visible = inner.height as usize;
    let start = state.selected_drive.saturating_sub(visible.saturating_sub(1));
    let lines: Vec<Line> = drives
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(idx, drive)| {
            let style = if idx == state.selected_drive {
                Style::default().add_modifier(Modifier::REVERSED)
            } else if drive.is_in_progress() {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            Line::styled(drive_line(drive), style)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_console(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Console").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let visible = inner.height as usize;
    let skip = state.logs.len().saturating_sub(visible);
    let text = state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    frame.render_widget(Paragraph::new(text), inner);
}

fn render_drive_overlay(frame: &mut Frame, area: Rect, app: &App, drive_id: &str) {
    let popup_area = centered_rect(80, 80, area);
    frame.render_widget(Clear, popup_area);

    let state = app.engine.state();
    let Some(drive) = state.drives.get(drive_id) else {
        return;
    };
    let mut lines = vec![drive_line(drive), String::new()];
    if !drive.has_plays_data() {
        lines.push("Loading plays...".to_string());
    } else if drive.plays().is_empty() {
        lines.push("No plays available".to_string());
    }
    for play in drive.plays() {
        let clock = play
            .clock
            .as_ref()
            .map(|c| format!("Q{} {}", play.period.unwrap_or(0), c.display))
            .unwrap_or_default();
        let win = app
            .engine
            .play_win_probability(drive_id, &play.id)
            .map(|w| format!("{:.0}%", w.percent))
            .unwrap_or_default();
        lines.push(format!("{clock:<10} {win:>4}  {}", play.text));
        let names: Vec<String> = app
            .engine
            .play_participants(drive_id, &play.id)
            .into_iter()
            .filter_map(|p| match p.athlete {
                AthleteRef::Full(a) => Some(format!("{} ({})", a.display_name, p.role)),
                AthleteRef::Reference(_) => None,
            })
            .collect();
        if !names.is_empty() {
            lines.push(format!("{:<16}{}", "", names.join(", ")));
        }
    }

    let popup = Paragraph::new(lines.join("\n"))
        .scroll((state.drive_scroll, 0))
        .block(
            Block::default()
                .title(format!("Drive {drive_id}"))
                .borders(Borders::ALL),
        );
    frame.render_widget(popup, popup_area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Gridiron Terminal - Help",
        "",
        "  j/k or ↑/↓   Move / scroll",
        "  Enter / d    Open drive (pauses polling)",
        "  b / Esc      Close drive",
        "  r            Refresh all lanes",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
