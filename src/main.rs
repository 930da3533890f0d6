//! tvdetail - Jellyfin item detail screen for the terminal
//!
//! # Usage
//!
//! ```bash
//! # Interactive detail screen
//! tvdetail browse <ITEM_ID>
//!
//! # CLI mode (for automation)
//! tvdetail details <ITEM_ID> --json
//! tvdetail row <ITEM_ID> --kind seasons
//! ```

use std::io::{stdout, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tvdetail::api::{JellyfinClient, MediaServer, StaticServerDirectory};
use tvdetail::app::{App, AppEnv, FetchDone};
use tvdetail::cli::{self, BrowseCmd, Cli, Command, ExitCode, Output};
use tvdetail::commands::{self, Connection};
use tvdetail::config::Config;
use tvdetail::services::{DataRefreshService, Destination, MemoryWatchlist};
use tvdetail::ui::{render_detail, Theme};

/// Terminal type alias for convenience
type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Refresh interval for the event loop
const TICK_RATE: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.is_tui_mode());
    run_cli(cli).await.into()
}

/// Log to stderr in CLI mode; to a file in TUI mode so the screen stays clean
fn init_logging(tui: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tvdetail=info"));
    if tui {
        let dir = dirs::cache_dir()?.join("tvdetail");
        std::fs::create_dir_all(&dir).ok()?;
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, "tvdetail.log"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        None
    }
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let config = commands::load_config(cli.config.as_deref());

    let Some(command) = cli.command else {
        return output.error("No command given (try `tvdetail browse <ITEM_ID>`)", ExitCode::InvalidArgs);
    };

    let conn = match commands::connect(&config, cli.server).await {
        Ok(conn) => conn,
        Err(e) => return output.error(e.to_string(), ExitCode::InvalidArgs),
    };

    match command {
        Command::Details(cmd) => commands::details_cmd(cmd, &conn, &output).await,
        Command::Channel(cmd) => commands::channel_cmd(cmd, &conn, &output).await,
        Command::SeriesTimer(cmd) => commands::series_timer_cmd(cmd, &conn, &output).await,
        Command::Row(cmd) => commands::row_cmd(cmd, &conn, &output).await,
        Command::Browse(cmd) => match run_tui(cmd, &config, conn).await {
            Ok(code) => code,
            Err(e) => output.error(e.to_string(), ExitCode::Error),
        },
    }
}

// =============================================================================
// TUI Mode
// =============================================================================

/// Initialize the terminal for TUI mode
fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state
fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Clients for every configured server, keyed the way items carry their server id
fn server_directory(config: &Config) -> StaticServerDirectory {
    let mut directory = StaticServerDirectory::new();
    for server in &config.servers {
        let id = server.id.simple().to_string();
        let client: Arc<dyn MediaServer> = Arc::new(
            JellyfinClient::new(&server.url, &server.access_token, server.user_id).with_server_id(id.clone()),
        );
        directory.insert(id, client);
    }
    directory
}

/// Run interactive TUI
async fn run_tui(cmd: BrowseCmd, config: &Config, conn: Connection) -> Result<ExitCode> {
    let item_id = match cli::parse_item_id(&cmd.item_id) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::InvalidArgs);
        }
    };

    let env = AppEnv {
        server: conn.server.clone(),
        directory: Arc::new(server_directory(config)),
        watchlist: Arc::new(MemoryWatchlist::new()),
        refresh: Arc::new(DataRefreshService::new()),
        session: conn.session.clone(),
        preferences: conn.preferences.clone(),
    };
    let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
    let mut app = App::new(env, fetch_tx);
    app.open(
        Destination::ItemDetails {
            item_id,
            server_id: Some(conn.server_id.clone()),
        },
        Utc::now(),
    )
    .await;
    app.tick(Utc::now()).await;

    let mut terminal = init_terminal()?;
    let result = run_event_loop(&mut terminal, &mut app, fetch_rx).await;

    // Always restore terminal, even on error
    restore_terminal(&mut terminal)?;
    result?;
    Ok(ExitCode::Success)
}

/// Main event loop - input, finished row fetches, timers, render
async fn run_event_loop(
    terminal: &mut Tui,
    app: &mut App,
    mut fetch_rx: mpsc::UnboundedReceiver<FetchDone>,
) -> Result<()> {
    while app.running {
        terminal.draw(|frame| render_ui(frame, app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (ignore releases on Windows)
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, Utc::now()).await;
                }
            }
        }

        while let Ok(done) = fetch_rx.try_recv() {
            app.apply_fetch(done);
        }

        app.tick(Utc::now()).await;
    }

    Ok(())
}

// =============================================================================
// UI Rendering
// =============================================================================

/// Main render function
fn render_ui(frame: &mut Frame, app: &App) {
    let area = frame.area();

    frame.render_widget(Clear, area);
    frame.render_widget(Block::default().style(Style::default().bg(Theme::BACKGROUND)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header(frame, chunks[0], app);
    match app.current() {
        Some(screen) => render_detail(frame, chunks[1], screen),
        None => {
            let empty = Paragraph::new("Nothing to show")
                .style(Theme::dimmed())
                .alignment(Alignment::Center);
            frame.render_widget(empty, chunks[1]);
        }
    }
    render_status_bar(frame, chunks[2], app);
}

/// Header with logo and breadcrumb of open screens
fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let header_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(14), // Logo
            Constraint::Min(1),     // Breadcrumb
        ])
        .split(area);

    let logo = Paragraph::new(Line::from(vec![
        Span::styled("TV", Style::default().fg(Theme::PRIMARY).add_modifier(Modifier::BOLD)),
        Span::styled("DETAIL", Style::default().fg(Theme::SECONDARY).add_modifier(Modifier::BOLD)),
    ]))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Theme::border()),
    );
    frame.render_widget(logo, header_chunks[0]);

    let trail: Vec<String> = app
        .screens
        .iter()
        .map(|s| {
            s.controller
                .summary()
                .map(|card| card.title.clone())
                .unwrap_or_else(|| "…".to_string())
        })
        .collect();
    let breadcrumb = Paragraph::new(Span::styled(trail.join(" › "), Theme::dimmed())).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Theme::border()),
    );
    frame.render_widget(breadcrumb, header_chunks[1]);
}

/// Status bar with the latest message and key hints
fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!(" {} ", status), Theme::accent()));
        spans.push(Span::raw(" │ "));
    }
    for (key, desc) in [
        ("↑↓", "rows"),
        ("←→", "items"),
        ("↵", "select"),
        ("p", "play"),
        ("esc", "back"),
        ("q", "quit"),
    ] {
        spans.push(Span::styled(format!(" {}", key), Theme::keybind()));
        spans.push(Span::styled(format!(":{} ", desc), Theme::keybind_desc()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).style(Theme::status_bar()), area);
}
