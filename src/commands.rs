//! CLI Command Handlers
//!
//! Each handler drives a `DetailController` (or a single `RowAdapter`)
//! headlessly against the configured Jellyfin server and prints a report.
//! Handlers take CLI args and Output, return ExitCode.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::query::{ItemQuery, NextUpQuery, RowQuery, SeasonsQuery, SimilarQuery, UpcomingQuery};
use crate::api::{ApiError, JellyfinClient, MediaServer};
use crate::cli::{
    parse_item_id, ActionArg, ChannelCmd, DetailsCmd, ExitCode, Output, RowCmd, RowKindArg,
    SeriesTimerCmd,
};
use crate::config::{Config, Preferences};
use crate::detail::{
    ActionButton, ActionKind, DetailContext, DetailController, DetailTarget, InfoItem,
};
use crate::models::{BaseItem, ItemKind};
use crate::rows::{fetch, Row, RowAdapter, RowId};
use crate::services::{
    DataRefreshService, MemoryWatchlist, MessageLog, NavigationStack, PlayQueue, PlaybackRequest,
    UserSession,
};

/// Upper bound on fetch rounds while settling a headless screen
const MAX_FETCH_ROUNDS: usize = 8;

// =============================================================================
// Connection
// =============================================================================

/// Client and session for one configured server
pub struct Connection {
    pub server: Arc<dyn MediaServer>,
    pub server_id: String,
    pub session: Arc<UserSession>,
    pub preferences: Preferences,
}

/// Load config from an explicit path or the default location
pub fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => Config::load_from(path).with_env_overrides(),
        None => Config::load(),
    }
}

/// Connect to the selected server and fetch the signed-in user
pub async fn connect(config: &Config, server: Option<Uuid>) -> Result<Connection> {
    let entry = config.server(server).ok_or_else(|| {
        anyhow::anyhow!("No server configured (set JELLYFIN_URL, JELLYFIN_TOKEN and JELLYFIN_USER_ID)")
    })?;
    let server_id = entry.id.simple().to_string();
    let client: Arc<dyn MediaServer> = Arc::new(
        JellyfinClient::new(&entry.url, &entry.access_token, entry.user_id)
            .with_server_id(server_id.clone()),
    );

    let user = match client.current_user().await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(server = %entry.name, error = %e, "Failed to load current user");
            None
        }
    };

    Ok(Connection {
        server: client,
        server_id: server_id.clone(),
        session: Arc::new(UserSession::new(user, Some(server_id))),
        preferences: config.preferences.clone(),
    })
}

/// In-memory collaborators for a headless screen
pub struct Headless {
    pub navigator: Arc<NavigationStack>,
    pub messages: Arc<MessageLog>,
    pub playback: Arc<PlayQueue>,
}

impl Headless {
    pub fn new() -> Self {
        Self {
            navigator: Arc::new(NavigationStack::new()),
            messages: Arc::new(MessageLog::new()),
            playback: Arc::new(PlayQueue::new()),
        }
    }

    pub fn context(&self, conn: &Connection) -> DetailContext {
        DetailContext {
            server: conn.server.clone(),
            navigator: self.navigator.clone(),
            messages: self.messages.clone(),
            playback: self.playback.clone(),
            watchlist: Arc::new(MemoryWatchlist::new()),
            refresh: Arc::new(DataRefreshService::new()),
            session: conn.session.clone(),
            preferences: conn.preferences.clone(),
        }
    }
}

impl Default for Headless {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RowReport {
    pub title: String,
    pub loaded: usize,
    pub total: Option<u32>,
    pub fully_loaded: bool,
    pub items: Vec<String>,
}

impl RowReport {
    fn from_row(row: &Row) -> Self {
        let adapter = row.adapter();
        Self {
            title: row.header.title.clone(),
            loaded: row.items().len(),
            total: adapter.map(|a| a.total_items()),
            fully_loaded: adapter.map(|a| a.is_fully_loaded()).unwrap_or(true),
            items: row.items().iter().map(|i| i.label()).collect(),
        }
    }

    fn from_adapter(title: &str, adapter: &RowAdapter) -> Self {
        Self {
            title: title.to_string(),
            loaded: adapter.len(),
            total: Some(adapter.total_items()),
            fully_loaded: adapter.is_fully_loaded(),
            items: adapter.items().iter().map(|i| i.label()).collect(),
        }
    }
}

/// Everything a headless detail screen shows
#[derive(Debug, Serialize)]
pub struct DetailReport {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub overview: String,
    pub info: Vec<InfoItem>,
    pub actions: Vec<ActionButton>,
    pub rows: Vec<RowReport>,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub playback: Vec<String>,
}

impl DetailReport {
    pub fn from_controller(controller: &DetailController, headless: &Headless) -> Option<Self> {
        let subject = controller.subject()?;
        let summary = controller.summary()?;
        Some(Self {
            id: subject.id,
            kind: subject.kind.to_string(),
            title: summary.title.clone(),
            overview: summary.overview.clone(),
            info: summary.info.clone(),
            actions: controller.actions().buttons().to_vec(),
            rows: controller.rows().iter().map(RowReport::from_row).collect(),
            messages: headless.messages.all(),
            playback: headless
                .playback
                .requests()
                .iter()
                .map(describe_playback)
                .collect(),
        })
    }

    /// Human-readable rendering for text mode
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} [{}]", self.title, self.kind);
        for info in &self.info {
            let _ = writeln!(out, "  {}: {}", info.label, info.value);
        }
        if !self.overview.is_empty() {
            let _ = writeln!(out, "\n{}", self.overview);
        }

        let visible: Vec<&str> = self
            .actions
            .iter()
            .filter(|b| b.visible)
            .map(|b| b.label.as_str())
            .collect();
        if !visible.is_empty() {
            let _ = writeln!(out, "\nActions: {}", visible.join(" | "));
        }

        for row in &self.rows {
            let _ = writeln!(
                out,
                "\n{} ({}{})",
                row.title,
                row.loaded,
                row.total.map(|t| format!("/{}", t)).unwrap_or_default()
            );
            for item in &row.items {
                let _ = writeln!(out, "  - {}", item);
            }
        }
        for message in &self.messages {
            let _ = writeln!(out, "\n! {}", message);
        }
        out
    }
}

fn describe_playback(request: &PlaybackRequest) -> String {
    match request {
        PlaybackRequest::Play { items, position_ms, shuffle } => format!(
            "play {} item(s) at {}ms{}",
            items.len(),
            position_ms,
            if *shuffle { " shuffled" } else { "" }
        ),
        PlaybackRequest::QueueAudio(items) => format!("queue {} audio item(s)", items.len()),
        PlaybackRequest::InstantMix(id) => format!("instant mix {}", id.simple()),
        PlaybackRequest::ExternalTrailer(url) => format!("trailer {}", url),
    }
}

// =============================================================================
// Error mapping
// =============================================================================

/// Exit code for a failed command
pub fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<ApiError>() {
        Some(ApiError::NotFound) => ExitCode::NotFound,
        Some(_) => ExitCode::NetworkError,
        None => ExitCode::Error,
    }
}

fn report_error(output: &Output, error: anyhow::Error) -> ExitCode {
    let code = exit_code_for(&error);
    output.error(format!("{:#}", error), code)
}

fn print_report(output: &Output, report: &DetailReport) -> ExitCode {
    if output.json {
        if let Err(e) = output.print(report) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    } else {
        output.text(report.render_text());
    }
    ExitCode::Success
}

// =============================================================================
// Detail screens
// =============================================================================

/// Start a screen, load its target and settle all row fetches
pub async fn run_screen(
    conn: &Connection,
    headless: &Headless,
    target: DetailTarget,
    action: Option<ActionKind>,
) -> Result<Option<DetailReport>> {
    let mut controller = DetailController::new(
        headless.context(conn),
        target,
        Some(conn.server_id.clone()),
    );
    let now = Utc::now();
    controller.on_start();
    controller.on_resume(now);
    controller.load(now).await;

    if headless.navigator.back_count() > 0 {
        return Ok(None);
    }
    if let Some(kind) = action {
        controller.activate(kind, Utc::now()).await;
    }

    for _ in 0..MAX_FETCH_ROUNDS {
        if !controller.has_pending_fetches() {
            break;
        }
        controller.run_pending_fetches().await;
    }

    let report = DetailReport::from_controller(&controller, headless);
    controller.on_pause();
    controller.on_stop();
    controller.on_destroy();
    Ok(report)
}

async fn show_screen(
    conn: &Connection,
    output: &Output,
    target: DetailTarget,
    action: Option<ActionKind>,
) -> ExitCode {
    let headless = Headless::new();
    match run_screen(conn, &headless, target, action).await {
        Ok(Some(report)) => print_report(output, &report),
        Ok(None) => output.error("Not found", ExitCode::NotFound),
        Err(e) => report_error(output, e),
    }
}

fn action_kind(arg: ActionArg) -> ActionKind {
    match arg {
        ActionArg::Watched => ActionKind::Watched,
        ActionArg::Favorite => ActionKind::Favorite,
        ActionArg::Record => ActionKind::Record,
        ActionArg::RecordSeries => ActionKind::RecordSeries,
    }
}

pub async fn details_cmd(cmd: DetailsCmd, conn: &Connection, output: &Output) -> ExitCode {
    let id = match parse_item_id(&cmd.item_id) {
        Ok(id) => id,
        Err(e) => return output.error(e, ExitCode::InvalidArgs),
    };
    output.info(format!("Loading details for {}", id.simple()));
    show_screen(conn, output, DetailTarget::Item(id), cmd.action.map(action_kind)).await
}

fn read_program(path: &Path) -> Result<BaseItem> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid program JSON in {}", path.display()))
}

pub async fn channel_cmd(cmd: ChannelCmd, conn: &Connection, output: &Output) -> ExitCode {
    let channel_id = match parse_item_id(&cmd.channel_id) {
        Ok(id) => id,
        Err(e) => return output.error(e, ExitCode::InvalidArgs),
    };
    let program = match cmd.program.as_deref().map(read_program).transpose() {
        Ok(program) => program,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };
    output.info(format!("Loading channel {}", channel_id.simple()));
    show_screen(conn, output, DetailTarget::Channel { channel_id, program }, None).await
}

pub async fn series_timer_cmd(cmd: SeriesTimerCmd, conn: &Connection, output: &Output) -> ExitCode {
    let timer = match conn.server.get_series_timer(cmd.timer_id.trim()).await {
        Ok(timer) => timer,
        Err(e) => return report_error(output, e.into()),
    };
    output.info(format!(
        "Loading series recording {}",
        timer.name.as_deref().unwrap_or(&cmd.timer_id)
    ));
    show_screen(conn, output, DetailTarget::SeriesTimer(timer), None).await
}

// =============================================================================
// Row Command
// =============================================================================

/// Row query and title for a `row --kind`
pub fn row_query(kind: RowKindArg, subject: &BaseItem) -> (&'static str, RowQuery) {
    let id = subject.id;
    match kind {
        RowKindArg::Similar => {
            let query = SimilarQuery { item_id: id, limit: Some(20) };
            if subject.kind == ItemKind::Series {
                ("More Like This", RowQuery::SimilarSeries(query))
            } else {
                ("More Like This", RowQuery::SimilarMovies(query))
            }
        }
        RowKindArg::Seasons => ("Seasons", RowQuery::Seasons(SeasonsQuery { series_id: id })),
        RowKindArg::NextUp => (
            "Next Up",
            RowQuery::NextUp(NextUpQuery {
                series_id: Some(id),
                ..Default::default()
            }),
        ),
        RowKindArg::Specials => ("Specials", RowQuery::Specials { item_id: id }),
        RowKindArg::Trailers => ("Trailers", RowQuery::Trailers { item_id: id }),
        RowKindArg::Parts => ("Additional Parts", RowQuery::AdditionalParts { item_id: id }),
        RowKindArg::Upcoming => (
            "Upcoming",
            RowQuery::Upcoming(UpcomingQuery {
                parent_id: Some(id),
                limit: None,
            }),
        ),
        RowKindArg::PersonMovies => (
            "Movies",
            RowQuery::Items(ItemQuery::by_person(id, ItemKind::Movie)),
        ),
        RowKindArg::ArtistAlbums => ("Albums", RowQuery::Items(ItemQuery::albums_by_artist(id))),
    }
}

/// Retrieve a row, then page it until `pages` pages are in or it is fully loaded
pub async fn drive_row(server: &dyn MediaServer, adapter: &mut RowAdapter, pages: u32) {
    let mut next = adapter.retrieve(Utc::now()).into_request();
    let mut page = 0;
    while let Some(request) = next.take() {
        let result = fetch::execute(server, &request).await;
        if let Err(e) = &result {
            tracing::warn!(row = %request.row, error = %e, "Row fetch failed");
        }
        adapter.complete(request.generation, result);
        page += 1;
        if page >= pages || adapter.is_fully_loaded() || adapter.is_empty() {
            break;
        }
        next = adapter.load_more_if_needed(adapter.len() - 1);
    }
}

pub async fn row_cmd(cmd: RowCmd, conn: &Connection, output: &Output) -> ExitCode {
    let id = match parse_item_id(&cmd.item_id) {
        Ok(id) => id,
        Err(e) => return output.error(e, ExitCode::InvalidArgs),
    };
    let subject = match conn.server.get_item(id).await {
        Ok(item) => item,
        Err(e) => return report_error(output, e.into()),
    };

    let (title, query) = row_query(cmd.kind, &subject);
    let mut adapter =
        RowAdapter::new(RowId(0), query, cmd.chunk).with_server_id(Some(conn.server_id.clone()));
    output.info(format!("Retrieving {} for {}", title, subject.name));

    drive_row(conn.server.as_ref(), &mut adapter, cmd.pages.max(1)).await;

    let report = RowReport::from_adapter(title, &adapter);
    if output.json {
        if let Err(e) = output.print(&report) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    } else {
        output.text(format!(
            "{} ({}/{})",
            report.title,
            report.loaded,
            report.total.unwrap_or(0)
        ));
        for item in &report.items {
            output.text(format!("  - {}", item));
        }
    }
    ExitCode::Success
}
