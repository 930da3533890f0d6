//! App state and core application logic
//!
//! Manages the stack of detail screens, keyboard focus and the hand-off of
//! row fetches to background tasks. Rendering lives in `ui`.

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::api::{resolve_client, MediaServer, ServerDirectory};
use crate::config::Preferences;
use crate::detail::{DetailContext, DetailController, DetailTarget};
use crate::rows::{fetch, FetchPage, RowError, RowId};
use crate::services::{
    DataRefreshService, Destination, MessageLog, Messages, Navigator, PlayQueue, UserSession,
    Watchlist,
};

// =============================================================================
// Navigation
// =============================================================================

/// Navigation request raised by a screen, handled by the app loop
#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    Back,
    Navigate(Destination),
    Reset(Destination),
}

/// Navigator that queues requests for the app loop
#[derive(Debug, Default)]
pub struct ScreenNavigator {
    events: Mutex<Vec<NavEvent>>,
    depth: Mutex<usize>,
}

impl ScreenNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<NavEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    fn set_depth(&self, depth: usize) {
        if let Ok(mut d) = self.depth.lock() {
            *d = depth;
        }
    }

    fn push(&self, event: NavEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Navigator for ScreenNavigator {
    fn go_back(&self) {
        self.push(NavEvent::Back);
    }

    fn navigate(&self, destination: Destination) {
        self.push(NavEvent::Navigate(destination));
    }

    fn reset(&self, destination: Destination) {
        self.push(NavEvent::Reset(destination));
    }

    fn can_go_back(&self) -> bool {
        self.depth.lock().map(|d| *d > 1).unwrap_or(false)
    }
}

// =============================================================================
// Screens
// =============================================================================

/// Row fetch finished on a background task
#[derive(Debug)]
pub struct FetchDone {
    pub screen: u64,
    pub row: RowId,
    pub generation: u64,
    pub result: Result<FetchPage, RowError>,
}

/// Keyboard focus inside a detail screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Actions,
    /// Row at this display position
    Row(usize),
}

/// One detail screen on the stack
pub struct Screen {
    pub serial: u64,
    pub controller: DetailController,
    pub focus: Focus,
    /// Selected item per row
    pub selections: HashMap<RowId, usize>,
    pub popup_selected: usize,
}

impl Screen {
    fn new(serial: u64, controller: DetailController) -> Self {
        Self {
            serial,
            controller,
            focus: Focus::Actions,
            selections: HashMap::new(),
            popup_selected: 0,
        }
    }

    pub fn selection(&self, row: RowId) -> usize {
        self.selections.get(&row).copied().unwrap_or(0)
    }

    /// Focused row id and its item count
    fn focused_row(&self) -> Option<(RowId, usize)> {
        match self.focus {
            Focus::Row(position) => self
                .controller
                .rows()
                .at(position)
                .map(|row| (row.id, row.items().len())),
            Focus::Actions => None,
        }
    }

    fn move_vertical(&mut self, down: bool) {
        let rows = self.controller.rows().len();
        self.focus = match (self.focus, down) {
            (Focus::Actions, true) if rows > 0 => Focus::Row(0),
            (Focus::Row(p), true) if p + 1 < rows => Focus::Row(p + 1),
            (Focus::Row(0), false) => Focus::Actions,
            (Focus::Row(p), false) => Focus::Row(p - 1),
            (focus, _) => focus,
        };
        match self.focused_row() {
            Some((row, _)) => {
                let index = self.selection(row);
                self.controller.on_row_item_selected(row, index);
            }
            None => self.controller.clear_row_selection(),
        }
    }

    fn move_horizontal(&mut self, forward: bool) {
        let Some((row, len)) = self.focused_row() else {
            self.controller.actions_mut().move_focus(forward);
            return;
        };
        if len == 0 {
            return;
        }
        let current = self.selection(row);
        let next = if forward {
            (current + 1).min(len - 1)
        } else {
            current.saturating_sub(1)
        };
        self.selections.insert(row, next);
        self.controller.on_row_item_selected(row, next);
    }
}

// =============================================================================
// Main Application State
// =============================================================================

/// Services shared by every screen
#[derive(Clone)]
pub struct AppEnv {
    pub server: Arc<dyn MediaServer>,
    pub directory: Arc<dyn ServerDirectory>,
    pub watchlist: Arc<dyn Watchlist>,
    pub refresh: Arc<DataRefreshService>,
    pub session: Arc<UserSession>,
    pub preferences: Preferences,
}

/// Main application state
pub struct App {
    /// Whether the app is running
    pub running: bool,
    pub screens: Vec<Screen>,
    pub messages: Arc<MessageLog>,
    pub playback: Arc<PlayQueue>,
    navigator: Arc<ScreenNavigator>,
    env: AppEnv,
    fetch_tx: mpsc::UnboundedSender<FetchDone>,
    next_serial: u64,
    seen_messages: usize,
    /// Latest transient message
    pub status: Option<String>,
}

impl App {
    pub fn new(env: AppEnv, fetch_tx: mpsc::UnboundedSender<FetchDone>) -> Self {
        Self {
            running: true,
            screens: Vec::new(),
            messages: Arc::new(MessageLog::new()),
            playback: Arc::new(PlayQueue::new()),
            navigator: Arc::new(ScreenNavigator::new()),
            env,
            fetch_tx,
            next_serial: 0,
            seen_messages: 0,
            status: None,
        }
    }

    pub fn current(&self) -> Option<&Screen> {
        self.screens.last()
    }

    fn current_mut(&mut self) -> Option<&mut Screen> {
        self.screens.last_mut()
    }

    /// Quit the application
    pub fn quit(&mut self) {
        self.running = false;
    }

    fn context(&self, server_id: Option<&str>) -> DetailContext {
        DetailContext {
            server: resolve_client(self.env.directory.as_ref(), server_id, self.env.server.clone()),
            navigator: self.navigator.clone(),
            messages: self.messages.clone(),
            playback: self.playback.clone(),
            watchlist: self.env.watchlist.clone(),
            refresh: self.env.refresh.clone(),
            session: self.env.session.clone(),
            preferences: self.env.preferences.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Screen stack
    // -------------------------------------------------------------------------

    /// Push a detail screen for `destination`
    pub async fn open(&mut self, destination: Destination, now: DateTime<Utc>) {
        let (target, server_id) = match destination {
            Destination::ItemDetails { item_id, server_id } => (DetailTarget::Item(item_id), server_id),
            Destination::ChannelDetails { channel_id, program } => (
                DetailTarget::Channel {
                    channel_id,
                    program: program.map(|p| *p),
                },
                None,
            ),
            Destination::SeriesTimerDetails { series_timer_id } => {
                match self.env.server.get_series_timer(&series_timer_id).await {
                    Ok(timer) => (DetailTarget::SeriesTimer(timer), None),
                    Err(e) => {
                        tracing::warn!(timer = %series_timer_id, error = %e, "Failed to load series timer");
                        self.messages.show("Unable to load recording");
                        return;
                    }
                }
            }
            other => {
                tracing::info!(destination = ?other, "Destination not available in detail browser");
                self.messages.show("Not available here");
                return;
            }
        };

        if let Some(top) = self.current_mut() {
            top.controller.on_pause();
            top.controller.on_stop();
        }

        let context = self.context(server_id.as_deref());
        let mut controller = DetailController::new(context, target, server_id);
        self.next_serial += 1;
        controller.on_start();
        controller.on_resume(now);
        self.screens.push(Screen::new(self.next_serial, controller));
        self.navigator.set_depth(self.screens.len());

        if let Some(top) = self.current_mut() {
            top.controller.load(now).await;
        }
    }

    /// Pop the current screen; quits when none remain
    pub fn back(&mut self, now: DateTime<Utc>) {
        if let Some(mut screen) = self.screens.pop() {
            screen.controller.on_pause();
            screen.controller.on_stop();
            screen.controller.on_destroy();
        }
        self.navigator.set_depth(self.screens.len());
        match self.current_mut() {
            Some(top) => {
                top.controller.on_start();
                top.controller.on_resume(now);
            }
            None => self.quit(),
        }
    }

    /// Act on navigation requested by screens
    pub async fn process_navigation(&mut self, now: DateTime<Utc>) {
        for event in self.navigator.drain() {
            match event {
                NavEvent::Back => self.back(now),
                NavEvent::Navigate(destination) => self.open(destination, now).await,
                NavEvent::Reset(destination) => {
                    for mut screen in self.screens.drain(..) {
                        screen.controller.on_stop();
                        screen.controller.on_destroy();
                    }
                    self.open(destination, now).await;
                    if self.screens.is_empty() {
                        self.quit();
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Row fetches
    // -------------------------------------------------------------------------

    /// Run the current screen's queued fetches on background tasks
    pub fn spawn_fetches(&mut self) {
        let tx = self.fetch_tx.clone();
        let Some(top) = self.current_mut() else {
            return;
        };
        let serial = top.serial;
        let server = top.controller.fetch_server();
        for request in top.controller.take_pending_fetches() {
            let server = server.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = fetch::execute(server.as_ref(), &request).await;
                let _ = tx.send(FetchDone {
                    screen: serial,
                    row: request.row,
                    generation: request.generation,
                    result,
                });
            });
        }
    }

    /// Deliver a finished fetch to its screen, if it is still shown
    pub fn apply_fetch(&mut self, done: FetchDone) {
        match self.screens.iter_mut().find(|s| s.serial == done.screen) {
            Some(screen) => {
                screen
                    .controller
                    .apply_fetch(done.row, done.generation, done.result);
            }
            None => tracing::debug!(row = %done.row, "Screen gone, dropping row fetch"),
        }
    }

    /// Timers, navigation, fetch hand-off and status refresh
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        if let Some(top) = self.current_mut() {
            top.controller.poll_timers(now).await;
        }
        self.after_input(now).await;
    }

    async fn after_input(&mut self, now: DateTime<Utc>) {
        self.process_navigation(now).await;
        self.spawn_fetches();
        let all = self.messages.all();
        if all.len() > self.seen_messages {
            self.seen_messages = all.len();
            self.status = all.last().cloned();
        }
    }

    // -------------------------------------------------------------------------
    // Keyboard Event Handling
    // -------------------------------------------------------------------------

    /// Handle keyboard event, returns true if event was consumed
    pub async fn handle_key(&mut self, key: KeyEvent, now: DateTime<Utc>) -> bool {
        self.status = None;

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit();
            return true;
        }
        if key.code == KeyCode::Char('q') {
            self.quit();
            return true;
        }

        let Some(screen) = self.screens.last_mut() else {
            return false;
        };

        let consumed = if let Some(options) = screen.controller.popup().map(|p| p.options.len()) {
            match key.code {
                KeyCode::Up => {
                    screen.popup_selected = screen.popup_selected.saturating_sub(1);
                    true
                }
                KeyCode::Down => {
                    if screen.popup_selected + 1 < options {
                        screen.popup_selected += 1;
                    }
                    true
                }
                KeyCode::Enter => {
                    let index = screen.popup_selected;
                    screen.popup_selected = 0;
                    screen.controller.choose(index, now).await;
                    true
                }
                KeyCode::Esc => {
                    screen.popup_selected = 0;
                    screen.controller.dismiss_popup();
                    true
                }
                _ => false,
            }
        } else {
            match key.code {
                KeyCode::Esc | KeyCode::Backspace => {
                    self.navigator.go_back();
                    true
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    screen.move_vertical(false);
                    true
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    screen.move_vertical(true);
                    true
                }
                KeyCode::Left | KeyCode::Char('h') => {
                    screen.move_horizontal(false);
                    true
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    screen.move_horizontal(true);
                    true
                }
                KeyCode::Enter => {
                    match screen.focused_row() {
                        Some((row, _)) => {
                            let index = screen.selection(row);
                            screen.controller.on_row_item_clicked(row, index);
                        }
                        None => {
                            if let Some(kind) = screen.controller.actions().focused() {
                                screen.controller.activate(kind, now).await;
                            }
                        }
                    }
                    true
                }
                KeyCode::Char(' ') | KeyCode::Char('p') => screen.controller.on_play_pause_key(),
                _ => false,
            }
        };

        self.after_input(now).await;
        consumed
    }
}
