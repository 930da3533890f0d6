//! Item detail screen
//!
//! `DetailController` owns one subject for the lifetime of a detail screen:
//! it loads it, builds the summary card, the action bar and the related
//! rows, and reacts to lifecycle events, timers and user input.
//!
//! The controller never spawns work. Remote calls made by actions are
//! awaited in place; row fetches are queued as `FetchRequest`s for the
//! host to run (`run_pending_fetches`, or spawned tasks feeding
//! `apply_fetch`). Delayed work is modelled as deadlines polled through
//! `poll_timers`.

pub mod actions;
pub mod related;
pub mod summary;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::query::NextUpQuery;
use crate::api::{ApiResult, MediaServer};
use crate::config::Preferences;
use crate::models::{BaseItem, ItemKind, LiveProgramContext, SeriesTimer, StreamKind};
use crate::rows::{fetch, FetchPage, FetchRequest, RowAdapter, RowContainer, RowError, RowId, RowItem};
use crate::services::{
    DataRefreshService, Destination, Messages, Navigator, PlaybackLauncher, PlaybackRequest,
    UserSession, Watchlist,
};

pub use actions::{
    collapse_overflow, ActionBar, ActionButton, ActionContext, ActionKind, MAX_VISIBLE_ACTIONS,
    OVERFLOW_PRIORITY,
};
pub use related::{plan_rows, RowPlan, RowSource};
pub use summary::{format_millis, format_runtime, InfoItem, SummaryCard};

/// End-time refresh period
pub const CLOCK_INTERVAL_MS: i64 = 15_000;
/// Delay before re-reading the subject after the screen resumes
pub const POST_RESUME_DELAY_MS: i64 = 750;
/// Delay before re-adding the schedule row after a series timer edit
pub const SCHEDULE_REBUILD_DELAY_MS: i64 = 1_500;
/// Playback this recent always counts as newer than the last update
const RECENT_PLAYBACK_MS: i64 = 2_000;

// =============================================================================
// Construction
// =============================================================================

/// What the screen was opened for
#[derive(Debug, Clone, PartialEq)]
pub enum DetailTarget {
    Item(Uuid),
    /// Live channel; without a program the current airing one is looked up
    Channel {
        channel_id: Uuid,
        program: Option<BaseItem>,
    },
    SeriesTimer(SeriesTimer),
}

/// Collaborators the controller calls into
#[derive(Clone)]
pub struct DetailContext {
    /// Client for this screen (already resolved for multi-server navigation)
    pub server: Arc<dyn MediaServer>,
    pub navigator: Arc<dyn Navigator>,
    pub messages: Arc<dyn Messages>,
    pub playback: Arc<dyn PlaybackLauncher>,
    pub watchlist: Arc<dyn Watchlist>,
    pub refresh: Arc<DataRefreshService>,
    pub session: Arc<UserSession>,
    pub preferences: Preferences,
}

// =============================================================================
// Lifecycle and timers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Resumed,
    Paused,
    Stopped,
    Destroyed,
}

impl Lifecycle {
    /// Started or later, and not yet stopped
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Started | Lifecycle::Resumed | Lifecycle::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    Clock,
    PostResumeRefresh,
    ScheduleRebuild,
}

/// Pending delayed callbacks, at most one per kind
#[derive(Debug, Clone, Default)]
pub struct Timers {
    deadlines: BTreeMap<TimerKind, DateTime<Utc>>,
}

impl Timers {
    pub fn schedule(&mut self, kind: TimerKind, at: DateTime<Utc>) {
        self.deadlines.insert(kind, at);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines.remove(&kind);
    }

    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<DateTime<Utc>> {
        self.deadlines.get(&kind).copied()
    }

    /// Remove and return every timer due at `now`
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<TimerKind> {
        let due: Vec<TimerKind> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(kind, _)| *kind)
            .collect();
        for kind in &due {
            self.deadlines.remove(kind);
        }
        due
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}

// =============================================================================
// Popups
// =============================================================================

/// Audio / subtitle stream picked before playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackChoice {
    #[default]
    Default,
    /// Subtitles only
    Off,
    Stream(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackSelection {
    pub audio: TrackChoice,
    pub subtitle: TrackChoice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupKind {
    Resume { episode: Box<BaseItem>, position_ms: i64 },
    Versions,
    AudioTracks(Vec<TrackChoice>),
    SubtitleTracks(Vec<TrackChoice>),
    ConfirmDelete,
    ConfirmCancelRecordSeries,
    ConfirmCancelSeriesTimer,
    More(Vec<ActionKind>),
}

/// Modal choice list shown over the screen
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub kind: PopupKind,
    pub title: String,
    pub options: Vec<String>,
    pub checked: Option<usize>,
}

impl Popup {
    fn new(kind: PopupKind, title: &str, options: Vec<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            options,
            checked: None,
        }
    }

    fn confirm(kind: PopupKind, title: &str, yes: &str) -> Self {
        Self::new(kind, title, vec![yes.to_string(), "No".to_string()])
    }
}

// =============================================================================
// DetailController
// =============================================================================

pub struct DetailController {
    ctx: DetailContext,
    target: DetailTarget,
    /// Explicit server the screen was opened for
    server_id: Option<String>,
    lifecycle: Lifecycle,
    subject: Option<BaseItem>,
    program: Option<LiveProgramContext>,
    series_timer: Option<SeriesTimer>,
    summary: Option<SummaryCard>,
    actions: ActionBar,
    rows: RowContainer,
    pending: Vec<FetchRequest>,
    timers: Timers,
    popup: Option<Popup>,
    prev_item_id: Option<Uuid>,
    in_watchlist: bool,
    selected_version: usize,
    tracks: TrackSelection,
    focused_row_item: Option<(RowId, usize)>,
    last_updated: DateTime<Utc>,
}

impl DetailController {
    pub fn new(ctx: DetailContext, target: DetailTarget, server_id: Option<String>) -> Self {
        let (program, series_timer) = match &target {
            DetailTarget::Channel {
                channel_id,
                program: Some(program),
            } => (Some(LiveProgramContext::new(program.clone(), Some(*channel_id))), None),
            DetailTarget::SeriesTimer(timer) => (None, Some(timer.clone())),
            _ => (None, None),
        };
        Self {
            ctx,
            target,
            server_id,
            lifecycle: Lifecycle::Created,
            subject: None,
            program,
            series_timer,
            summary: None,
            actions: ActionBar::new(),
            rows: RowContainer::new(),
            pending: Vec::new(),
            timers: Timers::default(),
            popup: None,
            prev_item_id: None,
            in_watchlist: false,
            selected_version: 0,
            tracks: TrackSelection::default(),
            focused_row_item: None,
            last_updated: Utc::now(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn target(&self) -> &DetailTarget {
        &self.target
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn subject(&self) -> Option<&BaseItem> {
        self.subject.as_ref()
    }

    pub fn program(&self) -> Option<&LiveProgramContext> {
        self.program.as_ref()
    }

    pub fn series_timer(&self) -> Option<&SeriesTimer> {
        self.series_timer.as_ref()
    }

    pub fn summary(&self) -> Option<&SummaryCard> {
        self.summary.as_ref()
    }

    pub fn actions(&self) -> &ActionBar {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionBar {
        &mut self.actions
    }

    pub fn rows(&self) -> &RowContainer {
        &self.rows
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn dismiss_popup(&mut self) {
        self.popup = None;
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn previous_episode(&self) -> Option<Uuid> {
        self.prev_item_id
    }

    pub fn track_selection(&self) -> TrackSelection {
        self.tracks
    }

    pub fn selected_version(&self) -> usize {
        self.selected_version
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Client row fetches go through
    pub fn fetch_server(&self) -> Arc<dyn MediaServer> {
        self.ctx.server.clone()
    }

    /// Server to carry into navigation and playback: explicit, else the subject's
    fn item_server_id(&self) -> Option<String> {
        self.server_id
            .clone()
            .or_else(|| self.subject.as_ref().and_then(|s| s.server_id.clone()))
    }

    fn channel_id(&self) -> Option<Uuid> {
        match &self.target {
            DetailTarget::Channel { channel_id, .. } => Some(*channel_id),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn on_start(&mut self) {
        self.lifecycle = Lifecycle::Started;
    }

    /// Start the clock, schedule the post-playback refresh and re-fetch rows
    /// whose change triggers fired or whose first page was dropped while the
    /// screen was away
    pub fn on_resume(&mut self, now: DateTime<Utc>) {
        self.lifecycle = Lifecycle::Resumed;
        if self.ctx.preferences.clock_behavior.shows_in_menus() {
            self.timers
                .schedule(TimerKind::Clock, now + Duration::milliseconds(CLOCK_INTERVAL_MS));
        }
        self.timers.schedule(
            TimerKind::PostResumeRefresh,
            now + Duration::milliseconds(POST_RESUME_DELAY_MS),
        );

        let refresh = self.ctx.refresh.clone();
        for row in self.rows.iter_mut() {
            if let Some(adapter) = row.adapter_mut() {
                let retrieval = if adapter.needs_reload() {
                    Some(adapter.retrieve(now))
                } else {
                    adapter.re_retrieve_if_needed(&refresh, now)
                };
                if let Some(request) = retrieval.and_then(|r| r.into_request()) {
                    self.pending.push(request);
                }
            }
        }
    }

    pub fn on_pause(&mut self) {
        self.lifecycle = Lifecycle::Paused;
        self.cancel_screen_timers();
    }

    pub fn on_stop(&mut self) {
        self.lifecycle = Lifecycle::Stopped;
        self.cancel_screen_timers();
    }

    fn cancel_screen_timers(&mut self) {
        self.timers.cancel(TimerKind::Clock);
        self.timers.cancel(TimerKind::PostResumeRefresh);
    }

    pub fn on_destroy(&mut self) {
        self.lifecycle = Lifecycle::Destroyed;
        self.timers.clear();
        self.pending.clear();
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Resolve the target and display it; not-found navigates back
    pub async fn load(&mut self, now: DateTime<Utc>) {
        match self.target.clone() {
            DetailTarget::SeriesTimer(timer) => {
                self.set_subject(series_timer_subject(&timer), now).await;
            }
            DetailTarget::Channel { channel_id, program } => {
                let program = match program {
                    Some(program) => Some(program),
                    None => self.current_program(channel_id).await,
                };
                match program {
                    Some(program) => {
                        let id = program.id;
                        self.program = Some(LiveProgramContext::new(program, Some(channel_id)));
                        self.load_item(id, now).await;
                    }
                    None => {
                        tracing::warn!(channel = %channel_id, "No current program for channel");
                        self.ctx.navigator.go_back();
                    }
                }
            }
            DetailTarget::Item(id) => self.load_item(id, now).await,
        }
        self.last_updated = now;
    }

    async fn current_program(&self, channel_id: Uuid) -> Option<BaseItem> {
        match self.ctx.server.get_channel(channel_id).await {
            Ok(channel) => channel.current_program.map(|p| *p),
            Err(e) => {
                tracing::warn!(channel = %channel_id, error = %e, "Failed to load channel");
                None
            }
        }
    }

    async fn load_item(&mut self, id: Uuid, now: DateTime<Utc>) {
        match self.ctx.server.get_item(id).await {
            Ok(item) => self.set_subject(item, now).await,
            Err(e) => {
                tracing::warn!(item = %id, error = %e, "Failed to load item");
                self.ctx.navigator.go_back();
            }
        }
    }

    /// Display a new subject: summary, actions, rows. No-op when inactive.
    pub async fn set_subject(&mut self, item: BaseItem, now: DateTime<Utc>) {
        if !self.is_active() {
            tracing::debug!(item = %item.id, "Screen not active, ignoring subject");
            return;
        }

        let mut item = item;
        if let (Some(channel_id), Some(program)) = (self.channel_id(), &self.program) {
            item.parent_id = Some(channel_id);
            item.start_date = program.start();
            item.end_date = program.end();
            item.run_time_ticks = program.program.run_time_ticks;
        }
        tracing::info!(item = %item.id, kind = %item.kind, "Showing details");

        self.summary = Some(SummaryCard::build(&item, &self.ctx.preferences, now));
        let has_actions = item.kind.has_actions();
        self.subject = Some(item);
        self.prev_item_id = None;
        self.popup = None;
        self.focused_row_item = None;

        self.actions = ActionBar::new();
        if has_actions {
            self.build_actions(now).await;
        }

        self.rows.clear();
        self.pending.clear();
        self.add_rows(now);
        self.last_updated = now;
    }

    async fn build_actions(&mut self, now: DateTime<Utc>) {
        let Some(subject) = self.subject.clone() else {
            return;
        };

        let watchlist = self.ctx.preferences.watchlist_enabled().then(|| {
            self.ctx
                .session
                .current_server()
                .map(|server| self.ctx.watchlist.contains(subject.id, &server))
                .unwrap_or(false)
        });
        self.in_watchlist = watchlist.unwrap_or(false);

        let bar = ActionBar::build(&ActionContext {
            subject: &subject,
            program: self.program.as_ref(),
            series_timer: self.series_timer.as_ref(),
            preferences: &self.ctx.preferences,
            can_manage_recordings: self.ctx.session.can_manage_recordings(),
            watchlist,
            now,
        });
        self.actions = bar;

        if subject.can_play() {
            let next_up = if subject.kind == ItemKind::Series && !subject.is_started() {
                self.next_up_episode(&subject).await
            } else {
                None
            };
            self.actions
                .apply_resume_visibility(resume_visible(&subject, next_up.as_ref()));
        }

        if self.actions.contains(ActionKind::PrevEpisode) {
            self.resolve_previous_episode(&subject).await;
        }
        self.actions.show_more_if_needed();
    }

    async fn next_up_episode(&self, subject: &BaseItem) -> Option<BaseItem> {
        let query = NextUpQuery {
            series_id: Some(subject.series_id.unwrap_or(subject.id)),
            parent_id: None,
            limit: Some(1),
        };
        match self.ctx.server.next_up(&query).await {
            Ok(result) => result.items.into_iter().next(),
            Err(e) => {
                tracing::warn!(item = %subject.id, error = %e, "Failed to load next up episode");
                None
            }
        }
    }

    /// Find the episode listed before the subject among its neighbours
    async fn resolve_previous_episode(&mut self, subject: &BaseItem) {
        let Some(series_id) = subject.series_id else {
            return;
        };
        match self.ctx.server.adjacent_episodes(series_id, subject.id).await {
            Ok(result) => {
                let position = result.items.iter().position(|i| i.id == subject.id);
                self.prev_item_id = match position {
                    Some(0) => None,
                    Some(p) => result.items.get(p - 1).map(|i| i.id),
                    None => result.items.first().map(|i| i.id),
                };
            }
            Err(e) => {
                tracing::warn!(item = %subject.id, error = %e, "Failed to load adjacent episodes");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Rows
    // -------------------------------------------------------------------------

    fn add_rows(&mut self, now: DateTime<Utc>) {
        let Some(subject) = self.subject.as_ref() else {
            return;
        };
        let plans = plan_rows(subject, self.series_timer.as_ref(), &self.ctx.preferences);
        tracing::debug!(item = %subject.id, kind = %subject.kind, rows = plans.len(), "Adding rows");

        for plan in plans {
            match plan.source {
                RowSource::Adapter {
                    query,
                    chunk,
                    triggers,
                } => {
                    let id = self.rows.allocate_id();
                    let mut adapter = RowAdapter::new(id, query, chunk)
                        .with_server_id(self.server_id.clone())
                        .with_triggers(&triggers);
                    if let Some(request) = adapter.retrieve(now).into_request() {
                        self.pending.push(request);
                    }
                    self.rows.add_adapter(plan.header, adapter);
                }
                RowSource::Static(items) => {
                    self.rows.add_static(plan.header, items);
                }
            }
        }
    }

    /// Queued row fetches for the host to run
    pub fn take_pending_fetches(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending_fetches(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Deliver a row fetch result. When the screen is no longer active the
    /// result is dropped and the row's fetch settled without touching items.
    pub fn apply_fetch(
        &mut self,
        row: RowId,
        generation: u64,
        result: Result<FetchPage, RowError>,
    ) -> bool {
        if !self.is_active() {
            tracing::debug!(row = %row, "Screen not active, dropping row fetch");
            self.rows.abandon_fetch(row, generation);
            return false;
        }
        self.rows.apply_fetch(row, generation, result)
    }

    /// Run every queued fetch concurrently and apply the results
    pub async fn run_pending_fetches(&mut self) {
        let requests = self.take_pending_fetches();
        if requests.is_empty() {
            return;
        }
        let server = self.fetch_server();
        let results = join_all(
            requests
                .iter()
                .map(|request| fetch::execute(server.as_ref(), request)),
        )
        .await;
        for (request, result) in requests.iter().zip(results) {
            self.apply_fetch(request.row, request.generation, result);
        }
    }

    /// A row item gained focus; may page the row ahead
    pub fn on_row_item_selected(&mut self, row: RowId, index: usize) {
        self.focused_row_item = Some((row, index));
        if let Some(request) = self
            .rows
            .adapter_mut(row)
            .and_then(|adapter| adapter.load_more_if_needed(index))
        {
            self.pending.push(request);
        }
    }

    /// Focus left the rows (back on the action bar)
    pub fn clear_row_selection(&mut self) {
        self.focused_row_item = None;
    }

    fn row_item(&self, row: RowId, index: usize) -> Option<&RowItem> {
        self.rows.get(row).and_then(|r| r.items().get(index))
    }

    /// Open or play a row item
    pub fn on_row_item_clicked(&mut self, row: RowId, index: usize) {
        let Some(item) = self.row_item(row, index).cloned() else {
            return;
        };
        match item {
            RowItem::Item(item) => {
                let server_id = item.server_id.clone().or_else(|| self.item_server_id());
                self.ctx.navigator.navigate(Destination::ItemDetails {
                    item_id: item.id,
                    server_id,
                });
            }
            RowItem::Person(person) => {
                self.ctx.navigator.navigate(Destination::ItemDetails {
                    item_id: person.id,
                    server_id: self.item_server_id(),
                });
            }
            RowItem::Chapter(chapter) => {
                if let Some(subject) = self.subject.clone() {
                    self.play(vec![subject], chapter.start_ms(), false);
                }
            }
            RowItem::SeriesTimer(timer) => {
                if let Some(id) = timer.id {
                    self.ctx
                        .navigator
                        .navigate(Destination::SeriesTimerDetails { series_timer_id: id });
                }
            }
            RowItem::GridButton(button) => self.ctx.navigator.navigate(button.destination),
            RowItem::Text(_) => {}
        }
    }

    /// Play/pause key; true when handled
    pub fn on_play_pause_key(&mut self) -> bool {
        if let Some((row, index)) = self.focused_row_item {
            return match self.row_item(row, index).cloned() {
                Some(RowItem::Item(item)) if item.can_play() => {
                    self.play(vec![item], 0, false);
                    true
                }
                _ => false,
            };
        }
        match self.subject.clone() {
            Some(subject) if subject.can_play() => {
                let position = subject.playback_position_ms();
                self.play(vec![subject], position, false);
                true
            }
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Run due timers
    pub async fn poll_timers(&mut self, now: DateTime<Utc>) {
        for kind in self.timers.take_due(now) {
            match kind {
                TimerKind::Clock => self.clock_tick(now),
                TimerKind::PostResumeRefresh => self.post_resume_refresh(now).await,
                TimerKind::ScheduleRebuild => {
                    if self.is_active() {
                        self.add_rows(now);
                    }
                }
            }
        }
    }

    fn clock_tick(&mut self, now: DateTime<Utc>) {
        if !self.is_active() {
            return;
        }
        // Summary not built yet (subject still loading)
        let (Some(summary), Some(subject)) = (self.summary.as_mut(), self.subject.as_ref()) else {
            return;
        };
        if subject.run_time_ticks.is_some() {
            summary.refresh_end_time(subject, now);
            self.timers
                .schedule(TimerKind::Clock, now + Duration::milliseconds(CLOCK_INTERVAL_MS));
        }
    }

    async fn post_resume_refresh(&mut self, now: DateTime<Utc>) {
        if !self.is_active() {
            return;
        }
        let Some(subject) = self.subject.clone() else {
            return;
        };
        let Some(last_playback) = self.ctx.refresh.last_playback() else {
            return;
        };
        let recent = now - last_playback < Duration::milliseconds(RECENT_PLAYBACK_MS);
        if !(last_playback > self.last_updated || recent) || subject.kind == ItemKind::MusicArtist {
            return;
        }
        tracing::debug!(%last_playback, last_updated = %self.last_updated, "Playback since last update");

        let other_episode = self.ctx.refresh.last_played_item().filter(|played| {
            subject.kind == ItemKind::Episode
                && played.kind == ItemKind::Episode
                && played.id != subject.id
        });
        if let Some(played) = other_episode {
            tracing::info!(item = %played.id, "Re-loading after new episode playback");
            self.ctx.refresh.set_last_played_item(None);
            self.load_item(played.id, now).await;
            return;
        }

        tracing::info!(item = %subject.id, "Updating info after playback");
        let item = match self.ctx.server.get_item(subject.id).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(item = %subject.id, error = %e, "Failed to refresh item");
                return;
            }
        };

        if self.actions.contains(ActionKind::Resume) {
            let visible = (item.kind == ItemKind::Series && !item.played()) || item.can_resume();
            self.actions.set_visible(ActionKind::Resume, visible);
            if item.can_resume() {
                self.actions.set_label(
                    ActionKind::Resume,
                    summary::resume_label(&item, self.ctx.preferences.resume_preroll_ms()),
                );
            }
            if visible {
                self.actions.request_focus(ActionKind::Resume);
            } else {
                self.actions.request_focus(ActionKind::Play);
            }
            self.actions.show_more_if_needed();
        }
        self.actions.set_activated(ActionKind::Watched, item.played());
        if let Some(summary) = self.summary.as_mut() {
            summary.refresh_end_time(&item, now);
        }
        self.subject = Some(item);
        self.last_updated = now;
    }

    /// Series timer edited elsewhere: refresh its overview and rebuild the schedule
    pub async fn on_action_complete(&mut self, now: DateTime<Utc>) {
        let Some(timer_id) = self.series_timer.as_ref().and_then(|t| t.id.clone()) else {
            return;
        };
        match self.ctx.server.get_series_timer(&timer_id).await {
            Ok(timer) => {
                let overview = timer.overview();
                if let Some(subject) = self.subject.as_mut() {
                    subject.overview = Some(overview.clone());
                }
                if let Some(summary) = self.summary.as_mut() {
                    summary.set_overview(overview);
                }
                self.series_timer = Some(timer);
            }
            Err(e) => tracing::warn!(timer = %timer_id, error = %e, "Failed to refresh series timer"),
        }
        self.rows.clear();
        self.pending.clear();
        self.timers.schedule(
            TimerKind::ScheduleRebuild,
            now + Duration::milliseconds(SCHEDULE_REBUILD_DELAY_MS),
        );
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Activate a button (or its overflow entry)
    pub async fn activate(&mut self, kind: ActionKind, now: DateTime<Utc>) {
        let Some(subject) = self.subject.clone() else {
            return;
        };
        tracing::debug!(action = ?kind, item = %subject.id, "Action");
        match kind {
            ActionKind::Resume => self.resume_playback(&subject).await,
            ActionKind::Play => self.play(vec![subject], 0, false),
            ActionKind::Queue => self.add_to_queue(&subject),
            ActionKind::Shuffle => self.play(vec![subject], 0, true),
            ActionKind::InstantMix => {
                self.ctx.playback.launch(PlaybackRequest::InstantMix(subject.id));
            }
            ActionKind::AudioTrack => self.show_track_popup(&subject, StreamKind::Audio),
            ActionKind::SubtitleTrack => self.show_track_popup(&subject, StreamKind::Subtitle),
            ActionKind::Watchlist => self.toggle_watchlist(&subject),
            ActionKind::Versions => self.show_versions_popup(&subject),
            ActionKind::Trailers => self.play_trailers(&subject).await,
            ActionKind::Record => self.toggle_record().await,
            ActionKind::RecordSeries => self.toggle_record_series().await,
            ActionKind::SeriesSettings => {
                if let Some(id) = self.program.as_ref().and_then(|p| p.series_timer_id()) {
                    self.ctx.navigator.navigate(Destination::RecordingOptions {
                        series_timer_id: id.to_string(),
                    });
                }
            }
            ActionKind::Watched => self.toggle_played(now).await,
            ActionKind::Favorite => self.toggle_favorite(now).await,
            ActionKind::PrevEpisode => {
                if let Some(id) = self.prev_item_id {
                    self.navigate_to_item(id);
                }
            }
            ActionKind::GoToSeries => {
                if let Some(id) = subject.series_id {
                    self.navigate_to_item(id);
                }
            }
            ActionKind::Delete => {
                tracing::info!(item = %subject.id, "Showing item delete confirmation");
                self.popup = Some(Popup::confirm(
                    PopupKind::ConfirmDelete,
                    "Delete item?",
                    "Delete",
                ));
            }
            ActionKind::SeriesTimerSettings => {
                if let Some(id) = self.series_timer.as_ref().and_then(|t| t.id.clone()) {
                    self.ctx
                        .navigator
                        .navigate(Destination::RecordingOptions { series_timer_id: id });
                }
            }
            ActionKind::CancelSeriesTimer => {
                self.popup = Some(Popup::confirm(
                    PopupKind::ConfirmCancelSeriesTimer,
                    "Cancel the entire series?",
                    "Cancel series",
                ));
            }
            ActionKind::More => {
                let entries = self.actions.overflow_entries(self.prev_item_id.is_some());
                if !entries.is_empty() {
                    let labels = entries.iter().map(|k| self.actions.overflow_label(*k)).collect();
                    self.popup = Some(Popup::new(PopupKind::More(entries), "Other options", labels));
                }
            }
        }
    }

    /// Pick option `index` of the open popup
    pub async fn choose(&mut self, index: usize, now: DateTime<Utc>) {
        let Some(popup) = self.popup.take() else {
            return;
        };
        if index >= popup.options.len() {
            self.popup = Some(popup);
            return;
        }
        match popup.kind {
            PopupKind::Resume {
                episode,
                position_ms,
            } => {
                let position = if index == 0 { position_ms } else { 0 };
                self.play(vec![*episode], position, false);
            }
            PopupKind::Versions => self.select_version(index).await,
            PopupKind::AudioTracks(choices) => {
                if let Some(choice) = choices.get(index) {
                    self.tracks.audio = *choice;
                    self.ctx
                        .messages
                        .show(&format!("Audio: {}", popup.options[index]));
                }
            }
            PopupKind::SubtitleTracks(choices) => {
                if let Some(choice) = choices.get(index) {
                    self.tracks.subtitle = *choice;
                    self.ctx
                        .messages
                        .show(&format!("Subtitles: {}", popup.options[index]));
                }
            }
            PopupKind::ConfirmDelete if index == 0 => self.delete_subject().await,
            PopupKind::ConfirmCancelRecordSeries if index == 0 => {
                self.cancel_record_series().await;
            }
            PopupKind::ConfirmCancelSeriesTimer if index == 0 => {
                self.cancel_series_timer().await;
            }
            PopupKind::More(entries) => {
                if let Some(kind) = entries.get(index).copied() {
                    self.activate(kind, now).await;
                }
            }
            _ => {}
        }
    }

    fn play(&self, items: Vec<BaseItem>, position_ms: i64, shuffle: bool) {
        if items.is_empty() {
            tracing::error!("No items to play - ignoring play request");
            return;
        }
        let server_id = self.item_server_id();
        let items = items
            .into_iter()
            .map(|mut item| {
                if let Some(server_id) = &server_id {
                    item.annotate_server_id(server_id);
                }
                item
            })
            .collect();
        self.ctx.playback.launch(PlaybackRequest::Play {
            items,
            position_ms,
            shuffle,
        });
    }

    fn navigate_to_item(&self, item_id: Uuid) {
        self.ctx.navigator.navigate(Destination::ItemDetails {
            item_id,
            server_id: self.item_server_id(),
        });
    }

    fn add_to_queue(&self, subject: &BaseItem) {
        if subject.is_music() {
            self.ctx
                .playback
                .launch(PlaybackRequest::QueueAudio(vec![subject.clone()]));
        }
    }

    async fn resume_playback(&mut self, subject: &BaseItem) {
        let preroll = self.ctx.preferences.resume_preroll_ms();
        if subject.kind != ItemKind::Series {
            self.play(
                vec![subject.clone()],
                (subject.playback_position_ms() - preroll).max(0),
                false,
            );
            return;
        }

        match self.next_up_episode(subject).await {
            None => self.ctx.messages.show("Unable to play: no next up episode"),
            Some(episode) if episode.playback_position_ticks() == 0 => {
                self.play(vec![episode], 0, false);
            }
            Some(episode) => {
                let position_ms = (episode.playback_position_ms() - preroll).max(0);
                self.popup = Some(Popup::new(
                    PopupKind::Resume {
                        episode: Box::new(episode),
                        position_ms,
                    },
                    "Resume",
                    vec![
                        format!("Resume from {}", format_millis(position_ms)),
                        actions::LABEL_FROM_BEGINNING.to_string(),
                    ],
                ));
            }
        }
    }

    async fn play_trailers(&mut self, subject: &BaseItem) {
        if subject.local_trailer_count.unwrap_or(0) < 1 {
            match subject.remote_trailers.first() {
                Some(trailer) => self
                    .ctx
                    .playback
                    .launch(PlaybackRequest::ExternalTrailer(trailer.url.clone())),
                None => self.ctx.messages.show("No trailer available"),
            }
            return;
        }
        match self.ctx.server.local_trailers(subject.id).await {
            Ok(trailers) => self.play(trailers, 0, false),
            Err(e) => {
                tracing::error!(item = %subject.id, error = %e, "Error retrieving trailers for playback");
                self.ctx.messages.show("Unable to play trailers");
            }
        }
    }

    fn show_track_popup(&mut self, subject: &BaseItem, kind: StreamKind) {
        let streams: Vec<_> = subject
            .media_sources
            .first()
            .map(|s| s.streams_of(kind).cloned().collect())
            .unwrap_or_default();
        let mut choices = Vec::new();
        let mut options = Vec::new();
        if kind == StreamKind::Subtitle {
            choices.push(TrackChoice::Off);
            options.push("None".to_string());
        }
        for stream in &streams {
            choices.push(TrackChoice::Stream(stream.index));
            options.push(stream.to_string());
        }
        choices.push(TrackChoice::Default);
        options.push("Default".to_string());

        let current = match kind {
            StreamKind::Subtitle => self.tracks.subtitle,
            _ => self.tracks.audio,
        };
        let (title, popup_kind) = match kind {
            StreamKind::Subtitle => ("Subtitle track", PopupKind::SubtitleTracks(choices.clone())),
            _ => ("Audio track", PopupKind::AudioTracks(choices.clone())),
        };
        let mut popup = Popup::new(popup_kind, title, options);
        popup.checked = choices.iter().position(|c| *c == current);
        self.popup = Some(popup);
    }

    fn show_versions_popup(&mut self, subject: &BaseItem) {
        let options = subject
            .media_sources
            .iter()
            .map(|s| s.name.clone().unwrap_or_else(|| s.id.clone()))
            .collect();
        let mut popup = Popup::new(PopupKind::Versions, "Select version", options);
        popup.checked = Some(self.selected_version);
        self.popup = Some(popup);
    }

    async fn select_version(&mut self, index: usize) {
        let Some(source) = self
            .subject
            .as_ref()
            .and_then(|s| s.media_sources.get(index).cloned())
        else {
            return;
        };
        self.selected_version = index;
        let Ok(id) = Uuid::parse_str(&source.id) else {
            tracing::warn!(source = %source.id, "Media source id is not an item id");
            return;
        };
        match self.ctx.server.get_item(id).await {
            Ok(item) => {
                self.subject = Some(item);
                self.actions.request_focus(ActionKind::Versions);
            }
            Err(e) => tracing::warn!(source = %source.id, error = %e, "Failed to load version"),
        }
    }

    fn toggle_watchlist(&mut self, subject: &BaseItem) {
        let adding = !self.in_watchlist;
        let Some(server) = self.ctx.session.current_server() else {
            self.ctx.messages.show(if adding {
                "Failed to add to watch list"
            } else {
                "Failed to remove from watch list"
            });
            return;
        };
        if adding {
            if self.ctx.watchlist.add(subject.id, &server) {
                self.ctx.messages.show("Added to watch list");
            }
        } else if self.ctx.watchlist.remove(subject.id, &server) {
            self.ctx.messages.show("Removed from watch list");
        }
        self.in_watchlist = adding;
        actions::set_watchlist_state(&mut self.actions, adding);
    }

    async fn toggle_played(&mut self, now: DateTime<Utc>) {
        let Some(subject) = self.subject.as_ref() else {
            return;
        };
        let (id, played) = (subject.id, subject.played());
        let user_data = match self.ctx.server.set_played(id, !played).await {
            Ok(user_data) => user_data,
            Err(e) => {
                tracing::warn!(item = %id, error = %e, "Failed to update played state");
                self.ctx.messages.show("Unable to update watched state");
                return;
            }
        };
        let Some(subject) = self.subject.as_mut() else {
            return;
        };
        let played = user_data.played;
        subject.user_data = Some(user_data);
        let (kind, can_resume) = (subject.kind, subject.can_resume());

        self.actions.set_activated(ActionKind::Watched, played);
        if self.actions.contains(ActionKind::Resume) {
            self.actions.set_visible(ActionKind::Resume, can_resume);
        }

        let refresh = &self.ctx.refresh;
        refresh.set_last_playback(now);
        match kind {
            ItemKind::Movie => refresh.set_last_movie_playback(now),
            ItemKind::Episode => refresh.set_last_tv_playback(now),
            _ => {}
        }
        self.actions.show_more_if_needed();
    }

    async fn toggle_favorite(&mut self, now: DateTime<Utc>) {
        let Some(subject) = self.subject.as_ref() else {
            return;
        };
        let (id, favorite) = (subject.id, subject.is_favorite());
        match self.ctx.server.set_favorite(id, !favorite).await {
            Ok(user_data) => {
                self.actions
                    .set_activated(ActionKind::Favorite, user_data.is_favorite);
                if let Some(subject) = self.subject.as_mut() {
                    subject.user_data = Some(user_data);
                }
                self.ctx.refresh.set_last_favorite_update(now);
            }
            Err(e) => {
                tracing::warn!(item = %id, error = %e, "Failed to update favorite");
                self.ctx.messages.show("Unable to update favorite");
            }
        }
    }

    async fn delete_subject(&mut self) {
        let Some(subject) = self.subject.clone() else {
            return;
        };
        tracing::info!(item = %subject.id, name = %subject.name, "Deleting item");
        if let Err(e) = self.ctx.server.delete_item(subject.id).await {
            tracing::error!(item = %subject.id, error = %e, "Failed to delete item");
            self.ctx
                .messages
                .show(&format!("Failed to delete {}", subject.name));
            return;
        }
        self.ctx.refresh.set_last_deleted_item_id(subject.id);
        if self.ctx.navigator.can_go_back() {
            self.ctx.navigator.go_back();
        } else {
            self.ctx.navigator.navigate(Destination::Home);
        }
        self.ctx.messages.show(&format!("{} deleted", subject.name));
    }

    // -------------------------------------------------------------------------
    // Live TV recording
    // -------------------------------------------------------------------------

    fn set_rec_timer(&mut self, id: Option<String>) {
        self.actions.set_activated(ActionKind::Record, id.is_some());
        if let Some(program) = self.program.as_mut() {
            program.program.timer_id = id;
        }
    }

    fn set_rec_series_timer(&mut self, id: Option<String>) {
        self.actions.set_activated(ActionKind::RecordSeries, id.is_some());
        self.actions.set_visible(ActionKind::SeriesSettings, id.is_some());
        if let Some(program) = self.program.as_mut() {
            program.program.series_timer_id = id;
        }
    }

    /// Apply a re-fetched program's timer state
    fn update_program(&mut self, program: BaseItem) {
        let channel_id = self.program.as_ref().and_then(|p| p.channel_id);
        let (timer_id, series_timer_id) = (program.timer_id.clone(), program.series_timer_id.clone());
        self.program = Some(LiveProgramContext::new(program, channel_id));
        self.set_rec_series_timer(series_timer_id);
        self.set_rec_timer(timer_id);
    }

    fn program_id(&self) -> Option<(Uuid, String)> {
        self.program
            .as_ref()
            .map(|p| (p.program.id, p.program.id.simple().to_string()))
    }

    async fn toggle_record(&mut self) {
        let Some((program_uuid, program_id)) = self.program_id() else {
            return;
        };
        let server = self.ctx.server.clone();

        match self.program.as_ref().and_then(|p| p.timer_id().map(str::to_string)) {
            None => {
                let result: ApiResult<BaseItem> = async {
                    let defaults = server.get_default_timer(&program_id).await?;
                    server.create_timer(&defaults).await?;
                    server.get_program(&program_id).await
                }
                .await;
                match result {
                    Ok(program) => {
                        self.update_program(program);
                        self.ctx.messages.show("Set to record");
                    }
                    Err(e) => {
                        tracing::warn!(program = %program_id, error = %e, "Failed to create recording");
                        self.ctx.messages.show("Unable to create recording");
                    }
                }
            }
            Some(timer_id) => match server.cancel_timer(&timer_id).await {
                Ok(()) => {
                    self.set_rec_timer(None);
                    self.ctx.refresh.set_last_deleted_item_id(program_uuid);
                    self.ctx.messages.show("Recording cancelled");
                }
                Err(e) => {
                    tracing::warn!(timer = %timer_id, error = %e, "Failed to cancel recording");
                    self.ctx.messages.show("Unable to cancel recording");
                }
            },
        }
    }

    async fn toggle_record_series(&mut self) {
        let Some((_, program_id)) = self.program_id() else {
            return;
        };
        if self
            .program
            .as_ref()
            .and_then(|p| p.series_timer_id())
            .is_some()
        {
            self.popup = Some(Popup::confirm(
                PopupKind::ConfirmCancelRecordSeries,
                "Cancel the entire series?",
                "Yes",
            ));
            return;
        }

        let server = self.ctx.server.clone();
        let result: ApiResult<BaseItem> = async {
            let defaults = server.get_default_timer(&program_id).await?;
            server.create_series_timer(&defaults).await?;
            server.get_program(&program_id).await
        }
        .await;
        match result {
            Ok(program) => {
                self.update_program(program);
                self.ctx.messages.show("Set to record");
            }
            Err(e) => {
                tracing::warn!(program = %program_id, error = %e, "Failed to create series recording");
                self.ctx.messages.show("Unable to create recording");
            }
        }
    }

    async fn cancel_record_series(&mut self) {
        let Some((program_uuid, _)) = self.program_id() else {
            return;
        };
        let Some(series_timer_id) = self
            .program
            .as_ref()
            .and_then(|p| p.series_timer_id().map(str::to_string))
        else {
            return;
        };
        match self.ctx.server.cancel_series_timer(&series_timer_id).await {
            Ok(()) => {
                self.set_rec_series_timer(None);
                self.set_rec_timer(None);
                self.ctx.refresh.set_last_deleted_item_id(program_uuid);
                self.ctx.messages.show("Recording cancelled");
            }
            Err(e) => {
                tracing::warn!(timer = %series_timer_id, error = %e, "Failed to cancel series recording");
                self.ctx.messages.show("Unable to cancel recording");
            }
        }
    }

    async fn cancel_series_timer(&mut self) {
        let Some(timer_id) = self.series_timer.as_ref().and_then(|t| t.id.clone()) else {
            return;
        };
        if let Err(e) = self.ctx.server.cancel_series_timer(&timer_id).await {
            tracing::warn!(timer = %timer_id, error = %e, "Failed to cancel series timer");
            self.ctx.messages.show("Unable to cancel recording");
            return;
        }
        self.ctx.messages.show("Recording cancelled");
        if let Ok(id) = Uuid::parse_str(&timer_id) {
            self.ctx.refresh.set_last_deleted_item_id(id);
        }
        if self.ctx.navigator.can_go_back() {
            self.ctx.navigator.go_back();
        } else {
            self.ctx.navigator.reset(Destination::Home);
        }
    }
}

/// Resume shows for resumable items and for started, unfinished series
fn resume_visible(subject: &BaseItem, next_up: Option<&BaseItem>) -> bool {
    let started = subject.is_started() || next_up.map(BaseItem::can_resume).unwrap_or(false);
    (subject.kind == ItemKind::Series && started && !subject.played()) || subject.can_resume()
}

/// Stand-in subject for a series recording rule
fn series_timer_subject(timer: &SeriesTimer) -> BaseItem {
    BaseItem {
        id: timer
            .id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .unwrap_or_else(Uuid::nil),
        name: timer.name.clone().unwrap_or_default(),
        kind: ItemKind::Folder,
        is_folder: Some(true),
        child_count: Some(0),
        overview: Some(timer.overview()),
        series_timer_id: timer.id.clone(),
        ..Default::default()
    }
}
