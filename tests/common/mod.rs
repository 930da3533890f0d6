//! Shared fixtures for integration tests
//!
//! `StubServer` answers `MediaServer` calls from in-memory tables and
//! records every call so tests can assert on traffic.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tvdetail::api::query::{
    ArtistsQuery, ChannelsQuery, ItemQuery, LatestQuery, NextUpQuery, ProgramsQuery,
    RecordingsQuery, ResumeQuery, SeasonsQuery, SimilarQuery, UpcomingQuery,
};
use tvdetail::api::{ApiError, ApiResult, MediaServer};
use tvdetail::config::Preferences;
use tvdetail::detail::DetailContext;
use tvdetail::models::{BaseItem, ItemKind, QueryResult, SeriesTimer, Timer, User, UserData};
use tvdetail::services::{
    DataRefreshService, MemoryWatchlist, MessageLog, NavigationStack, PlayQueue, UserSession,
};

pub const SERVER_ID: &str = "home";

#[derive(Default)]
pub struct StubState {
    pub items: HashMap<Uuid, BaseItem>,
    pub channels: HashMap<Uuid, BaseItem>,
    pub programs: HashMap<String, BaseItem>,
    pub similar: Vec<BaseItem>,
    pub next_up: Vec<BaseItem>,
    pub seasons: Vec<BaseItem>,
    pub adjacent: Vec<BaseItem>,
    pub specials: Vec<BaseItem>,
    pub trailers: Vec<BaseItem>,
    /// Items served by `query_items`, paged by start/limit
    pub library: Vec<BaseItem>,
    pub series_timers: HashMap<String, SeriesTimer>,
    pub schedule: Vec<Timer>,
    pub user: User,
    pub calls: Vec<String>,
    pub deleted: Vec<Uuid>,
    pub fail_deletes: bool,
}

#[derive(Default, Clone)]
pub struct StubServer {
    pub state: Arc<Mutex<StubState>>,
}

impl StubServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, item: BaseItem) -> Self {
        self.state.lock().unwrap().items.insert(item.id, item);
        self
    }

    pub fn update(&self, f: impl FnOnce(&mut StubState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn page(items: Vec<BaseItem>) -> ApiResult<QueryResult<BaseItem>> {
        Ok(QueryResult::from_items(items))
    }
}

#[async_trait]
impl MediaServer for StubServer {
    async fn get_item(&self, id: Uuid) -> ApiResult<BaseItem> {
        self.log(format!("get_item {}", id));
        self.state
            .lock()
            .unwrap()
            .items
            .get(&id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn query_items(
        &self,
        _query: &ItemQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>> {
        self.log(format!("query_items {} {:?}", start, limit));
        let library = self.state.lock().unwrap().library.clone();
        let total = library.len() as u32;
        let items: Vec<BaseItem> = library
            .into_iter()
            .skip(start as usize)
            .take(limit.map(|l| l as usize).unwrap_or(usize::MAX))
            .collect();
        Ok(QueryResult {
            items,
            total_record_count: total,
            start_index: start,
        })
    }

    async fn similar(&self, query: &SimilarQuery) -> ApiResult<QueryResult<BaseItem>> {
        self.log(format!("similar {}", query.item_id));
        Self::page(self.state.lock().unwrap().similar.clone())
    }

    async fn specials(&self, item_id: Uuid) -> ApiResult<Vec<BaseItem>> {
        self.log(format!("specials {}", item_id));
        Ok(self.state.lock().unwrap().specials.clone())
    }

    async fn additional_parts(&self, item_id: Uuid) -> ApiResult<QueryResult<BaseItem>> {
        self.log(format!("additional_parts {}", item_id));
        Self::page(Vec::new())
    }

    async fn local_trailers(&self, item_id: Uuid) -> ApiResult<Vec<BaseItem>> {
        self.log(format!("local_trailers {}", item_id));
        Ok(self.state.lock().unwrap().trailers.clone())
    }

    async fn artists(&self, _: &ArtistsQuery, _: u32, _: Option<u32>) -> ApiResult<QueryResult<BaseItem>> {
        Self::page(Vec::new())
    }

    async fn album_artists(&self, _: &ArtistsQuery, _: u32, _: Option<u32>) -> ApiResult<QueryResult<BaseItem>> {
        Self::page(Vec::new())
    }

    async fn latest(&self, _: &LatestQuery) -> ApiResult<Vec<BaseItem>> {
        Ok(Vec::new())
    }

    async fn resume(&self, _: &ResumeQuery) -> ApiResult<QueryResult<BaseItem>> {
        Self::page(Vec::new())
    }

    async fn user_views(&self) -> ApiResult<QueryResult<BaseItem>> {
        Self::page(Vec::new())
    }

    async fn delete_item(&self, id: Uuid) -> ApiResult<()> {
        self.log(format!("delete_item {}", id));
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(ApiError::ServerError(500));
        }
        state.deleted.push(id);
        Ok(())
    }

    async fn next_up(&self, _: &NextUpQuery) -> ApiResult<QueryResult<BaseItem>> {
        self.log("next_up".to_string());
        Self::page(self.state.lock().unwrap().next_up.clone())
    }

    async fn seasons(&self, _: &SeasonsQuery) -> ApiResult<QueryResult<BaseItem>> {
        self.log("seasons".to_string());
        Self::page(self.state.lock().unwrap().seasons.clone())
    }

    async fn upcoming(&self, _: &UpcomingQuery) -> ApiResult<QueryResult<BaseItem>> {
        self.log("upcoming".to_string());
        Self::page(Vec::new())
    }

    async fn adjacent_episodes(&self, _: Uuid, _: Uuid) -> ApiResult<QueryResult<BaseItem>> {
        self.log("adjacent_episodes".to_string());
        Self::page(self.state.lock().unwrap().adjacent.clone())
    }

    async fn get_channel(&self, id: Uuid) -> ApiResult<BaseItem> {
        self.log(format!("get_channel {}", id));
        self.state
            .lock()
            .unwrap()
            .channels
            .get(&id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn get_program(&self, id: &str) -> ApiResult<BaseItem> {
        self.log(format!("get_program {}", id));
        self.state
            .lock()
            .unwrap()
            .programs
            .get(id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn live_tv_channels(&self, _: &ChannelsQuery, _: u32, _: Option<u32>) -> ApiResult<QueryResult<BaseItem>> {
        Self::page(Vec::new())
    }

    async fn recommended_programs(&self, _: &ProgramsQuery) -> ApiResult<QueryResult<BaseItem>> {
        Self::page(Vec::new())
    }

    async fn recordings(&self, _: &RecordingsQuery) -> ApiResult<QueryResult<BaseItem>> {
        Self::page(Vec::new())
    }

    async fn series_timers(&self) -> ApiResult<QueryResult<SeriesTimer>> {
        let timers = self.state.lock().unwrap().series_timers.values().cloned().collect();
        Ok(QueryResult::from_items(timers))
    }

    async fn get_series_timer(&self, id: &str) -> ApiResult<SeriesTimer> {
        self.log(format!("get_series_timer {}", id));
        self.state
            .lock()
            .unwrap()
            .series_timers
            .get(id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn timers_for_series(&self, series_timer_id: &str) -> ApiResult<QueryResult<Timer>> {
        self.log(format!("timers_for_series {}", series_timer_id));
        Ok(QueryResult::from_items(self.state.lock().unwrap().schedule.clone()))
    }

    async fn get_default_timer(&self, program_id: &str) -> ApiResult<SeriesTimer> {
        self.log(format!("get_default_timer {}", program_id));
        Ok(SeriesTimer {
            program_id: Some(program_id.to_string()),
            ..Default::default()
        })
    }

    async fn create_series_timer(&self, timer: &SeriesTimer) -> ApiResult<()> {
        self.log(format!("create_series_timer {:?}", timer.program_id));
        let mut state = self.state.lock().unwrap();
        if let Some(program) = timer.program_id.as_ref().and_then(|id| state.programs.get_mut(id)) {
            program.series_timer_id = Some("series-1".to_string());
            program.timer_id = Some("timer-1".to_string());
        }
        Ok(())
    }

    async fn cancel_timer(&self, id: &str) -> ApiResult<()> {
        self.log(format!("cancel_timer {}", id));
        Ok(())
    }

    async fn cancel_series_timer(&self, id: &str) -> ApiResult<()> {
        self.log(format!("cancel_series_timer {}", id));
        Ok(())
    }

    async fn create_timer(&self, timer: &SeriesTimer) -> ApiResult<()> {
        self.log(format!("create_timer {:?}", timer.program_id));
        let mut state = self.state.lock().unwrap();
        if let Some(program) = timer.program_id.as_ref().and_then(|id| state.programs.get_mut(id)) {
            program.timer_id = Some("timer-1".to_string());
        }
        Ok(())
    }

    async fn set_favorite(&self, item_id: Uuid, favorite: bool) -> ApiResult<UserData> {
        self.log(format!("set_favorite {} {}", item_id, favorite));
        Ok(UserData {
            is_favorite: favorite,
            ..Default::default()
        })
    }

    async fn set_played(&self, item_id: Uuid, played: bool) -> ApiResult<UserData> {
        self.log(format!("set_played {} {}", item_id, played));
        Ok(UserData {
            played,
            ..Default::default()
        })
    }

    async fn current_user(&self) -> ApiResult<User> {
        Ok(self.state.lock().unwrap().user.clone())
    }
}

/// In-memory collaborators handed to a controller, kept for assertions
pub struct Harness {
    pub server: StubServer,
    pub navigator: Arc<NavigationStack>,
    pub messages: Arc<MessageLog>,
    pub playback: Arc<PlayQueue>,
    pub watchlist: Arc<MemoryWatchlist>,
    pub refresh: Arc<DataRefreshService>,
    pub session: Arc<UserSession>,
    pub preferences: Preferences,
}

impl Harness {
    pub fn new(server: StubServer) -> Self {
        Self {
            server,
            navigator: Arc::new(NavigationStack::with_root(tvdetail::services::Destination::Home)),
            messages: Arc::new(MessageLog::new()),
            playback: Arc::new(PlayQueue::new()),
            watchlist: Arc::new(MemoryWatchlist::new()),
            refresh: Arc::new(DataRefreshService::new()),
            session: Arc::new(UserSession::new(Some(User::default()), Some(SERVER_ID.to_string()))),
            preferences: Preferences::default(),
        }
    }

    pub fn context(&self) -> DetailContext {
        DetailContext {
            server: Arc::new(self.server.clone()),
            navigator: self.navigator.clone(),
            messages: self.messages.clone(),
            playback: self.playback.clone(),
            watchlist: self.watchlist.clone(),
            refresh: self.refresh.clone(),
            session: self.session.clone(),
            preferences: self.preferences.clone(),
        }
    }
}

pub fn item(kind: ItemKind, name: &str) -> BaseItem {
    BaseItem {
        id: Uuid::new_v4(),
        name: name.to_string(),
        kind,
        user_data: Some(UserData::default()),
        ..Default::default()
    }
}
