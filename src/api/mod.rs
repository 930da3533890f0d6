//! Media server access
//!
//! - `MediaServer`: async seam every remote lookup goes through
//! - `JellyfinClient`: reqwest implementation for a Jellyfin server
//! - `query`: row query shapes

pub mod jellyfin;
pub mod query;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{BaseItem, QueryResult, SeriesTimer, Timer, User, UserData};

pub use jellyfin::JellyfinClient;
pub use query::{
    ArtistsQuery, ChannelsQuery, ItemFilter, ItemQuery, LatestQuery, NextUpQuery,
    ProgramsQuery, RecordingsQuery, ResumeQuery, RowQuery, RowQueryKind, SeasonsQuery,
    SimilarQuery, SortOption, SortOrder, UpcomingQuery,
};

/// Media server error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found (404)")]
    NotFound,

    #[error("Unauthorized (401)")]
    Unauthorized,

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Operations the detail screen and its rows need from a media server
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Identity used to annotate items fetched through this server
    fn server_id(&self) -> Option<&str> {
        None
    }

    // Items
    async fn get_item(&self, id: Uuid) -> ApiResult<BaseItem>;
    async fn query_items(
        &self,
        query: &ItemQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>>;
    async fn similar(&self, query: &SimilarQuery) -> ApiResult<QueryResult<BaseItem>>;
    async fn specials(&self, item_id: Uuid) -> ApiResult<Vec<BaseItem>>;
    async fn additional_parts(&self, item_id: Uuid) -> ApiResult<QueryResult<BaseItem>>;
    async fn local_trailers(&self, item_id: Uuid) -> ApiResult<Vec<BaseItem>>;
    async fn artists(
        &self,
        query: &ArtistsQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>>;
    async fn album_artists(
        &self,
        query: &ArtistsQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>>;
    async fn latest(&self, query: &LatestQuery) -> ApiResult<Vec<BaseItem>>;
    async fn resume(&self, query: &ResumeQuery) -> ApiResult<QueryResult<BaseItem>>;
    async fn user_views(&self) -> ApiResult<QueryResult<BaseItem>>;
    async fn delete_item(&self, id: Uuid) -> ApiResult<()>;

    // Shows
    async fn next_up(&self, query: &NextUpQuery) -> ApiResult<QueryResult<BaseItem>>;
    async fn seasons(&self, query: &SeasonsQuery) -> ApiResult<QueryResult<BaseItem>>;
    async fn upcoming(&self, query: &UpcomingQuery) -> ApiResult<QueryResult<BaseItem>>;
    /// Episodes adjacent to `episode_id` within its series (previous, self, next)
    async fn adjacent_episodes(
        &self,
        series_id: Uuid,
        episode_id: Uuid,
    ) -> ApiResult<QueryResult<BaseItem>>;

    // Live TV
    async fn get_channel(&self, id: Uuid) -> ApiResult<BaseItem>;
    async fn get_program(&self, id: &str) -> ApiResult<BaseItem>;
    async fn live_tv_channels(
        &self,
        query: &ChannelsQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>>;
    async fn recommended_programs(&self, query: &ProgramsQuery) -> ApiResult<QueryResult<BaseItem>>;
    async fn recordings(&self, query: &RecordingsQuery) -> ApiResult<QueryResult<BaseItem>>;
    async fn series_timers(&self) -> ApiResult<QueryResult<SeriesTimer>>;
    async fn get_series_timer(&self, id: &str) -> ApiResult<SeriesTimer>;
    async fn timers_for_series(&self, series_timer_id: &str) -> ApiResult<QueryResult<Timer>>;
    /// Server defaults for a new recording of `program_id`
    async fn get_default_timer(&self, program_id: &str) -> ApiResult<SeriesTimer>;
    async fn create_series_timer(&self, timer: &SeriesTimer) -> ApiResult<()>;
    async fn cancel_timer(&self, id: &str) -> ApiResult<()>;
    async fn cancel_series_timer(&self, id: &str) -> ApiResult<()>;
    /// Record a single program using the server's default timer settings
    async fn create_timer(&self, timer: &SeriesTimer) -> ApiResult<()>;

    // User data
    async fn set_favorite(&self, item_id: Uuid, favorite: bool) -> ApiResult<UserData>;
    async fn set_played(&self, item_id: Uuid, played: bool) -> ApiResult<UserData>;
    async fn current_user(&self) -> ApiResult<User>;
}

/// Resolves a per-server client for multi-server navigation
pub trait ServerDirectory: Send + Sync {
    fn client_for(&self, server_id: &str) -> Option<Arc<dyn MediaServer>>;
}

/// Fixed map of server id -> client
#[derive(Default, Clone)]
pub struct StaticServerDirectory {
    clients: HashMap<String, Arc<dyn MediaServer>>,
}

impl StaticServerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, server_id: impl Into<String>, client: Arc<dyn MediaServer>) {
        self.clients.insert(server_id.into(), client);
    }
}

impl ServerDirectory for StaticServerDirectory {
    fn client_for(&self, server_id: &str) -> Option<Arc<dyn MediaServer>> {
        self.clients.get(server_id).cloned()
    }
}

/// Pick the client for a screen: explicit server if resolvable, else the session default
pub fn resolve_client(
    directory: &dyn ServerDirectory,
    server_id: Option<&str>,
    default: Arc<dyn MediaServer>,
) -> Arc<dyn MediaServer> {
    match server_id {
        Some(id) => match directory.client_for(id) {
            Some(client) => client,
            None => {
                tracing::warn!(server_id = id, "No client for server, using session client");
                default
            }
        },
        None => default,
    }
}
