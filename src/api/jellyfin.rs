//! Jellyfin REST client
//!
//! Implements `MediaServer` over the Jellyfin HTTP API. Authenticated with
//! an access token (`X-Emby-Token`); user-scoped endpoints use the configured
//! user id.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::query::{
    ArtistsQuery, ChannelsQuery, ItemQuery, LatestQuery, NextUpQuery, ProgramsQuery, QueryParams,
    RecordingsQuery, ResumeQuery, SeasonsQuery, SimilarQuery, UpcomingQuery,
};
use super::{ApiError, ApiResult, MediaServer};
use crate::models::{BaseItem, QueryResult, SeriesTimer, Timer, User, UserData};

const ITEM_FIELDS: &str = "Overview,People,MediaSources,MediaStreams,Chapters,RemoteTrailers,ChildCount,CanDelete";

/// Jellyfin API client
pub struct JellyfinClient {
    base_url: String,
    access_token: String,
    user_id: Uuid,
    server_id: Option<String>,
    client: reqwest::Client,
}

impl JellyfinClient {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>, user_id: Uuid) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            user_id,
            server_id: None,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Tag fetched items with this server's id
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn user(&self) -> String {
        self.user_id.simple().to_string()
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%method, %url, "Jellyfin request");

        let mut request = self
            .client
            .request(method, &url)
            .header("X-Emby-Token", &self.access_token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            status => Err(ApiError::ServerError(status.as_u16())),
        }
    }

    /// Authenticated GET, parsed as JSON
    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        let response = self.send(Method::GET, endpoint, None).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("JSON parse error: {}", e)))
    }

    /// POST/DELETE whose response body is ignored
    async fn execute(&self, method: Method, endpoint: &str) -> ApiResult<()> {
        self.send(method, endpoint, None).await.map(|_| ())
    }

    async fn post_json<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> ApiResult<()> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("JSON encode error: {}", e)))?;
        self.send(Method::POST, endpoint, Some(body)).await.map(|_| ())
    }

    async fn user_data(&self, method: Method, endpoint: &str) -> ApiResult<UserData> {
        let response = self.send(method, endpoint, None).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("JSON parse error: {}", e)))
    }

    fn annotate(&self, mut page: QueryResult<BaseItem>) -> QueryResult<BaseItem> {
        if let Some(server_id) = &self.server_id {
            for item in &mut page.items {
                item.annotate_server_id(server_id);
            }
        }
        page
    }

    fn annotate_list(&self, items: Vec<BaseItem>) -> Vec<BaseItem> {
        self.annotate(QueryResult::from_items(items)).items
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    async fn get_item(&self, id: Uuid) -> ApiResult<BaseItem> {
        let endpoint = format!(
            "/Users/{}/Items/{}?Fields={}",
            self.user(),
            id.simple(),
            ITEM_FIELDS
        );
        let mut item: BaseItem = self.get(&endpoint).await?;
        if let Some(server_id) = &self.server_id {
            item.annotate_server_id(server_id);
        }
        Ok(item)
    }

    async fn query_items(
        &self,
        query: &ItemQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = query.params(start, limit);
        params.push("UserId", self.user());
        let page = self
            .get(&format!("/Items{}", params.to_query_string()))
            .await?;
        Ok(self.annotate(page))
    }

    async fn similar(&self, query: &SimilarQuery) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = QueryParams::new();
        params.push("UserId", self.user()).push_opt("Limit", query.limit);
        let endpoint = format!(
            "/Items/{}/Similar{}",
            query.item_id.simple(),
            params.to_query_string()
        );
        let page = self.get(&endpoint).await?;
        Ok(self.annotate(page))
    }

    async fn specials(&self, item_id: Uuid) -> ApiResult<Vec<BaseItem>> {
        let endpoint = format!(
            "/Users/{}/Items/{}/SpecialFeatures",
            self.user(),
            item_id.simple()
        );
        let items = self.get(&endpoint).await?;
        Ok(self.annotate_list(items))
    }

    async fn additional_parts(&self, item_id: Uuid) -> ApiResult<QueryResult<BaseItem>> {
        let endpoint = format!(
            "/Videos/{}/AdditionalParts?UserId={}",
            item_id.simple(),
            self.user()
        );
        let page = self.get(&endpoint).await?;
        Ok(self.annotate(page))
    }

    async fn local_trailers(&self, item_id: Uuid) -> ApiResult<Vec<BaseItem>> {
        let endpoint = format!(
            "/Users/{}/Items/{}/LocalTrailers",
            self.user(),
            item_id.simple()
        );
        let items = self.get(&endpoint).await?;
        Ok(self.annotate_list(items))
    }

    async fn artists(
        &self,
        query: &ArtistsQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = query.params(start, limit);
        params.push("UserId", self.user());
        let page = self
            .get(&format!("/Artists{}", params.to_query_string()))
            .await?;
        Ok(self.annotate(page))
    }

    async fn album_artists(
        &self,
        query: &ArtistsQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = query.params(start, limit);
        params.push("UserId", self.user());
        let page = self
            .get(&format!("/Artists/AlbumArtists{}", params.to_query_string()))
            .await?;
        Ok(self.annotate(page))
    }

    async fn latest(&self, query: &LatestQuery) -> ApiResult<Vec<BaseItem>> {
        let mut params = QueryParams::new();
        params
            .push_opt("ParentId", query.parent_id.map(|id| id.simple().to_string()))
            .push_list(
                "IncludeItemTypes",
                query
                    .include_item_types
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            )
            .push_opt("Limit", query.limit);
        let endpoint = format!(
            "/Users/{}/Items/Latest{}",
            self.user(),
            params.to_query_string()
        );
        let items = self.get(&endpoint).await?;
        Ok(self.annotate_list(items))
    }

    async fn resume(&self, query: &ResumeQuery) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = QueryParams::new();
        params
            .push_opt("ParentId", query.parent_id.map(|id| id.simple().to_string()))
            .push_list(
                "MediaTypes",
                query
                    .media_types
                    .iter()
                    .map(|m| format!("{:?}", m))
                    .collect::<Vec<_>>()
                    .join(","),
            )
            .push_opt("Limit", query.limit);
        let endpoint = format!(
            "/Users/{}/Items/Resume{}",
            self.user(),
            params.to_query_string()
        );
        let page = self.get(&endpoint).await?;
        Ok(self.annotate(page))
    }

    async fn user_views(&self) -> ApiResult<QueryResult<BaseItem>> {
        let page = self.get(&format!("/Users/{}/Views", self.user())).await?;
        Ok(self.annotate(page))
    }

    async fn delete_item(&self, id: Uuid) -> ApiResult<()> {
        self.execute(Method::DELETE, &format!("/Items/{}", id.simple()))
            .await
    }

    async fn next_up(&self, query: &NextUpQuery) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = QueryParams::new();
        params
            .push("UserId", self.user())
            .push_opt("SeriesId", query.series_id.map(|id| id.simple().to_string()))
            .push_opt("ParentId", query.parent_id.map(|id| id.simple().to_string()))
            .push_opt("Limit", query.limit)
            .push("Fields", "Overview");
        let page = self
            .get(&format!("/Shows/NextUp{}", params.to_query_string()))
            .await?;
        Ok(self.annotate(page))
    }

    async fn seasons(&self, query: &SeasonsQuery) -> ApiResult<QueryResult<BaseItem>> {
        let endpoint = format!(
            "/Shows/{}/Seasons?UserId={}",
            query.series_id.simple(),
            self.user()
        );
        let page = self.get(&endpoint).await?;
        Ok(self.annotate(page))
    }

    async fn upcoming(&self, query: &UpcomingQuery) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = QueryParams::new();
        params
            .push("UserId", self.user())
            .push_opt("ParentId", query.parent_id.map(|id| id.simple().to_string()))
            .push_opt("Limit", query.limit);
        let page = self
            .get(&format!("/Shows/Upcoming{}", params.to_query_string()))
            .await?;
        Ok(self.annotate(page))
    }

    async fn adjacent_episodes(
        &self,
        series_id: Uuid,
        episode_id: Uuid,
    ) -> ApiResult<QueryResult<BaseItem>> {
        let endpoint = format!(
            "/Shows/{}/Episodes?UserId={}&AdjacentTo={}",
            series_id.simple(),
            self.user(),
            episode_id.simple()
        );
        let page = self.get(&endpoint).await?;
        Ok(self.annotate(page))
    }

    async fn get_channel(&self, id: Uuid) -> ApiResult<BaseItem> {
        let endpoint = format!("/LiveTv/Channels/{}?UserId={}", id.simple(), self.user());
        self.get(&endpoint).await
    }

    async fn get_program(&self, id: &str) -> ApiResult<BaseItem> {
        let endpoint = format!(
            "/LiveTv/Programs/{}?UserId={}",
            urlencoding::encode(id),
            self.user()
        );
        self.get(&endpoint).await
    }

    async fn live_tv_channels(
        &self,
        query: &ChannelsQuery,
        start: u32,
        limit: Option<u32>,
    ) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = QueryParams::new();
        params
            .push("UserId", self.user())
            .push_opt("IsFavorite", query.is_favorite)
            .push("StartIndex", start)
            .push_opt("Limit", limit);
        let page = self
            .get(&format!("/LiveTv/Channels{}", params.to_query_string()))
            .await?;
        Ok(self.annotate(page))
    }

    async fn recommended_programs(&self, query: &ProgramsQuery) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = QueryParams::new();
        params
            .push("UserId", self.user())
            .push_opt("IsAiring", query.is_airing)
            .push_opt("HasAired", query.has_aired)
            .push_opt("IsMovie", query.is_movie)
            .push_opt("IsSeries", query.is_series)
            .push_opt("IsSports", query.is_sports)
            .push_opt("Limit", query.limit);
        let page = self
            .get(&format!(
                "/LiveTv/Programs/Recommended{}",
                params.to_query_string()
            ))
            .await?;
        Ok(self.annotate(page))
    }

    async fn recordings(&self, query: &RecordingsQuery) -> ApiResult<QueryResult<BaseItem>> {
        let mut params = QueryParams::new();
        params
            .push("UserId", self.user())
            .push_opt("IsInProgress", query.is_in_progress)
            .push_opt("Limit", query.limit);
        let page = self
            .get(&format!("/LiveTv/Recordings{}", params.to_query_string()))
            .await?;
        Ok(self.annotate(page))
    }

    async fn series_timers(&self) -> ApiResult<QueryResult<SeriesTimer>> {
        self.get("/LiveTv/SeriesTimers").await
    }

    async fn get_series_timer(&self, id: &str) -> ApiResult<SeriesTimer> {
        self.get(&format!("/LiveTv/SeriesTimers/{}", urlencoding::encode(id)))
            .await
    }

    async fn timers_for_series(&self, series_timer_id: &str) -> ApiResult<QueryResult<Timer>> {
        self.get(&format!(
            "/LiveTv/Timers?SeriesTimerId={}",
            urlencoding::encode(series_timer_id)
        ))
        .await
    }

    async fn get_default_timer(&self, program_id: &str) -> ApiResult<SeriesTimer> {
        self.get(&format!(
            "/LiveTv/Timers/Defaults?ProgramId={}",
            urlencoding::encode(program_id)
        ))
        .await
    }

    async fn create_series_timer(&self, timer: &SeriesTimer) -> ApiResult<()> {
        self.post_json("/LiveTv/SeriesTimers", timer).await
    }

    async fn cancel_timer(&self, id: &str) -> ApiResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/LiveTv/Timers/{}", urlencoding::encode(id)),
        )
        .await
    }

    async fn cancel_series_timer(&self, id: &str) -> ApiResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/LiveTv/SeriesTimers/{}", urlencoding::encode(id)),
        )
        .await
    }

    async fn create_timer(&self, timer: &SeriesTimer) -> ApiResult<()> {
        self.post_json("/LiveTv/Timers", timer).await
    }

    async fn set_favorite(&self, item_id: Uuid, favorite: bool) -> ApiResult<UserData> {
        let method = if favorite { Method::POST } else { Method::DELETE };
        let endpoint = format!("/Users/{}/FavoriteItems/{}", self.user(), item_id.simple());
        self.user_data(method, &endpoint).await
    }

    async fn set_played(&self, item_id: Uuid, played: bool) -> ApiResult<UserData> {
        let method = if played { Method::POST } else { Method::DELETE };
        let endpoint = format!("/Users/{}/PlayedItems/{}", self.user(), item_id.simple());
        self.user_data(method, &endpoint).await
    }

    async fn current_user(&self) -> ApiResult<User> {
        self.get(&format!("/Users/{}", self.user())).await
    }
}
