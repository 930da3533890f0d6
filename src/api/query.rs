//! Row query shapes
//!
//! One `RowQuery` variant per data source a row can be backed by. The variant
//! is fixed when the row is built; only its parameters (sort, filters, start
//! letter) can change afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::{BaseItem, ChapterItem, ItemKind, MediaType, Person};

// =============================================================================
// Sorting and filtering
// =============================================================================

/// Sort field used by name-ordered rows; sorting by anything else clears the start letter
pub const SORT_NAME: &str = "SortName";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "Ascending",
            SortOrder::Descending => "Descending",
        }
    }
}

/// Sort field + order pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOption {
    pub field: String,
    pub order: SortOrder,
}

impl SortOption {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn is_by_name(&self) -> bool {
        self.field == SORT_NAME
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemFilter {
    IsPlayed,
    IsUnplayed,
    IsFavorite,
    IsResumable,
    Likes,
}

impl ItemFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemFilter::IsPlayed => "IsPlayed",
            ItemFilter::IsUnplayed => "IsUnplayed",
            ItemFilter::IsFavorite => "IsFavorite",
            ItemFilter::IsResumable => "IsResumable",
            ItemFilter::Likes => "Likes",
        }
    }
}

fn join<T, F: Fn(&T) -> String>(values: &[T], f: F) -> String {
    values.iter().map(f).collect::<Vec<_>>().join(",")
}

/// Accumulates `key=value` pairs into an encoded query string
#[derive(Debug, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn push_opt<V: ToString>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(key, v);
        }
        self
    }

    pub fn push_list(&mut self, key: &str, value: String) -> &mut Self {
        if !value.is_empty() {
            self.push(key, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `?a=b&c=d` (empty string when no params)
    pub fn to_query_string(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        format!("?{}", pairs.join("&"))
    }
}

// =============================================================================
// Query shapes
// =============================================================================

/// Generic `/Items` query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    pub parent_id: Option<Uuid>,
    pub include_item_types: Vec<ItemKind>,
    pub exclude_item_types: Vec<ItemKind>,
    pub media_types: Vec<MediaType>,
    pub recursive: bool,
    pub sort_by: Vec<String>,
    pub sort_order: Option<SortOrder>,
    pub filters: Vec<ItemFilter>,
    pub name_starts_with: Option<String>,
    pub person_ids: Vec<Uuid>,
    pub artist_ids: Vec<Uuid>,
    pub is_favorite: Option<bool>,
    /// Explicit window; used by `Retrieve` only when both are set
    pub start_index: Option<u32>,
    pub limit: Option<u32>,
}

impl ItemQuery {
    pub fn params(&self, start: u32, limit: Option<u32>) -> QueryParams {
        let mut p = QueryParams::new();
        p.push_opt("ParentId", self.parent_id.map(|id| id.simple().to_string()))
            .push_list("IncludeItemTypes", join(&self.include_item_types, |k| k.as_str().into()))
            .push_list("ExcludeItemTypes", join(&self.exclude_item_types, |k| k.as_str().into()))
            .push_list("MediaTypes", join(&self.media_types, |m| format!("{:?}", m)))
            .push_list("SortBy", self.sort_by.join(","))
            .push_opt("SortOrder", self.sort_order.map(|o| o.as_str()))
            .push_list("Filters", join(&self.filters, |f| f.as_str().into()))
            .push_opt("NameStartsWith", self.name_starts_with.as_deref())
            .push_list("PersonIds", join(&self.person_ids, |id| id.simple().to_string()))
            .push_list("ArtistIds", join(&self.artist_ids, |id| id.simple().to_string()))
            .push_opt("IsFavorite", self.is_favorite);
        if self.recursive {
            p.push("Recursive", true);
        }
        p.push("StartIndex", start);
        p.push_opt("Limit", limit);
        p.push("Fields", "Overview,PrimaryImageAspectRatio,ChildCount");
        p
    }

    /// Items featuring a person, restricted to one kind
    pub fn by_person(person_id: Uuid, kind: ItemKind) -> Self {
        Self {
            person_ids: vec![person_id],
            include_item_types: vec![kind],
            recursive: true,
            sort_by: vec![SORT_NAME.to_string()],
            ..Default::default()
        }
    }

    /// Albums by an artist
    pub fn albums_by_artist(artist_id: Uuid) -> Self {
        Self {
            artist_ids: vec![artist_id],
            include_item_types: vec![ItemKind::MusicAlbum],
            recursive: true,
            sort_by: vec!["ProductionYear".to_string(), SORT_NAME.to_string()],
            sort_order: Some(SortOrder::Descending),
            ..Default::default()
        }
    }
}

/// `/Artists` and `/Artists/AlbumArtists` query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistsQuery {
    pub parent_id: Option<Uuid>,
    pub sort_by: Vec<String>,
    pub sort_order: Option<SortOrder>,
    pub filters: Vec<ItemFilter>,
    pub name_starts_with: Option<String>,
}

impl ArtistsQuery {
    pub fn params(&self, start: u32, limit: Option<u32>) -> QueryParams {
        let mut p = QueryParams::new();
        p.push_opt("ParentId", self.parent_id.map(|id| id.simple().to_string()))
            .push_list("SortBy", self.sort_by.join(","))
            .push_opt("SortOrder", self.sort_order.map(|o| o.as_str()))
            .push_list("Filters", join(&self.filters, |f| f.as_str().into()))
            .push_opt("NameStartsWith", self.name_starts_with.as_deref())
            .push("StartIndex", start)
            .push_opt("Limit", limit);
        p
    }
}

/// `/Shows/NextUp`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NextUpQuery {
    pub series_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub limit: Option<u32>,
}

/// `/Shows/{id}/Seasons`
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonsQuery {
    pub series_id: Uuid,
}

/// `/Shows/Upcoming`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpcomingQuery {
    pub parent_id: Option<Uuid>,
    pub limit: Option<u32>,
}

/// `/Items/{id}/Similar`
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarQuery {
    pub item_id: Uuid,
    pub limit: Option<u32>,
}

/// `/LiveTv/Channels`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelsQuery {
    pub is_favorite: Option<bool>,
}

/// `/LiveTv/Programs/Recommended`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramsQuery {
    pub is_airing: Option<bool>,
    pub has_aired: Option<bool>,
    pub is_movie: Option<bool>,
    pub is_series: Option<bool>,
    pub is_sports: Option<bool>,
    pub limit: Option<u32>,
}

/// `/LiveTv/Recordings`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingsQuery {
    pub is_in_progress: Option<bool>,
    pub limit: Option<u32>,
}

/// `/Users/{u}/Items/Latest`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestQuery {
    pub parent_id: Option<Uuid>,
    pub include_item_types: Vec<ItemKind>,
    pub limit: Option<u32>,
}

/// `/Users/{u}/Items/Resume`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeQuery {
    pub parent_id: Option<Uuid>,
    pub media_types: Vec<MediaType>,
    pub limit: Option<u32>,
}

// =============================================================================
// RowQuery
// =============================================================================

/// Data source backing one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowQuery {
    Items(ItemQuery),
    NextUp(NextUpQuery),
    Seasons(SeasonsQuery),
    Upcoming(UpcomingQuery),
    SimilarMovies(SimilarQuery),
    SimilarSeries(SimilarQuery),
    Specials { item_id: Uuid },
    AdditionalParts { item_id: Uuid },
    Trailers { item_id: Uuid },
    LiveTvChannels(ChannelsQuery),
    LiveTvPrograms(ProgramsQuery),
    LiveTvRecordings(RecordingsQuery),
    Artists(ArtistsQuery),
    AlbumArtists(ArtistsQuery),
    Latest(LatestQuery),
    Resume(ResumeQuery),
    MergedContinueWatching { resume: ResumeQuery, next_up: NextUpQuery },
    Views,
    SeriesTimers { can_manage: bool },
    Premieres(ItemQuery),
    AudioPlaylists(ItemQuery),
    Schedule { series_timer_id: String },
    StaticPeople(Vec<Person>),
    StaticChapters(Vec<ChapterItem>),
    StaticItems(Vec<BaseItem>),
}

/// Tag of a `RowQuery` variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowQueryKind {
    Items,
    NextUp,
    Seasons,
    Upcoming,
    SimilarMovies,
    SimilarSeries,
    Specials,
    AdditionalParts,
    Trailers,
    LiveTvChannels,
    LiveTvPrograms,
    LiveTvRecordings,
    Artists,
    AlbumArtists,
    Latest,
    Resume,
    MergedContinueWatching,
    Views,
    SeriesTimers,
    Premieres,
    AudioPlaylists,
    Schedule,
    StaticPeople,
    StaticChapters,
    StaticItems,
}

impl fmt::Display for RowQueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl RowQuery {
    pub fn kind(&self) -> RowQueryKind {
        match self {
            RowQuery::Items(_) => RowQueryKind::Items,
            RowQuery::NextUp(_) => RowQueryKind::NextUp,
            RowQuery::Seasons(_) => RowQueryKind::Seasons,
            RowQuery::Upcoming(_) => RowQueryKind::Upcoming,
            RowQuery::SimilarMovies(_) => RowQueryKind::SimilarMovies,
            RowQuery::SimilarSeries(_) => RowQueryKind::SimilarSeries,
            RowQuery::Specials { .. } => RowQueryKind::Specials,
            RowQuery::AdditionalParts { .. } => RowQueryKind::AdditionalParts,
            RowQuery::Trailers { .. } => RowQueryKind::Trailers,
            RowQuery::LiveTvChannels(_) => RowQueryKind::LiveTvChannels,
            RowQuery::LiveTvPrograms(_) => RowQueryKind::LiveTvPrograms,
            RowQuery::LiveTvRecordings(_) => RowQueryKind::LiveTvRecordings,
            RowQuery::Artists(_) => RowQueryKind::Artists,
            RowQuery::AlbumArtists(_) => RowQueryKind::AlbumArtists,
            RowQuery::Latest(_) => RowQueryKind::Latest,
            RowQuery::Resume(_) => RowQueryKind::Resume,
            RowQuery::MergedContinueWatching { .. } => RowQueryKind::MergedContinueWatching,
            RowQuery::Views => RowQueryKind::Views,
            RowQuery::SeriesTimers { .. } => RowQueryKind::SeriesTimers,
            RowQuery::Premieres(_) => RowQueryKind::Premieres,
            RowQuery::AudioPlaylists(_) => RowQueryKind::AudioPlaylists,
            RowQuery::Schedule { .. } => RowQueryKind::Schedule,
            RowQuery::StaticPeople(_) => RowQueryKind::StaticPeople,
            RowQuery::StaticChapters(_) => RowQueryKind::StaticChapters,
            RowQuery::StaticItems(_) => RowQueryKind::StaticItems,
        }
    }

    /// Backed by an in-memory list (no network fetch)
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            RowQuery::StaticPeople(_) | RowQuery::StaticChapters(_) | RowQuery::StaticItems(_)
        )
    }

    /// Shapes that page through `retrieve_next`
    pub fn is_pageable(&self) -> bool {
        matches!(
            self,
            RowQuery::Items(_)
                | RowQuery::LiveTvChannels(_)
                | RowQuery::Artists(_)
                | RowQuery::AlbumArtists(_)
        )
    }

    /// Explicit window carried by a generic items query
    pub fn explicit_window(&self) -> Option<(u32, u32)> {
        match self {
            RowQuery::Items(q) => match (q.start_index, q.limit) {
                (Some(start), Some(limit)) => Some((start, limit)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Rewrite the sort of artist / album-artist / generic item queries.
    /// Returns false for shapes that carry no sort.
    pub fn apply_sort(&mut self, sort: &SortOption) -> bool {
        match self {
            RowQuery::Artists(q) | RowQuery::AlbumArtists(q) => {
                q.sort_by = vec![sort.field.clone()];
                q.sort_order = Some(sort.order);
                true
            }
            RowQuery::Items(q) | RowQuery::Premieres(q) | RowQuery::AudioPlaylists(q) => {
                q.sort_by = vec![sort.field.clone()];
                q.sort_order = Some(sort.order);
                true
            }
            _ => false,
        }
    }

    pub fn apply_filters(&mut self, filters: &[ItemFilter]) -> bool {
        match self {
            RowQuery::Artists(q) | RowQuery::AlbumArtists(q) => {
                q.filters = filters.to_vec();
                true
            }
            RowQuery::Items(q) | RowQuery::Premieres(q) | RowQuery::AudioPlaylists(q) => {
                q.filters = filters.to_vec();
                true
            }
            _ => false,
        }
    }

    /// Current name-prefix filter
    pub fn start_letter(&self) -> Option<&str> {
        match self {
            RowQuery::Artists(q) | RowQuery::AlbumArtists(q) => q.name_starts_with.as_deref(),
            RowQuery::Items(q) | RowQuery::Premieres(q) | RowQuery::AudioPlaylists(q) => {
                q.name_starts_with.as_deref()
            }
            _ => None,
        }
    }

    /// Set the name-prefix filter; `"#"` clears it
    pub fn set_start_letter(&mut self, letter: Option<&str>) {
        let value = match letter {
            Some("#") | None => None,
            Some(l) => Some(l.to_string()),
        };
        match self {
            RowQuery::Artists(q) | RowQuery::AlbumArtists(q) => q.name_starts_with = value,
            RowQuery::Items(q) | RowQuery::Premieres(q) | RowQuery::AudioPlaylists(q) => {
                q.name_starts_with = value
            }
            _ => {}
        }
    }
}
