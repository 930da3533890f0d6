//! Data structures and types for tvdetail
//!
//! Mirrors the subset of the Jellyfin item model the detail screen needs,
//! organized by domain:
//! - **Items**: the displayed subject, its user data and relations
//! - **Media**: sources, streams and chapters
//! - **Live TV**: program context and series timers
//! - **Paging**: query result envelopes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Jellyfin ticks are 100ns units
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

// =============================================================================
// Item Models
// =============================================================================

/// Closed set of item kinds the client distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemKind {
    Movie,
    Series,
    Season,
    Episode,
    Person,
    MusicArtist,
    MusicAlbum,
    Audio,
    Playlist,
    BoxSet,
    Folder,
    CollectionFolder,
    Video,
    Recording,
    Program,
    TvChannel,
    Trailer,
    MusicVideo,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ItemKind {
    /// Server-side name used in `IncludeItemTypes`
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "Movie",
            ItemKind::Series => "Series",
            ItemKind::Season => "Season",
            ItemKind::Episode => "Episode",
            ItemKind::Person => "Person",
            ItemKind::MusicArtist => "MusicArtist",
            ItemKind::MusicAlbum => "MusicAlbum",
            ItemKind::Audio => "Audio",
            ItemKind::Playlist => "Playlist",
            ItemKind::BoxSet => "BoxSet",
            ItemKind::Folder => "Folder",
            ItemKind::CollectionFolder => "CollectionFolder",
            ItemKind::Video => "Video",
            ItemKind::Recording => "Recording",
            ItemKind::Program => "Program",
            ItemKind::TvChannel => "TvChannel",
            ItemKind::Trailer => "Trailer",
            ItemKind::MusicVideo => "MusicVideo",
            ItemKind::Unknown => "Unknown",
        }
    }

    /// Kinds whose detail screen carries an action bar
    pub fn has_actions(&self) -> bool {
        matches!(
            self,
            ItemKind::Episode
                | ItemKind::Movie
                | ItemKind::Series
                | ItemKind::Season
                | ItemKind::Folder
                | ItemKind::Video
                | ItemKind::Recording
                | ItemKind::Program
                | ItemKind::Trailer
                | ItemKind::MusicArtist
                | ItemKind::Person
                | ItemKind::MusicVideo
        )
    }

    /// Video kinds that get audio/subtitle selectors and the watchlist button
    pub fn is_video(&self) -> bool {
        matches!(self, ItemKind::Movie | ItemKind::Episode | ItemKind::Video)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Media type reported alongside the kind (used for audio playlists)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MediaType {
    Video,
    Audio,
    Photo,
    Book,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Per-user play state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserData {
    #[serde(default)]
    pub played: bool,
    #[serde(default)]
    pub playback_position_ticks: i64,
    #[serde(default)]
    pub played_percentage: Option<f64>,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Role of a person attached to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PersonKind {
    Actor,
    Director,
    Writer,
    Producer,
    GuestStar,
    Composer,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Person credited on an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: PersonKind,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(role) if !role.is_empty() => write!(f, "{} ({})", self.name, role),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Externally hosted trailer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteTrailer {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Media Models
// =============================================================================

/// Stream type within a media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    #[default]
    #[serde(other)]
    Other,
}

/// One elementary stream of a media source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStream {
    #[serde(rename = "Type", default)]
    pub kind: StreamKind,
    pub index: i32,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
}

impl fmt::Display for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(title) = &self.display_title {
            return write!(f, "{}", title);
        }
        let codec = self.codec.as_deref().unwrap_or("?");
        match &self.language {
            Some(lang) => write!(f, "{} ({})", codec, lang),
            None => write!(f, "{}", codec),
        }
    }
}

/// A playable version of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub media_streams: Vec<MediaStream>,
}

impl MediaSource {
    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &MediaStream> {
        self.media_streams.iter().filter(move |s| s.kind == kind)
    }
}

/// Chapter marker as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chapter {
    pub start_position_ticks: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_tag: Option<String>,
}

/// Chapter as shown in a row: bound to its item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterItem {
    pub item_id: Uuid,
    pub index: usize,
    pub name: String,
    pub start_position_ticks: i64,
    pub image_tag: Option<String>,
}

impl ChapterItem {
    pub fn start_ms(&self) -> i64 {
        self.start_position_ticks / TICKS_PER_MILLISECOND
    }
}

// =============================================================================
// BaseItem (DetailSubject)
// =============================================================================

/// A media item as returned by the server
///
/// This is the detail screen's subject and also the element type of most
/// related rows. Live TV programs carry their schedule and timer ids here too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BaseItem {
    pub id: Uuid,
    pub name: String,
    pub server_id: Option<String>,
    #[serde(rename = "Type")]
    pub kind: ItemKind,
    pub media_type: MediaType,
    pub is_folder: Option<bool>,
    pub overview: Option<String>,
    pub run_time_ticks: Option<i64>,
    pub production_year: Option<i32>,
    pub official_rating: Option<String>,
    pub user_data: Option<UserData>,

    // Relations
    pub series_id: Option<Uuid>,
    pub series_name: Option<String>,
    pub season_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub index_number: Option<i32>,
    pub child_count: Option<i32>,

    // Extras
    pub part_count: Option<i32>,
    pub special_feature_count: Option<i32>,
    pub local_trailer_count: Option<i32>,
    pub remote_trailers: Vec<RemoteTrailer>,
    pub people: Vec<Person>,
    pub media_sources: Vec<MediaSource>,
    pub chapters: Vec<Chapter>,
    pub can_delete: Option<bool>,

    // Live TV
    pub channel_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub timer_id: Option<String>,
    pub series_timer_id: Option<String>,
    pub is_series: Option<bool>,
    pub is_sports: Option<bool>,
    pub current_program: Option<Box<BaseItem>>,
}

impl BaseItem {
    pub fn is_folder(&self) -> bool {
        self.is_folder.unwrap_or(false)
    }

    pub fn played(&self) -> bool {
        self.user_data.as_ref().map(|u| u.played).unwrap_or(false)
    }

    pub fn is_favorite(&self) -> bool {
        self.user_data.as_ref().map(|u| u.is_favorite).unwrap_or(false)
    }

    pub fn playback_position_ticks(&self) -> i64 {
        self.user_data
            .as_ref()
            .map(|u| u.playback_position_ticks)
            .unwrap_or(0)
    }

    pub fn playback_position_ms(&self) -> i64 {
        self.playback_position_ticks() / TICKS_PER_MILLISECOND
    }

    /// A saved position exists
    pub fn can_resume(&self) -> bool {
        self.playback_position_ticks() > 0
    }

    /// Played percentage is reported and non-zero
    pub fn is_started(&self) -> bool {
        self.user_data
            .as_ref()
            .and_then(|u| u.played_percentage)
            .map(|p| p > 0.0)
            .unwrap_or(false)
    }

    pub fn can_play(&self) -> bool {
        match self.kind {
            ItemKind::Person | ItemKind::Unknown => false,
            _ if self.is_folder() => self.child_count.map(|c| c > 0).unwrap_or(true),
            _ => true,
        }
    }

    pub fn is_live_tv(&self) -> bool {
        matches!(self.kind, ItemKind::TvChannel | ItemKind::Program)
    }

    pub fn is_music(&self) -> bool {
        matches!(
            self.kind,
            ItemKind::MusicAlbum | ItemKind::MusicArtist | ItemKind::Audio
        ) || (self.kind == ItemKind::Playlist && self.media_type == MediaType::Audio)
    }

    pub fn has_playable_trailers(&self) -> bool {
        self.local_trailer_count.unwrap_or(0) > 0 || !self.remote_trailers.is_empty()
    }

    /// First person credited with the given role
    pub fn first_person(&self, kind: PersonKind) -> Option<&Person> {
        self.people.iter().find(|p| p.kind == kind)
    }

    /// Audio streams of the primary media source
    pub fn audio_track_count(&self) -> usize {
        self.media_sources
            .first()
            .map(|s| s.streams_of(StreamKind::Audio).count())
            .unwrap_or(0)
    }

    /// Subtitle streams of the primary media source
    pub fn subtitle_track_count(&self) -> usize {
        self.media_sources
            .first()
            .map(|s| s.streams_of(StreamKind::Subtitle).count())
            .unwrap_or(0)
    }

    /// Chapters bound to this item for display in a row
    pub fn chapter_items(&self) -> Vec<ChapterItem> {
        self.chapters
            .iter()
            .enumerate()
            .map(|(index, chapter)| ChapterItem {
                item_id: self.id,
                index,
                name: chapter
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Chapter {}", index + 1)),
                start_position_ticks: chapter.start_position_ticks,
                image_tag: chapter.image_tag.clone(),
            })
            .collect()
    }

    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    /// Annotate with a server id only if the server didn't report one
    pub fn annotate_server_id(&mut self, server_id: &str) {
        if self.server_id.is_none() {
            self.server_id = Some(server_id.to_string());
        }
    }
}

impl fmt::Display for BaseItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.series_name, self.index_number) {
            (ItemKind::Episode, Some(series), Some(n)) => {
                write!(f, "{} - E{:02} {}", series, n, self.name)
            }
            _ => match self.production_year {
                Some(year) => write!(f, "{} ({})", self.name, year),
                None => write!(f, "{}", self.name),
            },
        }
    }
}

// =============================================================================
// Live TV Models
// =============================================================================

/// A program being displayed from a live TV / guide context
///
/// Wraps the program item; timer ids are mutated in place as recordings are
/// created or cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveProgramContext {
    pub program: BaseItem,
    pub channel_id: Option<Uuid>,
}

impl LiveProgramContext {
    pub fn new(program: BaseItem, channel_id: Option<Uuid>) -> Self {
        Self {
            program,
            channel_id,
        }
    }

    pub fn timer_id(&self) -> Option<&str> {
        self.program.timer_id.as_deref()
    }

    pub fn series_timer_id(&self) -> Option<&str> {
        self.program.series_timer_id.as_deref()
    }

    pub fn is_series(&self) -> bool {
        self.program.is_series.unwrap_or(false)
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.program.start_date
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.program.end_date
    }

    /// Program has not ended yet (unknown end counts as not ended)
    pub fn is_upcoming_or_airing(&self, now: DateTime<Utc>) -> bool {
        self.end().map(|end| end > now).unwrap_or(true)
    }
}

/// Series recording rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SeriesTimer {
    pub id: Option<String>,
    pub name: Option<String>,
    pub channel_id: Option<Uuid>,
    pub channel_name: Option<String>,
    pub program_id: Option<String>,
    pub record_any_time: bool,
    pub record_any_channel: bool,
    pub record_new_only: bool,
    pub keep_up_to: i32,
    pub pre_padding_seconds: i32,
    pub post_padding_seconds: i32,
    /// Remaining server fields, sent back untouched on create
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SeriesTimer {
    /// Human summary of the rule, shown as the detail overview
    pub fn overview(&self) -> String {
        let channel = if self.record_any_channel {
            "All channels".to_string()
        } else {
            self.channel_name
                .clone()
                .unwrap_or_else(|| "This channel".to_string())
        };
        let time = if self.record_any_time {
            "Any time"
        } else {
            "Original air time only"
        };
        let mut parts = vec![channel, time.to_string()];
        if self.record_new_only {
            parts.push("New episodes only".to_string());
        }
        if self.keep_up_to > 0 {
            parts.push(format!("Keep up to {}", self.keep_up_to));
        }
        parts.join(" · ")
    }
}

/// Scheduled recording of one program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Timer {
    pub id: Option<String>,
    pub name: Option<String>,
    pub series_timer_id: Option<String>,
    pub program_info: Option<BaseItem>,
    pub start_date: Option<DateTime<Utc>>,
}

// =============================================================================
// User Models
// =============================================================================

/// Permissions relevant to the detail screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserPolicy {
    pub is_administrator: bool,
    pub enable_live_tv_management: bool,
    pub enable_live_tv_access: bool,
}

/// Signed-in user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub policy: UserPolicy,
}

impl User {
    pub fn can_manage_recordings(&self) -> bool {
        self.policy.enable_live_tv_management
    }
}

// =============================================================================
// Paging Models
// =============================================================================

/// Query result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResult<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_record_count: u32,
    #[serde(default)]
    pub start_index: u32,
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_record_count: 0,
            start_index: 0,
        }
    }
}

impl<T> QueryResult<T> {
    /// Build from a bare list (endpoints that return arrays)
    pub fn from_items(items: Vec<T>) -> Self {
        let total = items.len() as u32;
        Self {
            items,
            total_record_count: total,
            start_index: 0,
        }
    }
}
