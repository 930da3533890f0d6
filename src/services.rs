//! Collaborator services used by the detail screen
//!
//! Navigation, transient messages, playback, watchlist and change
//! notification are consumed through small traits so the controller can be
//! driven headlessly (CLI), interactively (TUI) or by tests. The in-memory
//! implementations here back the binary.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{BaseItem, User};

// =============================================================================
// Navigation
// =============================================================================

/// Screens the detail view can navigate to
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    ItemDetails {
        item_id: Uuid,
        server_id: Option<String>,
    },
    ChannelDetails {
        channel_id: Uuid,
        program: Option<Box<BaseItem>>,
    },
    SeriesTimerDetails {
        series_timer_id: String,
    },
    RecordingOptions {
        series_timer_id: String,
    },
    Browse {
        folder_id: Option<Uuid>,
    },
    Home,
}

pub trait Navigator: Send + Sync {
    fn go_back(&self);
    fn navigate(&self, destination: Destination);
    fn reset(&self, destination: Destination);
    fn can_go_back(&self) -> bool;
}

/// Back-stack navigator recording every move
#[derive(Debug, Default)]
pub struct NavigationStack {
    inner: Mutex<NavInner>,
}

#[derive(Debug, Default)]
struct NavInner {
    stack: Vec<Destination>,
    backs: usize,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing screen underneath
    pub fn with_root(root: Destination) -> Self {
        let nav = Self::default();
        if let Ok(mut inner) = nav.inner.lock() {
            inner.stack.push(root);
        }
        nav
    }

    pub fn current(&self) -> Option<Destination> {
        self.inner.lock().ok().and_then(|i| i.stack.last().cloned())
    }

    /// Number of `go_back` calls
    pub fn back_count(&self) -> usize {
        self.inner.lock().map(|i| i.backs).unwrap_or(0)
    }

    pub fn history(&self) -> Vec<Destination> {
        self.inner.lock().map(|i| i.stack.clone()).unwrap_or_default()
    }
}

impl Navigator for NavigationStack {
    fn go_back(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.backs += 1;
            inner.stack.pop();
        }
    }

    fn navigate(&self, destination: Destination) {
        tracing::debug!(?destination, "Navigate");
        if let Ok(mut inner) = self.inner.lock() {
            inner.stack.push(destination);
        }
    }

    fn reset(&self, destination: Destination) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.stack.clear();
            inner.stack.push(destination);
        }
    }

    fn can_go_back(&self) -> bool {
        self.inner.lock().map(|i| !i.stack.is_empty()).unwrap_or(false)
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Transient user-facing messages (toasts)
pub trait Messages: Send + Sync {
    fn show(&self, message: &str);
}

#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<String>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.messages.lock().ok().and_then(|m| m.last().cloned())
    }
}

impl Messages for MessageLog {
    fn show(&self, message: &str) {
        tracing::info!(message, "User message");
        if let Ok(mut m) = self.messages.lock() {
            m.push(message.to_string());
        }
    }
}

// =============================================================================
// Playback
// =============================================================================

/// What was asked of the playback engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackRequest {
    Play {
        items: Vec<BaseItem>,
        position_ms: i64,
        shuffle: bool,
    },
    QueueAudio(Vec<BaseItem>),
    InstantMix(Uuid),
    ExternalTrailer(String),
}

pub trait PlaybackLauncher: Send + Sync {
    fn launch(&self, request: PlaybackRequest);
}

/// Records playback requests instead of playing
#[derive(Debug, Default)]
pub struct PlayQueue {
    requests: Mutex<Vec<PlaybackRequest>>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PlaybackRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<PlaybackRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

impl PlaybackLauncher for PlayQueue {
    fn launch(&self, request: PlaybackRequest) {
        tracing::info!(?request, "Playback requested");
        if let Ok(mut r) = self.requests.lock() {
            r.push(request);
        }
    }
}

// =============================================================================
// Watchlist
// =============================================================================

/// Per-server watchlist membership
pub trait Watchlist: Send + Sync {
    fn contains(&self, item_id: Uuid, server_id: &str) -> bool;
    /// False if the item was already listed
    fn add(&self, item_id: Uuid, server_id: &str) -> bool;
    /// False if the item was not listed
    fn remove(&self, item_id: Uuid, server_id: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryWatchlist {
    items: Mutex<HashSet<(String, Uuid)>>,
}

impl MemoryWatchlist {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Watchlist for MemoryWatchlist {
    fn contains(&self, item_id: Uuid, server_id: &str) -> bool {
        self.items
            .lock()
            .map(|i| i.contains(&(server_id.to_string(), item_id)))
            .unwrap_or(false)
    }

    fn add(&self, item_id: Uuid, server_id: &str) -> bool {
        self.items
            .lock()
            .map(|mut i| i.insert((server_id.to_string(), item_id)))
            .unwrap_or(false)
    }

    fn remove(&self, item_id: Uuid, server_id: &str) -> bool {
        self.items
            .lock()
            .map(|mut i| i.remove(&(server_id.to_string(), item_id)))
            .unwrap_or(false)
    }
}

// =============================================================================
// Data refresh
// =============================================================================

/// Last-change timestamps per category
#[derive(Debug, Default)]
pub struct DataRefreshService {
    state: Mutex<RefreshState>,
}

#[derive(Debug, Default, Clone)]
struct RefreshState {
    last_library_change: Option<DateTime<Utc>>,
    last_movie_playback: Option<DateTime<Utc>>,
    last_tv_playback: Option<DateTime<Utc>>,
    last_favorite_update: Option<DateTime<Utc>>,
    last_playback: Option<DateTime<Utc>>,
    last_played_item: Option<BaseItem>,
    last_deleted_item_id: Option<Uuid>,
}

macro_rules! timestamp_accessors {
    ($($get:ident, $set:ident, $field:ident;)*) => {
        $(
            pub fn $get(&self) -> Option<DateTime<Utc>> {
                self.state.lock().ok().and_then(|s| s.$field)
            }

            pub fn $set(&self, at: DateTime<Utc>) {
                if let Ok(mut s) = self.state.lock() {
                    s.$field = Some(at);
                }
            }
        )*
    };
}

impl DataRefreshService {
    pub fn new() -> Self {
        Self::default()
    }

    timestamp_accessors! {
        last_library_change, set_last_library_change, last_library_change;
        last_movie_playback, set_last_movie_playback, last_movie_playback;
        last_tv_playback, set_last_tv_playback, last_tv_playback;
        last_favorite_update, set_last_favorite_update, last_favorite_update;
        last_playback, set_last_playback, last_playback;
    }

    pub fn last_played_item(&self) -> Option<BaseItem> {
        self.state.lock().ok().and_then(|s| s.last_played_item.clone())
    }

    pub fn set_last_played_item(&self, item: Option<BaseItem>) {
        if let Ok(mut s) = self.state.lock() {
            s.last_played_item = item;
        }
    }

    pub fn last_deleted_item_id(&self) -> Option<Uuid> {
        self.state.lock().ok().and_then(|s| s.last_deleted_item_id)
    }

    pub fn set_last_deleted_item_id(&self, id: Uuid) {
        if let Ok(mut s) = self.state.lock() {
            s.last_deleted_item_id = Some(id);
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Signed-in user and active server
#[derive(Debug, Default)]
pub struct UserSession {
    user: Mutex<Option<User>>,
    server_id: Mutex<Option<String>>,
}

impl UserSession {
    pub fn new(user: Option<User>, server_id: Option<String>) -> Self {
        Self {
            user: Mutex::new(user),
            server_id: Mutex::new(server_id),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.lock().ok().and_then(|u| u.clone())
    }

    pub fn set_current_user(&self, user: Option<User>) {
        if let Ok(mut u) = self.user.lock() {
            *u = user;
        }
    }

    pub fn current_server(&self) -> Option<String> {
        self.server_id.lock().ok().and_then(|s| s.clone())
    }

    pub fn can_manage_recordings(&self) -> bool {
        self.current_user()
            .map(|u| u.can_manage_recordings())
            .unwrap_or(false)
    }
}
