//! tvdetail - Jellyfin item detail screen for the terminal
//!
//! Loads an item, live channel or series recording, builds its summary card
//! and action buttons, and fills related-content rows through paginated
//! row adapters.
//!
//! # Modules
//!
//! - `models` - Jellyfin DTOs (items, streams, timers, users)
//! - `api` - Media server trait, Jellyfin client and row queries
//! - `rows` - Row adapters, row container and page fetching
//! - `detail` - Detail screen controller, action bar, summary, row plan
//! - `services` - Navigation, messages, playback, watchlist, refresh stamps
//! - `config` - TOML config and preferences
//! - `cli` / `commands` - Headless command line
//! - `app` / `ui` - Interactive terminal UI

pub mod api;
pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod detail;
pub mod models;
pub mod rows;
pub mod services;
pub mod ui;

// Re-export commonly used types
pub use api::{ApiError, JellyfinClient, MediaServer};
pub use detail::{DetailContext, DetailController, DetailTarget};
pub use models::{BaseItem, ItemKind, SeriesTimer};
pub use rows::{RowAdapter, RowContainer, RowId, RowItem};
