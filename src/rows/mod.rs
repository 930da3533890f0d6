//! Paginated content rows
//!
//! - `adapter`: one row's cursor, single-flight guard and re-fetch triggers
//! - `fetch`: executes a row fetch against a `MediaServer`
//! - `container`: ordered set of rows owned by a screen

pub mod adapter;
pub mod container;
pub mod fetch;

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::api::ApiError;
use crate::models::{BaseItem, ChapterItem, Person, SeriesTimer};
use crate::services::Destination;

pub use adapter::{FetchMode, FetchRequest, Retrieval, RetrievalGuard, RowAdapter, RowCursor};
pub use container::{Row, RowContainer, RowContent, RowHeader};
pub use fetch::FetchPage;

/// Stable handle to a row inside a `RowContainer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

/// Named invalidation categories a row can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTrigger {
    LibraryUpdated,
    MoviePlayback,
    TvPlayback,
    FavoriteUpdate,
}

/// Shortcut tile shown at the head of some rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridButton {
    pub label: String,
    #[serde(skip)]
    pub destination: Destination,
}

/// One element of a row
#[derive(Debug, Clone, PartialEq)]
pub enum RowItem {
    Item(BaseItem),
    Person(Person),
    Chapter(ChapterItem),
    SeriesTimer(SeriesTimer),
    GridButton(GridButton),
    Text(String),
}

impl RowItem {
    pub fn label(&self) -> String {
        match self {
            RowItem::Item(item) => item.to_string(),
            RowItem::Person(person) => person.to_string(),
            RowItem::Chapter(chapter) => chapter.name.clone(),
            RowItem::SeriesTimer(timer) => timer.name.clone().unwrap_or_default(),
            RowItem::GridButton(button) => button.label.clone(),
            RowItem::Text(text) => text.clone(),
        }
    }

    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            RowItem::Item(item) => Some(item.id),
            RowItem::Person(person) => Some(person.id),
            RowItem::Chapter(chapter) => Some(chapter.item_id),
            _ => None,
        }
    }
}

/// Row fetch failure delivered to the finished listener
#[derive(Error, Debug)]
pub enum RowError {
    #[error("Row fetch failed: {0}")]
    Fetch(#[from] ApiError),

    #[error("Row query has no remote source")]
    NotRemote,
}

/// Called once per completed fetch, success or failure
pub type FinishedListener = Box<dyn FnMut(Result<(), &RowError>) + Send>;
