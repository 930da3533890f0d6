//! Paginated row adapter
//!
//! A `RowAdapter` owns one row's items and its pagination cursor. Fetching is
//! split in two halves so the adapter never awaits: `retrieve` /
//! `retrieve_next` hand back a `FetchRequest` for the caller to execute, and
//! `complete` applies the result. The retrieval guard is held between the two.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

use super::{ChangeTrigger, FetchPage, FinishedListener, GridButton, RowError, RowId, RowItem};
use crate::api::query::{ItemFilter, RowQuery, RowQueryKind, SortOption};
use crate::services::{DataRefreshService, Destination};

/// Distance (in items) from the end that triggers a page load when unpaged
const UNPAGED_LOOKAHEAD: i64 = 20;

/// Chunk divisor for the paged look-ahead window
const CHUNK_LOOKAHEAD_DIVISOR: f64 = 1.7;

// =============================================================================
// Cursor and guard
// =============================================================================

/// Pagination state of one row
#[derive(Debug, Clone, PartialEq)]
pub struct RowCursor {
    items_loaded: u32,
    total_items: u32,
    chunk_size: u32,
    fully_loaded: bool,
}

impl RowCursor {
    /// `chunk_size` 0 means the source is loaded in one go
    pub fn new(chunk_size: u32) -> Self {
        Self {
            items_loaded: 0,
            total_items: 0,
            chunk_size,
            fully_loaded: false,
        }
    }

    pub fn items_loaded(&self) -> u32 {
        self.items_loaded
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.fully_loaded
    }

    pub fn set_items_loaded(&mut self, loaded: u32) {
        self.items_loaded = loaded;
        self.recompute();
    }

    pub fn set_total_items(&mut self, total: u32) {
        self.total_items = total;
        self.recompute();
    }

    /// Full re-fetch starts over; the fully-loaded flag is left for the fetch to settle
    fn reset(&mut self) {
        self.items_loaded = 0;
    }

    fn recompute(&mut self) {
        self.fully_loaded = self.chunk_size == 0 || self.items_loaded >= self.total_items;
    }

    /// Scroll position is close enough to the loaded end to fetch more
    pub fn wants_more(&self, pos: usize) -> bool {
        let pos = pos as i64;
        let loaded = self.items_loaded as i64;
        if self.chunk_size > 0 {
            pos as f64 >= loaded as f64 - (self.chunk_size as f64 / CHUNK_LOOKAHEAD_DIVISOR)
        } else {
            pos >= loaded - UNPAGED_LOOKAHEAD
        }
    }
}

/// Single-flight "currently retrieving" flag
#[derive(Debug, Default)]
pub struct RetrievalGuard {
    retrieving: Mutex<bool>,
}

impl RetrievalGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_retrieving(&self) -> bool {
        self.retrieving.lock().map(|r| *r).unwrap_or(false)
    }

    /// Set the flag if clear; false when a fetch is already in flight
    pub fn try_begin(&self) -> bool {
        match self.retrieving.lock() {
            Ok(mut r) if !*r => {
                *r = true;
                true
            }
            _ => false,
        }
    }

    /// Set the flag regardless of its state
    pub fn begin(&self) {
        if let Ok(mut r) = self.retrieving.lock() {
            *r = true;
        }
    }

    pub fn finish(&self) {
        if let Ok(mut r) = self.retrieving.lock() {
            *r = false;
        }
    }
}

// =============================================================================
// Fetch protocol
// =============================================================================

/// How a completed page is merged into the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Replace,
    Append,
}

/// A fetch the caller must run and hand back to `RowAdapter::complete`
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub row: RowId,
    pub generation: u64,
    pub query: RowQuery,
    pub start: u32,
    pub limit: Option<u32>,
    pub mode: FetchMode,
}

/// Outcome of starting a full retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Remote source: run the request
    Fetch(FetchRequest),
    /// In-memory source: items are already in place
    Loaded,
}

impl Retrieval {
    pub fn into_request(self) -> Option<FetchRequest> {
        match self {
            Retrieval::Fetch(request) => Some(request),
            Retrieval::Loaded => None,
        }
    }
}

// =============================================================================
// RowAdapter
// =============================================================================

/// One lazily fetched row of items
pub struct RowAdapter {
    id: RowId,
    query: RowQuery,
    cursor: RowCursor,
    guard: RetrievalGuard,
    items: Vec<RowItem>,
    /// Leading tiles that are not part of the query result
    pinned: u32,
    generation: u64,
    pending_mode: Option<FetchMode>,
    /// A full retrieve was abandoned before its first page arrived
    reload_needed: bool,
    triggers: Vec<ChangeTrigger>,
    last_full_retrieve: Option<DateTime<Utc>>,
    server_id: Option<String>,
    sort: Option<SortOption>,
    filters: Vec<ItemFilter>,
    listener: Option<FinishedListener>,
}

impl std::fmt::Debug for RowAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowAdapter")
            .field("id", &self.id)
            .field("kind", &self.query.kind())
            .field("cursor", &self.cursor)
            .field("items", &self.items.len())
            .field("generation", &self.generation)
            .finish()
    }
}

impl RowAdapter {
    pub fn new(id: RowId, query: RowQuery, chunk_size: u32) -> Self {
        Self {
            id,
            query,
            cursor: RowCursor::new(chunk_size),
            guard: RetrievalGuard::new(),
            items: Vec::new(),
            pinned: 0,
            generation: 0,
            pending_mode: None,
            reload_needed: false,
            triggers: Vec::new(),
            last_full_retrieve: None,
            server_id: None,
            sort: None,
            filters: Vec::new(),
            listener: None,
        }
    }

    /// Annotate items lacking a server id with this one
    pub fn with_server_id(mut self, server_id: Option<String>) -> Self {
        self.server_id = server_id;
        self
    }

    pub fn with_triggers(mut self, triggers: &[ChangeTrigger]) -> Self {
        self.triggers = triggers.to_vec();
        self
    }

    pub fn set_finished_listener(&mut self, listener: FinishedListener) {
        self.listener = Some(listener);
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn kind(&self) -> RowQueryKind {
        self.query.kind()
    }

    pub fn query(&self) -> &RowQuery {
        &self.query
    }

    pub fn items(&self) -> &[RowItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&RowItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn cursor(&self) -> &RowCursor {
        &self.cursor
    }

    pub fn items_loaded(&self) -> u32 {
        self.cursor.items_loaded()
    }

    pub fn set_items_loaded(&mut self, loaded: u32) {
        self.cursor.set_items_loaded(loaded);
    }

    pub fn total_items(&self) -> u32 {
        self.cursor.total_items()
    }

    pub fn set_total_items(&mut self, total: u32) {
        self.cursor.set_total_items(total);
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.cursor.is_fully_loaded()
    }

    pub fn is_retrieving(&self) -> bool {
        self.guard.is_retrieving()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_full_retrieve(&self) -> Option<DateTime<Utc>> {
        self.last_full_retrieve
    }

    pub fn triggers(&self) -> &[ChangeTrigger] {
        &self.triggers
    }

    pub fn sort(&self) -> Option<&SortOption> {
        self.sort.as_ref()
    }

    pub fn filters(&self) -> &[ItemFilter] {
        &self.filters
    }

    // -------------------------------------------------------------------------
    // Retrieval
    // -------------------------------------------------------------------------

    /// Full (re)load
    ///
    /// In-memory sources are populated immediately; remote sources return the
    /// first page request.
    pub fn retrieve(&mut self, now: DateTime<Utc>) -> Retrieval {
        self.guard.begin();
        self.generation += 1;
        self.reload_needed = false;
        self.last_full_retrieve = Some(now);
        self.cursor.reset();
        self.pinned = 0;

        let chunk = self.cursor.chunk_size();
        let limit = (chunk > 0).then_some(chunk);

        match &self.query {
            RowQuery::StaticPeople(people) => {
                let items = people.iter().cloned().map(RowItem::Person).collect();
                self.load_static(items);
                Retrieval::Loaded
            }
            RowQuery::StaticChapters(chapters) => {
                let items = chapters.iter().cloned().map(RowItem::Chapter).collect();
                self.load_static(items);
                Retrieval::Loaded
            }
            RowQuery::StaticItems(list) => {
                let server_id = self.server_id.clone();
                let items = list
                    .iter()
                    .cloned()
                    .map(|mut item| {
                        if let Some(server_id) = &server_id {
                            item.annotate_server_id(server_id);
                        }
                        RowItem::Item(item)
                    })
                    .collect();
                self.load_static(items);
                Retrieval::Loaded
            }
            RowQuery::AudioPlaylists(_) => {
                self.items.clear();
                self.items.push(RowItem::GridButton(GridButton {
                    label: "Favorites".to_string(),
                    destination: Destination::Browse { folder_id: None },
                }));
                self.pinned = 1;
                self.cursor.set_items_loaded(1);
                Retrieval::Fetch(self.request(0, limit, FetchMode::Append))
            }
            query => {
                let (start, limit) = query.explicit_window().map_or((0, limit), |(s, l)| (s, Some(l)));
                Retrieval::Fetch(self.request(start, limit, FetchMode::Replace))
            }
        }
    }

    fn load_static(&mut self, items: Vec<RowItem>) {
        let count = items.len() as u32;
        self.items = items;
        self.cursor.set_total_items(count);
        self.cursor.set_items_loaded(count);
        self.finish(Ok(()));
    }

    fn request(&mut self, start: u32, limit: Option<u32>, mode: FetchMode) -> FetchRequest {
        self.pending_mode = Some(mode);
        FetchRequest {
            row: self.id,
            generation: self.generation,
            query: self.query.clone(),
            start,
            limit,
            mode,
        }
    }

    /// Scroll-driven page-ahead
    pub fn load_more_if_needed(&mut self, pos: usize) -> Option<FetchRequest> {
        if self.cursor.is_fully_loaded() {
            return None;
        }
        if self.guard.is_retrieving() {
            tracing::info!(row = %self.id, "Not loading more because currently retrieving");
            return None;
        }
        if self.cursor.wants_more(pos) {
            tracing::info!(
                row = %self.id,
                pos,
                items_loaded = self.cursor.items_loaded(),
                total = self.cursor.total_items(),
                chunk = self.cursor.chunk_size(),
                "Loading more items"
            );
            return self.retrieve_next();
        }
        None
    }

    /// Next page of a paged source
    pub fn retrieve_next(&mut self) -> Option<FetchRequest> {
        let chunk = self.cursor.chunk_size();
        if self.cursor.is_fully_loaded() || chunk == 0 {
            return None;
        }
        let pageable = self.query.is_pageable() || matches!(self.query, RowQuery::AudioPlaylists(_));
        if !pageable {
            return None;
        }
        if !self.guard.try_begin() {
            return None;
        }
        let start = self.cursor.items_loaded().saturating_sub(self.pinned);
        Some(self.request(start, Some(chunk), FetchMode::Append))
    }

    /// Apply a finished fetch. Returns false when the result belongs to an
    /// earlier generation and was discarded.
    pub fn complete(&mut self, generation: u64, result: Result<FetchPage, RowError>) -> bool {
        if generation != self.generation {
            tracing::debug!(row = %self.id, generation, current = self.generation, "Discarding stale row fetch");
            return false;
        }
        let mode = self.pending_mode.take().unwrap_or(FetchMode::Append);

        match result {
            Ok(page) => {
                let received = page.items.len() as u32;
                if mode == FetchMode::Replace {
                    self.items.truncate(self.pinned as usize);
                }
                let annotated: Vec<RowItem> =
                    page.items.into_iter().map(|item| self.annotate(item)).collect();
                self.items.extend(annotated);
                self.cursor.set_total_items(page.total);
                let base = match mode {
                    FetchMode::Replace => self.pinned,
                    FetchMode::Append => self.cursor.items_loaded(),
                };
                self.cursor.set_items_loaded(base + received);
                self.finish(Ok(()));
            }
            Err(err) => {
                self.finish(Err(err));
            }
        }
        true
    }

    /// Settle a fetch whose result will never be applied. Items are left
    /// untouched; an abandoned full retrieve marks the row for reload.
    pub fn abandon(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        let mode = self.pending_mode.take();
        self.reload_needed |= mode == Some(FetchMode::Replace);
        tracing::debug!(row = %self.id, generation, mode = ?mode, "Abandoned row fetch");
        self.guard.finish();
        true
    }

    pub fn needs_reload(&self) -> bool {
        self.reload_needed
    }

    fn annotate(&self, item: RowItem) -> RowItem {
        match (item, &self.server_id) {
            (RowItem::Item(mut item), Some(server_id)) => {
                item.annotate_server_id(server_id);
                RowItem::Item(item)
            }
            (item, _) => item,
        }
    }

    fn finish(&mut self, result: Result<(), RowError>) {
        if let Err(err) = &result {
            tracing::warn!(row = %self.id, error = %err, "Failed to retrieve items");
        }
        self.guard.finish();
        if let Some(listener) = self.listener.as_mut() {
            listener(result.as_ref().map(|_| ()));
        }
    }

    // -------------------------------------------------------------------------
    // Invalidation
    // -------------------------------------------------------------------------

    /// A configured trigger fired after the last full retrieval
    pub fn needs_re_retrieve(&self, refresh: &DataRefreshService) -> bool {
        let Some(last) = self.last_full_retrieve else {
            return false;
        };
        self.triggers.iter().any(|trigger| {
            let changed = match trigger {
                ChangeTrigger::LibraryUpdated => refresh.last_library_change(),
                ChangeTrigger::MoviePlayback => refresh.last_movie_playback(),
                ChangeTrigger::TvPlayback => refresh.last_tv_playback(),
                ChangeTrigger::FavoriteUpdate => refresh.last_favorite_update(),
            };
            changed.map(|at| last < at).unwrap_or(false)
        })
    }

    /// Full retrieve if any trigger fired; `None` when nothing changed
    pub fn re_retrieve_if_needed(
        &mut self,
        refresh: &DataRefreshService,
        now: DateTime<Utc>,
    ) -> Option<Retrieval> {
        if !self.needs_re_retrieve(refresh) {
            return None;
        }
        tracing::info!(row = %self.id, kind = %self.kind(), "Re-retrieving row");
        Some(self.retrieve(now))
    }

    // -------------------------------------------------------------------------
    // Sort / filter
    // -------------------------------------------------------------------------

    /// Change sort; returns true when the sort actually changed
    pub fn set_sort(&mut self, sort: SortOption) -> bool {
        if self.sort.as_ref() == Some(&sort) {
            return false;
        }
        self.query.apply_sort(&sort);
        if !sort.is_by_name() {
            self.query.set_start_letter(None);
        }
        self.sort = Some(sort);
        true
    }

    /// Rewrite the query filters. The owning container removes the row afterwards.
    pub fn apply_filters(&mut self, filters: Vec<ItemFilter>) {
        self.query.apply_filters(&filters);
        self.filters = filters;
    }

    pub fn start_letter(&self) -> Option<&str> {
        self.query.start_letter()
    }

    pub fn set_start_letter(&mut self, letter: Option<&str>) {
        self.query.set_start_letter(letter);
    }
}
