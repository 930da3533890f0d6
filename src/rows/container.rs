//! Ordered row list owned by a screen
//!
//! Rows are kept sorted by their header index; rows without an index follow
//! the indexed ones in insertion order. Rows refer back to the container only
//! through their `RowId`.

use super::{FetchPage, RowAdapter, RowError, RowId, RowItem};
use crate::api::query::{ItemFilter, SortOption};

pub const PLACEHOLDER_HEADER: &str = "Empty";
pub const PLACEHOLDER_TEXT: &str = "No items";

/// Row title plus display-priority index
#[derive(Debug, Clone, PartialEq)]
pub struct RowHeader {
    pub index: Option<usize>,
    pub title: String,
}

impl RowHeader {
    pub fn new(index: usize, title: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            title: title.into(),
        }
    }

    /// Header for rows that follow every indexed row
    pub fn unindexed(title: impl Into<String>) -> Self {
        Self {
            index: None,
            title: title.into(),
        }
    }
}

#[derive(Debug)]
pub enum RowContent {
    Adapter(RowAdapter),
    Static(Vec<RowItem>),
}

#[derive(Debug)]
pub struct Row {
    pub id: RowId,
    pub header: RowHeader,
    pub content: RowContent,
}

impl Row {
    pub fn items(&self) -> &[RowItem] {
        match &self.content {
            RowContent::Adapter(adapter) => adapter.items(),
            RowContent::Static(items) => items,
        }
    }

    pub fn adapter(&self) -> Option<&RowAdapter> {
        match &self.content {
            RowContent::Adapter(adapter) => Some(adapter),
            RowContent::Static(_) => None,
        }
    }

    pub fn adapter_mut(&mut self) -> Option<&mut RowAdapter> {
        match &mut self.content {
            RowContent::Adapter(adapter) => Some(adapter),
            RowContent::Static(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.header.title == PLACEHOLDER_HEADER
            && matches!(&self.content, RowContent::Static(items) if items.len() == 1)
    }
}

/// The rows of one screen
#[derive(Debug, Default)]
pub struct RowContainer {
    rows: Vec<Row>,
    next_id: u64,
}

impl RowContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a row about to be built
    pub fn allocate_id(&mut self) -> RowId {
        self.next_id += 1;
        RowId(self.next_id)
    }

    /// Insert a row at its display position
    pub fn add_row(&mut self, row: Row) -> RowId {
        let id = row.id;
        let position = match row.header.index {
            Some(index) => self
                .rows
                .iter()
                .position(|r| r.header.index.map(|i| i > index).unwrap_or(true))
                .unwrap_or(self.rows.len()),
            None => self.rows.len(),
        };
        self.rows.insert(position, row);
        id
    }

    pub fn add_adapter(&mut self, header: RowHeader, adapter: RowAdapter) -> RowId {
        let id = adapter.id();
        self.add_row(Row {
            id,
            header,
            content: RowContent::Adapter(adapter),
        })
    }

    pub fn add_static(&mut self, header: RowHeader, items: Vec<RowItem>) -> RowId {
        let id = self.allocate_id();
        self.add_row(Row {
            id,
            header,
            content: RowContent::Static(items),
        })
    }

    /// Remove a row; removing the last row first inserts a placeholder
    pub fn remove_row(&mut self, id: RowId) -> Option<Row> {
        let position = self.rows.iter().position(|r| r.id == id)?;
        if self.rows.len() == 1 {
            self.add_static(
                RowHeader::unindexed(PLACEHOLDER_HEADER),
                vec![RowItem::Text(PLACEHOLDER_TEXT.to_string())],
            );
        }
        Some(self.rows.remove(position))
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn adapter_mut(&mut self, id: RowId) -> Option<&mut RowAdapter> {
        self.get_mut(id).and_then(Row::adapter_mut)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.get(id).is_some()
    }

    pub fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    pub fn at(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.rows.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn titles(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.header.title.as_str()).collect()
    }

    /// Deliver a fetch result to its row. False if the row is gone or the
    /// result is stale.
    pub fn apply_fetch(
        &mut self,
        id: RowId,
        generation: u64,
        result: Result<FetchPage, RowError>,
    ) -> bool {
        match self.adapter_mut(id) {
            Some(adapter) => adapter.complete(generation, result),
            None => {
                tracing::debug!(row = %id, "Fetch result for removed row dropped");
                false
            }
        }
    }

    /// Settle a fetch that will not be applied
    pub fn abandon_fetch(&mut self, id: RowId, generation: u64) -> bool {
        self.adapter_mut(id)
            .map(|adapter| adapter.abandon(generation))
            .unwrap_or(false)
    }

    /// Rewrite a row's filters and drop it; the caller re-adds and re-retrieves
    pub fn set_filters(&mut self, id: RowId, filters: Vec<ItemFilter>) -> Option<Row> {
        self.adapter_mut(id)?.apply_filters(filters);
        self.remove_row(id)
    }

    pub fn set_sort(&mut self, id: RowId, sort: SortOption) -> bool {
        self.adapter_mut(id)
            .map(|adapter| adapter.set_sort(sort))
            .unwrap_or(false)
    }
}
