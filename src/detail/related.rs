//! Related-content rows for a detail subject
//!
//! `plan_rows` maps the subject kind to the rows under the summary card.
//! Each plan carries its display index; the container orders by it, so the
//! order plans are produced in does not matter.

use crate::api::query::{
    ItemQuery, NextUpQuery, RowQuery, SeasonsQuery, SimilarQuery, UpcomingQuery,
};
use crate::config::Preferences;
use crate::models::{BaseItem, ItemKind, PersonKind, SeriesTimer};
use crate::rows::{ChangeTrigger, RowHeader, RowItem};

/// Page size for person / artist rows
const PERSON_ROW_CHUNK: u32 = 100;

/// Similar items requested per row
const SIMILAR_LIMIT: u32 = 20;

/// Episodes shown after the current one
const NEXT_EPISODES_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum RowSource {
    Adapter {
        query: RowQuery,
        chunk: u32,
        triggers: Vec<ChangeTrigger>,
    },
    Static(Vec<RowItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowPlan {
    pub header: RowHeader,
    pub source: RowSource,
}

impl RowPlan {
    fn adapter(index: usize, title: &str, query: RowQuery) -> Self {
        Self::paged(index, title, query, 0)
    }

    fn paged(index: usize, title: &str, query: RowQuery, chunk: u32) -> Self {
        Self {
            header: RowHeader::new(index, title),
            source: RowSource::Adapter {
                query,
                chunk,
                triggers: Vec::new(),
            },
        }
    }

    fn with_triggers(mut self, list: &[ChangeTrigger]) -> Self {
        if let RowSource::Adapter { triggers, .. } = &mut self.source {
            *triggers = list.to_vec();
        }
        self
    }
}

/// Rows to show for `subject`
///
/// In series-timer mode only the schedule row is shown.
pub fn plan_rows(
    subject: &BaseItem,
    series_timer: Option<&SeriesTimer>,
    prefs: &Preferences,
) -> Vec<RowPlan> {
    if let Some(timer) = series_timer {
        return timer
            .id
            .clone()
            .map(|id| {
                vec![RowPlan::adapter(
                    0,
                    "Schedule",
                    RowQuery::Schedule { series_timer_id: id },
                )]
            })
            .unwrap_or_default();
    }

    let id = subject.id;
    let mut rows = Vec::new();

    match subject.kind {
        ItemKind::Movie => {
            if subject.part_count.unwrap_or(0) > 0 {
                rows.push(RowPlan::adapter(0, "Additional Parts", RowQuery::AdditionalParts { item_id: id }));
            }
            if !subject.people.is_empty() {
                rows.push(RowPlan::adapter(1, "Cast & Crew", RowQuery::StaticPeople(subject.people.clone())));
            }
            if subject.special_feature_count.unwrap_or(0) > 0 {
                rows.push(RowPlan::adapter(3, "Specials", RowQuery::Specials { item_id: id }));
            }
            if subject.local_trailer_count.unwrap_or(0) > 1 {
                rows.push(RowPlan::adapter(4, "Trailers", RowQuery::Trailers { item_id: id }));
            }
            if !subject.chapters.is_empty() {
                rows.push(RowPlan::adapter(2, "Chapters", RowQuery::StaticChapters(subject.chapter_items())));
            }
            rows.push(RowPlan::adapter(5, "More Like This", RowQuery::SimilarMovies(similar(id))));
            rows.extend(info_rows(subject, prefs));
        }
        ItemKind::Trailer => {
            if !subject.people.is_empty() {
                rows.push(RowPlan::adapter(0, "Cast & Crew", RowQuery::StaticPeople(subject.people.clone())));
            }
            rows.push(RowPlan::adapter(4, "More Like This", RowQuery::SimilarMovies(similar(id))));
            rows.extend(info_rows(subject, prefs));
        }
        ItemKind::Person => {
            for (index, title, kind) in [
                (0, "Movies", ItemKind::Movie),
                (1, "TV Series", ItemKind::Series),
                (2, "Episodes", ItemKind::Episode),
            ] {
                rows.push(RowPlan::paged(
                    index,
                    title,
                    RowQuery::Items(ItemQuery::by_person(id, kind)),
                    PERSON_ROW_CHUNK,
                ));
            }
        }
        ItemKind::MusicArtist => {
            rows.push(RowPlan::paged(
                0,
                "Albums",
                RowQuery::Items(ItemQuery::albums_by_artist(id)),
                PERSON_ROW_CHUNK,
            ));
        }
        ItemKind::Series => {
            rows.push(
                RowPlan::adapter(
                    0,
                    "Next Up",
                    RowQuery::NextUp(NextUpQuery {
                        series_id: Some(id),
                        ..Default::default()
                    }),
                )
                .with_triggers(&[ChangeTrigger::TvPlayback]),
            );
            rows.push(
                RowPlan::adapter(1, "Seasons", RowQuery::Seasons(SeasonsQuery { series_id: id }))
                    .with_triggers(&[ChangeTrigger::TvPlayback]),
            );
            if subject.special_feature_count.unwrap_or(0) > 0 {
                rows.push(RowPlan::adapter(3, "Specials", RowQuery::Specials { item_id: id }));
            }
            rows.push(RowPlan::adapter(
                2,
                "Upcoming",
                RowQuery::Upcoming(UpcomingQuery {
                    parent_id: Some(id),
                    limit: None,
                }),
            ));
            if !subject.people.is_empty() {
                rows.push(RowPlan::adapter(3, "Cast & Crew", RowQuery::StaticPeople(subject.people.clone())));
            }
            rows.push(RowPlan::adapter(4, "More Like This", RowQuery::SimilarSeries(similar(id))));
        }
        ItemKind::Episode => {
            if let (Some(season_id), Some(index)) = (subject.season_id, subject.index_number) {
                // Episode numbers are 1-based, the query window 0-based
                let query = ItemQuery {
                    parent_id: Some(season_id),
                    include_item_types: vec![ItemKind::Episode],
                    start_index: Some(index.max(0) as u32),
                    limit: Some(NEXT_EPISODES_LIMIT),
                    ..Default::default()
                };
                rows.push(
                    RowPlan::adapter(5, "Next Episode", RowQuery::Items(query))
                        .with_triggers(&[ChangeTrigger::TvPlayback]),
                );
            }
            let guests: Vec<_> = subject
                .people
                .iter()
                .filter(|p| p.kind == PersonKind::GuestStar)
                .cloned()
                .collect();
            if !guests.is_empty() {
                rows.push(RowPlan::adapter(0, "Guest Stars", RowQuery::StaticPeople(guests)));
            }
            if !subject.chapters.is_empty() {
                rows.push(RowPlan::adapter(1, "Chapters", RowQuery::StaticChapters(subject.chapter_items())));
            }
            rows.extend(info_rows(subject, prefs));
        }
        _ => rows.extend(info_rows(subject, prefs)),
    }

    rows
}

fn similar(item_id: uuid::Uuid) -> SimilarQuery {
    SimilarQuery {
        item_id,
        limit: Some(SIMILAR_LIMIT),
    }
}

/// Stream listings per media source, only with debugging enabled
fn info_rows(subject: &BaseItem, prefs: &Preferences) -> Vec<RowPlan> {
    if !prefs.debugging_enabled {
        return Vec::new();
    }
    subject
        .media_sources
        .iter()
        .filter(|source| !source.media_streams.is_empty())
        .map(|source| {
            let title = match &source.container {
                Some(container) => format!("Media Details ({})", container),
                None => "Media Details".to_string(),
            };
            RowPlan {
                header: RowHeader::unindexed(title),
                source: RowSource::Static(
                    source
                        .media_streams
                        .iter()
                        .map(|stream| RowItem::Text(stream.to_string()))
                        .collect(),
                ),
            }
        })
        .collect()
}
