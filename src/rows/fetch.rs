//! Row fetch execution
//!
//! Turns a `FetchRequest` into server calls. One arm per `RowQuery` shape;
//! in-memory shapes never reach here.

use std::collections::HashSet;

use super::{FetchRequest, RowError, RowItem};
use crate::api::query::RowQuery;
use crate::api::MediaServer;
use crate::models::{BaseItem, ItemKind, QueryResult};

/// One page of a row's data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchPage {
    pub items: Vec<RowItem>,
    /// Server-reported total for the whole query
    pub total: u32,
}

impl From<QueryResult<BaseItem>> for FetchPage {
    fn from(result: QueryResult<BaseItem>) -> Self {
        Self {
            total: result.total_record_count,
            items: result.items.into_iter().map(RowItem::Item).collect(),
        }
    }
}

impl From<Vec<BaseItem>> for FetchPage {
    fn from(items: Vec<BaseItem>) -> Self {
        QueryResult::from_items(items).into()
    }
}

/// Run one row fetch
pub async fn execute(server: &dyn MediaServer, request: &FetchRequest) -> Result<FetchPage, RowError> {
    let start = request.start;
    let limit = request.limit;

    let page: FetchPage = match &request.query {
        RowQuery::Items(q) | RowQuery::AudioPlaylists(q) => {
            server.query_items(q, start, limit).await?.into()
        }
        RowQuery::NextUp(q) => server.next_up(q).await?.into(),
        RowQuery::Seasons(q) => server.seasons(q).await?.into(),
        RowQuery::Upcoming(q) => server.upcoming(q).await?.into(),
        RowQuery::SimilarMovies(q) | RowQuery::SimilarSeries(q) => server.similar(q).await?.into(),
        RowQuery::Specials { item_id } => server.specials(*item_id).await?.into(),
        RowQuery::AdditionalParts { item_id } => server.additional_parts(*item_id).await?.into(),
        RowQuery::Trailers { item_id } => server.local_trailers(*item_id).await?.into(),
        RowQuery::LiveTvChannels(q) => server.live_tv_channels(q, start, limit).await?.into(),
        RowQuery::LiveTvPrograms(q) => server.recommended_programs(q).await?.into(),
        RowQuery::LiveTvRecordings(q) => server.recordings(q).await?.into(),
        RowQuery::Artists(q) => server.artists(q, start, limit).await?.into(),
        RowQuery::AlbumArtists(q) => server.album_artists(q, start, limit).await?.into(),
        RowQuery::Latest(q) => server.latest(q).await?.into(),
        RowQuery::Resume(q) => server.resume(q).await?.into(),
        RowQuery::Views => server.user_views().await?.into(),
        RowQuery::MergedContinueWatching { resume, next_up } => {
            let (resume, next_up) = futures::join!(server.resume(resume), server.next_up(next_up));
            merge_continue_watching(resume?.items, next_up?.items).into()
        }
        RowQuery::Premieres(q) => {
            let result = server.query_items(q, 0, limit).await?;
            let premieres: Vec<BaseItem> = result
                .items
                .into_iter()
                .filter(|item| item.kind == ItemKind::Episode && item.index_number == Some(1))
                .collect();
            premieres.into()
        }
        RowQuery::SeriesTimers { can_manage } => {
            let timers = server.series_timers().await?;
            let total = timers.total_record_count;
            let items = timers
                .items
                .into_iter()
                .map(|timer| {
                    if *can_manage {
                        RowItem::SeriesTimer(timer)
                    } else {
                        RowItem::Text(timer.name.unwrap_or_default())
                    }
                })
                .collect();
            FetchPage { items, total }
        }
        RowQuery::Schedule { series_timer_id } => {
            let timers = server.timers_for_series(series_timer_id).await?;
            let programs: Vec<BaseItem> = timers
                .items
                .into_iter()
                .filter_map(|timer| {
                    timer.program_info.map(|mut program| {
                        program.timer_id = program.timer_id.or(timer.id);
                        program.series_timer_id = program.series_timer_id.or(timer.series_timer_id);
                        program
                    })
                })
                .collect();
            programs.into()
        }
        RowQuery::StaticPeople(_) | RowQuery::StaticChapters(_) | RowQuery::StaticItems(_) => {
            return Err(RowError::NotRemote);
        }
    };

    tracing::debug!(
        row = %request.row,
        kind = %request.query.kind(),
        received = page.items.len(),
        total = page.total,
        "Row page fetched"
    );
    Ok(page)
}

/// Resume items first, then next-up episodes not already present
fn merge_continue_watching(resume: Vec<BaseItem>, next_up: Vec<BaseItem>) -> Vec<BaseItem> {
    let mut seen: HashSet<_> = resume.iter().map(|item| item.id).collect();
    let resumed_series: HashSet<_> = resume.iter().filter_map(|item| item.series_id).collect();
    let mut merged = resume;
    for item in next_up {
        let series_in_progress = item
            .series_id
            .map(|id| resumed_series.contains(&id))
            .unwrap_or(false);
        if !series_in_progress && seen.insert(item.id) {
            merged.push(item);
        }
    }
    merged
}
