//! Row adapter paging tests
//!
//! Runs adapters end to end against the in-memory server: first page,
//! scroll-driven look-ahead, single-flight paging and refresh generations.

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::{item, StubServer};
use tvdetail::api::query::{ItemQuery, RowQuery, SimilarQuery};
use tvdetail::models::{ItemKind, Timer};
use tvdetail::rows::{fetch, ChangeTrigger, FetchMode, RowAdapter, RowId, RowItem};
use tvdetail::services::DataRefreshService;

fn library(count: usize) -> StubServer {
    let server = StubServer::new();
    let items = (0..count)
        .map(|i| item(ItemKind::Movie, &format!("Movie {:03}", i)))
        .collect();
    server.update(|s| s.library = items);
    server
}

fn person_row(chunk: u32) -> RowAdapter {
    RowAdapter::new(
        RowId(1),
        RowQuery::Items(ItemQuery::by_person(Uuid::new_v4(), ItemKind::Movie)),
        chunk,
    )
}

async fn run(server: &StubServer, adapter: &mut RowAdapter, request: tvdetail::rows::FetchRequest) -> bool {
    let result = fetch::execute(server, &request).await;
    adapter.complete(request.generation, result)
}

#[tokio::test]
async fn test_pages_through_library() {
    let server = library(250);
    let mut adapter = person_row(100);

    let first = adapter.retrieve(Utc::now()).into_request().unwrap();
    assert_eq!((first.start, first.limit, first.mode), (0, Some(100), FetchMode::Replace));
    assert!(run(&server, &mut adapter, first).await);
    assert_eq!(adapter.len(), 100);
    assert_eq!(adapter.total_items(), 250);
    assert!(!adapter.is_fully_loaded());

    // Far from the loaded end: nothing to do
    assert!(adapter.load_more_if_needed(10).is_none());

    let second = adapter.load_more_if_needed(60).unwrap();
    assert_eq!((second.start, second.mode), (100, FetchMode::Append));
    // Single flight while the page is out
    assert!(adapter.load_more_if_needed(99).is_none());
    assert!(run(&server, &mut adapter, second).await);
    assert_eq!(adapter.items_loaded(), 200);

    let third = adapter.retrieve_next().unwrap();
    assert_eq!(third.start, 200);
    assert!(run(&server, &mut adapter, third).await);
    assert_eq!(adapter.len(), 250);
    assert!(adapter.is_fully_loaded());
    assert!(adapter.load_more_if_needed(249).is_none());
    assert!(adapter.retrieve_next().is_none());

    match adapter.get(249) {
        Some(RowItem::Item(last)) => assert_eq!(last.name, "Movie 249"),
        other => panic!("unexpected row item {:?}", other),
    }
    assert_eq!(server.count("query_items"), 3);
}

#[tokio::test]
async fn test_refresh_discards_pages_in_flight() {
    let server = library(30);
    let mut adapter = person_row(10);
    let now = Utc::now();

    let stale = adapter.retrieve(now).into_request().unwrap();
    let fresh = adapter.retrieve(now + Duration::seconds(1)).into_request().unwrap();
    assert!(fresh.generation > stale.generation);

    assert!(!run(&server, &mut adapter, stale).await);
    assert!(adapter.is_empty());
    assert!(adapter.is_retrieving());

    assert!(run(&server, &mut adapter, fresh).await);
    assert_eq!(adapter.len(), 10);
    assert!(!adapter.is_retrieving());
}

#[tokio::test]
async fn test_refresh_replaces_items() {
    let server = library(5);
    let mut adapter = person_row(10);
    let now = Utc::now();

    let request = adapter.retrieve(now).into_request().unwrap();
    run(&server, &mut adapter, request).await;
    assert_eq!(adapter.len(), 5);

    server.update(|s| s.library.truncate(2));
    let request = adapter.retrieve(now).into_request().unwrap();
    run(&server, &mut adapter, request).await;
    assert_eq!(adapter.len(), 2);
    assert_eq!(adapter.total_items(), 2);
}

#[tokio::test]
async fn test_unpaged_row_loads_once() {
    let server = StubServer::new();
    server.update(|s| s.similar = vec![item(ItemKind::Movie, "A"), item(ItemKind::Movie, "B")]);
    let mut adapter = RowAdapter::new(
        RowId(2),
        RowQuery::SimilarMovies(SimilarQuery {
            item_id: Uuid::new_v4(),
            limit: Some(20),
        }),
        0,
    )
    .with_server_id(Some("home".to_string()));

    let request = adapter.retrieve(Utc::now()).into_request().unwrap();
    assert_eq!(request.limit, None);
    run(&server, &mut adapter, request).await;

    assert!(adapter.is_fully_loaded());
    assert!(adapter.load_more_if_needed(1).is_none());
    assert!(adapter
        .items()
        .iter()
        .all(|i| matches!(i, RowItem::Item(item) if item.server_id.as_deref() == Some("home"))));
}

#[tokio::test]
async fn test_trigger_re_retrieves_after_change() {
    let server = library(3);
    let refresh = DataRefreshService::new();
    let t0 = Utc::now();
    let mut adapter = person_row(10).with_triggers(&[ChangeTrigger::MoviePlayback]);

    // Never retrieved: nothing to refresh
    refresh.set_last_movie_playback(t0);
    assert!(adapter.re_retrieve_if_needed(&refresh, t0).is_none());

    let request = adapter.retrieve(t0).into_request().unwrap();
    run(&server, &mut adapter, request).await;
    assert!(!adapter.needs_re_retrieve(&refresh));

    refresh.set_last_tv_playback(t0 + Duration::seconds(1));
    assert!(!adapter.needs_re_retrieve(&refresh));

    refresh.set_last_movie_playback(t0 + Duration::seconds(2));
    let again = adapter
        .re_retrieve_if_needed(&refresh, t0 + Duration::seconds(3))
        .and_then(|r| r.into_request())
        .unwrap();
    assert_eq!(again.start, 0);
    assert_eq!(adapter.last_full_retrieve(), Some(t0 + Duration::seconds(3)));
}

#[test]
fn test_schedule_row_carries_timer_ids() {
    let server = StubServer::new();
    let program = item(ItemKind::Program, "Late Show");
    server.update(|s| {
        s.schedule = vec![
            Timer {
                id: Some("t1".into()),
                series_timer_id: Some("s1".into()),
                program_info: Some(program.clone()),
                ..Default::default()
            },
            // No program attached: skipped
            Timer {
                id: Some("t2".into()),
                ..Default::default()
            },
        ];
    });
    let mut adapter = RowAdapter::new(
        RowId(3),
        RowQuery::Schedule {
            series_timer_id: "s1".into(),
        },
        0,
    );
    let request = adapter.retrieve(Utc::now()).into_request().unwrap();
    tokio_test::block_on(run(&server, &mut adapter, request));

    assert_eq!(adapter.len(), 1);
    match adapter.get(0) {
        Some(RowItem::Item(found)) => {
            assert_eq!(found.id, program.id);
            assert_eq!(found.timer_id.as_deref(), Some("t1"));
            assert_eq!(found.series_timer_id.as_deref(), Some("s1"));
        }
        other => panic!("unexpected row item {:?}", other),
    }
}
