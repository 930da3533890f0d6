//! Jellyfin client tests
//!
//! Checks endpoints, auth header, item parsing and error mapping against a
//! mock HTTP server.

use mockito::{Matcher, Server};
use uuid::Uuid;

use tvdetail::api::query::{ItemQuery, SimilarQuery};
use tvdetail::api::{ApiError, JellyfinClient, MediaServer};
use tvdetail::models::{ItemKind, SeriesTimer};

const TOKEN: &str = "secret-token";

fn client(server: &Server, user: Uuid) -> JellyfinClient {
    JellyfinClient::new(server.url(), TOKEN, user).with_server_id("home")
}

// =============================================================================
// Items
// =============================================================================

#[tokio::test]
async fn test_get_item_parses_and_tags_server() {
    let mut server = Server::new_async().await;
    let user = Uuid::new_v4();
    let item_id = Uuid::new_v4();

    let body = format!(
        r#"{{
            "Id": "{}",
            "Name": "Alien",
            "Type": "Movie",
            "ProductionYear": 1979,
            "RunTimeTicks": 70140000000,
            "UserData": {{"Played": false, "PlaybackPositionTicks": 600000000, "IsFavorite": true}},
            "People": [{{"Id": "{}", "Name": "Ridley Scott", "Type": "Director"}}],
            "LocalTrailerCount": 2
        }}"#,
        item_id.simple(),
        Uuid::new_v4().simple()
    );

    let mock = server
        .mock(
            "GET",
            format!("/Users/{}/Items/{}", user.simple(), item_id.simple()).as_str(),
        )
        .match_query(Matcher::Regex("Fields=.*People".into()))
        .match_header("X-Emby-Token", TOKEN)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let item = client(&server, user).get_item(item_id).await.unwrap();
    mock.assert_async().await;

    assert_eq!(item.id, item_id);
    assert_eq!(item.kind, ItemKind::Movie);
    assert_eq!(item.server_id.as_deref(), Some("home"));
    assert_eq!(item.playback_position_ms(), 60_000);
    assert!(item.is_favorite());
    assert_eq!(item.local_trailer_count, Some(2));
    assert_eq!(item.people.len(), 1);
}

#[tokio::test]
async fn test_missing_item_is_not_found() {
    let mut server = Server::new_async().await;
    let user = Uuid::new_v4();
    let _mock = server
        .mock("GET", Matcher::Regex("^/Users/.*/Items/".into()))
        .with_status(404)
        .create_async()
        .await;

    let err = client(&server, user).get_item(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_auth_failure_mapped() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let err = client(&server, Uuid::new_v4()).current_user().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn test_bad_json_is_invalid_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", Matcher::Any)
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = client(&server, Uuid::new_v4())
        .get_item(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_similar_and_paged_items() {
    let mut server = Server::new_async().await;
    let user = Uuid::new_v4();
    let item_id = Uuid::new_v4();
    let person_id = Uuid::new_v4();

    let page = format!(
        r#"{{"Items": [{{"Id": "{}", "Name": "Aliens", "Type": "Movie"}}], "TotalRecordCount": 41, "StartIndex": 0}}"#,
        Uuid::new_v4().simple()
    );

    let similar = server
        .mock("GET", format!("/Items/{}/Similar", item_id.simple()).as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("UserId".into(), user.simple().to_string()),
            Matcher::UrlEncoded("Limit".into(), "20".into()),
        ]))
        .with_status(200)
        .with_body(&page)
        .create_async()
        .await;

    let items = server
        .mock("GET", "/Items")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("PersonIds".into(), person_id.simple().to_string()),
            Matcher::UrlEncoded("IncludeItemTypes".into(), "Series".into()),
            Matcher::UrlEncoded("StartIndex".into(), "100".into()),
            Matcher::UrlEncoded("Limit".into(), "100".into()),
        ]))
        .with_status(200)
        .with_body(&page)
        .create_async()
        .await;

    let jellyfin = client(&server, user);
    let result = jellyfin
        .similar(&SimilarQuery {
            item_id,
            limit: Some(20),
        })
        .await
        .unwrap();
    assert_eq!(result.total_record_count, 41);
    assert_eq!(result.items[0].server_id.as_deref(), Some("home"));

    let result = jellyfin
        .query_items(&ItemQuery::by_person(person_id, ItemKind::Series), 100, Some(100))
        .await
        .unwrap();
    assert_eq!(result.items.len(), 1);

    similar.assert_async().await;
    items.assert_async().await;
}

// =============================================================================
// User data
// =============================================================================

#[tokio::test]
async fn test_favorite_toggle_methods() {
    let mut server = Server::new_async().await;
    let user = Uuid::new_v4();
    let item_id = Uuid::new_v4();
    let path = format!("/Users/{}/FavoriteItems/{}", user.simple(), item_id.simple());

    let add = server
        .mock("POST", path.as_str())
        .with_status(200)
        .with_body(r#"{"IsFavorite": true, "Played": false, "PlaybackPositionTicks": 0}"#)
        .create_async()
        .await;
    let remove = server
        .mock("DELETE", path.as_str())
        .with_status(200)
        .with_body(r#"{"IsFavorite": false}"#)
        .create_async()
        .await;

    let jellyfin = client(&server, user);
    assert!(jellyfin.set_favorite(item_id, true).await.unwrap().is_favorite);
    assert!(!jellyfin.set_favorite(item_id, false).await.unwrap().is_favorite);

    add.assert_async().await;
    remove.assert_async().await;
}

#[tokio::test]
async fn test_delete_item() {
    let mut server = Server::new_async().await;
    let item_id = Uuid::new_v4();
    let mock = server
        .mock("DELETE", format!("/Items/{}", item_id.simple()).as_str())
        .match_header("X-Emby-Token", TOKEN)
        .with_status(204)
        .create_async()
        .await;

    client(&server, Uuid::new_v4()).delete_item(item_id).await.unwrap();
    mock.assert_async().await;
}

// =============================================================================
// Live TV
// =============================================================================

#[tokio::test]
async fn test_record_program_round_trip() {
    let mut server = Server::new_async().await;
    let program_id = "a1b2c3";

    let defaults = server
        .mock("GET", "/LiveTv/Timers/Defaults")
        .match_query(Matcher::UrlEncoded("ProgramId".into(), program_id.into()))
        .with_status(200)
        .with_body(r#"{"ProgramId": "a1b2c3", "PrePaddingSeconds": 60, "ServiceName": "Emby"}"#)
        .create_async()
        .await;

    // Unknown server fields are sent back untouched
    let create = server
        .mock("POST", "/LiveTv/Timers")
        .match_body(Matcher::PartialJsonString(
            r#"{"ProgramId": "a1b2c3", "PrePaddingSeconds": 60, "ServiceName": "Emby"}"#.into(),
        ))
        .with_status(204)
        .create_async()
        .await;

    let jellyfin = client(&server, Uuid::new_v4());
    let timer: SeriesTimer = jellyfin.get_default_timer(program_id).await.unwrap();
    assert_eq!(timer.pre_padding_seconds, 60);
    jellyfin.create_timer(&timer).await.unwrap();

    defaults.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn test_series_schedule_and_cancel() {
    let mut server = Server::new_async().await;

    let schedule = server
        .mock("GET", "/LiveTv/Timers")
        .match_query(Matcher::UrlEncoded("SeriesTimerId".into(), "s1".into()))
        .with_status(200)
        .with_body(
            r#"{"Items": [{"Id": "t1", "SeriesTimerId": "s1", "ProgramInfo": {"Id": "0b1f8bc0c4a54a0c9f2d4d7ac4f5d6e7", "Name": "News", "Type": "Program"}}], "TotalRecordCount": 1}"#,
        )
        .create_async()
        .await;
    let cancel = server
        .mock("DELETE", "/LiveTv/SeriesTimers/s1")
        .with_status(204)
        .create_async()
        .await;

    let jellyfin = client(&server, Uuid::new_v4());
    let timers = jellyfin.timers_for_series("s1").await.unwrap();
    assert_eq!(timers.items.len(), 1);
    assert_eq!(
        timers.items[0].program_info.as_ref().map(|p| p.name.as_str()),
        Some("News")
    );
    jellyfin.cancel_series_timer("s1").await.unwrap();

    schedule.assert_async().await;
    cancel.assert_async().await;
}
