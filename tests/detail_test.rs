//! Detail controller tests
//!
//! Drives `DetailController` against an in-memory server: loading, rows,
//! action buttons, popups, live TV recording and lifecycle gating.

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::{item, Harness, StubServer, SERVER_ID};
use tvdetail::config::HomeSection;
use tvdetail::detail::{ActionKind, DetailController, DetailTarget, PopupKind, TimerKind};
use tvdetail::models::{
    BaseItem, Chapter, ItemKind, MediaSource, MediaStream, Person, PersonKind, SeriesTimer,
    StreamKind, Timer, User, UserData,
};
use tvdetail::rows::RowItem;
use tvdetail::services::{Destination, PlaybackRequest};

fn stream(kind: StreamKind, index: i32) -> MediaStream {
    MediaStream {
        kind,
        index,
        codec: Some("aac".into()),
        language: Some("eng".into()),
        display_title: None,
    }
}

fn person(name: &str, kind: PersonKind) -> Person {
    Person {
        id: Uuid::new_v4(),
        name: name.to_string(),
        role: None,
        kind,
    }
}

async fn open(h: &Harness, target: DetailTarget) -> DetailController {
    let now = Utc::now();
    let mut controller = DetailController::new(h.context(), target, Some(SERVER_ID.to_string()));
    controller.on_start();
    controller.on_resume(now);
    controller.load(now).await;
    controller.run_pending_fetches().await;
    controller
}

// =============================================================================
// Loading and rows
// =============================================================================

#[tokio::test]
async fn test_movie_rows_in_display_order() {
    let mut movie = item(ItemKind::Movie, "Arrival");
    movie.part_count = Some(1);
    movie.special_feature_count = Some(2);
    movie.local_trailer_count = Some(2);
    movie.people = vec![
        person("Amy Adams", PersonKind::Actor),
        person("Denis Villeneuve", PersonKind::Director),
    ];
    movie.chapters = vec![Chapter {
        start_position_ticks: 0,
        name: Some("Opening".into()),
        image_tag: None,
    }];
    let similar = item(ItemKind::Movie, "Contact");
    let server = StubServer::new().with_item(movie.clone());
    server.update(|s| s.similar = vec![similar.clone()]);

    let h = Harness::new(server);
    let controller = open(&h, DetailTarget::Item(movie.id)).await;

    assert_eq!(
        controller.rows().titles(),
        vec![
            "Additional Parts",
            "Cast & Crew",
            "Chapters",
            "Specials",
            "Trailers",
            "More Like This"
        ]
    );

    let cast = controller.rows().at(1).unwrap();
    assert_eq!(cast.items().len(), 2);

    let more = controller.rows().at(5).unwrap();
    match &more.items()[0] {
        RowItem::Item(found) => {
            assert_eq!(found.id, similar.id);
            assert_eq!(found.server_id.as_deref(), Some(SERVER_ID));
        }
        other => panic!("unexpected row item {:?}", other),
    }
    assert_eq!(controller.summary().unwrap().title, "Arrival");
    assert!(!controller.has_pending_fetches());
}

#[tokio::test]
async fn test_missing_item_navigates_back() {
    let h = Harness::new(StubServer::new());
    let controller = open(&h, DetailTarget::Item(Uuid::new_v4())).await;

    assert!(controller.subject().is_none());
    assert_eq!(h.navigator.back_count(), 1);
}

#[tokio::test]
async fn test_series_rows_and_trigger_refresh() {
    let series = item(ItemKind::Series, "Severance");
    let server = StubServer::new().with_item(series.clone());
    server.update(|s| s.seasons = vec![item(ItemKind::Season, "Season 1")]);
    let h = Harness::new(server);

    let t0 = Utc::now();
    let mut controller = DetailController::new(h.context(), DetailTarget::Item(series.id), None);
    controller.on_start();
    controller.on_resume(t0);
    controller.load(t0).await;
    controller.run_pending_fetches().await;

    assert_eq!(
        controller.rows().titles(),
        vec!["Next Up", "Seasons", "Upcoming", "More Like This"]
    );
    assert_eq!(controller.rows().at(1).unwrap().items().len(), 1);

    // Episode watched elsewhere: rows with the TV playback trigger re-fetch on return
    h.refresh.set_last_tv_playback(t0 + Duration::seconds(5));
    controller.on_pause();
    controller.on_resume(t0 + Duration::seconds(10));
    assert_eq!(controller.take_pending_fetches().len(), 2);
}

#[tokio::test]
async fn test_person_row_click_opens_person() {
    let mut movie = item(ItemKind::Movie, "Heat");
    let actor = person("Al Pacino", PersonKind::Actor);
    movie.people = vec![actor.clone()];
    let h = Harness::new(StubServer::new().with_item(movie.clone()));
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;

    let row = controller.rows().at(0).unwrap().id;
    controller.on_row_item_clicked(row, 0);

    assert_eq!(
        h.navigator.current(),
        Some(Destination::ItemDetails {
            item_id: actor.id,
            server_id: Some(SERVER_ID.to_string()),
        })
    );
}

// =============================================================================
// Actions
// =============================================================================

#[tokio::test]
async fn test_episode_overflow_and_previous_episode() {
    let series_id = Uuid::new_v4();
    let previous = item(ItemKind::Episode, "Good News About Hell");
    let mut episode = item(ItemKind::Episode, "Half Loop");
    episode.series_id = Some(series_id);
    episode.season_id = Some(Uuid::new_v4());
    episode.index_number = Some(2);
    episode.local_trailer_count = Some(1);
    episode.user_data = Some(UserData {
        playback_position_ticks: 6_000_000_000,
        ..Default::default()
    });
    episode.media_sources = vec![MediaSource {
        id: "source".into(),
        name: None,
        container: Some("mkv".into()),
        media_streams: vec![
            stream(StreamKind::Audio, 1),
            stream(StreamKind::Audio, 2),
            stream(StreamKind::Subtitle, 3),
            stream(StreamKind::Subtitle, 4),
        ],
    }];

    let server = StubServer::new().with_item(episode.clone());
    server.update(|s| s.adjacent = vec![previous.clone(), episode.clone()]);
    let h = Harness::new(server);
    let mut controller = open(&h, DetailTarget::Item(episode.id)).await;

    assert_eq!(
        controller.actions().visible_kinds(),
        vec![
            ActionKind::Resume,
            ActionKind::Play,
            ActionKind::AudioTrack,
            ActionKind::SubtitleTrack,
            ActionKind::Watched,
            ActionKind::GoToSeries,
            ActionKind::More,
        ]
    );
    assert_eq!(controller.actions().label(ActionKind::Play), Some("From beginning"));
    assert_eq!(controller.previous_episode(), Some(previous.id));

    let now = Utc::now();
    controller.activate(ActionKind::More, now).await;
    let popup = controller.popup().unwrap();
    assert_eq!(
        popup.options,
        vec!["Play trailers", "Add favorite", "Previous episode"]
    );

    controller.choose(2, now).await;
    assert_eq!(
        h.navigator.current(),
        Some(Destination::ItemDetails {
            item_id: previous.id,
            server_id: Some(SERVER_ID.to_string()),
        })
    );
}

#[tokio::test]
async fn test_resume_plays_from_saved_position() {
    let mut movie = item(ItemKind::Movie, "Dune");
    movie.user_data = Some(UserData {
        playback_position_ticks: 12_000_000_000,
        ..Default::default()
    });
    let mut h = Harness::new(StubServer::new().with_item(movie.clone()));
    h.preferences.resume_subtract_duration = "10".into();
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;

    assert_eq!(controller.actions().focused(), Some(ActionKind::Resume));
    controller.activate(ActionKind::Resume, Utc::now()).await;

    match h.playback.last() {
        Some(PlaybackRequest::Play {
            items, position_ms, ..
        }) => {
            assert_eq!(items[0].id, movie.id);
            assert_eq!(position_ms, 1_200_000 - 10_000);
        }
        other => panic!("unexpected playback {:?}", other),
    }
}

#[tokio::test]
async fn test_resume_before_preroll_starts_at_zero() {
    let mut movie = item(ItemKind::Movie, "Dune");
    movie.user_data = Some(UserData {
        playback_position_ticks: 50_000_000,
        ..Default::default()
    });
    let mut h = Harness::new(StubServer::new().with_item(movie.clone()));
    h.preferences.resume_subtract_duration = "10".into();
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;

    controller.activate(ActionKind::Resume, Utc::now()).await;
    match h.playback.last() {
        Some(PlaybackRequest::Play { position_ms, .. }) => assert_eq!(position_ms, 0),
        other => panic!("unexpected playback {:?}", other),
    }
}

#[tokio::test]
async fn test_series_resume_offers_choice() {
    let mut series = item(ItemKind::Series, "Andor");
    series.user_data = Some(UserData {
        played_percentage: Some(40.0),
        ..Default::default()
    });
    let mut next = item(ItemKind::Episode, "Aldhani");
    next.user_data = Some(UserData {
        playback_position_ticks: 600_000_000,
        ..Default::default()
    });
    let server = StubServer::new().with_item(series.clone());
    server.update(|s| s.next_up = vec![next.clone()]);
    let h = Harness::new(server);
    let mut controller = open(&h, DetailTarget::Item(series.id)).await;

    assert!(controller.actions().is_visible(ActionKind::Resume));
    let now = Utc::now();
    controller.activate(ActionKind::Resume, now).await;

    let popup = controller.popup().unwrap();
    assert!(popup.options[0].starts_with("Resume from"));
    assert_eq!(popup.options[1], "From beginning");

    controller.choose(1, now).await;
    match h.playback.last() {
        Some(PlaybackRequest::Play {
            items, position_ms, ..
        }) => {
            assert_eq!(items[0].id, next.id);
            assert_eq!(position_ms, 0);
        }
        other => panic!("unexpected playback {:?}", other),
    }
}

#[tokio::test]
async fn test_subtitle_popup_marks_current_choice() {
    let mut movie = item(ItemKind::Movie, "Amélie");
    movie.media_sources = vec![MediaSource {
        id: "source".into(),
        name: None,
        container: None,
        media_streams: vec![stream(StreamKind::Subtitle, 2), stream(StreamKind::Subtitle, 3)],
    }];
    let h = Harness::new(StubServer::new().with_item(movie.clone()));
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;
    let now = Utc::now();

    controller.activate(ActionKind::SubtitleTrack, now).await;
    let popup = controller.popup().unwrap();
    assert_eq!(popup.options.first().map(String::as_str), Some("None"));
    assert_eq!(popup.options.last().map(String::as_str), Some("Default"));
    assert_eq!(popup.checked, Some(popup.options.len() - 1));

    controller.choose(0, now).await;
    assert_eq!(
        controller.track_selection().subtitle,
        tvdetail::detail::TrackChoice::Off
    );
    assert_eq!(h.messages.last().as_deref(), Some("Subtitles: None"));
}

#[tokio::test]
async fn test_favorite_and_watched_toggle() {
    let movie = item(ItemKind::Movie, "Alien");
    let h = Harness::new(StubServer::new().with_item(movie.clone()));
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;
    let now = Utc::now();

    controller.activate(ActionKind::Favorite, now).await;
    assert!(controller.actions().is_activated(ActionKind::Favorite));
    assert_eq!(h.refresh.last_favorite_update(), Some(now));

    controller.activate(ActionKind::Watched, now).await;
    assert!(controller.actions().is_activated(ActionKind::Watched));
    assert_eq!(h.refresh.last_movie_playback(), Some(now));
    assert!(h.refresh.last_tv_playback().is_none());
    assert_eq!(h.server.count("set_played"), 1);
}

#[tokio::test]
async fn test_watchlist_without_server_reports_failure() {
    let movie = item(ItemKind::Movie, "Blade Runner");
    let mut h = Harness::new(StubServer::new().with_item(movie.clone()));
    h.preferences.home_sections.push(HomeSection::Watchlist);
    h.session = std::sync::Arc::new(tvdetail::services::UserSession::new(Some(User::default()), None));
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;

    assert!(controller.actions().contains(ActionKind::Watchlist));
    controller.activate(ActionKind::Watchlist, Utc::now()).await;
    assert_eq!(h.messages.last().as_deref(), Some("Failed to add to watch list"));
}

#[tokio::test]
async fn test_watchlist_toggle_is_server_scoped() {
    use tvdetail::services::Watchlist;

    let movie = item(ItemKind::Movie, "Blade Runner");
    let mut h = Harness::new(StubServer::new().with_item(movie.clone()));
    h.preferences.home_sections.push(HomeSection::Watchlist);
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;
    let now = Utc::now();

    controller.activate(ActionKind::Watchlist, now).await;
    assert!(h.watchlist.contains(movie.id, SERVER_ID));
    assert!(!h.watchlist.contains(movie.id, "elsewhere"));
    assert_eq!(
        controller.actions().label(ActionKind::Watchlist),
        Some("Remove from watch list")
    );

    controller.activate(ActionKind::Watchlist, now).await;
    assert!(!h.watchlist.contains(movie.id, SERVER_ID));
    assert_eq!(h.messages.last().as_deref(), Some("Removed from watch list"));
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let mut movie = item(ItemKind::Movie, "Old Home Video");
    movie.can_delete = Some(true);
    let mut h = Harness::new(StubServer::new().with_item(movie.clone()));
    h.preferences.media_management_enabled = true;
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;
    let now = Utc::now();

    controller.activate(ActionKind::Delete, now).await;
    assert!(matches!(
        controller.popup().map(|p| &p.kind),
        Some(PopupKind::ConfirmDelete)
    ));
    controller.choose(1, now).await;
    assert!(h.server.state.lock().unwrap().deleted.is_empty());

    controller.activate(ActionKind::Delete, now).await;
    controller.choose(0, now).await;
    assert_eq!(h.server.state.lock().unwrap().deleted, vec![movie.id]);
    assert_eq!(h.refresh.last_deleted_item_id(), Some(movie.id));
    assert_eq!(h.navigator.back_count(), 1);
    assert_eq!(h.messages.last().as_deref(), Some("Old Home Video deleted"));
}

#[tokio::test]
async fn test_failed_delete_stays_on_screen() {
    let mut movie = item(ItemKind::Movie, "Keeper");
    movie.can_delete = Some(true);
    let server = StubServer::new().with_item(movie.clone());
    server.update(|s| s.fail_deletes = true);
    let mut h = Harness::new(server);
    h.preferences.media_management_enabled = true;
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;
    let now = Utc::now();

    controller.activate(ActionKind::Delete, now).await;
    controller.choose(0, now).await;
    assert_eq!(h.navigator.back_count(), 0);
    assert_eq!(h.messages.last().as_deref(), Some("Failed to delete Keeper"));
    assert!(h.refresh.last_deleted_item_id().is_none());
}

// =============================================================================
// Live TV
// =============================================================================

fn live_tv_harness() -> (Harness, Uuid, BaseItem) {
    let channel_id = Uuid::new_v4();
    let mut program = item(ItemKind::Program, "Evening News");
    program.is_series = Some(true);
    program.start_date = Some(Utc::now() - Duration::minutes(10));
    program.end_date = Some(Utc::now() + Duration::minutes(50));

    let mut channel = item(ItemKind::TvChannel, "Channel 4");
    channel.id = channel_id;
    channel.current_program = Some(Box::new(program.clone()));

    let server = StubServer::new().with_item(program.clone());
    server.update(|s| {
        s.channels.insert(channel_id, channel);
        s.programs.insert(program.id.simple().to_string(), program.clone());
    });
    let mut h = Harness::new(server);
    let mut user = User::default();
    user.policy.enable_live_tv_management = true;
    h.session = std::sync::Arc::new(tvdetail::services::UserSession::new(
        Some(user),
        Some(SERVER_ID.to_string()),
    ));
    (h, channel_id, program)
}

#[tokio::test]
async fn test_channel_mode_record_toggle() {
    let (h, channel_id, program) = live_tv_harness();
    let mut controller = open(
        &h,
        DetailTarget::Channel {
            channel_id,
            program: None,
        },
    )
    .await;

    let subject = controller.subject().unwrap();
    assert_eq!(subject.id, program.id);
    assert_eq!(subject.parent_id, Some(channel_id));
    assert!(controller.actions().is_visible(ActionKind::Record));
    assert!(!controller.actions().is_activated(ActionKind::Record));
    assert!(!controller.actions().is_visible(ActionKind::SeriesSettings));
    assert!(!controller.actions().contains(ActionKind::Watched));

    let now = Utc::now();
    controller.activate(ActionKind::Record, now).await;
    assert!(controller.actions().is_activated(ActionKind::Record));
    assert_eq!(controller.program().and_then(|p| p.timer_id()), Some("timer-1"));
    assert_eq!(h.messages.last().as_deref(), Some("Set to record"));
    assert_eq!(h.server.count("create_timer"), 1);

    controller.activate(ActionKind::Record, now).await;
    assert!(!controller.actions().is_activated(ActionKind::Record));
    assert_eq!(h.server.count("cancel_timer timer-1"), 1);
    assert_eq!(h.refresh.last_deleted_item_id(), Some(program.id));
}

#[tokio::test]
async fn test_channel_mode_series_recording() {
    let (h, channel_id, program) = live_tv_harness();
    let mut controller = open(
        &h,
        DetailTarget::Channel {
            channel_id,
            program: Some(program.clone()),
        },
    )
    .await;
    // Program passed in: no channel lookup
    assert_eq!(h.server.count("get_channel"), 0);

    let now = Utc::now();
    controller.activate(ActionKind::RecordSeries, now).await;
    assert!(controller.actions().is_activated(ActionKind::RecordSeries));
    assert!(controller.actions().is_visible(ActionKind::SeriesSettings));

    controller.activate(ActionKind::RecordSeries, now).await;
    assert!(matches!(
        controller.popup().map(|p| &p.kind),
        Some(PopupKind::ConfirmCancelRecordSeries)
    ));
    controller.choose(0, now).await;
    assert_eq!(h.server.count("cancel_series_timer series-1"), 1);
    assert!(!controller.actions().is_activated(ActionKind::RecordSeries));
    assert!(!controller.actions().is_activated(ActionKind::Record));
    assert!(!controller.actions().is_visible(ActionKind::SeriesSettings));
}

#[tokio::test]
async fn test_channel_without_program_goes_back() {
    let h = Harness::new(StubServer::new());
    let controller = open(
        &h,
        DetailTarget::Channel {
            channel_id: Uuid::new_v4(),
            program: None,
        },
    )
    .await;
    assert!(controller.subject().is_none());
    assert_eq!(h.navigator.back_count(), 1);
}

// =============================================================================
// Series timers
// =============================================================================

fn series_timer() -> SeriesTimer {
    SeriesTimer {
        id: Some(Uuid::new_v4().simple().to_string()),
        name: Some("Jeopardy!".into()),
        channel_name: Some("ABC".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_series_timer_mode_shows_schedule() {
    let timer = series_timer();
    let timer_id = timer.id.clone().unwrap();
    let airing = item(ItemKind::Program, "Jeopardy! #1");
    let server = StubServer::new();
    server.update(|s| {
        s.schedule = vec![Timer {
            id: Some("t1".into()),
            series_timer_id: Some(timer_id.clone()),
            program_info: Some(airing.clone()),
            ..Default::default()
        }];
    });
    let h = Harness::new(server);
    let controller = open(&h, DetailTarget::SeriesTimer(timer.clone())).await;

    let subject = controller.subject().unwrap();
    assert_eq!(subject.kind, ItemKind::Folder);
    assert_eq!(subject.name, "Jeopardy!");
    assert_eq!(controller.rows().titles(), vec!["Schedule"]);
    match &controller.rows().at(0).unwrap().items()[0] {
        RowItem::Item(program) => {
            assert_eq!(program.timer_id.as_deref(), Some("t1"));
            assert_eq!(program.series_timer_id.as_deref(), Some(timer_id.as_str()));
        }
        other => panic!("unexpected row item {:?}", other),
    }
    assert!(!controller.actions().contains(ActionKind::Play));
    assert!(controller.actions().is_visible(ActionKind::CancelSeriesTimer));
}

#[tokio::test]
async fn test_cancel_series_timer_leaves_screen() {
    let timer = series_timer();
    let h = Harness::new(StubServer::new());
    let mut controller = open(&h, DetailTarget::SeriesTimer(timer.clone())).await;
    let now = Utc::now();

    controller.activate(ActionKind::CancelSeriesTimer, now).await;
    controller.choose(0, now).await;

    let expected = format!("cancel_series_timer {}", timer.id.clone().unwrap());
    assert_eq!(h.server.count(&expected), 1);
    assert_eq!(h.navigator.back_count(), 1);
    assert_eq!(h.messages.last().as_deref(), Some("Recording cancelled"));
}

#[tokio::test]
async fn test_series_timer_edit_rebuilds_schedule() {
    let timer = series_timer();
    let timer_id = timer.id.clone().unwrap();
    let mut edited = timer.clone();
    edited.record_new_only = true;
    let server = StubServer::new();
    server.update(|s| {
        s.series_timers.insert(timer_id.clone(), edited);
    });
    let h = Harness::new(server);
    let mut controller = open(&h, DetailTarget::SeriesTimer(timer)).await;

    let now = Utc::now();
    controller.on_action_complete(now).await;
    assert!(controller.rows().is_empty());
    assert!(controller
        .summary()
        .unwrap()
        .overview
        .contains("New episodes only"));
    assert!(controller.timers().is_scheduled(TimerKind::ScheduleRebuild));

    controller.poll_timers(now + Duration::seconds(2)).await;
    assert_eq!(controller.rows().titles(), vec!["Schedule"]);
    assert!(controller.has_pending_fetches());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_post_resume_refresh_after_playback() {
    let movie = item(ItemKind::Movie, "Tenet");
    let server = StubServer::new().with_item(movie.clone());
    let h = Harness::new(server.clone());

    let t0 = Utc::now();
    let mut controller = DetailController::new(h.context(), DetailTarget::Item(movie.id), None);
    controller.on_start();
    controller.on_resume(t0);
    controller.load(t0).await;
    assert!(!controller.actions().is_visible(ActionKind::Resume));

    // Played part of it elsewhere
    let mut watched = movie.clone();
    watched.user_data = Some(UserData {
        playback_position_ticks: 3_000_000_000,
        ..Default::default()
    });
    server.update(|s| {
        s.items.insert(movie.id, watched);
    });
    h.refresh.set_last_playback(t0 + Duration::milliseconds(500));

    controller.poll_timers(t0 + Duration::seconds(1)).await;
    assert_eq!(server.count("get_item"), 2);
    assert!(controller.actions().is_visible(ActionKind::Resume));
    assert_eq!(controller.actions().focused(), Some(ActionKind::Resume));
    assert!(controller.subject().unwrap().can_resume());
}

#[tokio::test]
async fn test_post_resume_refresh_skipped_without_playback() {
    let movie = item(ItemKind::Movie, "Tenet");
    let server = StubServer::new().with_item(movie.clone());
    let h = Harness::new(server.clone());
    let t0 = Utc::now();
    let mut controller = DetailController::new(h.context(), DetailTarget::Item(movie.id), None);
    controller.on_start();
    controller.on_resume(t0);
    controller.load(t0).await;

    controller.poll_timers(t0 + Duration::seconds(1)).await;
    assert_eq!(server.count("get_item"), 1);
    assert!(!controller.timers().is_scheduled(TimerKind::PostResumeRefresh));
}

#[tokio::test]
async fn test_stopped_screen_ignores_results() {
    let movie = item(ItemKind::Movie, "Solaris");
    let h = Harness::new(StubServer::new().with_item(movie.clone()));
    let now = Utc::now();
    let mut controller = DetailController::new(h.context(), DetailTarget::Item(movie.id), None);
    controller.on_start();
    controller.on_resume(now);
    controller.load(now).await;

    let request = controller.take_pending_fetches().pop().unwrap();
    controller.on_pause();
    controller.on_stop();
    assert!(!controller.is_active());
    assert!(!controller.timers().is_scheduled(TimerKind::Clock));
    assert!(!controller.timers().is_scheduled(TimerKind::PostResumeRefresh));

    let applied = controller.apply_fetch(request.row, request.generation, Ok(Default::default()));
    assert!(!applied);

    controller.set_subject(item(ItemKind::Movie, "Other"), now).await;
    assert_eq!(controller.subject().unwrap().id, movie.id);

    controller.on_destroy();
    assert!(!controller.timers().is_scheduled(TimerKind::PostResumeRefresh));
}

#[tokio::test]
async fn test_rows_dropped_while_away_reload_on_return() {
    let actor = item(ItemKind::Person, "Tilda Swinton");
    let server = StubServer::new().with_item(actor.clone());
    server.update(|s| s.library = vec![item(ItemKind::Movie, "Orlando")]);
    let h = Harness::new(server);
    let now = Utc::now();
    let mut controller = DetailController::new(h.context(), DetailTarget::Item(actor.id), None);
    controller.on_start();
    controller.on_resume(now);
    controller.load(now).await;

    // Another screen opened before the person rows came back
    let requests = controller.take_pending_fetches();
    assert_eq!(requests.len(), 3);
    controller.on_pause();
    controller.on_stop();
    for request in &requests {
        assert!(!controller.apply_fetch(request.row, request.generation, Ok(Default::default())));
    }
    for row in controller.rows().iter() {
        assert!(!row.adapter().unwrap().is_retrieving());
    }

    controller.on_start();
    controller.on_resume(now + Duration::seconds(5));
    assert!(controller.has_pending_fetches());
    controller.run_pending_fetches().await;
    assert_eq!(h.server.count("query_items"), 3);
    let movies = controller.rows().at(0).unwrap();
    assert_eq!(movies.items().len(), 1);
    assert!(!movies.adapter().unwrap().is_retrieving());
}

#[tokio::test]
async fn test_play_key_plays_focused_row_item() {
    let mut movie = item(ItemKind::Movie, "Drive");
    movie.local_trailer_count = Some(0);
    let similar = item(ItemKind::Movie, "Thief");
    let server = StubServer::new().with_item(movie.clone());
    server.update(|s| s.similar = vec![similar.clone()]);
    let h = Harness::new(server);
    let mut controller = open(&h, DetailTarget::Item(movie.id)).await;

    // Nothing focused in the rows: the subject plays
    assert!(controller.on_play_pause_key());
    assert!(matches!(
        h.playback.last(),
        Some(PlaybackRequest::Play { ref items, .. }) if items[0].id == movie.id
    ));

    let row = controller.rows().at(0).unwrap().id;
    controller.on_row_item_selected(row, 0);
    assert!(controller.on_play_pause_key());
    assert!(matches!(
        h.playback.last(),
        Some(PlaybackRequest::Play { ref items, .. }) if items[0].id == similar.id
    ));
}
