//! Action button bar
//!
//! `ActionBar::build` derives the ordered button list from the subject and
//! its context. Which buttons of the overflow subset stay visible is decided
//! by `collapse_overflow`, a pure function over kinds so it can be checked
//! without a controller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use super::summary::resume_label;
use crate::config::Preferences;
use crate::models::{BaseItem, ItemKind, LiveProgramContext, SeriesTimer};

/// Visible buttons allowed before the overflow subset collapses
pub const MAX_VISIBLE_ACTIONS: usize = 4;

/// Collapsible buttons, most important first
pub const OVERFLOW_PRIORITY: [ActionKind; 4] = [
    ActionKind::Queue,
    ActionKind::Trailers,
    ActionKind::Shuffle,
    ActionKind::Favorite,
];

pub const LABEL_PLAY_NEXT_UP: &str = "Play next up";
pub const LABEL_FROM_BEGINNING: &str = "From beginning";
pub const LABEL_ADD_TO_WATCHLIST: &str = "Add to watch list";
pub const LABEL_REMOVE_FROM_WATCHLIST: &str = "Remove from watch list";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ActionKind {
    Resume,
    Play,
    Queue,
    Shuffle,
    InstantMix,
    AudioTrack,
    SubtitleTrack,
    Watchlist,
    Versions,
    Trailers,
    Record,
    RecordSeries,
    SeriesSettings,
    Watched,
    Favorite,
    PrevEpisode,
    GoToSeries,
    Delete,
    SeriesTimerSettings,
    CancelSeriesTimer,
    More,
}

impl ActionKind {
    pub fn default_label(&self) -> &'static str {
        match self {
            ActionKind::Resume => "Resume",
            ActionKind::Play => "Play",
            ActionKind::Queue => "Add to queue",
            ActionKind::Shuffle => "Shuffle all",
            ActionKind::InstantMix => "Instant mix",
            ActionKind::AudioTrack => "Audio track",
            ActionKind::SubtitleTrack => "Subtitle track",
            ActionKind::Watchlist => LABEL_ADD_TO_WATCHLIST,
            ActionKind::Versions => "Select version",
            ActionKind::Trailers => "Play trailers",
            ActionKind::Record => "Record",
            ActionKind::RecordSeries => "Record series",
            ActionKind::SeriesSettings => "Series settings",
            ActionKind::Watched => "Watched",
            ActionKind::Favorite => "Favorite",
            ActionKind::PrevEpisode => "Previous episode",
            ActionKind::GoToSeries => "Go to series",
            ActionKind::Delete => "Delete",
            ActionKind::SeriesTimerSettings => "Series settings",
            ActionKind::CancelSeriesTimer => "Cancel series",
            ActionKind::More => "Other options",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionButton {
    pub kind: ActionKind,
    pub label: String,
    pub visible: bool,
    pub activated: bool,
}

impl ActionButton {
    fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            label: kind.default_label().to_string(),
            visible: true,
            activated: false,
        }
    }

    fn labeled(kind: ActionKind, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::new(kind)
        }
    }

    fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn activated(mut self, on: bool) -> Self {
        self.activated = on;
        self
    }
}

/// Everything the bar is derived from
#[derive(Debug, Clone)]
pub struct ActionContext<'a> {
    pub subject: &'a BaseItem,
    pub program: Option<&'a LiveProgramContext>,
    pub series_timer: Option<&'a SeriesTimer>,
    pub preferences: &'a Preferences,
    pub can_manage_recordings: bool,
    /// `None` when the watchlist section is off, else whether the item is listed
    pub watchlist: Option<bool>,
    pub now: DateTime<Utc>,
}

// =============================================================================
// Overflow collapse
// =============================================================================

/// Decide which overflow-subset buttons stay visible
///
/// `visible` is the current visible set (the More button included if shown),
/// `present` every kind on the bar. Subset members are visited least
/// important first; each is shown if the visible count without it (plus one
/// for a More button that will have to appear) stays under
/// `MAX_VISIBLE_ACTIONS + 1`, else hidden and counted as collapsed. Returns
/// the new visible set and whether More is visible.
pub fn collapse_overflow(
    visible: &BTreeSet<ActionKind>,
    present: &[ActionKind],
) -> (BTreeSet<ActionKind>, bool) {
    let mut result = visible.clone();
    let more_visible = visible.contains(&ActionKind::More);
    let mut count = visible.len();
    let mut collapsed = 0usize;

    for kind in OVERFLOW_PRIORITY.iter().rev().filter(|k| present.contains(k)) {
        let is_visible = result.contains(kind);
        let pending_more = usize::from(!more_visible && collapsed > 0);
        if count - usize::from(is_visible) + pending_more <= MAX_VISIBLE_ACTIONS {
            if !is_visible {
                result.insert(*kind);
                count += 1;
            }
        } else {
            if is_visible {
                result.remove(kind);
                count -= 1;
            }
            collapsed += 1;
        }
    }

    let show_more = collapsed > 0;
    if show_more {
        result.insert(ActionKind::More);
    } else {
        result.remove(&ActionKind::More);
    }
    (result, show_more)
}

// =============================================================================
// ActionBar
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionBar {
    buttons: Vec<ActionButton>,
    focus: Option<ActionKind>,
}

impl ActionBar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the candidate buttons in display order
    ///
    /// Resume starts hidden; the controller decides its visibility once
    /// next-up state is known. More starts hidden and is settled by
    /// `show_more_if_needed`.
    pub fn build(ctx: &ActionContext<'_>) -> Self {
        let item = ctx.subject;
        let mut buttons = Vec::new();

        if item.can_play() {
            let resume = if item.kind == ItemKind::Series {
                LABEL_PLAY_NEXT_UP.to_string()
            } else {
                resume_label(item, ctx.preferences.resume_preroll_ms())
            };
            buttons.push(ActionButton::labeled(ActionKind::Resume, resume).hidden());

            let play = if item.is_live_tv() {
                "Tune to channel"
            } else if item.is_folder() {
                "Play all"
            } else {
                "Play"
            };
            buttons.push(ActionButton::labeled(ActionKind::Play, play));

            if item.is_music() {
                buttons.push(ActionButton::new(ActionKind::Queue));
            }
            if (item.is_folder() && item.kind != ItemKind::BoxSet) || item.kind == ItemKind::MusicArtist {
                buttons.push(ActionButton::new(ActionKind::Shuffle));
            }
            if item.kind == ItemKind::MusicArtist {
                buttons.push(ActionButton::new(ActionKind::InstantMix));
            }
            if item.kind.is_video() {
                if item.audio_track_count() > 1 {
                    buttons.push(ActionButton::new(ActionKind::AudioTrack));
                }
                if item.subtitle_track_count() > 1 {
                    buttons.push(ActionButton::new(ActionKind::SubtitleTrack));
                }
                if let Some(listed) = ctx.watchlist {
                    buttons.push(watchlist_button(listed));
                }
            }
        }

        if item.media_sources.len() > 1 {
            buttons.push(ActionButton::new(ActionKind::Versions));
        }

        if item.has_playable_trailers() {
            buttons.push(ActionButton::new(ActionKind::Trailers));
        }

        if let Some(program) = ctx.program.filter(|_| ctx.can_manage_recordings) {
            if program.is_upcoming_or_airing(ctx.now) {
                buttons.push(
                    ActionButton::new(ActionKind::Record).activated(program.timer_id().is_some()),
                );
            }
            if program.is_series() {
                let has_series_timer = program.series_timer_id().is_some();
                buttons.push(ActionButton::new(ActionKind::RecordSeries).activated(has_series_timer));
                let settings = ActionButton::new(ActionKind::SeriesSettings);
                buttons.push(if has_series_timer { settings } else { settings.hidden() });
            }
        }

        if let Some(user_data) = item.user_data.as_ref().filter(|_| ctx.program.is_none()) {
            if !matches!(item.kind, ItemKind::MusicArtist | ItemKind::Person) {
                buttons.push(ActionButton::new(ActionKind::Watched).activated(user_data.played));
                buttons.push(ActionButton::new(ActionKind::Favorite).activated(user_data.is_favorite));
            }
        }

        if item.kind == ItemKind::Episode && item.series_id.is_some() {
            buttons.push(ActionButton::new(ActionKind::PrevEpisode).hidden());
            buttons.push(ActionButton::new(ActionKind::GoToSeries));
        }

        if ctx.preferences.media_management_enabled {
            let deletable = item.can_delete.unwrap_or(false)
                && (item.kind != ItemKind::Recording || ctx.can_manage_recordings);
            if deletable {
                buttons.push(ActionButton::new(ActionKind::Delete));
            }
        }

        if ctx.series_timer.is_some() {
            buttons.push(ActionButton::new(ActionKind::SeriesTimerSettings));
            buttons.push(ActionButton::new(ActionKind::CancelSeriesTimer));
        }

        buttons.push(ActionButton::new(ActionKind::More).hidden());

        let focus = buttons.iter().find(|b| b.visible).map(|b| b.kind);
        Self { buttons, focus }
    }

    pub fn buttons(&self) -> &[ActionButton] {
        &self.buttons
    }

    pub fn get(&self, kind: ActionKind) -> Option<&ActionButton> {
        self.buttons.iter().find(|b| b.kind == kind)
    }

    fn get_mut(&mut self, kind: ActionKind) -> Option<&mut ActionButton> {
        self.buttons.iter_mut().find(|b| b.kind == kind)
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn is_visible(&self, kind: ActionKind) -> bool {
        self.get(kind).map(|b| b.visible).unwrap_or(false)
    }

    pub fn is_activated(&self, kind: ActionKind) -> bool {
        self.get(kind).map(|b| b.activated).unwrap_or(false)
    }

    pub fn set_visible(&mut self, kind: ActionKind, visible: bool) {
        if let Some(button) = self.get_mut(kind) {
            button.visible = visible;
        }
    }

    pub fn set_activated(&mut self, kind: ActionKind, activated: bool) {
        if let Some(button) = self.get_mut(kind) {
            button.activated = activated;
        }
    }

    pub fn set_label(&mut self, kind: ActionKind, label: impl Into<String>) {
        if let Some(button) = self.get_mut(kind) {
            button.label = label.into();
        }
    }

    pub fn label(&self, kind: ActionKind) -> Option<&str> {
        self.get(kind).map(|b| b.label.as_str())
    }

    pub fn visible(&self) -> impl Iterator<Item = &ActionButton> {
        self.buttons.iter().filter(|b| b.visible)
    }

    pub fn visible_kinds(&self) -> Vec<ActionKind> {
        self.visible().map(|b| b.kind).collect()
    }

    // -------------------------------------------------------------------------
    // Focus
    // -------------------------------------------------------------------------

    pub fn focused(&self) -> Option<ActionKind> {
        self.focus
    }

    /// Focus a button if it exists and is visible
    pub fn request_focus(&mut self, kind: ActionKind) -> bool {
        if self.is_visible(kind) {
            self.focus = Some(kind);
            true
        } else {
            false
        }
    }

    /// Move focus among visible buttons; `forward` wraps at the ends
    pub fn move_focus(&mut self, forward: bool) {
        let visible = self.visible_kinds();
        if visible.is_empty() {
            self.focus = None;
            return;
        }
        let current = self
            .focus
            .and_then(|f| visible.iter().position(|k| *k == f))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % visible.len()
        } else {
            (current + visible.len() - 1) % visible.len()
        };
        self.focus = Some(visible[next]);
    }

    // -------------------------------------------------------------------------
    // Resume / overflow
    // -------------------------------------------------------------------------

    /// Show or hide Resume; a visible Resume relabels Play and takes focus
    pub fn apply_resume_visibility(&mut self, visible: bool) {
        self.set_visible(ActionKind::Resume, visible);
        if visible {
            self.set_label(ActionKind::Play, LABEL_FROM_BEGINNING);
            self.request_focus(ActionKind::Resume);
        } else {
            self.request_focus(ActionKind::Play);
        }
    }

    /// Re-run the overflow collapse over the current bar
    pub fn show_more_if_needed(&mut self) -> bool {
        let visible: BTreeSet<ActionKind> = self.visible_kinds().into_iter().collect();
        let present: Vec<ActionKind> = self.buttons.iter().map(|b| b.kind).collect();
        let (visible, more) = collapse_overflow(&visible, &present);
        for button in self.buttons.iter_mut() {
            button.visible = visible.contains(&button.kind);
        }
        if let Some(focus) = self.focus {
            if !self.is_visible(focus) {
                let first = self.visible().next().map(|b| b.kind);
                self.focus = first;
            }
        }
        more
    }

    /// Entries of the "Other options" popup
    ///
    /// Collapsed subset members, a hidden go-to-series, and the previous
    /// episode once it has been resolved.
    pub fn overflow_entries(&self, previous_resolved: bool) -> Vec<ActionKind> {
        let mut entries: Vec<ActionKind> = OVERFLOW_PRIORITY
            .iter()
            .copied()
            .filter(|k| self.contains(*k) && !self.is_visible(*k))
            .collect();
        if self.contains(ActionKind::GoToSeries) && !self.is_visible(ActionKind::GoToSeries) {
            entries.push(ActionKind::GoToSeries);
        }
        if previous_resolved && self.contains(ActionKind::PrevEpisode) {
            entries.push(ActionKind::PrevEpisode);
        }
        entries
    }

    /// Label used for an entry of the "Other options" popup
    pub fn overflow_label(&self, kind: ActionKind) -> String {
        match kind {
            ActionKind::Favorite if self.is_activated(ActionKind::Favorite) => "Remove favorite".into(),
            ActionKind::Favorite => "Add favorite".into(),
            other => self
                .label(other)
                .unwrap_or(other.default_label())
                .to_string(),
        }
    }
}

fn watchlist_button(listed: bool) -> ActionButton {
    let label = if listed {
        LABEL_REMOVE_FROM_WATCHLIST
    } else {
        LABEL_ADD_TO_WATCHLIST
    };
    ActionButton::labeled(ActionKind::Watchlist, label)
}

/// Flip the watchlist button in place
pub fn set_watchlist_state(bar: &mut ActionBar, listed: bool) {
    let label = if listed {
        LABEL_REMOVE_FROM_WATCHLIST
    } else {
        LABEL_ADD_TO_WATCHLIST
    };
    bar.set_label(ActionKind::Watchlist, label);
    bar.set_activated(ActionKind::Watchlist, false);
}
