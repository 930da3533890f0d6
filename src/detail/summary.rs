//! Summary card shown at the top of the detail screen
//!
//! Title, overview and up to three info items (director or season count,
//! runtime, estimated end time). Formatting helpers live here too.

use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;

use crate::config::Preferences;
use crate::models::{BaseItem, ItemKind, PersonKind, TICKS_PER_MILLISECOND};

/// Ticks in one minute
const TICKS_PER_MINUTE: f64 = 600_000_000.0;

pub const LABEL_SEASONS: &str = "Seasons";
pub const LABEL_DIRECTED_BY: &str = "Directed by";
pub const LABEL_RUNS: &str = "Runs";
pub const LABEL_ENDS: &str = "Ends";
const UNKNOWN: &str = "[Unknown]";

// =============================================================================
// Formatting
// =============================================================================

/// `h:mm:ss` when an hour or longer, else `m:ss`; negative values render as zero
pub fn format_millis(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Runtime in whole minutes, rounded up
pub fn runtime_minutes(ticks: i64) -> i64 {
    (ticks as f64 / TICKS_PER_MINUTE).ceil() as i64
}

/// `1h 57m` / `42m`; empty for a missing or non-positive runtime
pub fn format_runtime(ticks: Option<i64>) -> String {
    let Some(ticks) = ticks.filter(|t| *t > 0) else {
        return String::new();
    };
    let total = runtime_minutes(ticks);
    let (hours, minutes) = (total / 60, total % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Estimated end of playback if started now
///
/// Programs with a scheduled end use it; resumable items finish the
/// remaining runtime from now.
pub fn end_time(subject: &BaseItem, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if matches!(subject.kind, ItemKind::MusicArtist | ItemKind::Person) {
        return None;
    }
    let runtime = subject.run_time_ticks.filter(|t| *t > 0)?;
    let from_now = |ticks: i64| now + Duration::milliseconds(ticks / TICKS_PER_MILLISECOND);

    if subject.can_resume() {
        return Some(from_now(runtime - subject.playback_position_ticks()));
    }
    match (subject.kind, subject.end_date) {
        (ItemKind::Program, Some(end)) => Some(end),
        _ => Some(from_now(runtime)),
    }
}

/// End time as local wall-clock `HH:MM`, empty when there is none
pub fn format_end_time(subject: &BaseItem, now: DateTime<Utc>) -> String {
    end_time(subject, now)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Label of the resume button for a non-series subject
pub fn resume_label(subject: &BaseItem, preroll_ms: i64) -> String {
    let start = if subject.can_resume() {
        subject.playback_position_ms() - preroll_ms
    } else {
        0
    };
    format!("Resume from {}", format_millis(start))
}

// =============================================================================
// Summary card
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoItem {
    pub label: String,
    pub value: String,
}

impl InfoItem {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryCard {
    pub title: String,
    pub overview: String,
    pub info: Vec<InfoItem>,
}

impl SummaryCard {
    pub fn build(subject: &BaseItem, prefs: &Preferences, now: DateTime<Utc>) -> Self {
        let mut info = Vec::new();

        if !matches!(subject.kind, ItemKind::Person | ItemKind::MusicArtist) {
            if subject.kind == ItemKind::Series {
                info.push(InfoItem::new(
                    LABEL_SEASONS,
                    subject.child_count.unwrap_or(0).to_string(),
                ));
            } else {
                let director = subject
                    .first_person(PersonKind::Director)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| UNKNOWN.to_string());
                info.push(InfoItem::new(LABEL_DIRECTED_BY, director));
            }

            if subject.run_time_ticks.is_some() {
                info.push(InfoItem::new(LABEL_RUNS, format_runtime(subject.run_time_ticks)));
                if prefs.clock_behavior.shows_in_menus() {
                    info.push(InfoItem::new(LABEL_ENDS, format_end_time(subject, now)));
                }
            }
        }

        Self {
            title: subject.name.clone(),
            overview: subject.overview.clone().unwrap_or_default(),
            info,
        }
    }

    pub fn info_value(&self, label: &str) -> Option<&str> {
        self.info
            .iter()
            .find(|i| i.label == label)
            .map(|i| i.value.as_str())
    }

    /// Recompute the "Ends" value; false if the card has none
    pub fn refresh_end_time(&mut self, subject: &BaseItem, now: DateTime<Utc>) -> bool {
        match self.info.iter_mut().find(|i| i.label == LABEL_ENDS) {
            Some(item) => {
                item.value = format_end_time(subject, now);
                true
            }
            None => false,
        }
    }

    pub fn set_overview(&mut self, overview: impl Into<String>) {
        self.overview = overview.into();
    }
}
