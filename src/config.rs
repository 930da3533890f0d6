//! Configuration management for tvdetail
//!
//! Handles config file loading/saving, server credentials and user preferences.
//! Config is stored at ~/.config/tvdetail/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// When the on-screen clock (and the detail "Ends" time) is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClockBehavior {
    #[default]
    Always,
    InMenus,
    InVideo,
    Never,
}

impl ClockBehavior {
    /// Detail screens count as menus
    pub fn shows_in_menus(&self) -> bool {
        matches!(self, ClockBehavior::Always | ClockBehavior::InMenus)
    }
}

/// Home screen sections the user has enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeSection {
    LatestMedia,
    Resume,
    NextUp,
    LiveTv,
    Watchlist,
    LibraryTiles,
}

/// User preferences read by the detail screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Seconds rewound when resuming (kept as text, as entered)
    pub resume_subtract_duration: String,
    pub clock_behavior: ClockBehavior,
    pub debugging_enabled: bool,
    pub media_management_enabled: bool,
    pub home_sections: Vec<HomeSection>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            resume_subtract_duration: "0".to_string(),
            clock_behavior: ClockBehavior::Always,
            debugging_enabled: false,
            media_management_enabled: false,
            home_sections: vec![HomeSection::Resume, HomeSection::NextUp, HomeSection::LatestMedia],
        }
    }
}

impl Preferences {
    /// Resume preroll in milliseconds; malformed values count as zero
    pub fn resume_preroll_ms(&self) -> i64 {
        match self.resume_subtract_duration.trim().parse::<i64>() {
            Ok(seconds) => seconds.checked_mul(1000).unwrap_or_else(|| {
                tracing::error!(value = %self.resume_subtract_duration, "Resume preroll out of range");
                0
            }),
            Err(e) => {
                tracing::error!(value = %self.resume_subtract_duration, error = %e, "Unable to parse resume preroll");
                0
            }
        }
    }

    pub fn watchlist_enabled(&self) -> bool {
        self.home_sections.contains(&HomeSection::Watchlist)
    }
}

/// One Jellyfin server the user is signed in to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub access_token: String,
    pub user_id: Uuid,
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server used when none is given on the command line
    pub default_server: Option<Uuid>,
    /// Known servers
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Config {
    /// Get config file path (~/.config/tvdetail/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tvdetail").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
            .with_env_overrides()
    }

    /// Load config from an explicit path; unreadable or invalid files yield the default
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match toml::from_str(&s) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Apply environment overrides to the default server:
    /// 1. JELLYFIN_URL / JELLYFIN_TOKEN / JELLYFIN_USER_ID override its fields
    /// 2. If no server is configured and all three are set, one is synthesized
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("JELLYFIN_URL").ok(),
            std::env::var("JELLYFIN_TOKEN").ok(),
            std::env::var("JELLYFIN_USER_ID")
                .ok()
                .and_then(|s| Uuid::parse_str(&s).ok()),
        )
    }

    fn with_overrides(mut self, url: Option<String>, token: Option<String>, user_id: Option<Uuid>) -> Self {
        let default_id = self.default_server;
        match self.servers.iter_mut().find(|s| Some(s.id) == default_id) {
            Some(server) => {
                if let Some(url) = url {
                    server.url = url;
                }
                if let Some(token) = token {
                    server.access_token = token;
                }
                if let Some(user_id) = user_id {
                    server.user_id = user_id;
                }
            }
            None => {
                if let (Some(url), Some(token), Some(user_id)) = (url, token, user_id) {
                    let id = Uuid::new_v4();
                    self.servers.push(ServerConfig {
                        id,
                        name: "Environment".to_string(),
                        url,
                        access_token: token,
                        user_id,
                    });
                    self.default_server = Some(id);
                }
            }
        }
        self
    }

    /// Server by id, or the default server, or the first configured
    pub fn server(&self, id: Option<Uuid>) -> Option<&ServerConfig> {
        match id {
            Some(id) => self.servers.iter().find(|s| s.id == id),
            None => self
                .default_server
                .and_then(|d| self.servers.iter().find(|s| s.id == d))
                .or_else(|| self.servers.first()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: Uuid) -> ServerConfig {
        ServerConfig {
            id,
            name: "Home".into(),
            url: "http://jellyfin.local:8096".into(),
            access_token: "abc".into(),
            user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.servers.is_empty());
        assert!(config.default_server.is_none());
        assert_eq!(config.preferences.clock_behavior, ClockBehavior::Always);
    }

    #[test]
    fn test_resume_preroll_parsing() {
        let mut prefs = Preferences::default();
        prefs.resume_subtract_duration = "10".into();
        assert_eq!(prefs.resume_preroll_ms(), 10_000);
        prefs.resume_subtract_duration = "ten".into();
        assert_eq!(prefs.resume_preroll_ms(), 0);
    }

    #[test]
    fn test_resume_preroll_out_of_range_is_zero() {
        let mut prefs = Preferences::default();
        prefs.resume_subtract_duration = "9999999999999999".into();
        assert_eq!(prefs.resume_preroll_ms(), 0);
        prefs.resume_subtract_duration = i64::MAX.to_string();
        assert_eq!(prefs.resume_preroll_ms(), 0);
    }

    #[test]
    fn test_toml_round_trip_with_partial_preferences() {
        let text = r#"
            default_server = "6f1f8bc0-c4a5-4a0c-9f2d-4d7ac4f5d6e7"

            [[servers]]
            id = "6f1f8bc0-c4a5-4a0c-9f2d-4d7ac4f5d6e7"
            name = "Home"
            url = "http://jellyfin.local:8096"
            access_token = "abc"
            user_id = "7f1f8bc0-c4a5-4a0c-9f2d-4d7ac4f5d6e7"

            [preferences]
            home_sections = ["watchlist"]
            clock_behavior = "in_video"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert!(config.preferences.watchlist_enabled());
        assert!(!config.preferences.clock_behavior.shows_in_menus());
        assert_eq!(config.preferences.resume_subtract_duration, "0");
        assert_eq!(config.server(None).map(|s| s.name.as_str()), Some("Home"));
    }

    #[test]
    fn test_env_overrides_existing_default() {
        let id = Uuid::new_v4();
        let config = Config {
            servers: vec![server(id)],
            default_server: Some(id),
            ..Default::default()
        }
        .with_overrides(Some("http://other:8096".into()), None, None);
        assert_eq!(config.servers[0].url, "http://other:8096");
        assert_eq!(config.servers[0].access_token, "abc");
    }

    #[test]
    fn test_env_synthesizes_server() {
        let user = Uuid::new_v4();
        let config = Config::default().with_overrides(
            Some("http://env:8096".into()),
            Some("tok".into()),
            Some(user),
        );
        let server = config.server(None).unwrap();
        assert_eq!(server.url, "http://env:8096");
        assert_eq!(server.user_id, user);
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = std::env::temp_dir().join(format!("tvdetail-test-{}", Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut config = Config::default();
        config.preferences.debugging_enabled = true;
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        let _ = std::fs::remove_dir_all(dir);
    }
}
