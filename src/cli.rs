//! CLI - Command Line Interface for tvdetail
//!
//! Every detail-screen initialization mode is scriptable headlessly.
//! All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Load a detail screen and print card, actions and rows
//! tvdetail details 2f6ad2a5c4cb4d3b9b6c26e0f3f4a1b7 --json
//!
//! # Channel mode (current program) and series-timer mode
//! tvdetail channel 0d7a8b1e1f2a4b1c9e0e7a3b2c1d0e9f
//! tvdetail series-timer 9a1c2b3d4e5f60718293a4b5c6d7e8f9
//!
//! # Drive one paginated row
//! tvdetail row 2f6ad2a5c4cb4d3b9b6c26e0f3f4a1b7 --kind person-movies --chunk 50 --pages 3
//!
//! # Interactive detail screen
//! tvdetail browse 2f6ad2a5c4cb4d3b9b6c26e0f3f4a1b7
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;
use uuid::Uuid;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network or server error
    NetworkError = 3,
    /// Item, channel or timer not found
    NotFound = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// tvdetail - Jellyfin item detail screen for the terminal
#[derive(Parser, Debug)]
#[command(
    name = "tvdetail",
    version,
    about = "Jellyfin item detail screen for the terminal",
    long_about = "Loads the detail screen of a Jellyfin item, live channel or \
                  series recording: summary card, action buttons and related rows.\n\n\
                  Use `browse` for the interactive screen, the other subcommands \
                  for scripting.",
    after_help = "EXAMPLES:\n\
                  tvdetail browse <ITEM_ID>            Interactive detail screen\n\
                  tvdetail details <ITEM_ID> --json    Headless detail screen\n\
                  tvdetail row <ITEM_ID> -k seasons    Drive a single row"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Configured server to use (default server when omitted)
    #[arg(long, short = 's', global = true)]
    pub server: Option<Uuid>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Interactive terminal UI requested
    pub fn is_tui_mode(&self) -> bool {
        matches!(self.command, Some(Command::Browse(_)))
    }

    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the detail screen of an item
    #[command(visible_alias = "d")]
    Details(DetailsCmd),

    /// Load the detail screen of a live channel's program
    #[command(visible_alias = "ch")]
    Channel(ChannelCmd),

    /// Load the detail screen of a series recording
    #[command(visible_alias = "st")]
    SeriesTimer(SeriesTimerCmd),

    /// Retrieve and page through one related row
    Row(RowCmd),

    /// Interactive detail screen
    #[command(visible_alias = "b")]
    Browse(BrowseCmd),
}

/// Load an item's detail screen headlessly
#[derive(Args, Debug)]
pub struct DetailsCmd {
    /// Item id (hex, with or without dashes)
    #[arg(required = true)]
    pub item_id: String,

    /// Run an action after loading (e.g. watched, favorite)
    #[arg(long, short = 'a', value_enum)]
    pub action: Option<ActionArg>,
}

/// Load a channel's program detail screen
#[derive(Args, Debug)]
pub struct ChannelCmd {
    /// Channel id
    #[arg(required = true)]
    pub channel_id: String,

    /// JSON file with a program snapshot (current program when omitted)
    #[arg(long, short = 'p')]
    pub program: Option<PathBuf>,
}

/// Load a series recording's detail screen
#[derive(Args, Debug)]
pub struct SeriesTimerCmd {
    /// Series timer id
    #[arg(required = true)]
    pub timer_id: String,
}

/// Drive a single row through retrieval and paging
#[derive(Args, Debug)]
pub struct RowCmd {
    /// Subject item id (series, movie, person or artist)
    #[arg(required = true)]
    pub item_id: String,

    /// Row shape
    #[arg(long, short = 'k', value_enum)]
    pub kind: RowKindArg,

    /// Page size (0 = unpaged)
    #[arg(long, default_value = "0")]
    pub chunk: u32,

    /// Maximum number of pages to load
    #[arg(long, short = 'p', default_value = "1")]
    pub pages: u32,
}

/// Open the interactive detail screen
#[derive(Args, Debug)]
pub struct BrowseCmd {
    /// Item id
    #[arg(required = true)]
    pub item_id: String,
}

/// Row shapes available to `row`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKindArg {
    Similar,
    Seasons,
    NextUp,
    Specials,
    Trailers,
    Parts,
    Upcoming,
    PersonMovies,
    ArtistAlbums,
}

/// Actions runnable from `details --action`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionArg {
    Watched,
    Favorite,
    Record,
    RecordSeries,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print plain text (text mode only)
    pub fn text(&self, text: impl std::fmt::Display) {
        if !self.json {
            println!("{}", text);
        }
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Id Validation
// =============================================================================

/// Parse a Jellyfin id (32 hex digits, dashes optional)
pub fn parse_item_id(id: &str) -> Result<Uuid, &'static str> {
    Uuid::parse_str(id.trim()).map_err(|_| "Invalid item id (expected 32 hex digits)")
}

// =============================================================================
// Tests
// =============================================================================
