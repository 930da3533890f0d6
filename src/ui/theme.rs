//! Theme for the detail browser
//!
//! Dark palette with Jellyfin's purple and blue accents, plus style helpers
//! for the detail screen widgets.

use ratatui::style::{Color, Modifier, Style};

/// Detail browser palette
pub struct Theme;

impl Theme {
    // ═══════════════════════════════════════════════════════════════════════
    // CORE PALETTE
    // ═══════════════════════════════════════════════════════════════════════

    /// Background: #101014
    pub const BACKGROUND: Color = Color::Rgb(0x10, 0x10, 0x14);

    /// Primary: #00a4dc (Jellyfin blue)
    pub const PRIMARY: Color = Color::Rgb(0x00, 0xa4, 0xdc);

    /// Secondary: #aa5cc3 (Jellyfin purple)
    pub const SECONDARY: Color = Color::Rgb(0xaa, 0x5c, 0xc3);

    /// Accent: #f2c94c (gold, used for toggled actions)
    pub const ACCENT: Color = Color::Rgb(0xf2, 0xc9, 0x4c);

    /// Text: #e6e6eb
    pub const TEXT: Color = Color::Rgb(0xe6, 0xe6, 0xeb);

    /// Dim: #7a7a88
    pub const DIM: Color = Color::Rgb(0x7a, 0x7a, 0x88);

    /// Recording: #e5484d
    pub const RECORDING: Color = Color::Rgb(0xe5, 0x48, 0x4d);

    // ═══════════════════════════════════════════════════════════════════════
    // DERIVED COLORS
    // ═══════════════════════════════════════════════════════════════════════

    /// Panel background for the status bar
    pub const BACKGROUND_LIGHT: Color = Color::Rgb(0x1c, 0x1c, 0x24);

    /// Unfocused border
    pub const BORDER: Color = Color::Rgb(0x3a, 0x3a, 0x4a);

    /// Focused border
    pub const BORDER_FOCUSED: Color = Self::PRIMARY;

    // ═══════════════════════════════════════════════════════════════════════
    // STYLE HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Default text style
    pub fn text() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::BACKGROUND)
    }

    /// Focused action button
    pub fn highlighted() -> Style {
        Style::default()
            .fg(Self::BACKGROUND)
            .bg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn dimmed() -> Style {
        Style::default().fg(Self::DIM)
    }

    /// Screen and row titles
    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Info item values
    pub fn secondary() -> Style {
        Style::default().fg(Self::SECONDARY)
    }

    /// Toggled action (watched, favorite, in watchlist)
    pub fn accent() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    /// Active recording marker
    pub fn recording() -> Style {
        Style::default()
            .fg(Self::RECORDING)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border() -> Style {
        Style::default().fg(Self::BORDER)
    }

    pub fn border_focused() -> Style {
        Style::default()
            .fg(Self::BORDER_FOCUSED)
            .add_modifier(Modifier::BOLD)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMPONENT STYLES
    // ═══════════════════════════════════════════════════════════════════════

    /// Row item or popup option (normal state)
    pub fn list_item() -> Style {
        Style::default().fg(Self::TEXT)
    }

    /// Row item or popup option (selected)
    pub fn list_item_selected() -> Style {
        Style::default()
            .fg(Self::BACKGROUND)
            .bg(Self::SECONDARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Keybinding hint style
    pub fn keybind() -> Style {
        Style::default().fg(Self::ACCENT)
    }

    /// Keybinding description style
    pub fn keybind_desc() -> Style {
        Style::default().fg(Self::DIM)
    }

    pub fn status_bar() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::BACKGROUND_LIGHT)
    }

    /// Loading indicator
    pub fn loading() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }
}
