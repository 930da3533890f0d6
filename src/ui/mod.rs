//! Terminal UI components
//!
//! Built with ratatui. Keyboard-first navigation throughout.

pub mod detail;
pub mod theme;

pub use detail::render_detail;
pub use theme::Theme;
