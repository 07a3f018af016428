//! UI rendering module
//!
//! The terminal dashboard uses ratatui; the plain renderer prints the same
//! view as text lines.

pub mod dashboard;
pub mod format;
pub mod help_overlay;
pub mod plain;

pub use dashboard::render as render_dashboard;
pub use help_overlay::render as render_help_overlay;
pub use plain::render as render_plain;
