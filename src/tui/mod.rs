//! TUI host for a call session
//!
//! Terminal user interface using Ratatui.

mod app;
pub mod log_capture;
mod log_pane;
mod ui;

pub use app::run;
