//! Application state for the terminal dashboard
//!
//! The data is loaded before the first frame; the app only keeps the
//! computed view and reacts to keys.

use crossterm::event::{KeyCode, KeyEvent};

use crate::view::DashboardView;

/// Terminal UI state
pub struct App {
    pub view: DashboardView,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Number of entities whose load failed, shown in the status line
    pub failed_loads: usize,
}

impl App {
    pub fn new(view: DashboardView, failed_loads: usize) -> Self {
        Self {
            view,
            should_quit: false,
            show_help: false,
            failed_loads,
        }
    }

    /// Handles keyboard input
    ///
    /// # Key Bindings
    /// - `q` or `Esc`: Quit (Esc closes the help overlay first)
    /// - `?`: Toggle the help overlay
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        if self.show_help {
            match key_event.code {
                KeyCode::Esc | KeyCode::Char('?') => self.show_help = false,
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            }
            return;
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
    }
}
