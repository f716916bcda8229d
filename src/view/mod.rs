//! View module - UI rendering
//!
//! This module handles all UI rendering for the application using ratatui.
//! It is organized into submodules by component type:
//!
//! - `utils`: Shared utility functions (formatting, scrollable lists, theme colors)
//! - `layout`: Main layout structure (top bar, sidebar)
//! - `content`: Main content area rendering
//! - `progress`: Progress bar rendering
//! - `overlays`: Modal overlays (error, notice, help, settings, share, prompt, picker)

mod utils;
mod layout;
mod content;
mod progress;
mod overlays;

use std::collections::HashSet;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::model::{ContentState, PlaybackInfo, UiState};

pub struct AppView;

impl AppView {
    pub fn render(
        frame: &mut Frame,
        playback: &PlaybackInfo,
        ui_state: &UiState,
        content_state: &ContentState,
        liked: &HashSet<String>,
    ) {
        let accent = utils::accent_color(&ui_state.theme_id);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Search bar + source
                Constraint::Min(0),    // Main content (sidebar + content)
                Constraint::Length(3), // Progress bar with playback info
            ])
            .split(frame.area());

        layout::render_top_bar(frame, chunks[0], ui_state, accent);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30), // Sidebar (Library + Playlists)
                Constraint::Percentage(70), // Main content
            ])
            .split(chunks[1]);

        layout::render_sidebar(frame, main_chunks[0], ui_state, accent);

        let playing_id = playback.track.as_ref().map(|t| t.id.as_str());
        content::render_main_content(frame, main_chunks[1], ui_state, content_state, playing_id, liked, accent);

        progress::render_progress_bar(frame, chunks[2], playback, accent);

        if let Some(notice) = &ui_state.notice {
            overlays::render_notice(frame, notice, accent);
        }

        if ui_state.show_settings {
            overlays::render_settings(frame, ui_state, accent);
        }

        if let Some(picker) = &ui_state.playlist_picker {
            overlays::render_playlist_picker(frame, ui_state, picker, accent);
        }

        if let Some(prompt) = &ui_state.prompt {
            overlays::render_prompt(frame, prompt, accent);
        }

        if let Some(link) = &ui_state.share_link {
            overlays::render_share_link(frame, link, accent);
        }

        if ui_state.show_help_popup {
            overlays::render_help_popup(frame);
        }

        // Errors sit above everything else
        if ui_state.error_message.is_some() {
            overlays::render_error_notification(frame, ui_state);
        }
    }
}
