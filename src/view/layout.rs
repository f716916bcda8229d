//! Layout rendering (top bar, sidebar, main area structure)

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use ratatui::widgets::Padding;

use crate::model::{ActiveSection, BackendKind, UiState};
use super::utils::{border_style, row_style};

pub fn render_top_bar(frame: &mut Frame, area: Rect, ui_state: &UiState, accent: Color) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),     // Search input
            Constraint::Length(26), // Music source
        ])
        .split(area);

    let searching = ui_state.active_section == ActiveSection::Search;
    let search_style = if searching {
        Style::default().fg(accent)
    } else {
        Style::default().fg(Color::White)
    };

    let search_text = if ui_state.search_query.is_empty() {
        "Type to search..."
    } else {
        &ui_state.search_query
    };

    let search = Paragraph::new(search_text)
        .style(search_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search ")
                .padding(Padding::horizontal(1))
                .border_style(border_style(searching, accent)),
        );
    frame.render_widget(search, chunks[0]);

    // The free backend's health decides whether switching is possible
    let (marker, marker_color) = if ui_state.backend_available {
        ("●", Color::Green)
    } else {
        ("○", Color::DarkGray)
    };
    let icon = match ui_state.backend {
        BackendKind::Spotify => "🎵",
        BackendKind::YtMusic => "▶",
    };
    let source = Paragraph::new(Line::from(vec![
        Span::styled(format!("{} {} ", icon, ui_state.backend), Style::default().fg(accent)),
        Span::styled(marker, Style::default().fg(marker_color)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Source "));
    frame.render_widget(source, chunks[1]);
}

pub fn render_sidebar(frame: &mut Frame, area: Rect, ui_state: &UiState, accent: Color) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(ui_state.library_items.len() as u16 + 2),
            Constraint::Min(0), // Playlists (fills remaining space)
        ])
        .split(area);

    let library_focused = ui_state.active_section == ActiveSection::Library;
    let library_items: Vec<ListItem> = ui_state
        .library_items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let style = row_style(i == ui_state.library_selected, library_focused, accent);
            ListItem::new(item.name.clone()).style(style)
        })
        .collect();

    let library = List::new(library_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Library ")
            .padding(Padding::horizontal(1))
            .border_style(border_style(library_focused, accent)),
    );
    frame.render_widget(library, chunks[0]);

    let playlists_focused = ui_state.active_section == ActiveSection::Playlists;
    let playlist_items: Vec<ListItem> = if ui_state.playlists.is_empty() {
        vec![ListItem::new("No playlists yet (c to create)").style(Style::default().fg(Color::DarkGray))]
    } else {
        ui_state
            .playlists
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let style = row_style(i == ui_state.playlist_selected, playlists_focused, accent);
                ListItem::new(format!("{} ({})", item.name, item.track_count)).style(style)
            })
            .collect()
    };

    let playlists = List::new(playlist_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Playlists ")
                .padding(Padding::horizontal(1))
                .border_style(border_style(playlists_focused, accent)),
        )
        .highlight_style(Style::default()); // Highlight handled by item styles

    let mut list_state = ListState::default();
    list_state.select(Some(ui_state.playlist_selected));

    frame.render_stateful_widget(playlists, chunks[1], &mut list_state);
}
