//! Overlay rendering (error, notice, help, settings, share link, prompt, playlist picker)

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::library::theme_by_id;
use crate::model::{BackendKind, InputPrompt, PlaylistPicker, UiState};
use super::utils::centered_rect;

fn popup_block(title: String, color: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title)
        .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .style(Style::default().bg(Color::Black))
}

/// Lines a message needs when wrapped to `inner_width`
fn wrapped_lines(message: &str, inner_width: usize) -> u16 {
    ((message.chars().count() as f32) / (inner_width.max(1) as f32)).ceil().max(1.0) as u16
}

pub fn render_error_notification(frame: &mut Frame, ui_state: &UiState) {
    if let Some(ref error_msg) = ui_state.error_message {
        let area = frame.area();
        let popup_width = 52.min(area.width.saturating_sub(4));
        let inner_width = popup_width.saturating_sub(4) as usize; // account for borders
        let popup_area = centered_rect(area, popup_width, 2 + wrapped_lines(error_msg, inner_width));

        frame.render_widget(Clear, popup_area);
        let error_widget = Paragraph::new(error_msg.to_string())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: false })
            .block(popup_block(" Error (Esc to dismiss) ".to_string(), Color::Red));
        frame.render_widget(error_widget, popup_area);
    }
}

/// Short-lived status message in the bottom-right corner
pub fn render_notice(frame: &mut Frame, notice: &str, accent: Color) {
    let area = frame.area();
    let width = (notice.chars().count() as u16 + 4).min(area.width.saturating_sub(2));
    let notice_area = Rect {
        x: area.width.saturating_sub(width + 1),
        y: area.height.saturating_sub(6),
        width,
        height: 3,
    };
    frame.render_widget(Clear, notice_area);
    let widget = Paragraph::new(notice.to_string())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent))
                .style(Style::default().bg(Color::Black)),
        );
    frame.render_widget(widget, notice_area);
}

pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();

    let keybindings = vec![
        ("", "── Navigation ──"),
        ("Tab / Shift+Tab", "Cycle sections"),
        ("↑ / ↓", "Move selection"),
        ("← / →", "Switch home row"),
        ("Enter", "Select / Play"),
        ("Backspace / Esc", "Go back"),
        ("/ or G", "Focus search"),
        ("L", "Focus playlists"),
        ("U", "Show queue"),
        ("W", "Lyrics (YouTube Music)"),
        ("", ""),
        ("", "── Playback ──"),
        ("Space", "Play / Pause"),
        ("N / P", "Next / previous track"),
        ("R", "Cycle repeat (off → all → one)"),
        ("S", "Stop"),
        ("< / >", "Seek 10s back / forward"),
        ("", ""),
        ("", "── Library ──"),
        ("X", "Like / Unlike selected track"),
        ("Shift+L", "Like / Unlike playing track"),
        ("A", "Add to playlist"),
        ("C", "New playlist"),
        ("E", "Rename playlist"),
        ("Delete", "Remove track / delete playlist"),
        ("Y", "Share track or playlist"),
        ("I", "Open a share link"),
        ("T", "Transcribe lyrics"),
        ("", ""),
        ("", "── General ──"),
        ("O", "Settings (source, theme, logout)"),
        ("H / ?", "Toggle this help"),
        ("Q", "Quit"),
    ];

    let popup_area = centered_rect(area, 62, keybindings.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let lines: Vec<Line> = keybindings
        .iter()
        .map(|(key, desc)| {
            if key.is_empty() {
                // Section header or empty line
                Line::from(Span::styled(
                    format!("{:^38}", desc),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(vec![
                    Span::styled(
                        format!("{:>18}", key),
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::styled(desc.to_string(), Style::default().fg(Color::White)),
                ])
            }
        })
        .collect();

    let help_text = Paragraph::new(lines)
        .block(popup_block(" Help (H or Esc to close) ".to_string(), Color::Cyan))
        .style(Style::default().bg(Color::Black));
    frame.render_widget(help_text, popup_area);
}

/// Labels of the settings rows, in selection order
pub fn settings_rows(ui_state: &UiState) -> [String; 3] {
    let target = ui_state.backend.other();
    let availability = if target == BackendKind::YtMusic && !ui_state.backend_available {
        " (offline)"
    } else {
        ""
    };
    [
        format!("Source: {}  →  switch to {}{}", ui_state.backend, target, availability),
        format!("Theme: {}", theme_by_id(&ui_state.theme_id).name),
        "Log out of Spotify".to_string(),
    ]
}

pub fn render_settings(frame: &mut Frame, ui_state: &UiState, accent: Color) {
    let popup_area = centered_rect(frame.area(), 56, 5);
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = settings_rows(ui_state)
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let style = if i == ui_state.settings_selected {
                Style::default().fg(Color::Black).bg(accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(label).style(style)
        })
        .collect();

    let list = List::new(items).block(popup_block(" Settings (↑↓ Enter Esc) ".to_string(), accent));
    let mut list_state = ListState::default();
    list_state.select(Some(ui_state.settings_selected));
    frame.render_stateful_widget(list, popup_area, &mut list_state);
}

pub fn render_share_link(frame: &mut Frame, link: &str, accent: Color) {
    let area = frame.area();
    let popup_width = 70.min(area.width.saturating_sub(4));
    let inner_width = popup_width.saturating_sub(4) as usize;
    let popup_area = centered_rect(area, popup_width, 4 + wrapped_lines(link, inner_width));
    frame.render_widget(Clear, popup_area);

    let text = vec![
        Line::from(Span::styled(link.to_string(), Style::default().fg(Color::White))),
        Line::from(""),
        Line::from(Span::styled("Copy the link above, Esc to close", Style::default().fg(Color::DarkGray))),
    ];
    let widget = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(popup_block(" Share link ".to_string(), accent));
    frame.render_widget(widget, popup_area);
}

pub fn render_prompt(frame: &mut Frame, prompt: &InputPrompt, accent: Color) {
    let popup_area = centered_rect(frame.area(), 60, 3);
    frame.render_widget(Clear, popup_area);

    let widget = Paragraph::new(format!("{}▏", prompt.value))
        .style(Style::default().fg(Color::White))
        .block(popup_block(prompt.kind.title().to_string(), accent));
    frame.render_widget(widget, popup_area);
}

pub fn render_playlist_picker(frame: &mut Frame, ui_state: &UiState, picker: &PlaylistPicker, accent: Color) {
    let area = frame.area();
    let popup_height = (ui_state.playlists.len() as u16 + 2).max(3);
    let popup_area = centered_rect(area, 50, popup_height);
    frame.render_widget(Clear, popup_area);

    let title = format!(" Add \"{}\" to ", picker.track.name);
    if ui_state.playlists.is_empty() {
        let widget = Paragraph::new("No playlists yet. Press Enter, then c to create one.")
            .style(Style::default().fg(Color::DarkGray))
            .block(popup_block(title, accent));
        frame.render_widget(widget, popup_area);
        return;
    }

    let items: Vec<ListItem> = ui_state
        .playlists
        .iter()
        .enumerate()
        .map(|(i, playlist)| {
            let style = if i == picker.selected {
                Style::default().fg(Color::Black).bg(accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(format!("{} ({})", playlist.name, playlist.track_count)).style(style)
        })
        .collect();

    let list = List::new(items).block(popup_block(title, accent));
    let mut list_state = ListState::default();
    list_state.select(Some(picker.selected));
    frame.render_stateful_widget(list, popup_area, &mut list_state);
}
