//! Main content area rendering (home rows, track lists, stats, lyrics)

use std::collections::HashSet;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, ListItem, Paragraph, Wrap},
    Frame,
};
use ratatui::widgets::Padding;

use crate::catalog::MOODS;
use crate::library::ListeningStats;
use crate::model::{
    ActiveSection, ContentState, ContentView, HomeRows, HomeSection, Lyrics, PlaylistItem,
    TrackList, UiState,
};
use super::utils::{
    border_style, calculate_track_column_widths, format_duration, render_scrollable_list,
    row_style, truncate_string,
};

/// Per-frame values every list renderer needs
#[derive(Clone, Copy)]
struct RowContext<'a> {
    focused: bool,
    accent: Color,
    playing_id: Option<&'a str>,
    liked: &'a HashSet<String>,
}

pub fn render_main_content(
    frame: &mut Frame,
    area: Rect,
    ui_state: &UiState,
    content_state: &ContentState,
    playing_id: Option<&str>,
    liked: &HashSet<String>,
    accent: Color,
) {
    let ctx = RowContext {
        focused: ui_state.active_section == ActiveSection::MainContent,
        accent,
        playing_id,
        liked,
    };
    let view = &content_state.view;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(view.title())
        .padding(Padding::horizontal(1))
        .border_style(border_style(ctx.focused, accent));

    if content_state.is_loading {
        let loading = Paragraph::new("Loading...")
            .style(Style::default().fg(Color::Yellow))
            .block(block);
        frame.render_widget(loading, area);
        return;
    }

    match view {
        ContentView::Empty => {
            let content = Paragraph::new("Type in search and press Enter to find music\n\nUse Tab to navigate between sections\nUse ↑/↓ to select items\nPress Enter to open, h for help")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(content, area);
        }
        ContentView::Home(home) => render_home(frame, area, home, &ctx),
        ContentView::SearchResults { list, .. }
        | ContentView::SharedTrack { list }
        | ContentView::PlaylistDetail { list, .. }
        | ContentView::RemotePlaylist { list, .. }
        | ContentView::LikedSongs { list }
        | ContentView::RecentlyPlayed { list } => {
            render_track_list(frame, area, list, None, block, &ctx);
        }
        ContentView::Queue { list, now_playing } => {
            render_track_list(frame, area, list, *now_playing, block, &ctx);
        }
        ContentView::SpotifyPlaylists { playlists, selected } => {
            render_playlist_list(frame, area, playlists, *selected, block, &ctx);
        }
        ContentView::Stats(stats) => render_stats(frame, area, stats, block, accent),
        ContentView::Lyrics { lyrics, scroll, transcribing, .. } => {
            render_lyrics(frame, area, lyrics.as_ref(), *scroll, *transcribing, block);
        }
    }
}

fn track_rows(list: &TrackList, now_playing: Option<usize>, content_width: usize, ctx: &RowContext) -> Vec<ListItem<'static>> {
    let (num_width, _, title_width, artist_width, _) =
        calculate_track_column_widths(content_width, list.tracks.len());

    let mut items: Vec<ListItem<'static>> = vec![
        ListItem::new(format!(
            " {:<num_width$}   {}   {:<title_width$}   {:<artist_width$}   {}",
            "#", "  ", "Title", "Artist", "Duration",
            num_width = num_width,
            title_width = title_width,
            artist_width = artist_width
        ))
        .style(Style::default().fg(ctx.accent).add_modifier(Modifier::BOLD)),
    ];

    items.extend(list.tracks.iter().enumerate().map(|(i, track)| {
        // The queue marks its own position; elsewhere the playing id is matched
        let is_playing = match now_playing {
            Some(index) => index == i,
            None => ctx.playing_id == Some(track.id.as_str()),
        };
        let selected = i == list.selected;
        let style = if selected && ctx.focused {
            Style::default().fg(ctx.accent).add_modifier(Modifier::BOLD)
        } else if is_playing {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else if selected {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let liked_indicator = if ctx.liked.contains(&track.id) { "♥ " } else { "  " };
        let playing_indicator = if is_playing { "▶" } else { " " };
        let track_num = format!("{}{:<num_width$}", playing_indicator, i + 1, num_width = num_width);

        ListItem::new(format!(
            "{}   {}   {}   {}   {}",
            track_num,
            liked_indicator,
            truncate_string(&track.name, title_width),
            truncate_string(&track.artist_names(), artist_width),
            format_duration(track.duration_ms)
        ))
        .style(style)
    }));
    items
}

fn render_track_list(
    frame: &mut Frame,
    area: Rect,
    list: &TrackList,
    now_playing: Option<usize>,
    block: Block,
    ctx: &RowContext,
) {
    if list.tracks.is_empty() {
        let empty = Paragraph::new("Nothing here yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }
    let content_width = area.width.saturating_sub(4) as usize;
    let items = track_rows(list, now_playing, content_width, ctx);
    // +1 for header
    render_scrollable_list(frame, area, items, list.selected + 1, block);
}

fn render_home(frame: &mut Frame, area: Rect, home: &HomeRows, ctx: &RowContext) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(40),
            Constraint::Percentage(20),
        ])
        .split(area);

    let rows: [(&str, HomeSection, &TrackList); 2] = [
        (" For you ", HomeSection::ForYou, &home.for_you),
        (" Trending ", HomeSection::Trending, &home.trending),
    ];
    for (i, (title, section, list)) in rows.into_iter().enumerate() {
        let focused = ctx.focused && home.section == section;
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .padding(Padding::horizontal(1))
            .border_style(border_style(focused, ctx.accent));
        if home.loading {
            let loading = Paragraph::new("Loading...")
                .style(Style::default().fg(Color::Yellow))
                .block(block);
            frame.render_widget(loading, chunks[i]);
            continue;
        }
        let row_ctx = RowContext { focused, ..*ctx };
        render_track_list(frame, chunks[i], list, None, block, &row_ctx);
    }

    let moods_focused = ctx.focused && home.section == HomeSection::Moods;
    let spans: Vec<Span> = MOODS
        .iter()
        .enumerate()
        .flat_map(|(i, mood)| {
            let style = row_style(i == home.mood_selected, moods_focused, ctx.accent);
            [Span::styled(format!(" {} ", mood), style), Span::raw(" ")]
        })
        .collect();
    let moods = Paragraph::new(Line::from(spans)).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Moods (←/→ switch row) ")
            .border_style(border_style(moods_focused, ctx.accent)),
    );
    frame.render_widget(moods, chunks[2]);
}

fn render_playlist_list(
    frame: &mut Frame,
    area: Rect,
    playlists: &[PlaylistItem],
    selected: usize,
    block: Block,
    ctx: &RowContext,
) {
    let items: Vec<ListItem> = playlists
        .iter()
        .enumerate()
        .map(|(i, playlist)| {
            let style = row_style(i == selected, ctx.focused, ctx.accent);
            ListItem::new(format!("{} ({} tracks)", playlist.name, playlist.track_count)).style(style)
        })
        .collect();
    render_scrollable_list(frame, area, items, selected, block);
}

fn render_stats(frame: &mut Frame, area: Rect, stats: &ListeningStats, block: Block, accent: Color) {
    let heading = Style::default().fg(accent).add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Minutes listened  ", heading),
            Span::raw(stats.total_minutes.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Tracks played     ", heading),
            Span::raw(stats.tracks_played.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Artists           ", heading),
            Span::raw(stats.total_artists.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Average length    ", heading),
            Span::raw(format!("{} min", stats.average_track_minutes)),
        ]),
        Line::from(""),
        Line::from(Span::styled("Top artists", heading)),
    ];
    lines.extend(
        stats
            .top_artists
            .iter()
            .enumerate()
            .map(|(i, artist)| Line::from(format!("{:>2}. {} ({} plays)", i + 1, artist.name, artist.plays))),
    );
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Recently played", heading)));
    lines.extend(stats.recent_tracks.iter().map(|name| Line::from(format!("  {}", name))));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_lyrics(
    frame: &mut Frame,
    area: Rect,
    lyrics: Option<&Lyrics>,
    scroll: u16,
    transcribing: bool,
    block: Block,
) {
    let hint = Style::default().fg(Color::DarkGray);
    let paragraph = match lyrics.and_then(|l| l.lyrics.as_deref().map(|text| (text, l.source.as_deref()))) {
        Some((text, source)) => {
            let mut lines: Vec<Line> = text.lines().map(|l| Line::from(l.to_string())).collect();
            if let Some(source) = source {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(format!("Source: {}", source), hint)));
            }
            Paragraph::new(lines).scroll((scroll, 0))
        }
        None if transcribing => Paragraph::new("Transcribing the audio, this can take a minute...").style(hint),
        None if lyrics.is_some() => Paragraph::new("No lyrics found. Press t to transcribe them.").style(hint),
        None => Paragraph::new("Loading lyrics...").style(Style::default().fg(Color::Yellow)),
    };
    frame.render_widget(paragraph.wrap(Wrap { trim: false }).block(block), area);
}
