//! Progress bar rendering

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Gauge},
    Frame,
};

use crate::model::{PlaybackInfo, RepeatState, SessionStatus};
use super::utils::format_duration;

fn status_text(playback: &PlaybackInfo) -> String {
    let Some(track) = &playback.track else {
        return " No track playing".to_string();
    };
    let icon = match playback.status {
        SessionStatus::Loading => "…",
        SessionStatus::Playing => "▶",
        SessionStatus::Paused | SessionStatus::Idle => "⏸",
    };
    if track.album.is_empty() {
        format!(" {} {} | {}", icon, track.name, track.artist)
    } else {
        format!(" {} {} | {} ({})", icon, track.name, track.artist, track.album)
    }
}

pub fn render_progress_bar(frame: &mut Frame, area: Rect, playback: &PlaybackInfo, accent: Color) {
    let repeat_text = match playback.repeat {
        RepeatState::Off => "Repeat: Off",
        RepeatState::All => "Repeat: All",
        RepeatState::One => "Repeat: One",
    };
    let queue_text = match playback.queue_position {
        Some((position, total)) => format!("Queue: {}/{}", position, total),
        None => "Radio".to_string(),
    };

    let time_str = if playback.status == SessionStatus::Loading {
        "Loading...".to_string()
    } else {
        format!(
            "{} / {}",
            format_duration(playback.progress_ms),
            format_duration(playback.duration_ms)
        )
    };

    let progress_ratio = if playback.duration_ms > 0 {
        (playback.progress_ms as f64 / playback.duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let title = format!("{} ", status_text(playback));
    let controls_info = format!(" {} | {} | {} ", playback.backend, repeat_text, queue_text);

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(Line::from(controls_info).right_aligned()),
        )
        .gauge_style(Style::default().fg(accent))
        .ratio(progress_ratio)
        .label(time_str);

    frame.render_widget(gauge, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackMetadata;

    fn metadata(album: &str) -> TrackMetadata {
        TrackMetadata {
            id: "1".into(),
            name: "Song".into(),
            artist: "Artist".into(),
            album: album.into(),
            duration_ms: 1000,
            uri: "spotify:track:1".into(),
        }
    }

    #[test]
    fn idle_player_shows_placeholder() {
        assert_eq!(status_text(&PlaybackInfo::default()), " No track playing");
    }

    #[test]
    fn album_is_omitted_when_unknown() {
        let playback = PlaybackInfo {
            track: Some(metadata("")),
            status: SessionStatus::Playing,
            ..PlaybackInfo::default()
        };
        assert_eq!(status_text(&playback), " ▶ Song | Artist");

        let paused = PlaybackInfo {
            track: Some(metadata("Album")),
            status: SessionStatus::Paused,
            ..PlaybackInfo::default()
        };
        assert_eq!(status_text(&paused), " ⏸ Song | Artist (Album)");
    }
}
