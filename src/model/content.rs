//! Content view state for the main area: home rows, search results, playlists, queue, lyrics

use super::track::{Playlist, Track};
use super::types::{PlaylistItem, SelectedItem};
use super::ytmusic_client::Lyrics;
use crate::library::ListeningStats;

/// A scrollable list of tracks with a cursor
#[derive(Clone, Debug, Default)]
pub struct TrackList {
    pub tracks: Vec<Track>,
    pub selected: usize,
}

impl TrackList {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks, selected: 0 }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected < self.tracks.len().saturating_sub(1) {
            self.selected += 1;
        }
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.tracks.get(self.selected)
    }

    /// Swap in new tracks, keeping the cursor inside the list
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.selected = self.selected.min(self.tracks.len().saturating_sub(1));
    }

    fn select(&self, as_queue: bool) -> Option<SelectedItem> {
        self.selected_track().map(|track| SelectedItem::Track {
            track: track.clone(),
            context: as_queue.then(|| self.tracks.clone()),
        })
    }
}

/// Rows of the home screen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HomeSection {
    #[default]
    ForYou,
    Trending,
    Moods,
}

impl HomeSection {
    pub fn next(self) -> Self {
        match self {
            HomeSection::ForYou => HomeSection::Trending,
            HomeSection::Trending => HomeSection::Moods,
            HomeSection::Moods => HomeSection::ForYou,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            HomeSection::ForYou => HomeSection::Moods,
            HomeSection::Trending => HomeSection::ForYou,
            HomeSection::Moods => HomeSection::Trending,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HomeRows {
    pub for_you: TrackList,
    pub trending: TrackList,
    pub mood_selected: usize,
    pub section: HomeSection,
    pub loading: bool,
}

/// Represents the current view in the main content area
#[derive(Clone, Debug, Default)]
pub enum ContentView {
    #[default]
    Empty,
    Home(HomeRows),
    SearchResults {
        query: String,
        list: TrackList,
    },
    /// A track opened from a share link
    SharedTrack {
        list: TrackList,
    },
    /// Local playlist
    PlaylistDetail {
        playlist: Playlist,
        list: TrackList,
    },
    /// Playlist owned by the Spotify account
    RemotePlaylist {
        id: String,
        name: String,
        list: TrackList,
    },
    LikedSongs {
        list: TrackList,
    },
    RecentlyPlayed {
        list: TrackList,
    },
    Stats(ListeningStats),
    SpotifyPlaylists {
        playlists: Vec<PlaylistItem>,
        selected: usize,
    },
    /// Queue view - the session playlist with the playing entry marked
    Queue {
        list: TrackList,
        now_playing: Option<usize>,
    },
    Lyrics {
        track: Track,
        lyrics: Option<Lyrics>,
        scroll: u16,
        transcribing: bool,
    },
}

impl ContentView {
    pub fn title(&self) -> String {
        match self {
            ContentView::Empty => " Nova ".to_string(),
            ContentView::Home(_) => " Home ".to_string(),
            ContentView::SearchResults { query, list } => {
                format!(" Results for \"{}\" ({}) ", query, list.tracks.len())
            }
            ContentView::SharedTrack { .. } => " Shared with you ".to_string(),
            ContentView::PlaylistDetail { playlist, .. } => {
                format!(
                    " {} ({} tracks, {} min) ",
                    playlist.name,
                    playlist.tracks.len(),
                    playlist.total_duration_ms() / 60_000
                )
            }
            ContentView::RemotePlaylist { name, list, .. } => {
                format!(" {} ({} tracks) ", name, list.tracks.len())
            }
            ContentView::LikedSongs { list } => format!(" Liked songs ({}) ", list.tracks.len()),
            ContentView::RecentlyPlayed { .. } => " Recently played ".to_string(),
            ContentView::Stats(_) => " Listening stats ".to_string(),
            ContentView::SpotifyPlaylists { .. } => " Spotify playlists ".to_string(),
            ContentView::Queue { .. } => " Queue ".to_string(),
            ContentView::Lyrics { track, .. } => format!(" Lyrics - {} ", track.name),
        }
    }

    fn list_mut(&mut self) -> Option<&mut TrackList> {
        match self {
            ContentView::Home(home) => match home.section {
                HomeSection::ForYou => Some(&mut home.for_you),
                HomeSection::Trending => Some(&mut home.trending),
                HomeSection::Moods => None,
            },
            ContentView::SearchResults { list, .. }
            | ContentView::SharedTrack { list }
            | ContentView::PlaylistDetail { list, .. }
            | ContentView::RemotePlaylist { list, .. }
            | ContentView::LikedSongs { list }
            | ContentView::RecentlyPlayed { list }
            | ContentView::Queue { list, .. } => Some(list),
            _ => None,
        }
    }

    fn list(&self) -> Option<&TrackList> {
        match self {
            ContentView::Home(home) => match home.section {
                HomeSection::ForYou => Some(&home.for_you),
                HomeSection::Trending => Some(&home.trending),
                HomeSection::Moods => None,
            },
            ContentView::SearchResults { list, .. }
            | ContentView::SharedTrack { list }
            | ContentView::PlaylistDetail { list, .. }
            | ContentView::RemotePlaylist { list, .. }
            | ContentView::LikedSongs { list }
            | ContentView::RecentlyPlayed { list }
            | ContentView::Queue { list, .. } => Some(list),
            _ => None,
        }
    }

    pub fn move_up(&mut self) {
        match self {
            ContentView::Home(home) if home.section == HomeSection::Moods => {
                home.mood_selected = home.mood_selected.saturating_sub(1);
            }
            ContentView::SpotifyPlaylists { selected, .. } => {
                *selected = selected.saturating_sub(1);
            }
            ContentView::Lyrics { scroll, .. } => *scroll = scroll.saturating_sub(1),
            view => {
                if let Some(list) = view.list_mut() {
                    list.move_up();
                }
            }
        }
    }

    pub fn move_down(&mut self, mood_count: usize) {
        match self {
            ContentView::Home(home) if home.section == HomeSection::Moods => {
                if home.mood_selected < mood_count.saturating_sub(1) {
                    home.mood_selected += 1;
                }
            }
            ContentView::SpotifyPlaylists { playlists, selected } => {
                if *selected < playlists.len().saturating_sub(1) {
                    *selected += 1;
                }
            }
            ContentView::Lyrics { scroll, .. } => *scroll = scroll.saturating_add(1),
            view => {
                if let Some(list) = view.list_mut() {
                    list.move_down();
                }
            }
        }
    }

    /// What Enter acts on. Search results and shared tracks start a radio
    /// queue; every other list becomes the queue itself.
    pub fn selected_item(&self, moods: &[&str]) -> Option<SelectedItem> {
        match self {
            ContentView::Home(home) if home.section == HomeSection::Moods => moods
                .get(home.mood_selected)
                .map(|mood| SelectedItem::Mood { query: format!("{} music", mood) }),
            ContentView::SearchResults { list, .. } | ContentView::SharedTrack { list } => {
                list.select(false)
            }
            ContentView::Queue { list, .. } => {
                list.selected_track().map(|_| SelectedItem::QueueEntry { index: list.selected })
            }
            ContentView::SpotifyPlaylists { playlists, selected } => {
                playlists.get(*selected).map(|p| SelectedItem::SpotifyPlaylist {
                    id: p.id.clone(),
                    name: p.name.clone(),
                })
            }
            view => view.list().and_then(|list| list.select(true)),
        }
    }

    /// The track under the cursor, for like/share/add-to-playlist
    pub fn selected_track(&self) -> Option<&Track> {
        self.list().and_then(TrackList::selected_track)
    }

    pub fn cycle_section(&mut self, forward: bool) {
        if let ContentView::Home(home) = self {
            home.section = if forward { home.section.next() } else { home.section.prev() };
        }
    }

    /// Which local playlist is on screen, if any
    pub fn local_playlist_id(&self) -> Option<&str> {
        match self {
            ContentView::PlaylistDetail { playlist, .. } => Some(&playlist.id),
            _ => None,
        }
    }

    /// Library views re-read their data when storage changes
    pub fn is_library_backed(&self) -> bool {
        matches!(
            self,
            ContentView::PlaylistDetail { .. }
                | ContentView::LikedSongs { .. }
                | ContentView::RecentlyPlayed { .. }
                | ContentView::Stats(_)
        )
    }
}

/// State for the main content area
#[derive(Clone, Debug, Default)]
pub struct ContentState {
    pub view: ContentView,
    pub navigation_stack: Vec<ContentView>,
    pub is_loading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_track;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter().map(|id| test_track(id)).collect()
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut view = ContentView::LikedSongs { list: TrackList::new(tracks(&["a", "b"])) };
        view.move_up();
        view.move_down(0);
        view.move_down(0);
        view.move_down(0);
        assert_eq!(view.selected_track().map(|t| t.id.as_str()), Some("b"));

        let mut empty = TrackList::default();
        empty.move_down();
        assert_eq!(empty.selected, 0);
        assert!(empty.selected_track().is_none());
    }

    #[test]
    fn search_result_starts_radio() {
        let view = ContentView::SearchResults {
            query: "q".into(),
            list: TrackList::new(tracks(&["a", "b"])),
        };
        let Some(SelectedItem::Track { track, context }) = view.selected_item(&[]) else {
            panic!("expected a track");
        };
        assert_eq!(track.id, "a");
        assert!(context.is_none());
    }

    #[test]
    fn liked_songs_become_the_queue() {
        let mut view = ContentView::LikedSongs { list: TrackList::new(tracks(&["a", "b", "c"])) };
        view.move_down(0);
        let Some(SelectedItem::Track { track, context }) = view.selected_item(&[]) else {
            panic!("expected a track");
        };
        assert_eq!(track.id, "b");
        assert_eq!(context.map(|c| c.len()), Some(3));
    }

    #[test]
    fn home_moods_select_a_search() {
        let mut view = ContentView::Home(HomeRows::default());
        view.cycle_section(false);
        view.move_down(2);
        view.move_down(2);
        let item = view.selected_item(&["chill", "focus"]);
        assert!(matches!(item, Some(SelectedItem::Mood { query }) if query == "focus music"));
        assert!(view.selected_track().is_none());
    }

    #[test]
    fn replace_clamps_cursor() {
        let mut list = TrackList::new(tracks(&["a", "b", "c"]));
        list.move_down();
        list.move_down();
        list.replace(tracks(&["x"]));
        assert_eq!(list.selected, 0);
    }
}
