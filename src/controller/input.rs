//! Key event handling

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::catalog::MOODS;
use crate::model::{ActiveSection, ContentView, PromptKind};
use super::AppController;

/// Seek step for `<` / `>`
const SEEK_STEP_MS: i64 = 10_000;

impl AppController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let model = self.model.lock().await;

        // Handle error message first (blocks all other interactions)
        if model.has_error().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                model.clear_error().await;
            }
            return Ok(());
        }

        if model.is_help_popup_open().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('?')) {
                model.hide_help_popup().await;
            }
            return Ok(());
        }

        if model.is_share_open().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                model.hide_share_link().await;
            }
            return Ok(());
        }

        // Text prompt (new playlist, rename, paste share link)
        if model.is_prompt_open().await {
            match key.code {
                KeyCode::Esc => {
                    model.take_prompt().await;
                }
                KeyCode::Enter => {
                    let prompt = model.take_prompt().await;
                    drop(model);
                    if let Some(prompt) = prompt {
                        self.submit_prompt(prompt).await;
                    }
                }
                KeyCode::Backspace => model.prompt_pop().await,
                KeyCode::Char(c) => model.prompt_push(c).await,
                _ => {}
            }
            return Ok(());
        }

        // "Add to playlist" picker
        if model.is_picker_open().await {
            match key.code {
                KeyCode::Up => model.picker_move(false).await,
                KeyCode::Down => model.picker_move(true).await,
                KeyCode::Enter => {
                    let picked = model.take_picker().await;
                    drop(model);
                    if let Some((track, target)) = picked {
                        self.add_to_playlist(track, target).await;
                    }
                }
                KeyCode::Esc | KeyCode::Char('a') => model.close_picker().await,
                _ => {}
            }
            return Ok(());
        }

        if model.is_settings_open().await {
            match key.code {
                KeyCode::Up => model.settings_move(false).await,
                KeyCode::Down => model.settings_move(true).await,
                KeyCode::Enter => {
                    let selected = model.selected_setting().await;
                    drop(model);
                    self.activate_setting(selected).await;
                }
                KeyCode::Esc | KeyCode::Char('o') => model.close_settings().await,
                _ => {}
            }
            return Ok(());
        }

        let ui_state = model.get_ui_state().await;

        // Handle search input when in search section
        if ui_state.active_section == ActiveSection::Search {
            match key.code {
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        model.cycle_section_backward().await;
                    } else {
                        model.cycle_section_forward().await;
                    }
                    return Ok(());
                }
                KeyCode::BackTab => {
                    model.cycle_section_backward().await;
                    return Ok(());
                }
                KeyCode::Enter => {
                    drop(model);
                    self.search_now().await;
                    return Ok(());
                }
                KeyCode::Esc => {
                    model.set_active_section(ActiveSection::MainContent).await;
                    return Ok(());
                }
                KeyCode::Backspace => {
                    let query = model.backspace_search().await;
                    drop(model);
                    self.schedule_search(query).await;
                    return Ok(());
                }
                KeyCode::Char(c) => {
                    // Ctrl+Q still quits while typing
                    if (c == 'q' || c == 'Q') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        model.set_should_quit(true).await;
                        return Ok(());
                    }
                    let query = model.append_to_search(c).await;
                    drop(model);
                    self.schedule_search(query).await;
                    return Ok(());
                }
                _ => {}
            }
        }

        // Handle MainContent section navigation
        if ui_state.active_section == ActiveSection::MainContent {
            match key.code {
                KeyCode::Up => {
                    model.content_move_up().await;
                    return Ok(());
                }
                KeyCode::Down => {
                    model.content_move_down(MOODS.len()).await;
                    return Ok(());
                }
                KeyCode::Left => {
                    model.cycle_content_section(false).await;
                    return Ok(());
                }
                KeyCode::Right => {
                    model.cycle_content_section(true).await;
                    return Ok(());
                }
                KeyCode::Enter => {
                    let selected = model.get_selected_content_item(&MOODS).await;
                    drop(model);
                    if let Some(item) = selected {
                        self.handle_selected_item(item).await;
                    }
                    return Ok(());
                }
                KeyCode::Backspace | KeyCode::Esc => {
                    model.navigate_back().await;
                    return Ok(());
                }
                KeyCode::Char('x') => {
                    let track = model.get_selected_track().await;
                    drop(model);
                    if let Some(track) = track {
                        self.toggle_liked_track(&track).await;
                    }
                    return Ok(());
                }
                KeyCode::Char('a') => {
                    if let Some(track) = model.get_selected_track().await {
                        model.open_picker(track).await;
                    }
                    return Ok(());
                }
                KeyCode::Char('y') => {
                    let track = model.get_selected_track().await;
                    drop(model);
                    if let Some(track) = track {
                        self.share_track(&track).await;
                    }
                    return Ok(());
                }
                KeyCode::Char('t') => {
                    let view = model.current_view().await;
                    drop(model);
                    if let ContentView::Lyrics { track, .. } = view {
                        self.transcribe_lyrics(track).await;
                    }
                    return Ok(());
                }
                KeyCode::Delete => {
                    let view = model.current_view().await;
                    drop(model);
                    if let ContentView::PlaylistDetail { playlist, list } = view {
                        if let Some(track) = list.selected_track() {
                            self.remove_from_playlist(&playlist.id, &track.id).await;
                        }
                    }
                    return Ok(());
                }
                _ => {}
            }
        }

        // Sidebar playlist management
        if ui_state.active_section == ActiveSection::Playlists {
            match key.code {
                KeyCode::Char('e') => {
                    if let Some(playlist) = model.get_selected_playlist().await {
                        model
                            .open_prompt(PromptKind::RenamePlaylist { id: playlist.id }, &playlist.name)
                            .await;
                    }
                    return Ok(());
                }
                KeyCode::Delete => {
                    let selected = model.get_selected_playlist().await;
                    drop(model);
                    if let Some(playlist) = selected {
                        self.delete_playlist(&playlist.id).await;
                    }
                    return Ok(());
                }
                KeyCode::Char('y') => {
                    let selected = model.get_selected_playlist().await;
                    drop(model);
                    if let Some(playlist) = selected {
                        self.share_playlist(&playlist.id).await;
                    }
                    return Ok(());
                }
                _ => {}
            }
        }

        // Global keybindings
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                model.set_should_quit(true).await;
            }
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    model.cycle_section_backward().await;
                } else {
                    model.cycle_section_forward().await;
                }
            }
            KeyCode::BackTab => {
                model.cycle_section_backward().await;
            }
            KeyCode::Up => {
                model.move_selection_up().await;
            }
            KeyCode::Down => {
                model.move_selection_down().await;
            }
            KeyCode::Enter => match ui_state.active_section {
                ActiveSection::Library => {
                    let item = model.selected_library_item().await;
                    drop(model);
                    if let Some(item) = item {
                        self.open_library_item(item.kind).await;
                    }
                }
                ActiveSection::Playlists => {
                    let selected = model.get_selected_playlist().await;
                    drop(model);
                    if let Some(playlist) = selected {
                        self.open_playlist(&playlist.id).await;
                    }
                }
                _ => {}
            },
            // Play/Pause toggle
            KeyCode::Char(' ') => {
                drop(model);
                self.spawn_playback(|c| async move { c.toggle_playback().await });
            }
            KeyCode::Char('n') => {
                drop(model);
                self.spawn_playback(|c| async move { c.next_track().await });
            }
            KeyCode::Char('p') => {
                drop(model);
                self.spawn_playback(|c| async move { c.previous_track().await });
            }
            KeyCode::Char('r') => {
                drop(model);
                self.cycle_repeat().await;
            }
            KeyCode::Char('s') => {
                drop(model);
                self.stop_playback().await;
            }
            KeyCode::Char('<') | KeyCode::Char(',') => {
                drop(model);
                self.seek_relative(-SEEK_STEP_MS).await;
            }
            KeyCode::Char('>') | KeyCode::Char('.') => {
                drop(model);
                self.seek_relative(SEEK_STEP_MS).await;
            }
            // Like the playing track
            KeyCode::Char('L') => {
                drop(model);
                self.toggle_like_current().await;
            }
            KeyCode::Char('/') | KeyCode::Char('g') => {
                model.set_active_section(ActiveSection::Search).await;
            }
            KeyCode::Char('l') => {
                model.set_active_section(ActiveSection::Playlists).await;
            }
            KeyCode::Char('c') => {
                model.open_prompt(PromptKind::NewPlaylist, "").await;
            }
            KeyCode::Char('i') => {
                model.open_prompt(PromptKind::ImportShare, "").await;
            }
            KeyCode::Char('u') => {
                drop(model);
                self.show_queue().await;
            }
            KeyCode::Char('w') => {
                drop(model);
                self.show_lyrics().await;
            }
            KeyCode::Char('o') => {
                model.open_settings().await;
            }
            KeyCode::Char('h') | KeyCode::Char('?') => {
                model.show_help_popup().await;
            }
            _ => {}
        }
        Ok(())
    }
}
