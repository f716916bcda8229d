//! Persisted user preferences: color theme and preferred music source

use anyhow::Result;

use crate::model::BackendKind;
use super::store::{SOURCE_KEY, Store, THEME_KEY};

/// A color theme; `accent` tints borders, highlights and the progress gauge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    pub id: &'static str,
    pub name: &'static str,
    pub accent: (u8, u8, u8),
}

pub const DEFAULT_THEME: &str = "red";

pub const THEMES: [Theme; 20] = [
    Theme { id: "red", name: "Red & Black", accent: (0xe0, 0x2f, 0x2f) },
    Theme { id: "blue", name: "Blue & Black", accent: (0x3b, 0x82, 0xf6) },
    Theme { id: "purple", name: "Purple & Black", accent: (0xa8, 0x55, 0xf7) },
    Theme { id: "green", name: "Green & Black", accent: (0x1d, 0xb9, 0x54) },
    Theme { id: "orange", name: "Orange & Black", accent: (0xf9, 0x73, 0x16) },
    Theme { id: "pink", name: "Pink & Black", accent: (0xec, 0x48, 0x99) },
    Theme { id: "cyan", name: "Cyan & Black", accent: (0x06, 0xb6, 0xd4) },
    Theme { id: "yellow", name: "Yellow & Black", accent: (0xea, 0xb3, 0x08) },
    Theme { id: "white", name: "White & Black", accent: (0xe5, 0xe5, 0xe5) },
    Theme { id: "teal", name: "Teal & Black", accent: (0x14, 0xb8, 0xa6) },
    Theme { id: "magenta", name: "Magenta & Black", accent: (0xd9, 0x46, 0xef) },
    Theme { id: "lime", name: "Lime & Black", accent: (0x84, 0xcc, 0x16) },
    Theme { id: "navy", name: "Navy & Black", accent: (0x3f, 0x51, 0xb5) },
    Theme { id: "maroon", name: "Maroon & Black", accent: (0xb0, 0x30, 0x60) },
    Theme { id: "olive", name: "Olive & Black", accent: (0x9a, 0xa0, 0x3c) },
    Theme { id: "indigo", name: "Indigo & Black", accent: (0x63, 0x66, 0xf1) },
    Theme { id: "coral", name: "Coral & Black", accent: (0xff, 0x7f, 0x50) },
    Theme { id: "violet", name: "Violet & Black", accent: (0x8b, 0x5c, 0xf6) },
    Theme { id: "crimson", name: "Crimson & Black", accent: (0xdc, 0x14, 0x3c) },
    Theme { id: "gold", name: "Gold & Black", accent: (0xff, 0xc1, 0x07) },
];

pub fn theme_by_id(id: &str) -> Theme {
    THEMES
        .iter()
        .copied()
        .find(|t| t.id == id)
        .unwrap_or(THEMES[0])
}

#[derive(Clone)]
pub struct Settings {
    store: Store,
}

impl Settings {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn theme(&self) -> Theme {
        let id: Option<String> = self.store.read_opt(THEME_KEY);
        theme_by_id(id.as_deref().unwrap_or(DEFAULT_THEME))
    }

    pub fn set_theme(&self, id: &str) -> Result<Theme> {
        let theme = theme_by_id(id);
        self.store.write(THEME_KEY, theme.id)?;
        Ok(theme)
    }

    /// Advance to the next theme in the list, wrapping around
    pub fn cycle_theme(&self) -> Result<Theme> {
        let current = self.theme();
        let index = THEMES.iter().position(|t| t.id == current.id).unwrap_or(0);
        let next = THEMES[(index + 1) % THEMES.len()];
        self.set_theme(next.id)
    }

    pub fn preferred_source(&self) -> Option<BackendKind> {
        self.store.read_opt(SOURCE_KEY)
    }

    pub fn set_preferred_source(&self, source: BackendKind) -> Result<()> {
        self.store.write(SOURCE_KEY, &source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn theme_defaults_to_red() {
        let dir = tempdir().unwrap();
        let settings = Settings::new(Store::open(dir.path()).unwrap());
        assert_eq!(settings.theme().id, "red");
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        assert_eq!(theme_by_id("plaid").id, DEFAULT_THEME);
    }

    #[test]
    fn cycling_wraps_after_last_theme() {
        let dir = tempdir().unwrap();
        let settings = Settings::new(Store::open(dir.path()).unwrap());
        settings.set_theme("gold").unwrap();
        assert_eq!(settings.cycle_theme().unwrap().id, "red");
        assert_eq!(settings.cycle_theme().unwrap().id, "blue");
        assert_eq!(settings.theme().id, "blue");
    }

    #[test]
    fn source_preference_round_trips() {
        let dir = tempdir().unwrap();
        let settings = Settings::new(Store::open(dir.path()).unwrap());
        assert!(settings.preferred_source().is_none());
        settings.set_preferred_source(BackendKind::YtMusic).unwrap();
        assert_eq!(settings.preferred_source(), Some(BackendKind::YtMusic));
    }
}
