// Display preferences, persisted next to the task list

use crate::backend::Backend;
use eyre::{Context, Result};
use std::fmt;
use tracing::warn;

pub const THEME_KEY: &str = "themeMode";

/// Display mode flag; purely cosmetic, independent of the task store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemeMode {
    Normal,
    #[default]
    Modern,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Normal => ThemeMode::Modern,
            ThemeMode::Modern => ThemeMode::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Normal => "normal",
            ThemeMode::Modern => "modern",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read the stored theme; unknown values fall back to the default
pub fn load_theme<B: Backend>(backend: &B) -> Result<ThemeMode> {
    let stored = backend.read(THEME_KEY).context("Failed to read theme preference")?;
    Ok(match stored.as_deref().map(str::trim) {
        None => ThemeMode::default(),
        Some("normal") => ThemeMode::Normal,
        Some("modern") => ThemeMode::Modern,
        Some(other) => {
            warn!(value = other, "Unknown theme preference, using default");
            ThemeMode::default()
        }
    })
}

pub fn store_theme<B: Backend>(backend: &mut B, mode: ThemeMode) -> Result<()> {
    backend
        .write(THEME_KEY, mode.as_str())
        .context("Failed to save theme preference")
}

/// Flip the stored theme and return the new one
pub fn toggle_theme<B: Backend>(backend: &mut B) -> Result<ThemeMode> {
    let mode = load_theme(&*backend)?.toggled();
    store_theme(backend, mode)?;
    Ok(mode)
}
