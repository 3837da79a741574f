//! UI preference store
//!
//! Language and theme survive restarts under the `ui-storage` key. The
//! sidebar flag is session-only.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{load_persisted, save_persisted, PersistenceAdapter};
use crate::store::{Reducer, Store, Subscription};

/// Persistence key of the preference subset
pub const UI_STORAGE_KEY: &str = "ui-storage";

/// Format version of the persisted preference subset
pub const UI_STORAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
            Theme::System => f.write_str("system"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(format!(
                "Unknown theme '{}' (expected light, dark or system)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub language: String,
    pub theme: Theme,
    pub sidebar_open: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            theme: Theme::default(),
            sidebar_open: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedUi {
    pub language: String,
    pub theme: Theme,
}

#[derive(Debug, Clone)]
pub enum UiPatch {
    SetLanguage(String),
    SetTheme(Theme),
    ToggleSidebar,
    Rehydrate(PersistedUi),
}

impl Reducer for UiState {
    type Patch = UiPatch;

    fn apply(&mut self, patch: UiPatch) {
        match patch {
            UiPatch::SetLanguage(language) => self.language = language,
            UiPatch::SetTheme(theme) => self.theme = theme,
            UiPatch::ToggleSidebar => self.sidebar_open = !self.sidebar_open,
            UiPatch::Rehydrate(persisted) => {
                self.language = persisted.language;
                self.theme = persisted.theme;
            }
        }
    }
}

pub struct PreferencesStore {
    store: Store<UiState>,
    persistence: Arc<dyn PersistenceAdapter>,
    persist_lock: Mutex<()>,
}

impl PreferencesStore {
    /// Restore saved preferences, falling back to `default_language`
    pub fn rehydrate(persistence: Arc<dyn PersistenceAdapter>, default_language: &str) -> Self {
        let store = Store::new(UiState {
            language: default_language.to_string(),
            ..UiState::default()
        });

        match load_persisted::<PersistedUi>(persistence.as_ref(), UI_STORAGE_KEY, UI_STORAGE_VERSION)
        {
            Ok(Some(persisted)) => {
                debug!(language = %persisted.language, theme = %persisted.theme, "Rehydrated preferences");
                store.patch(UiPatch::Rehydrate(persisted));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable preferences"),
        }

        Self {
            store,
            persistence,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> UiState {
        self.store.snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription<UiState>
    where
        F: Fn(&UiState) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn language(&self) -> String {
        self.store.with(|state| state.language.clone())
    }

    pub fn theme(&self) -> Theme {
        self.store.with(|state| state.theme)
    }

    pub fn set_language(&self, language: impl Into<String>) {
        self.commit(UiPatch::SetLanguage(language.into()));
    }

    pub fn set_theme(&self, theme: Theme) {
        self.commit(UiPatch::SetTheme(theme));
    }

    pub fn toggle_sidebar(&self) {
        self.store.patch(UiPatch::ToggleSidebar);
    }

    fn commit(&self, patch: UiPatch) {
        self.store.patch(patch);

        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let subset = self.store.with(|state| PersistedUi {
            language: state.language.clone(),
            theme: state.theme,
        });

        if let Err(e) = save_persisted(
            self.persistence.as_ref(),
            UI_STORAGE_KEY,
            UI_STORAGE_VERSION,
            &subset,
        ) {
            warn!(error = %e, "Failed to persist preferences");
        }
    }
}
