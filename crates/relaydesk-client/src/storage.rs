//! Client state persisted between runs: auth tokens and UI preferences.
//!
//! The file is a flat JSON object with the keys `access_token`,
//! `refresh_token` and `ui-storage`. A missing file is an empty store.

use crate::error::StorageError;
use crate::models::AuthTokens;
use log::{debug, warn};
use relaydesk_transport::CredentialSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Access to the stored auth tokens.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_tokens(&self, tokens: &AuthTokens) -> Result<(), StorageError>;
    fn set_access_token(&self, access: &str) -> Result<(), StorageError>;
    fn clear_tokens(&self) -> Result<(), StorageError>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct UiPreferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, alias = "sidebarCollapsed")]
    pub sidebar_collapsed: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, rename = "ui-storage")]
    ui: UiPreferences,
}

/// JSON file backed store. Every change is written through immediately.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => PersistedState::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                PersistedState::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn ui_preferences(&self) -> UiPreferences {
        self.lock()
            .map(|state| state.ui.clone())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<Theme, StorageError> {
        self.update(|state| state.ui.theme = theme)?;
        Ok(theme)
    }

    pub fn toggle_theme(&self) -> Result<Theme, StorageError> {
        let theme = self.ui_preferences().theme.toggled();
        self.set_theme(theme)
    }

    pub fn toggle_sidebar(&self) -> Result<bool, StorageError> {
        let mut collapsed = false;
        self.update(|state| {
            state.ui.sidebar_collapsed = !state.ui.sidebar_collapsed;
            collapsed = state.ui.sidebar_collapsed;
        })?;
        Ok(collapsed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PersistedState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }

    fn read<T>(&self, f: impl FnOnce(&PersistedState) -> T) -> Option<T> {
        match self.lock() {
            Ok(state) => Some(f(&state)),
            Err(e) => {
                warn!("Reading state store failed: {}", e);
                None
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut PersistedState)) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        f(&mut state);
        self.persist(&state)
    }

    // Write to a sibling file and rename, so a crash never leaves half a file.
    fn persist(&self, state: &PersistedState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        debug!("State written to {}", self.path.display());
        Ok(())
    }
}

impl TokenStore for FileStore {
    fn access_token(&self) -> Option<String> {
        self.read(|state| state.access_token.clone()).flatten()
    }

    fn refresh_token(&self) -> Option<String> {
        self.read(|state| state.refresh_token.clone()).flatten()
    }

    fn set_tokens(&self, tokens: &AuthTokens) -> Result<(), StorageError> {
        self.update(|state| {
            state.access_token = Some(tokens.access.clone());
            state.refresh_token = Some(tokens.refresh.clone());
        })
    }

    fn set_access_token(&self, access: &str) -> Result<(), StorageError> {
        self.update(|state| state.access_token = Some(access.to_string()))
    }

    fn clear_tokens(&self) -> Result<(), StorageError> {
        self.update(|state| {
            state.access_token = None;
            state.refresh_token = None;
        })
    }
}

impl CredentialSource for FileStore {
    fn bearer_token(&self) -> Option<String> {
        self.access_token()
    }
}
