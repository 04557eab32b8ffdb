use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{AuthError, Theme};

const THEME_KEY: &str = "theme";

/// Theme preference in a small JSON key-value file. Other keys in the file
/// are left alone.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Option<Map<String, Value>> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => Some(entries),
            Ok(_) | Err(_) => {
                warn!("Ignoring unreadable preferences file {}", self.path.display());
                None
            }
        }
    }

    /// Missing, unreadable or unknown values all mean light.
    pub async fn load(&self) -> Theme {
        let theme = self
            .read_entries()
            .await
            .and_then(|mut entries| entries.remove(THEME_KEY))
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        debug!("Loaded theme {} from {}", theme, self.path.display());
        theme
    }

    pub async fn save(&self, theme: Theme) -> Result<(), AuthError> {
        let mut entries = self.read_entries().await.unwrap_or_default();
        entries.insert(THEME_KEY.to_string(), Value::String(theme.to_string()));

        let body = serde_json::to_string_pretty(&Value::Object(entries))
            .map_err(|e| AuthError::Preferences(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| AuthError::Preferences(format!("{}: {}", self.path.display(), e)))?;

        debug!("Saved theme {} to {}", theme, self.path.display());
        Ok(())
    }
}
