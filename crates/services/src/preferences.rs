//! UI preferences kept in the local store.

use crate::kv_store::KeyValueStore;
use shared::ClientError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const THEME_KEY: &str = "md-theme-mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::System => "system",
        }
    }

    /// Light → Dark → System → Light.
    pub fn cycle(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::System,
            ThemeMode::System => ThemeMode::Light,
        }
    }

    /// Resolve `System` against the platform preference.
    pub fn effective(self, prefers_dark: bool) -> ThemeMode {
        match self {
            ThemeMode::System if prefers_dark => ThemeMode::Dark,
            ThemeMode::System => ThemeMode::Light,
            mode => mode,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
            ThemeMode::System => "Follow system",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            "system" => Ok(ThemeMode::System),
            other => Err(ClientError::InvalidFormat(format!("unknown theme mode '{}'", other))),
        }
    }
}

#[derive(Clone)]
pub struct Preferences {
    local: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(local: Arc<dyn KeyValueStore>) -> Self {
        Self { local }
    }

    /// Stored theme, `System` when unset or unrecognised.
    pub fn theme(&self) -> ThemeMode {
        self.local
            .get(THEME_KEY)
            .ok()
            .flatten()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, mode: ThemeMode) -> Result<(), ClientError> {
        self.local.set(THEME_KEY, mode.as_str())
    }

    pub fn cycle_theme(&self) -> Result<ThemeMode, ClientError> {
        let next = self.theme().cycle();
        self.set_theme(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::MemoryStore;

    #[test]
    fn test_cycle_visits_every_mode() {
        let mode = ThemeMode::Light;
        assert_eq!(mode.cycle(), ThemeMode::Dark);
        assert_eq!(mode.cycle().cycle(), ThemeMode::System);
        assert_eq!(mode.cycle().cycle().cycle(), ThemeMode::Light);
    }

    #[test]
    fn test_effective_resolves_system() {
        assert_eq!(ThemeMode::System.effective(true), ThemeMode::Dark);
        assert_eq!(ThemeMode::System.effective(false), ThemeMode::Light);
        assert_eq!(ThemeMode::Light.effective(true), ThemeMode::Light);
    }

    #[test]
    fn test_theme_persistence() {
        let local = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(local.clone());
        assert_eq!(prefs.theme(), ThemeMode::System);

        assert_eq!(prefs.cycle_theme().unwrap(), ThemeMode::Light);
        assert_eq!(local.get(THEME_KEY).unwrap().as_deref(), Some("light"));

        local.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(prefs.theme(), ThemeMode::System);
        assert_eq!("Dark".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
    }
}
