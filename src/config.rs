//! Configuration loading for hiho.
//!
//! The configuration file is located at `~/.config/hiho/config.toml`:
//!
//! ```toml
//! [keybindings]
//! quit = "ctrl+c"
//! cycle_windows = "ctrl+o"
//! next_session = "alt+right"
//! prev_session = "alt+left"
//! toggle_tab = "tab"
//! session_up = "up"
//! session_down = "down"
//! focus_sidebar = "ctrl+1"
//! focus_main = "ctrl+2"
//!
//! [ui]
//! alt_screen = true
//! mouse = true
//! ```
//!
//! Every key is optional. Missing or empty values keep their defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keybindings: KeyBindings,
    pub ui: UiConfig,
}

/// Key names as produced by the input decoder (`ctrl+c`, `alt+left`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub quit: String,
    pub cycle_windows: String,
    pub next_session: String,
    pub prev_session: String,
    pub toggle_tab: String,
    pub session_up: String,
    pub session_down: String,
    pub focus_sidebar: String,
    pub focus_main: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: "ctrl+c".to_string(),
            cycle_windows: "ctrl+o".to_string(),
            next_session: "alt+right".to_string(),
            prev_session: "alt+left".to_string(),
            toggle_tab: "tab".to_string(),
            session_up: "up".to_string(),
            session_down: "down".to_string(),
            focus_sidebar: "ctrl+1".to_string(),
            focus_main: "ctrl+2".to_string(),
        }
    }
}

impl KeyBindings {
    /// Replace empty values with their defaults.
    fn fill_empty(&mut self) {
        let defaults = KeyBindings::default();
        let pairs = [
            (&mut self.quit, defaults.quit),
            (&mut self.cycle_windows, defaults.cycle_windows),
            (&mut self.next_session, defaults.next_session),
            (&mut self.prev_session, defaults.prev_session),
            (&mut self.toggle_tab, defaults.toggle_tab),
            (&mut self.session_up, defaults.session_up),
            (&mut self.session_down, defaults.session_down),
            (&mut self.focus_sidebar, defaults.focus_sidebar),
            (&mut self.focus_main, defaults.focus_main),
        ];
        for (value, default) in pairs {
            if value.trim().is_empty() {
                *value = default;
            }
        }
    }
}

/// Terminal options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Draw on the alternate screen buffer
    pub alt_screen: bool,
    /// Enable mouse reporting
    pub mouse: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            alt_screen: true,
            mouse: true,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// logged and also yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Self::default(),
        };

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring invalid config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse TOML text, keeping defaults for anything unset or empty.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.keybindings.fill_empty();
        Ok(config)
    }

    /// `~/.config/hiho/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }
}

/// `~/.config/hiho`
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join("hiho"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("hiho-config-{}-{}.toml", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.keybindings.quit, "ctrl+c");
        assert_eq!(config.keybindings.cycle_windows, "ctrl+o");
        assert_eq!(config.keybindings.next_session, "alt+right");
        assert_eq!(config.keybindings.prev_session, "alt+left");
        assert_eq!(config.keybindings.toggle_tab, "tab");
        assert_eq!(config.keybindings.focus_main, "ctrl+2");
        assert!(config.ui.alt_screen);
        assert!(config.ui.mouse);
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        let config = Config::parse(
            r#"
            [keybindings]
            quit = "ctrl+q"
            toggle_tab = ""

            [ui]
            mouse = false
            "#,
        )
        .unwrap();
        assert_eq!(config.keybindings.quit, "ctrl+q");
        assert_eq!(config.keybindings.toggle_tab, "tab");
        assert_eq!(config.keybindings.cycle_windows, "ctrl+o");
        assert!(config.ui.alt_screen);
        assert!(!config.ui.mouse);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(Config::parse("[keybindings\nquit = ").is_err());
    }

    #[test]
    fn test_load_from_path() {
        let path = temp_file("load", "[keybindings]\nnext_session = \"ctrl+n\"\n");
        let config = Config::load(Some(path.as_path()));
        fs::remove_file(&path).unwrap();
        assert_eq!(config.keybindings.next_session, "ctrl+n");
        assert_eq!(config.keybindings.prev_session, "alt+left");
    }

    #[test]
    fn test_load_missing_or_invalid_falls_back() {
        let missing = std::env::temp_dir().join("hiho-config-does-not-exist.toml");
        assert_eq!(Config::load(Some(missing.as_path())), Config::default());

        let path = temp_file("invalid", "ui = 3\n");
        let config = Config::load(Some(path.as_path()));
        fs::remove_file(&path).unwrap();
        assert_eq!(config, Config::default());
    }
}
