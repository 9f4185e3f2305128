//! Application-level configuration loading: team display colors, default game settings and
//! registry capacity.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::state::game::{GameSettings, TeamColor};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_SHOW_BACK_CONFIG_PATH";
/// Number of games hosted at once when the file does not say otherwise.
const DEFAULT_MAX_GAMES: usize = 32;

/// HSV color used by displays and controller lights to render a team color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct DisplayColor {
    /// Hue in degrees.
    pub h: f32,
    /// Saturation, 0 to 1.
    pub s: f32,
    /// Value, 0 to 1.
    pub v: f32,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    palette: HashMap<TeamColor, DisplayColor>,
    default_settings: GameSettings,
    max_games: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        colors = app_config.palette.len(),
                        max_games = app_config.max_games,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON configuration; missing sections keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Display color of a team color.
    pub fn display_color(&self, color: TeamColor) -> DisplayColor {
        self.palette
            .get(&color)
            .copied()
            .unwrap_or_else(|| default_display_color(color))
    }

    /// Settings given to games created without explicit settings.
    pub fn default_settings(&self) -> &GameSettings {
        &self.default_settings
    }

    /// Maximum number of games hosted at once.
    pub fn max_games(&self) -> usize {
        self.max_games
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            palette: TeamColor::ALL
                .into_iter()
                .map(|color| (color, default_display_color(color)))
                .collect(),
            default_settings: GameSettings::default(),
            max_games: DEFAULT_MAX_GAMES,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    colors: HashMap<TeamColor, RawColor>,
    #[serde(default)]
    default_settings: Option<GameSettings>,
    #[serde(default)]
    max_games: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut config = AppConfig::default();
        for (color, raw) in value.colors {
            config.palette.insert(color, raw.into());
        }
        if let Some(settings) = value.default_settings {
            config.default_settings = settings;
        }
        if let Some(max_games) = value.max_games.filter(|max| *max > 0) {
            config.max_games = max_games;
        }
        config
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single HSV entry inside the configuration file.
struct RawColor {
    hue: f32,
    saturation: f32,
    value: f32,
}

impl From<RawColor> for DisplayColor {
    fn from(value: RawColor) -> Self {
        Self {
            h: value.hue,
            s: value.saturation,
            v: value.value,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in palette shipped with the binary.
fn default_display_color(color: TeamColor) -> DisplayColor {
    let h = match color {
        TeamColor::Red => 0.0,
        TeamColor::Blue => -134.34782,
        TeamColor::Green => 119.331474,
        TeamColor::Yellow => 58.87927,
    };
    DisplayColor { h, s: 1.0, v: 1.0 }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "colors": { "blue": { "hue": 210.0, "saturation": 0.6, "value": 1.0 } },
                "default_settings": { "auto_next": true, "next_delay": 1500 }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.display_color(TeamColor::Blue),
            DisplayColor {
                h: 210.0,
                s: 0.6,
                v: 1.0
            }
        );
        assert_eq!(
            config.display_color(TeamColor::Red),
            default_display_color(TeamColor::Red)
        );
        assert!(config.default_settings().auto_next);
        assert_eq!(config.default_settings().next_delay, Duration::from_millis(1500));
        assert!(config.default_settings().auto_reveal);
        assert_eq!(config.max_games(), DEFAULT_MAX_GAMES);
    }

    #[test]
    fn zero_capacity_is_ignored() {
        let config = AppConfig::from_json(r#"{ "max_games": 0 }"#).unwrap();
        assert_eq!(config.max_games(), DEFAULT_MAX_GAMES);
    }
}
