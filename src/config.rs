use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::warn;
use serde::Deserialize;

use crate::{
    builtin_themes::{self, Theme},
    error::ConfigError,
};

const APP_DIR: &str = "tunedrop";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: String,
    /// Where blobs, the saved position and the log live.
    pub data_dir: Option<PathBuf>,
    pub fps: u32,
    /// Size of the spectrum canvas in pixels; the terminal view is scaled from it.
    pub canvas_width: usize,
    pub canvas_height: usize,
    /// Share of the previous spectrum frame erased on every new one.
    pub fade: f32,
    pub bar_gap: f32,
    pub bar_radius: f32,
    pub initial_volume: f32,
    /// Per-blob size limit. Unlimited when unset.
    pub max_blob_bytes: Option<u64>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: builtin_themes::DEFAULT_THEME.to_string(),
            data_dir: None,
            fps: 60,
            canvas_width: 512,
            canvas_height: 256,
            fade: 0.3,
            bar_gap: 1.0,
            bar_radius: 4.0,
            initial_volume: 0.7,
            max_blob_bytes: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads the user config. Problems never stop the program: the defaults are used and
    /// the error comes back for logging once the logger is up.
    pub fn load() -> (Config, Option<ConfigError>) {
        let Some(path) = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml")) else {
            return (Config::default(), None);
        };
        match Self::load_from(&path) {
            Ok(config) => (config, None),
            Err(err) => (Config::default(), Some(err)),
        }
    }

    /// A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config: Config = toml::from_str(&text)?;
        Ok(config.sanitized())
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    pub fn theme(&self) -> Theme {
        builtin_themes::get_by_name(&self.theme).unwrap_or_else(|| {
            warn!(
                "unknown theme {:?}, using {}; available: {}",
                self.theme,
                builtin_themes::DEFAULT_THEME,
                builtin_themes::list_themes().join(", ")
            );
            Theme::default()
        })
    }

    fn sanitized(mut self) -> Self {
        let defaults = Config::default();
        self.fps = self.fps.clamp(1, 240);
        self.canvas_width = self.canvas_width.max(1);
        self.canvas_height = self.canvas_height.max(1);
        if !self.fade.is_finite() {
            self.fade = defaults.fade;
        }
        self.fade = self.fade.clamp(0.0, 1.0);
        if !self.bar_gap.is_finite() || self.bar_gap < 0.0 {
            self.bar_gap = defaults.bar_gap;
        }
        if !self.bar_radius.is_finite() || self.bar_radius < 0.0 {
            self.bar_radius = defaults.bar_radius;
        }
        self.initial_volume = if self.initial_volume.is_nan() {
            defaults.initial_volume
        } else {
            self.initial_volume.clamp(0.0, 1.0)
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "theme = \"Nord\"\nfps = 30\n");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.theme, "Nord");
        assert_eq!(config.fps, 30);
        assert_eq!(config.canvas_width, 512);
        assert_eq!(config.initial_volume, 0.7);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "fps = \"fast\"");
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "fps = 0\nfade = 3.0\ninitial_volume = 1.5\nbar_gap = -2.0\n");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.fps, 1);
        assert_eq!(config.fade, 1.0);
        assert_eq!(config.initial_volume, 1.0);
        assert_eq!(config.bar_gap, 1.0);
    }

    #[test]
    fn explicit_data_dir_wins() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/somewhere")),
            ..Config::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/somewhere"));
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let config = Config {
            theme: "Neon Dreams".into(),
            ..Config::default()
        };
        assert_eq!(config.theme(), Theme::default());
    }
}
