use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{PALETTE, ROUND_UP_CHOICES, is_hex_color};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    TomlDecode(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {err}"),
            ConfigError::TomlDecode(err) => write!(f, "failed to parse settings: {err}"),
            ConfigError::Invalid(reason) => write!(f, "invalid settings: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub save_file: Option<PathBuf>,
    pub autosave_interval_secs: u64,
    pub default_round_up_minutes: u32,
    pub palette: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_file: None,
            autosave_interval_secs: 30,
            default_round_up_minutes: 0,
            palette: PALETTE.iter().map(|color| color.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Reads settings from `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(ConfigError::Io(err)),
        };

        let settings: Settings = toml::from_str(&raw).map_err(ConfigError::TomlDecode)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "autosave_interval_secs must be positive".to_string(),
            ));
        }
        if !ROUND_UP_CHOICES.contains(&self.default_round_up_minutes) {
            return Err(ConfigError::Invalid(format!(
                "default_round_up_minutes must be one of {ROUND_UP_CHOICES:?}"
            )));
        }
        if let Some(color) = self.palette.iter().find(|color| !is_hex_color(color)) {
            return Err(ConfigError::Invalid(format!(
                "palette entry is not a hex color: {color}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{ConfigError, Settings};

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().expect("temp dir");
        let settings = Settings::load(&dir.path().join("config.toml")).expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.autosave_interval_secs, 30);
        assert_eq!(settings.palette.len(), 11);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "autosave_interval_secs = 10\ndefault_round_up_minutes = 15\nsave_file = \"/tmp/tasks.json\"\n",
        )
        .expect("write");

        let settings = Settings::load(&path).expect("load");
        assert_eq!(settings.autosave_interval_secs, 10);
        assert_eq!(settings.default_round_up_minutes, 15);
        assert_eq!(
            settings.save_file.as_deref(),
            Some(std::path::Path::new("/tmp/tasks.json"))
        );
        assert_eq!(settings.palette, Settings::default().palette);
    }

    #[test]
    fn rejects_unsupported_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");

        fs::write(&path, "default_round_up_minutes = 7\n").expect("write");
        assert!(matches!(Settings::load(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "palette = [\"#fff\", \"teal\"]\n").expect("write");
        assert!(matches!(Settings::load(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "autosave_interval_secs = \"soon\"\n").expect("write");
        assert!(matches!(Settings::load(&path), Err(ConfigError::TomlDecode(_))));
    }
}
