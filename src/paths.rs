use std::env;
use std::path::PathBuf;

use crate::config::Settings;

const APP_DIR: &str = "TaskTimer";
const SAVE_FILE: &str = "saveFile.json";
const CONFIG_FILE: &str = "config.toml";

/// Picks the save file: explicit path, `TASK_TIMER_FILE`, the settings file,
/// then `<config dir>/TaskTimer/saveFile.json`.
pub fn resolve_save_path(cli_path: Option<PathBuf>, settings: &Settings) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = non_empty_var("TASK_TIMER_FILE") {
		return absolutize(path);
	}

	if let Some(path) = &settings.save_file {
		return absolutize(path.clone());
	}

	app_dir().join(SAVE_FILE)
}

pub fn resolve_config_path() -> PathBuf {
	if let Some(path) = non_empty_var("TASK_TIMER_CONFIG") {
		return absolutize(path);
	}

	app_dir().join(CONFIG_FILE)
}

fn app_dir() -> PathBuf {
	config_dir().join(APP_DIR)
}

fn config_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("APPDATA") {
			return PathBuf::from(path);
		}
	}

	if let Some(path) = non_empty_var("XDG_CONFIG_HOME") {
		return path;
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".config");
	}

	PathBuf::from(".")
}

fn non_empty_var(name: &str) -> Option<PathBuf> {
	env::var_os(name)
		.filter(|value| !value.is_empty())
		.map(PathBuf::from)
}

fn absolutize(path: PathBuf) -> PathBuf {
	if path.is_absolute() {
		return path;
	}

	match env::current_dir() {
		Ok(cwd) => cwd.join(path),
		Err(_) => path,
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::resolve_save_path;
	use crate::config::Settings;

	#[test]
	fn explicit_path_wins() {
		let settings = Settings {
			save_file: Some(PathBuf::from("/from/settings.json")),
			..Settings::default()
		};
		let path = resolve_save_path(Some(PathBuf::from("/explicit/tasks.json")), &settings);
		assert_eq!(path, PathBuf::from("/explicit/tasks.json"));
	}

	#[test]
	fn relative_paths_become_absolute() {
		let path = resolve_save_path(Some(PathBuf::from("tasks.json")), &Settings::default());
		assert!(path.is_absolute());
		assert!(path.ends_with("tasks.json"));
	}
}
