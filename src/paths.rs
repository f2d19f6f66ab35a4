use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "weekblocks";
const CONFIG_FILE: &str = "config.toml";
const LOG_FILE: &str = "weekblocks.log";

/// `--store`, then `WEEKBLOCKS_STORE`, then the config file, then the state
/// directory.
pub fn resolve_store_dir(cli_path: Option<PathBuf>, configured: Option<&Path>) -> PathBuf {
	pick_store_dir(cli_path, env::var_os("WEEKBLOCKS_STORE"), configured).unwrap_or_else(state_dir)
}

fn pick_store_dir(
	cli_path: Option<PathBuf>,
	env_path: Option<OsString>,
	configured: Option<&Path>,
) -> Option<PathBuf> {
	if let Some(path) = cli_path {
		return Some(absolutize(path));
	}

	if let Some(path) = env_path {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return Some(absolutize(path));
		}
	}

	configured
		.filter(|path| !path.as_os_str().is_empty())
		.map(|path| absolutize(path.to_path_buf()))
}

pub fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
	match cli_path {
		Some(path) => absolutize(path),
		None => config_dir().join(CONFIG_FILE),
	}
}

pub fn log_path() -> PathBuf {
	state_dir().join(LOG_FILE)
}

pub fn config_dir() -> PathBuf {
	if let Some(path) = env::var_os("WEEKBLOCKS_CONFIG_DIR") {
		return PathBuf::from(path);
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("APPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_CONFIG_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".config").join(APP_DIR);
	}

	PathBuf::from(".weekblocks")
}

pub fn state_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join(APP_DIR);
	}

	PathBuf::from(".weekblocks")
}

pub fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}

#[cfg(test)]
mod tests {
	use std::ffi::OsString;
	use std::path::{Path, PathBuf};

	use super::{absolutize, pick_store_dir};

	#[test]
	fn relative_paths_become_absolute() {
		assert!(absolutize(PathBuf::from("some/store")).is_absolute());
	}

	#[test]
	fn store_flag_beats_environment_and_config() {
		let picked = pick_store_dir(
			Some(PathBuf::from("/tmp/flag")),
			Some(OsString::from("/tmp/env")),
			Some(Path::new("/tmp/config")),
		);
		assert_eq!(picked, Some(PathBuf::from("/tmp/flag")));
	}

	#[test]
	fn environment_beats_config_unless_blank() {
		let picked = pick_store_dir(None, Some(OsString::from("/tmp/env")), Some(Path::new("/tmp/config")));
		assert_eq!(picked, Some(PathBuf::from("/tmp/env")));

		let picked = pick_store_dir(None, Some(OsString::new()), Some(Path::new("/tmp/config")));
		assert_eq!(picked, Some(PathBuf::from("/tmp/config")));

		assert_eq!(pick_store_dir(None, None, None), None);
	}
}
