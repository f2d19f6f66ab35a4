use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "WEEKBLOCKS_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

pub enum LogTarget {
    Stderr,
    /// The dashboard owns the terminal, so it logs here instead.
    File(PathBuf),
}

/// Environment first, then the config file, then `info`.
fn directive(from_env: Option<String>, configured: Option<&str>) -> String {
    from_env
        .filter(|value| !value.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

pub fn init(target: LogTarget, configured: Option<&str>) -> Result<(), Box<dyn Error>> {
    let directive = directive(std::env::var(LOG_ENV).ok(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
            .map_err(|err| err as Box<dyn Error>)?,
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|err| err as Box<dyn Error>)?
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{LogTarget, directive, init};

    #[test]
    fn environment_wins_over_config() {
        assert_eq!(directive(Some("debug".to_string()), Some("warn")), "debug");
        assert_eq!(directive(Some("  ".to_string()), Some("warn")), "warn");
        assert_eq!(directive(None, None), "info");
    }

    #[test]
    fn file_target_installs_once() {
        let mut path = std::env::temp_dir();
        path.push(format!("weekblocks_logging_{}", std::process::id()));
        path.push("weekblocks.log");

        init(LogTarget::File(path.clone()), Some("debug")).expect("first init");
        assert!(path.exists());
        assert!(init(LogTarget::Stderr, None).is_err());
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }
}
