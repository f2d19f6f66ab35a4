use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Settings, WeekRecord};
use crate::planner::Progress;

const SETTINGS_FILE: &str = "settings.json";
const PROGRESS_FILE: &str = "progress.json";
const WEEKS_DIR: &str = "weeks";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    JsonDecode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode {}: {source}", .path.display())]
    JsonEncode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A stored week together with the Monday it starts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPayload {
    #[serde(rename = "weekStartISO")]
    pub week_start_iso: NaiveDate,
    pub week: WeekRecord,
    pub updated_at: DateTime<Utc>,
}

/// The document written by `export` and read back by `import`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub week_start: NaiveDate,
    pub week: WeekRecord,
    pub settings: Settings,
}

pub trait StorageProvider {
    fn get_settings(&self) -> Result<Option<Settings>, StorageError>;
    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError>;
    fn get_week(&self, week_start: NaiveDate) -> Result<Option<WeekPayload>, StorageError>;
    fn save_week(&self, payload: &WeekPayload) -> Result<(), StorageError>;
    /// Inclusive on both ends, oldest first.
    fn list_weeks(&self, since: NaiveDate, until: NaiveDate) -> Result<Vec<WeekPayload>, StorageError>;
}

/// JSON documents under a single directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn week_path(&self, week_start: NaiveDate) -> PathBuf {
        self.root
            .join(WEEKS_DIR)
            .join(format!("{}.json", week_start.format("%Y-%m-%d")))
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root.join(PROGRESS_FILE)
    }

    pub fn load_progress(&self) -> Result<Progress, StorageError> {
        Ok(read_json(&self.progress_path())?.unwrap_or_default())
    }

    pub fn save_progress(&self, progress: &Progress) -> Result<(), StorageError> {
        write_json(&self.progress_path(), progress)
    }
}

impl StorageProvider for FileStore {
    fn get_settings(&self) -> Result<Option<Settings>, StorageError> {
        read_json(&self.settings_path())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        write_json(&self.settings_path(), settings)
    }

    fn get_week(&self, week_start: NaiveDate) -> Result<Option<WeekPayload>, StorageError> {
        read_json(&self.week_path(week_start))
    }

    fn save_week(&self, payload: &WeekPayload) -> Result<(), StorageError> {
        let path = self.week_path(payload.week_start_iso);
        write_json(&path, payload)?;
        debug!(week = %payload.week_start_iso, "saved week");
        Ok(())
    }

    fn list_weeks(&self, since: NaiveDate, until: NaiveDate) -> Result<Vec<WeekPayload>, StorageError> {
        let dir = self.root.join(WEEKS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: dir, source }),
        };

        let mut starts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                Ok(start) if start >= since && start <= until => starts.push(start),
                Ok(_) => {}
                Err(_) => warn!(path = %path.display(), "skipping unrecognised week file"),
            }
        }
        starts.sort();

        let mut weeks = Vec::with_capacity(starts.len());
        for start in starts {
            if let Some(payload) = self.get_week(start)? {
                weeks.push(payload);
            }
        }
        Ok(weeks)
    }
}

/// Stored settings with every missing default filled in.
pub fn load_settings(store: &dyn StorageProvider) -> Result<Settings, StorageError> {
    Ok(store.get_settings()?.unwrap_or_default().with_defaults())
}

/// The stored week, or an empty one.
pub fn load_week(store: &dyn StorageProvider, week_start: NaiveDate) -> Result<WeekRecord, StorageError> {
    Ok(store
        .get_week(week_start)?
        .map(|payload| payload.week)
        .unwrap_or_default())
}

/// Saves the week and folds it into the streak record.
pub fn save_week_with_progress(
    store: &FileStore,
    payload: &WeekPayload,
    progress: &mut Progress,
    today: NaiveDate,
) -> Result<(), StorageError> {
    store.save_week(payload)?;
    progress.update_from_week(payload.week_start_iso, &payload.week, today);
    store.save_progress(progress)
}

pub fn export_bundle(path: &Path, bundle: &ExportBundle) -> Result<(), StorageError> {
    write_json(path, bundle)
}

pub fn import_bundle(path: &Path) -> Result<ExportBundle, StorageError> {
    let raw = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StorageError::JsonDecode {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if raw.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::JsonDecode {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let io_error = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
    }

    let body = serde_json::to_string_pretty(value).map_err(|source| StorageError::JsonEncode {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = fs::File::create(path).map_err(io_error)?;
    file.write_all(body.as_bytes()).map_err(io_error)?;
    file.write_all(b"\n").map_err(io_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::fs;
    use std::path::PathBuf;

    use crate::domain::{Day, Settings, WeekRecord};

    use super::{
        ExportBundle, FileStore, StorageError, StorageProvider, WeekPayload, export_bundle,
        import_bundle, load_settings, load_week, save_week_with_progress,
    };
    use crate::planner::Progress;

    fn monday(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).expect("valid date")
    }

    fn payload(start: NaiveDate, project: &str) -> WeekPayload {
        let mut week = WeekRecord::empty();
        week.day_mut(Day::Monday).morning_project = project.to_string();
        WeekPayload {
            week_start_iso: start,
            week,
            updated_at: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn missing_store_reads_as_defaults() {
        let store = FileStore::new(temp_dir("weekblocks_storage_missing"));
        assert_eq!(store.get_settings().expect("read settings"), None);
        assert_eq!(load_settings(&store).expect("defaults"), Settings::default());
        assert_eq!(load_week(&store, monday(10)).expect("empty week"), WeekRecord::empty());
        assert!(store.list_weeks(monday(3), monday(31)).expect("list").is_empty());
    }

    #[test]
    fn blank_files_read_as_absent() {
        let root = temp_dir("weekblocks_storage_blank");
        let store = FileStore::new(&root);
        fs::create_dir_all(&root).expect("create root");
        fs::write(store.settings_path(), "  \n").expect("write blank");
        assert_eq!(store.get_settings().expect("read settings"), None);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn stored_settings_keep_their_values_and_gain_defaults() {
        let root = temp_dir("weekblocks_storage_settings");
        let store = FileStore::new(&root);
        fs::create_dir_all(&root).expect("create root");
        fs::write(
            store.settings_path(),
            r##"{"projects":["Garden"],"activityColors":{"Swim":"#00f"}}"##,
        )
        .expect("write settings");

        let settings = load_settings(&store).expect("load settings");
        assert_eq!(settings.projects, vec!["Garden".to_string()]);
        assert_eq!(settings.activity_colors["Swim"], "#00f");
        assert!(settings.activity_colors.contains_key("Run"));
        assert!(settings.suggested_slots.morning.is_some());

        store.save_settings(&settings).expect("save settings");
        assert_eq!(store.get_settings().expect("reload"), Some(settings));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn weeks_are_listed_inclusively_in_order() {
        let root = temp_dir("weekblocks_storage_weeks");
        let store = FileStore::new(&root);
        for (start, project) in [(monday(17), "b"), (monday(3), "x"), (monday(10), "a"), (monday(24), "c")] {
            store.save_week(&payload(start, project)).expect("save week");
        }
        fs::write(root.join("weeks").join("notes.json"), "{}").expect("write stray");

        let weeks = store.list_weeks(monday(10), monday(24)).expect("list");
        let projects = weeks
            .iter()
            .map(|payload| payload.week.day(Day::Monday).morning_project.as_str())
            .collect::<Vec<_>>();
        assert_eq!(projects, vec!["a", "b", "c"]);

        let raw = fs::read_to_string(store.week_path(monday(10))).expect("read week file");
        assert!(raw.contains("\"weekStartISO\": \"2025-03-10\""));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn malformed_week_is_reported() {
        let root = temp_dir("weekblocks_storage_malformed");
        let store = FileStore::new(&root);
        fs::create_dir_all(root.join("weeks")).expect("create weeks");
        fs::write(store.week_path(monday(10)), "{ nope").expect("write garbage");
        let err = store.get_week(monday(10)).expect_err("should fail");
        assert!(matches!(err, StorageError::JsonDecode { .. }));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn export_bundle_reads_back() {
        let root = temp_dir("weekblocks_storage_export");
        let path = root.join("bundle.json");
        let bundle = ExportBundle {
            week_start: monday(10),
            week: payload(monday(10), "Alpha").week,
            settings: Settings::default(),
        };
        export_bundle(&path, &bundle).expect("export");
        assert_eq!(import_bundle(&path).expect("import"), bundle);
        assert!(import_bundle(&root.join("missing.json")).is_err());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn saving_a_full_day_counts_towards_the_streak() {
        let root = temp_dir("weekblocks_storage_progress");
        let store = FileStore::new(&root);
        let mut data = payload(monday(10), "Linocut Book");
        let entry = data.week.day_mut(Day::Monday);
        entry.done_morning = true;
        entry.done_midday = true;
        entry.done_activity = true;

        let mut progress = Progress::default();
        save_week_with_progress(&store, &data, &mut progress, monday(10)).expect("save");
        assert_eq!(progress.current_streak(monday(10)), 1);
        assert_eq!(store.load_progress().expect("load progress"), progress);
        assert!(store.get_week(monday(10)).expect("read week").is_some());
        let _ = fs::remove_dir_all(root);
    }

    fn temp_dir(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }
}
