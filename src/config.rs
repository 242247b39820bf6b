use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;
use crate::models::record::HistoryPolicy;

const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";
const DEFAULT_TABLE: &str = "Clients";
const DEFAULT_SCANS_PREFIX: &str = "1. Daily Temp Scans";
const DEFAULT_CLIENTS_FOLDER: &str = "2. Active Clients";
const DEFAULT_LETTERS_SUBFOLDER: &str = "DOL Letters";
const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
const DEFAULT_OCR_MAX_PAGES: u32 = 3;
const DEFAULT_OCR_DPI: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirtableSettings {
    pub api_url: String,
    pub base_id: String,
    pub table: String,
    pub token: String,
}

/// Layout of the synced share the letters live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSettings {
    pub sync_root: PathBuf,
    pub scans_prefix: String,
    pub clients_folder: String,
    pub letters_subfolder: String,
}

impl FolderSettings {
    pub fn scans_dir(&self) -> PathBuf {
        self.sync_root.join(&self.scans_prefix)
    }

    pub fn clients_root(&self) -> PathBuf {
        self.sync_root.join(&self.clients_folder)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    airtable: Option<AirtableSettings>,
    folders: Option<FolderSettings>,
    pub history_policy: HistoryPolicy,
    pub settle_delay: Duration,
    pub ocr_max_pages: u32,
    pub ocr_dpi: u32,
    pub database_path: PathBuf,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let airtable = match (get("AIRTABLE_PAT"), get("AIRTABLE_BASE_ID")) {
            (Some(token), Some(base_id)) => Some(AirtableSettings {
                api_url: or("AIRTABLE_API_URL", DEFAULT_API_URL),
                base_id,
                table: or("AIRTABLE_TABLE", DEFAULT_TABLE),
                token,
            }),
            _ => None,
        };

        let folders = get("SYNC_FOLDER_PATH").map(|root| FolderSettings {
            sync_root: PathBuf::from(root),
            scans_prefix: or("SCANS_FOLDER_PREFIX", DEFAULT_SCANS_PREFIX),
            clients_folder: or("CLIENTS_FOLDER", DEFAULT_CLIENTS_FOLDER),
            letters_subfolder: or("LETTERS_SUBFOLDER", DEFAULT_LETTERS_SUBFOLDER),
        });

        let history_policy = match get("HISTORY_POLICY") {
            Some(raw) => HistoryPolicy::parse(&raw).map_err(AppError::Config)?,
            None => HistoryPolicy::default(),
        };

        let database_path = match get("MAILROOM_DB") {
            Some(path) => PathBuf::from(path),
            None => default_database_path(),
        };

        Ok(Self {
            airtable,
            folders,
            history_policy,
            settle_delay: Duration::from_millis(parse_number(
                "SETTLE_DELAY_MS",
                get("SETTLE_DELAY_MS"),
                DEFAULT_SETTLE_DELAY_MS,
            )?),
            ocr_max_pages: parse_number("OCR_MAX_PAGES", get("OCR_MAX_PAGES"), DEFAULT_OCR_MAX_PAGES)?,
            ocr_dpi: parse_number("OCR_DPI", get("OCR_DPI"), DEFAULT_OCR_DPI)?,
            database_path,
        })
    }

    pub fn airtable(&self) -> Result<&AirtableSettings, AppError> {
        self.airtable.as_ref().ok_or_else(|| {
            AppError::Config("AIRTABLE_PAT and AIRTABLE_BASE_ID must be set".to_string())
        })
    }

    /// Folder layout; the sync root has to exist.
    pub fn folders(&self) -> Result<&FolderSettings, AppError> {
        let folders = self
            .folders
            .as_ref()
            .ok_or_else(|| AppError::Config("SYNC_FOLDER_PATH must be set".to_string()))?;
        if !folders.sync_root.is_dir() {
            return Err(AppError::Config(format!(
                "SYNC_FOLDER_PATH does not exist: {}",
                folders.sync_root.display()
            )));
        }
        Ok(folders)
    }

    pub fn with_database_path(mut self, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            self.database_path = path.to_path_buf();
        }
        self
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, AppError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got '{value}'"))),
        None => Ok(default),
    }
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "mailroom")
        .map(|dirs| dirs.data_dir().join("mailroom.db"))
        .unwrap_or_else(|| PathBuf::from("mailroom.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.history_policy, HistoryPolicy::AlwaysAppend);
        assert_eq!(config.settle_delay, Duration::from_millis(1000));
        assert_eq!(config.ocr_max_pages, 3);
        assert_eq!(config.ocr_dpi, 300);
        assert!(config.airtable().is_err());
        assert!(config.folders().is_err());
    }

    #[test]
    fn test_airtable_settings() {
        let config = config_from(&[
            ("AIRTABLE_PAT", "pat123"),
            ("AIRTABLE_BASE_ID", "appABC"),
            ("AIRTABLE_TABLE", "Active"),
        ])
        .unwrap();
        let airtable = config.airtable().unwrap();
        assert_eq!(airtable.api_url, DEFAULT_API_URL);
        assert_eq!(airtable.table, "Active");
        assert_eq!(airtable.token, "pat123");
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = config_from(&[("AIRTABLE_PAT", "  "), ("AIRTABLE_BASE_ID", "app")]).unwrap();
        assert!(config.airtable().is_err());
    }

    #[test]
    fn test_folder_layout() {
        let root = std::env::temp_dir().join("mailroom_test_config_root");
        std::fs::create_dir_all(&root).unwrap();
        let config = config_from(&[("SYNC_FOLDER_PATH", root.to_str().unwrap())]).unwrap();
        let folders = config.folders().unwrap();
        assert_eq!(folders.scans_dir(), root.join("1. Daily Temp Scans"));
        assert_eq!(folders.clients_root(), root.join("2. Active Clients"));
        assert_eq!(folders.letters_subfolder, "DOL Letters");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_missing_sync_root_is_rejected() {
        let config =
            config_from(&[("SYNC_FOLDER_PATH", "/definitely/not/here/mailroom")]).unwrap();
        assert!(matches!(config.folders(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        assert!(matches!(
            config_from(&[("OCR_DPI", "high")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("HISTORY_POLICY", "sometimes")]),
            Err(AppError::Config(_))
        ));
        let skip = config_from(&[("HISTORY_POLICY", "skip_when_unchanged")]).unwrap();
        assert_eq!(skip.history_policy, HistoryPolicy::SkipWhenUnchanged);
    }

    #[test]
    fn test_database_path_override() {
        let config = config_from(&[("MAILROOM_DB", "/tmp/a.db")])
            .unwrap()
            .with_database_path(Some(Path::new("/tmp/b.db")));
        assert_eq!(config.database_path, PathBuf::from("/tmp/b.db"));
    }
}
