use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::capture::CaptureConfig;
use crate::models::Operator;

pub const SETTINGS_PATH_ENV: &str = "KIOSK_SETTINGS";
pub const DEBUG_ENV: &str = "KIOSK_DEBUG";
const DEFAULT_SETTINGS_FILE: &str = "kiosk-settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KioskSettings {
    pub api_base_url: String,
    pub frontend_base_url: String,
    pub capture_interval_ms: u64,
    pub dwell_ms: u64,
    pub history_capacity: usize,
    pub request_timeout_ms: u64,
    pub jpeg_quality: u8,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frames_dir: PathBuf,
    pub dark_mode: bool,
    pub operator: Option<Operator>,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".into(),
            frontend_base_url: "http://localhost:3000".into(),
            capture_interval_ms: 1_000,
            dwell_ms: 30_000,
            history_capacity: 5,
            request_timeout_ms: 10_000,
            jpeg_quality: 80,
            frame_width: 640,
            frame_height: 480,
            frames_dir: PathBuf::from("frames"),
            dark_mode: false,
            operator: None,
        }
    }
}

impl KioskSettings {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            capture_interval: Duration::from_millis(self.capture_interval_ms),
            dwell: Duration::from_millis(self.dwell_ms),
            history_capacity: self.history_capacity,
            jpeg_quality: self.jpeg_quality,
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            frontend_base_url: self.frontend_base_url.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings file location: `KIOSK_SETTINGS`, else `./kiosk-settings.json`.
pub fn default_settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<KioskSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings in {}: {err}; using defaults",
                    path.display()
                );
                KioskSettings::default()
            })
        } else {
            KioskSettings::default()
        };

        data.capture_config()
            .validate()
            .with_context(|| format!("Invalid capture settings in {}", path.display()))?;

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> KioskSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dark_mode(&self) -> bool {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dark_mode
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.dark_mode = enabled;
        self.persist(&guard)
    }

    fn persist(&self, data: &KioskSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("absent.json")).unwrap();
        let settings = store.get();
        assert_eq!(settings, KioskSettings::default());
        assert_eq!(settings.capture_interval_ms, 1_000);
        assert_eq!(settings.dwell_ms, 30_000);
        assert_eq!(settings.history_capacity, 5);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "api_base_url": "http://10.0.0.2:5000", "dwell_ms": 5000,
                 "operator": { "username": "ops", "role": "lecturer", "id": "7" } }"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.api_base_url, "http://10.0.0.2:5000");
        assert_eq!(settings.dwell_ms, 5_000);
        assert_eq!(settings.capture_interval_ms, 1_000);
        let operator = settings.operator.unwrap();
        assert_eq!(
            operator.role().unwrap(),
            Role::Lecturer {
                lecturer_id: "7".into()
            }
        );
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.get(), KioskSettings::default());
    }

    #[test]
    fn invalid_capture_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "history_capacity": 0 }"#).unwrap();
        assert!(SettingsStore::new(path).is_err());
    }

    #[test]
    fn dark_mode_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_dark_mode(true).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert!(reloaded.dark_mode());
    }
}
