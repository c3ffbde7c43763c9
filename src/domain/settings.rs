use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "pami-monitor".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    /// Discovery scan window before the attempt counts as abandoned.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    // Robot service overrides for re-keyed bench firmware builds
    #[serde(default = "default_robot_service_uuid")]
    pub robot_service_uuid: String,
    #[serde(default = "default_position_char_uuid")]
    pub position_char_uuid: String,
    #[serde(default = "default_motor_debug_char_uuid")]
    pub motor_debug_char_uuid: String,
    #[serde(default = "default_override_motor_char_uuid")]
    pub override_motor_char_uuid: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            scan_timeout_secs: default_scan_timeout_secs(),
            robot_service_uuid: default_robot_service_uuid(),
            position_char_uuid: default_position_char_uuid(),
            motor_debug_char_uuid: default_motor_debug_char_uuid(),
            override_motor_char_uuid: default_override_motor_char_uuid(),
        }
    }
}

fn default_scan_timeout_secs() -> u64 {
    5
}
fn default_robot_service_uuid() -> String {
    "c10e0000-5a32-42a0-886b-cf9d57a5fd4a".to_string()
}
fn default_position_char_uuid() -> String {
    "c10e0002-5a32-42a0-886b-cf9d57a5fd4a".to_string()
}
fn default_motor_debug_char_uuid() -> String {
    "c10e0003-5a32-42a0-886b-cf9d57a5fd4a".to_string()
}
fn default_override_motor_char_uuid() -> String {
    "c10e0004-5a32-42a0-886b-cf9d57a5fd4a".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("pami-link");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
