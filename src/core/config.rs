/*
 * Manages the user-facing export settings: the character limit that defines
 * segment splitting, the wrapper templates, and a few listing/packing knobs.
 * Settings are a camelCase JSON document (`settings.json`) kept either at an
 * explicit path or in the application's local configuration directory.
 *
 * It uses a trait-based approach (`ConfigManagerOperations`) so the app layer
 * can be tested with in-memory settings. The character limit has no default:
 * an export without one is refused rather than split by a guessed number.
 */
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

pub const SETTINGS_FILENAME: &str = "settings.json";
pub const CONTENT_PLACEHOLDER: &str = "%content%";
pub const DEFAULT_MAX_TEXT_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoProjectDirectory,
    MissingOption(&'static str),
    InvalidOption(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration file is not valid JSON: {e}"),
            ConfigError::NoProjectDirectory => {
                write!(f, "Could not determine project directory for configuration")
            }
            ConfigError::MissingOption(name) => {
                write!(f, "Required option '{name}' is not configured")
            }
            ConfigError::InvalidOption(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportSettings {
    pub character_limit: Option<usize>,
    pub export_start_template: String,
    pub export_continuation_template: String,
    pub export_end_template: String,
    pub copy_template: String,
    pub keep_header_with_content: bool,
    pub max_text_file_size: u64,
    pub exclude_patterns: Vec<String>,
    pub respect_gitignore: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            character_limit: None,
            export_start_template: String::new(),
            export_continuation_template: String::new(),
            export_end_template: String::new(),
            copy_template: CONTENT_PLACEHOLDER.to_string(),
            keep_header_with_content: true,
            max_text_file_size: DEFAULT_MAX_TEXT_FILE_SIZE,
            exclude_patterns: Vec::new(),
            respect_gitignore: false,
        }
    }
}

impl ExportSettings {
    /*
     * The configured character limit. Absent or zero is a precondition failure
     * of whatever operation asked for it.
     */
    pub fn require_character_limit(&self) -> Result<usize> {
        match self.character_limit {
            None => Err(ConfigError::MissingOption("characterLimit")),
            Some(0) => Err(ConfigError::InvalidOption(
                "characterLimit must be greater than zero".to_string(),
            )),
            Some(limit) => Ok(limit),
        }
    }

    /*
     * Applies `copyTemplate` to the copy text. The placeholder is replaced with
     * the content; a template without it gets the content appended.
     */
    pub fn apply_copy_template(&self, content: &str) -> String {
        if self.copy_template.contains(CONTENT_PLACEHOLDER) {
            self.copy_template.replace(CONTENT_PLACEHOLDER, content)
        } else {
            format!("{}{content}", self.copy_template)
        }
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_settings(&self) -> Result<ExportSettings>;
    fn save_settings(&self, settings: &ExportSettings) -> Result<()>;
}

/*
 * File-backed settings. With an explicit path the file must exist; the default
 * location (`settings.json` in the app's local config dir) reads as defaults
 * when missing.
 */
pub struct CoreConfigManager {
    app_name: String,
    explicit_path: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new(app_name: &str, explicit_path: Option<PathBuf>) -> Self {
        CoreConfigManager {
            app_name: app_name.to_string(),
            explicit_path,
        }
    }

    fn settings_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Ok(path.clone());
        }
        let config_dir = path_utils::get_base_app_config_local_dir(&self.app_name)
            .ok_or(ConfigError::NoProjectDirectory)?;
        Ok(config_dir.join(SETTINGS_FILENAME))
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_settings(&self) -> Result<ExportSettings> {
        let file_path = self.settings_path()?;
        if !file_path.exists() {
            if self.explicit_path.is_some() {
                return Err(ConfigError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("settings file {file_path:?} does not exist"),
                )));
            }
            log::debug!("CoreConfigManager: No settings at {file_path:?}, using defaults.");
            return Ok(ExportSettings::default());
        }
        let contents = fs::read_to_string(&file_path)?;
        if contents.trim().is_empty() {
            log::debug!("CoreConfigManager: Settings file {file_path:?} is empty.");
            return Ok(ExportSettings::default());
        }
        let settings: ExportSettings = serde_json::from_str(&contents)?;
        log::debug!("CoreConfigManager: Loaded settings from {file_path:?}.");
        Ok(settings)
    }

    fn save_settings(&self, settings: &ExportSettings) -> Result<()> {
        let file_path = self.settings_path()?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, serde_json::to_string_pretty(settings)?)?;
        log::debug!("CoreConfigManager: Saved settings to {file_path:?}.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_character_limit_has_no_default() {
        let settings = ExportSettings::default();
        assert!(matches!(
            settings.require_character_limit(),
            Err(ConfigError::MissingOption("characterLimit"))
        ));
    }

    #[test]
    fn test_zero_character_limit_is_invalid() {
        let settings = ExportSettings {
            character_limit: Some(0),
            ..ExportSettings::default()
        };
        assert!(matches!(
            settings.require_character_limit(),
            Err(ConfigError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_partial_camel_case_document_fills_defaults() {
        let settings: ExportSettings = serde_json::from_str(
            r#"{ "characterLimit": 8000, "exportStartTemplate": "BEGIN\n" }"#,
        )
        .unwrap();
        assert_eq!(settings.require_character_limit().unwrap(), 8000);
        assert_eq!(settings.export_start_template, "BEGIN\n");
        assert_eq!(settings.export_end_template, "");
        assert_eq!(settings.copy_template, CONTENT_PLACEHOLDER);
        assert!(settings.keep_header_with_content);
        assert_eq!(settings.max_text_file_size, DEFAULT_MAX_TEXT_FILE_SIZE);
        assert!(!settings.respect_gitignore);
    }

    #[test]
    fn test_apply_copy_template() {
        let mut settings = ExportSettings::default();
        assert_eq!(settings.apply_copy_template("body"), "body");

        settings.copy_template = "Review this:\n%content%\nThanks".to_string();
        assert_eq!(settings.apply_copy_template("body"), "Review this:\nbody\nThanks");

        settings.copy_template = "Prefix: ".to_string();
        assert_eq!(settings.apply_copy_template("body"), "Prefix: body");
    }

    #[test]
    fn test_save_and_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join(SETTINGS_FILENAME);
        let manager = CoreConfigManager::new("AnyApp", Some(path.clone()));
        let settings = ExportSettings {
            character_limit: Some(1234),
            export_end_template: "END".to_string(),
            exclude_patterns: vec![".git".to_string()],
            ..ExportSettings::default()
        };

        manager.save_settings(&settings).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"characterLimit\": 1234"));
        assert_eq!(manager.load_settings().unwrap(), settings);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = tempdir().unwrap();
        let manager = CoreConfigManager::new("AnyApp", Some(dir.path().join("absent.json")));
        assert!(matches!(manager.load_settings(), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "{ not json").unwrap();
        let manager = CoreConfigManager::new("AnyApp", Some(path));
        assert!(matches!(manager.load_settings(), Err(ConfigError::Serde(_))));
    }
}
