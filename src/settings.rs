use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::EngineCredentials;
use crate::gesture::{GestureConfig, InputKey};
use crate::pipeline::PipelineConfig;

// ============================================================================
// DEFAULT SETTINGS CONSTANTS
// ============================================================================

/// File name searched for during discovery
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Directory under the user config dir used as the last discovery location
pub const CONFIG_DIR_NAME: &str = "spacetrans";

pub const DEFAULT_ENGINE: &str = "youdao";

pub const DEFAULT_TARGET_LANGUAGE: &str = "en";

pub const DEFAULT_HOTKEY_ENABLED: bool = true;

// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Application settings, stored as JSON.
///
/// Missing fields take their defaults and unknown fields are ignored, so
/// files from older or newer versions still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Engine used for translation ("youdao", "gemini")
    pub current_engine: String,
    /// Language code translations are produced in
    pub target_language: String,
    /// Whether the gesture is honored at startup
    pub hotkey_enabled: bool,
    /// Key whose taps make up the gesture
    pub activation_key: InputKey,
    pub gesture: GestureConfig,
    /// Engine name -> credential fields (e.g. app_key, app_secret, api_key, model)
    pub engines: BTreeMap<String, EngineCredentials>,
    pub pipeline: PipelineConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        let mut engines = BTreeMap::new();
        engines.insert(
            "youdao".to_string(),
            EngineCredentials::from([
                ("app_key".to_string(), String::new()),
                ("app_secret".to_string(), String::new()),
            ]),
        );
        engines.insert(
            "gemini".to_string(),
            EngineCredentials::from([("api_key".to_string(), String::new())]),
        );

        Self {
            current_engine: DEFAULT_ENGINE.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            hotkey_enabled: DEFAULT_HOTKEY_ENABLED,
            activation_key: InputKey::Space,
            gesture: GestureConfig::default(),
            engines,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppSettings {
    /// Read and parse `path`. Values are not validated; see [`AppSettings::sanitize`].
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    /// Replace invalid values with defaults.
    ///
    /// Returns one [`SettingsError::Invalid`] per replaced value so the caller
    /// can report them.
    pub fn sanitize(&mut self) -> Vec<SettingsError> {
        let mut problems = Vec::new();

        if let Err(reason) = self.gesture.validate() {
            problems.push(SettingsError::Invalid(format!(
                "gesture: {}; using defaults",
                reason
            )));
            self.gesture = GestureConfig::default();
        }

        if self.activation_key == InputKey::Other {
            problems.push(SettingsError::Invalid(
                "activation_key is not a supported key; using space".to_string(),
            ));
            self.activation_key = InputKey::Space;
        }

        let engine = self.current_engine.trim().to_ascii_lowercase();
        self.current_engine = if engine.is_empty() {
            problems.push(SettingsError::Invalid(format!(
                "current_engine is empty; using {}",
                DEFAULT_ENGINE
            )));
            DEFAULT_ENGINE.to_string()
        } else {
            engine
        };

        let target = self.target_language.trim();
        self.target_language = if target.is_empty() {
            problems.push(SettingsError::Invalid(format!(
                "target_language is empty; using {}",
                DEFAULT_TARGET_LANGUAGE
            )));
            DEFAULT_TARGET_LANGUAGE.to_string()
        } else {
            target.to_string()
        };

        problems
    }
}

/// Locations searched for `config.json`, in priority order: the working
/// directory, the executable's directory and each of its ancestors, then the
/// user config directory.
pub fn candidate_paths(cwd: Option<&Path>, exe_dir: Option<&Path>, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let mut push = |path: PathBuf| {
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    };

    if let Some(cwd) = cwd {
        push(cwd.join(CONFIG_FILE_NAME));
    }
    if let Some(exe_dir) = exe_dir {
        for dir in exe_dir.ancestors() {
            push(dir.join(CONFIG_FILE_NAME));
        }
    }
    if let Some(config_dir) = config_dir {
        push(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    candidates
}

fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Where a default file is written when discovery finds nothing
fn default_location(exe_dir: Option<&Path>, config_dir: Option<&Path>) -> PathBuf {
    match (exe_dir, config_dir) {
        (Some(dir), _) => dir.join(CONFIG_FILE_NAME),
        (None, Some(dir)) => dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        (None, None) => PathBuf::from(CONFIG_FILE_NAME),
    }
}

/// Settings as loaded at startup
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: AppSettings,
    pub path: PathBuf,
    /// Values replaced by defaults during loading
    pub problems: Vec<SettingsError>,
}

/// Load settings from `explicit`, or discover `config.json`.
///
/// When no file exists a default one is written so the user has something
/// to edit. Parse errors are returned; invalid values are replaced and listed
/// in [`LoadedSettings::problems`].
pub fn load_settings(explicit: Option<&Path>) -> Result<LoadedSettings, SettingsError> {
    let cwd = std::env::current_dir().ok();
    let exe_dir = exe_dir();
    let config_dir = dirs::config_dir();

    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => candidate_paths(cwd.as_deref(), exe_dir.as_deref(), config_dir.as_deref())
            .into_iter()
            .find(|p| p.is_file())
            .unwrap_or_else(|| default_location(exe_dir.as_deref(), config_dir.as_deref())),
    };

    load_or_create(&path)
}

/// Load `path`, writing defaults there first if it does not exist
pub fn load_or_create(path: &Path) -> Result<LoadedSettings, SettingsError> {
    let mut settings = if path.is_file() {
        log::info!("Settings: loading {}", path.display());
        AppSettings::load_from(path)?
    } else {
        log::info!("Settings: no settings file, writing defaults to {}", path.display());
        let defaults = AppSettings::default();
        if let Err(e) = defaults.save_to(path) {
            log::warn!("Settings: {}; continuing with defaults", e);
        }
        defaults
    };

    let problems = settings.sanitize();
    for problem in &problems {
        log::warn!("Settings: {}", problem);
    }

    Ok(LoadedSettings {
        settings,
        path: path.to_path_buf(),
        problems,
    })
}
