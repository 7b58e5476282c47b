use crate::error::{Result, TodozError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_NAMESPACE: &str = "todos";
const DEFAULT_HINT_DELAY_MS: u64 = 1000;

/// Keys accepted by [`TodozConfig::get`] and [`TodozConfig::set`].
pub const KEYS: [&str; 3] = ["namespace", "hint-delay-ms", "show-done"];

/// Configuration for todoz, stored in `<data dir>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodozConfig {
    /// Storage namespace, i.e. the name of the list file
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Idle time before the "press Enter" hint shows
    #[serde(default = "default_hint_delay_ms")]
    pub hint_delay_ms: u64,

    /// Whether `list` shows completed todos
    #[serde(default = "default_show_done")]
    pub show_done: bool,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_hint_delay_ms() -> u64 {
    DEFAULT_HINT_DELAY_MS
}

fn default_show_done() -> bool {
    true
}

impl Default for TodozConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            hint_delay_ms: DEFAULT_HINT_DELAY_MS,
            show_done: true,
        }
    }
}

impl TodozConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(TodozError::Io)?;
        let config: TodozConfig =
            serde_json::from_str(&content).map_err(TodozError::Serialization)?;
        tracing::debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(TodozError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(TodozError::Serialization)?;
        fs::write(config_path, content).map_err(TodozError::Io)?;
        Ok(())
    }

    pub fn hint_delay(&self) -> Duration {
        Duration::from_millis(self.hint_delay_ms)
    }

    /// Current value of a key, formatted for display.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "namespace" => Some(self.namespace.clone()),
            "hint-delay-ms" => Some(self.hint_delay_ms.to_string()),
            "show-done" => Some(self.show_done.to_string()),
            _ => None,
        }
    }

    /// Parse and set a key. Unknown keys and unparsable values are errors.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "namespace" => {
                let value = value.trim();
                validate_namespace(value)?;
                self.namespace = value.to_string();
            }
            "hint-delay-ms" => {
                self.hint_delay_ms = value
                    .trim()
                    .parse()
                    .map_err(|_| TodozError::Api(format!("Invalid delay: {}", value)))?;
            }
            "show-done" => {
                self.show_done = match value.trim() {
                    "true" | "yes" | "on" => true,
                    "false" | "no" | "off" => false,
                    other => return Err(TodozError::Api(format!("Invalid boolean: {}", other))),
                };
            }
            other => return Err(TodozError::Api(format!("Unknown config key: {}", other))),
        }
        Ok(())
    }
}

/// Check that `name` can name a list file in the data directory.
///
/// The list is stored as `<name>.json`, so the name must be a plain file
/// stem and must not collide with the settings file.
pub fn validate_namespace(name: &str) -> Result<()> {
    let collides = format!("{}.json", name).eq_ignore_ascii_case(CONFIG_FILENAME);
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') || collides {
        return Err(TodozError::Api(format!("Invalid namespace: {}", name)));
    }
    Ok(())
}
