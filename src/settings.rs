// src/settings.rs
//
// Settings directory loading.
//
// - A settings directory holds up to three JSON files:
//     • resources.json : budgets, default-rule name, base stylesheet
//     • config.json    : conversion toggles
//     • character.json : ordered list of character rules
// - Every file is optional; a missing file yields defaults.
// - A file that exists but cannot be read or parsed is an error.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::SettingsError;
use crate::options::{ConversionOptions, Resources};
use crate::rules::{CharacterRule, RuleBook};

pub const RESOURCES_FILE_NAME: &str = "resources.json";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CHARACTER_FILE_NAME: &str = "character.json";

/// Everything a conversion needs from disk.
#[derive(Debug, Clone)]
pub struct Settings {
    pub resources: Resources,
    pub options: ConversionOptions,
    pub rules: RuleBook,
}

impl Settings {
    /// Load all three files from `dir`.
    pub fn load(dir: &Path) -> Result<Self, SettingsError> {
        let resources = load_object(&dir.join(RESOURCES_FILE_NAME))?
            .map(|m| Resources::from_map(&m))
            .unwrap_or_default();
        let options = load_object(&dir.join(CONFIG_FILE_NAME))?
            .map(|m| ConversionOptions::from_map(&m))
            .unwrap_or_default();
        let records = load_rules(&dir.join(CHARACTER_FILE_NAME))?;
        let rules = RuleBook::new(records, &resources.character_default_name);

        tracing::debug!(
            dir = %dir.display(),
            rules = rules.rules().len(),
            web = options.convert_web_log,
            compact = options.compact_mode,
            iframe_max = resources.iframe_max_character,
            "Loaded settings"
        );
        Ok(Settings {
            resources,
            options,
            rules,
        })
    }
}

fn read_json(path: &Path) -> Result<Option<Value>, SettingsError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Settings file absent, using defaults");
            return Ok(None);
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn load_object(path: &Path) -> Result<Option<Map<String, Value>>, SettingsError> {
    match read_json(path)? {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(shape_error(path, "a JSON object")),
    }
}

fn load_rules(path: &Path) -> Result<Vec<CharacterRule>, SettingsError> {
    let items = match read_json(path)? {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        // An empty object is what an unset store looks like.
        Some(Value::Object(map)) if map.is_empty() => return Ok(Vec::new()),
        Some(_) => return Err(shape_error(path, "a JSON array of character rules")),
    };

    let mut rules = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<CharacterRule>(item) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                tracing::warn!(path = %path.display(), index, error = %e, "Skipping unreadable character rule");
            }
        }
    }
    Ok(rules)
}

fn shape_error(path: &Path, expected: &'static str) -> SettingsError {
    SettingsError::Shape {
        path: PathBuf::from(path),
        expected,
    }
}
