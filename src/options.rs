// src/options.rs
//
// Conversion toggles and fixed resources.
//
// - Both are plain records.
// - Settings files are decoded key by key: a missing key or a value of the wrong type
//   falls back to that key's default, so a hand-edited file never blocks a conversion.

use serde_json::{Map, Value};

/// Base stylesheet prepended to the generated per-class rules.
pub const DEFAULT_WEB_STYLE_BASE: &str = r#"*{padding:0;margin:0;margin-bottom:1px;font-size:16px;line-height:25px;} body{font-family: "游明朝", serif;}"#;

/// User toggles for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Unknown speakers take the default rule's color instead of the HTML color.
    pub use_default_setting: bool,
    pub report_unknown_character: bool,
    /// Flag flat logs longer than [`Resources::max_log_character_length`].
    pub report_over_character: bool,
    /// Comma-separated tab names whose utterances are dropped.
    pub ignore_tabs: String,
    pub ignore_empty_message: bool,
    /// `。」` → `」`
    pub convert_quotation: bool,
    pub compact_mode: bool,
    /// `*` → `＊`
    pub convert_asterisk: bool,
    /// `~` → `～`
    pub convert_wave: bool,
    /// Also produce the web log and iframe fragments.
    pub convert_web_log: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ConversionOptions {
            use_default_setting: true,
            report_unknown_character: true,
            report_over_character: true,
            ignore_tabs: "雑談,other,".to_string(),
            ignore_empty_message: true,
            convert_quotation: true,
            compact_mode: false,
            convert_asterisk: false,
            convert_wave: false,
            convert_web_log: false,
        }
    }
}

impl ConversionOptions {
    /// Decode from a settings object, falling back per key.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let d = ConversionOptions::default();
        ConversionOptions {
            use_default_setting: bool_or(map.get("use_default_setting"), d.use_default_setting),
            report_unknown_character: bool_or(
                map.get("report_unknown_character"),
                d.report_unknown_character,
            ),
            report_over_character: bool_or(
                map.get("report_over_character"),
                d.report_over_character,
            ),
            ignore_tabs: string_or(map.get("ignore_tabs"), d.ignore_tabs),
            ignore_empty_message: bool_or(map.get("ignore_empty_message"), d.ignore_empty_message),
            convert_quotation: bool_or(map.get("convert_quotation"), d.convert_quotation),
            compact_mode: bool_or(map.get("compact_mode"), d.compact_mode),
            convert_asterisk: bool_or(map.get("convert_asterisk"), d.convert_asterisk),
            convert_wave: bool_or(map.get("convert_wave"), d.convert_wave),
            convert_web_log: bool_or(map.get("convert_web_log"), d.convert_web_log),
        }
    }

    /// Ignore-list entries, trimmed, empty entries dropped.
    pub fn ignored_tabs(&self) -> Vec<&str> {
        self.ignore_tabs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Budgets and constants that are not per-conversion toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    /// Flat log length (in characters) above which an over-length report is raised.
    pub max_log_character_length: usize,
    /// Sentinel character name of the default rule.
    pub character_default_name: String,
    pub web_style_base: String,
    /// Character budget of one iframe fragment.
    pub iframe_max_character: usize,
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            max_log_character_length: 250_000,
            character_default_name: "Default".to_string(),
            web_style_base: DEFAULT_WEB_STYLE_BASE.to_string(),
            iframe_max_character: 29_000,
        }
    }
}

impl Resources {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let d = Resources::default();
        Resources {
            max_log_character_length: usize_or(
                map.get("max_log_character_length"),
                d.max_log_character_length,
            ),
            character_default_name: string_or(
                map.get("character_default_name"),
                d.character_default_name,
            ),
            web_style_base: string_or(map.get("web_style_base"), d.web_style_base),
            iframe_max_character: usize_or(map.get("iframe_max_character"), d.iframe_max_character),
        }
    }
}

/* ============================ Lenient decoding =========================== */

fn bool_or(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}

fn usize_or(value: Option<&Value>, default: usize) -> usize {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.unwrap_or(default)
}

fn string_or(value: Option<&Value>, default: String) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        _ => default,
    }
}
