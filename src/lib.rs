//! Chat-log conversion engine.
//!
//! Turns a browser TRPG tool's HTML log export into:
//!
//! - a flat log with one `<span style="color:#RRGGBB;">` per color change,
//! - a web log using per-character style classes,
//! - iframe fragments bounded by a character budget, each carrying its own stylesheet.
//!
//! The pipeline is [`parser::parse`] → [`render::render`]; [`convert_log`] wraps
//! both with rule validation, stylesheet attachment and the length report.
//! Nothing here touches the filesystem except [`settings`].

pub mod error;
pub mod options;
pub mod parser;
pub mod render;
pub mod rules;
pub mod settings;

mod scan;

pub use error::{ConvertError, SettingsError};
pub use options::{ConversionOptions, Resources};
pub use parser::{parse, ConvertFlags, ParsedLog, Utterance};
pub use render::{render, stylesheet, ConvertedLog};
pub use rules::{is_valid_color_code, CharacterRule, RuleBook};
pub use settings::Settings;

/// Result of one conversion, ready for display or writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub log: ConvertedLog,
    /// Empty unless unknown-character reporting is enabled.
    pub unknown_characters: Vec<String>,
    pub used_style_classes: Vec<String>,
    /// Character count of the flat log.
    pub total_length: usize,
    /// Over-length reporting is on and `total_length` exceeds the configured maximum.
    pub over_limit: bool,
}

/// Convert one HTML document.
///
/// Rule colors are validated first; an invalid color aborts before parsing.
/// When web conversion is enabled, the generated stylesheet is appended to
/// every iframe fragment.
pub fn convert_log(
    html: &str,
    options: &ConversionOptions,
    rules: &RuleBook,
    resources: &Resources,
) -> Result<Conversion, ConvertError> {
    rules.validate_colors()?;

    let parsed = parse(html, options, rules);
    let mut log = render(&parsed.utterances, options, resources.iframe_max_character);

    if options.convert_web_log {
        let css = stylesheet(rules, &parsed.used_style_classes, &resources.web_style_base);
        for fragment in &mut log.iframe_fragments {
            fragment.push_str(&css);
        }
    }

    if !parsed.unknown_characters.is_empty() {
        tracing::warn!(
            characters = ?parsed.unknown_characters,
            "No enabled character settings for some speakers"
        );
    }

    let total_length = log.flat_log.chars().count();
    let over_limit =
        options.report_over_character && total_length > resources.max_log_character_length;
    if over_limit {
        tracing::warn!(
            total_length,
            max = resources.max_log_character_length,
            "Converted log exceeds the configured length"
        );
    }

    Ok(Conversion {
        log,
        unknown_characters: parsed.unknown_characters,
        used_style_classes: parsed.used_style_classes,
        total_length,
        over_limit,
    })
}
