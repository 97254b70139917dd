// src/rules.rs
//
// Per-character styling rules.
//
// - A RuleBook is the ordered rule list handed to a conversion together with its resolved
//   default rule.
// - The default is always present: when the stored records carry no rule named after the
//   default sentinel, one is synthesized from the per-field fallbacks.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConvertError;

/// Six hex digits, no leading '#'.
static COLOR_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{6}$").expect("hardcoded color code regex"));

/// True if `color` is a bare 6-digit hex RGB code.
pub fn is_valid_color_code(color: &str) -> bool {
    COLOR_CODE_RE.is_match(color)
}

/// Styling settings for one character, keyed by display name.
///
/// Field names on disk follow the settings file layout (`enable_paint`,
/// `class_name`, `color_code`, `delete_name`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CharacterRule {
    /// Disabled rules are ignored by lookup; the speaker is then treated as unknown.
    #[serde(rename = "enable_paint")]
    pub enabled: bool,
    pub character: String,
    #[serde(rename = "class_name")]
    pub style_class: String,
    #[serde(rename = "color_code")]
    pub color: String,
    pub group: String,
    #[serde(rename = "delete_name")]
    pub suppress_name: bool,
}

impl Default for CharacterRule {
    fn default() -> Self {
        CharacterRule {
            enabled: true,
            character: String::new(),
            style_class: "unset".to_string(),
            color: "000000".to_string(),
            group: "None".to_string(),
            suppress_name: false,
        }
    }
}

impl CharacterRule {
    pub fn new(character: impl Into<String>, color: impl Into<String>) -> Self {
        CharacterRule {
            character: character.into(),
            color: color.into(),
            ..CharacterRule::default()
        }
    }

    pub fn with_class(mut self, style_class: impl Into<String>) -> Self {
        self.style_class = style_class.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn suppressing_name(mut self) -> Self {
        self.suppress_name = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Ordered character rules plus the resolved default rule.
#[derive(Debug, Clone)]
pub struct RuleBook {
    default: CharacterRule,
    rules: Vec<CharacterRule>,
}

impl RuleBook {
    /// Build from stored records. The first record named `default_name` becomes
    /// the default rule; later records with that name are kept in the list but
    /// never honored as the default.
    pub fn new(rules: Vec<CharacterRule>, default_name: &str) -> Self {
        let stored = rules.iter().find(|r| r.character == default_name).cloned();
        match stored {
            Some(default) => RuleBook { default, rules },
            None => {
                let default = CharacterRule {
                    character: default_name.to_string(),
                    ..CharacterRule::default()
                };
                tracing::debug!(default_name, "No default rule stored, using fallback values");
                let mut all = Vec::with_capacity(rules.len() + 1);
                all.push(default.clone());
                all.extend(rules);
                RuleBook {
                    default,
                    rules: all,
                }
            }
        }
    }

    pub fn default_rule(&self) -> &CharacterRule {
        &self.default
    }

    pub fn rules(&self) -> &[CharacterRule] {
        &self.rules
    }

    /// First enabled rule for `speaker`.
    pub fn lookup(&self, speaker: &str) -> Option<&CharacterRule> {
        self.rules
            .iter()
            .find(|r| r.enabled && r.character == speaker)
    }

    /// First rule declaring `style_class`, enabled or not.
    pub fn by_class(&self, style_class: &str) -> Option<&CharacterRule> {
        self.rules.iter().find(|r| r.style_class == style_class)
    }

    /// Check every rule color before a conversion is accepted.
    pub fn validate_colors(&self) -> Result<(), ConvertError> {
        match self.rules.iter().find(|r| !is_valid_color_code(&r.color)) {
            Some(bad) => Err(ConvertError::InvalidColorCode {
                character: bad.character.clone(),
                color: bad.color.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_codes() {
        assert!(is_valid_color_code("ff00AA"));
        assert!(is_valid_color_code("000000"));
        assert!(!is_valid_color_code("#ff00aa"));
        assert!(!is_valid_color_code("fff"));
        assert!(!is_valid_color_code("ff00aa0"));
        assert!(!is_valid_color_code("gg0000"));
        assert!(!is_valid_color_code(""));
    }

    #[test]
    fn default_is_synthesized_first() {
        let book = RuleBook::new(vec![CharacterRule::new("Alice", "ff0000")], "Default");
        assert_eq!(book.default_rule().character, "Default");
        assert_eq!(book.default_rule().style_class, "unset");
        assert_eq!(book.default_rule().color, "000000");
        assert_eq!(book.default_rule().group, "None");
        assert_eq!(book.rules()[0].character, "Default");
        assert_eq!(book.rules().len(), 2);
    }

    #[test]
    fn first_default_wins() {
        let book = RuleBook::new(
            vec![
                CharacterRule::new("Default", "111111"),
                CharacterRule::new("Default", "222222"),
            ],
            "Default",
        );
        assert_eq!(book.default_rule().color, "111111");
        assert_eq!(book.rules().len(), 2);
    }

    #[test]
    fn lookup_skips_disabled() {
        let book = RuleBook::new(
            vec![
                CharacterRule::new("Bob", "111111").disabled(),
                CharacterRule::new("Bob", "222222"),
            ],
            "Default",
        );
        assert_eq!(book.lookup("Bob").map(|r| r.color.as_str()), Some("222222"));
        assert!(book.lookup("Carol").is_none());
    }

    #[test]
    fn invalid_color_reports_character() {
        let book = RuleBook::new(vec![CharacterRule::new("Alice", "red")], "Default");
        let err = book.validate_colors().unwrap_err();
        assert!(matches!(
            err,
            ConvertError::InvalidColorCode { ref character, ref color }
                if character == "Alice" && color == "red"
        ));
    }

    #[test]
    fn deserializes_settings_layout() {
        let json = r#"{"enable_paint": false, "character": "Alice", "class_name": "alice",
                       "color_code": "ff0000", "group": "PC", "delete_name": true}"#;
        let rule: CharacterRule = serde_json::from_str(json).unwrap();
        assert!(!rule.enabled);
        assert_eq!(rule.style_class, "alice");
        assert_eq!(rule.group, "PC");
        assert!(rule.suppress_name);

        let partial: CharacterRule = serde_json::from_str(r#"{"character": "Bob"}"#).unwrap();
        assert!(partial.enabled);
        assert_eq!(partial.color, "000000");
        assert_eq!(partial.style_class, "unset");
    }
}
