// src/parser.rs
//
// Chat-log extraction.
//
// - A qualifying paragraph is a <p> whose style attribute starts with "color:". It ends at
//   its </p>, at the next <p> start tag, or at end of input.
// - Its first three <span> descendants (document order) are tab, speaker and message.
//   Paragraphs with fewer spans are skipped.
// - Message: <br> → '\n', outer whitespace trimmed, inner blank lines kept.
// - "system" speakers carrying a "[ Name ]" token are unwrapped to Name, with the name
//   prefix suppressed.
// - Rule lookup runs for every paragraph before tab filtering. Unknown speakers are recorded
//   only for paragraphs that survive the tab filter.
// - Group/color trackers advance only on retained utterances.

use std::sync::LazyLock;

use regex::Regex;

use crate::options::ConversionOptions;
use crate::rules::RuleBook;
use crate::scan::{element_text, TokenKind, Tokenizer};

/// Speaker literal of system messages.
pub const SYSTEM_SPEAKER: &str = "system";

/// First bracketed token of a system message, inner whitespace trimmed.
static SYSTEM_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*(.*?)\s*\]").expect("hardcoded system name regex"));

/// Per-utterance rendering directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertFlags {
    /// Group changed since the previous retained utterance.
    pub leading_break: bool,
    pub suppress_name: bool,
    /// Same color as the previous retained utterance, compact mode on.
    pub compact: bool,
    pub style_class: String,
}

/// One speaker turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: String,
    /// Hex RGB without '#'. Taken from a rule, or verbatim from the source markup.
    pub color: String,
    pub text: String,
    pub flags: ConvertFlags,
}

impl Utterance {
    /// Line content before any markup: the message, prefixed with "speaker：" unless suppressed.
    pub fn line_text(&self) -> String {
        if self.flags.suppress_name {
            self.text.clone()
        } else {
            format!("{}：{}", self.speaker, self.text)
        }
    }
}

/// Parse result: retained utterances plus the side report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLog {
    pub utterances: Vec<Utterance>,
    /// Speakers without an enabled rule, first-seen order. Empty unless reporting is on.
    pub unknown_characters: Vec<String>,
    /// Style classes of retained utterances, first-seen order.
    pub used_style_classes: Vec<String>,
}

/* ============================ Source structure ========================== */

struct Paragraph<'a> {
    style: String,
    body: &'a [u8],
}

/// Every <p> carrying a style attribute, in document order.
fn styled_paragraphs(src: &[u8]) -> Vec<Paragraph<'_>> {
    let mut out = Vec::new();
    let mut open: Option<(Option<String>, usize)> = None;

    for token in Tokenizer::new(src) {
        if token.kind.is_start(b"p") {
            close_paragraph(&mut out, src, open.take(), token.start);
            open = Some((token.kind.attr(b"style"), token.end));
        } else if token.kind.is_end(b"p") {
            close_paragraph(&mut out, src, open.take(), token.start);
        }
    }
    close_paragraph(&mut out, src, open, src.len());
    out
}

fn close_paragraph<'a>(
    out: &mut Vec<Paragraph<'a>>,
    src: &'a [u8],
    open: Option<(Option<String>, usize)>,
    end: usize,
) {
    if let Some((Some(style), start)) = open {
        out.push(Paragraph {
            style,
            body: &src[start..end],
        });
    }
}

/// Bodies of all <span> descendants in start-tag order. Unclosed spans run to the end.
fn span_bodies(body: &[u8]) -> Vec<&[u8]> {
    let mut found: Vec<(usize, Option<usize>)> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for token in Tokenizer::new(body) {
        if token.kind.is_start(b"span") {
            if matches!(token.kind, TokenKind::StartTag { self_closing: true, .. }) {
                found.push((token.end, Some(token.end)));
            } else {
                stack.push(found.len());
                found.push((token.end, None));
            }
        } else if token.kind.is_end(b"span") {
            if let Some(idx) = stack.pop() {
                found[idx].1 = Some(token.start);
            }
        }
    }

    found
        .into_iter()
        .map(|(start, end)| &body[start..end.unwrap_or(body.len())])
        .collect()
}

/// Color from a `color:` style value: text after the last ':', ';' trimmed, '#' dropped.
fn style_color(style: &str) -> Option<&str> {
    if !style.starts_with("color:") {
        return None;
    }
    let value = style.rsplit(':').next().unwrap_or_default();
    Some(value.trim_matches(';').trim_start_matches('#'))
}

/// Tab label: trimmed, one layer of enclosing brackets removed.
fn tab_name(raw: &str) -> &str {
    let tab = raw.trim();
    tab.strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(tab)
}

/* ============================ System messages =========================== */

/// Effective speaker of one utterance after system-message unwrapping.
#[derive(Debug, PartialEq, Eq)]
struct Speaker {
    name: String,
    message: String,
    force_suppress: bool,
}

/// Unwrap `system` messages of the form "[ Name ] text" into speaker `Name` and
/// message "text". Anything else passes through unchanged.
fn unwrap_system(speaker: String, message: String) -> Speaker {
    if speaker != SYSTEM_SPEAKER {
        return Speaker {
            name: speaker,
            message,
            force_suppress: false,
        };
    }

    let found = SYSTEM_NAME_RE
        .captures(&message)
        .and_then(|caps| Some((caps.get(0)?.range(), caps.get(1)?.as_str().to_string())));
    match found {
        Some((token, name)) => {
            let rest = format!("{}{}", &message[..token.start], &message[token.end..]);
            Speaker {
                name,
                message: rest.trim().to_string(),
                force_suppress: true,
            }
        }
        None => Speaker {
            name: speaker,
            message,
            force_suppress: false,
        },
    }
}

/* ================================= Parse ================================= */

/// Styling picked for one utterance.
struct Resolved {
    color: String,
    group: String,
    suppress_name: bool,
    style_class: String,
    /// An enabled rule matched the speaker.
    known: bool,
}

/// Enabled rule for `speaker`, else the default rule. Unknown speakers keep the
/// color from the markup unless `use_default_setting` is on.
fn resolve(
    speaker: &str,
    html_color: &str,
    options: &ConversionOptions,
    rules: &RuleBook,
) -> Resolved {
    match rules.lookup(speaker) {
        Some(rule) => Resolved {
            color: rule.color.clone(),
            group: rule.group.clone(),
            suppress_name: rule.suppress_name,
            style_class: rule.style_class.clone(),
            known: true,
        },
        None => {
            let default = rules.default_rule();
            let color = if options.use_default_setting {
                default.color.as_str()
            } else {
                html_color
            };
            Resolved {
                color: color.to_string(),
                group: default.group.clone(),
                suppress_name: default.suppress_name,
                style_class: default.style_class.clone(),
                known: false,
            }
        }
    }
}

#[derive(Default)]
struct SkipCounts {
    no_color: usize,
    few_spans: usize,
    ignored_tab: usize,
    empty: usize,
}

/// Extract utterances from a chat-log export.
///
/// Never fails: paragraphs that do not look like chat lines are skipped.
pub fn parse(html: &str, options: &ConversionOptions, rules: &RuleBook) -> ParsedLog {
    let _span = tracing::info_span!("parse", bytes = html.len()).entered();

    let ignored_tabs = options.ignored_tabs();

    let mut log = ParsedLog::default();
    let mut skipped = SkipCounts::default();
    let mut prev_group: Option<String> = None;
    let mut prev_color: Option<String> = None;

    for paragraph in styled_paragraphs(html.as_bytes()) {
        let Some(html_color) = style_color(&paragraph.style) else {
            skipped.no_color += 1;
            continue;
        };

        let spans = span_bodies(paragraph.body);
        if spans.len() < 3 {
            skipped.few_spans += 1;
            continue;
        }

        let tab_text = element_text(spans[0], false);
        let tab = tab_name(&tab_text);
        let speaker = element_text(spans[1], false);
        let message = element_text(spans[2], true).trim().to_string();

        let Speaker {
            name: speaker,
            mut message,
            force_suppress,
        } = unwrap_system(speaker, message);

        let Resolved {
            color,
            group,
            mut suppress_name,
            style_class,
            known,
        } = resolve(&speaker, html_color, options, rules);

        if ignored_tabs.contains(&tab) {
            skipped.ignored_tab += 1;
            continue;
        }

        if !known
            && options.report_unknown_character
            && !log.unknown_characters.contains(&speaker)
        {
            log.unknown_characters.push(speaker.clone());
        }

        if options.ignore_empty_message && message.is_empty() {
            skipped.empty += 1;
            continue;
        }

        if options.convert_quotation {
            message = message.replace("。」", "」");
        }
        if options.convert_asterisk {
            message = message.replace('*', "＊");
        }
        if options.convert_wave {
            message = message.replace('~', "～");
        }

        if force_suppress {
            suppress_name = true;
        }

        if !log.used_style_classes.contains(&style_class) {
            log.used_style_classes.push(style_class.clone());
        }

        let flags = ConvertFlags {
            leading_break: prev_group.as_ref().is_some_and(|g| *g != group),
            suppress_name,
            compact: options.compact_mode && prev_color.as_ref() == Some(&color),
            style_class,
        };

        log.utterances.push(Utterance {
            speaker,
            color: color.clone(),
            text: message,
            flags,
        });

        prev_group = Some(group);
        prev_color = Some(color);
    }

    tracing::debug!(
        retained = log.utterances.len(),
        no_color = skipped.no_color,
        few_spans = skipped.few_spans,
        ignored_tab = skipped.ignored_tab,
        empty = skipped.empty,
        unknown = log.unknown_characters.len(),
        "Parsed chat log"
    );
    log
}
