// src/render.rs
//
// Output rendering.
//
// - Three modes share one line builder:
//     • Flat   : literal '\n', <span style="color:#RRGGBB;"> per color change.
//     • Web    : '\n' → "<br>\n", <span class="..."> per color change.
//     • Iframe : '\n' → "<br>", class spans, every line terminated by "<br>".
// - Compact lines carry no tag of their own; the previous span stays open.
// - Each non-compact line closes the span opened before it. Lines are kept structured
//   until assembly, so the first opening tag is never preceded by a stray "</span>"
//   and exactly one "</span>" closes the output.
// - Iframe lines are packed into fragments under a character budget. A line joins the
//   current fragment unless that would push the fragment past the budget.

use crate::options::ConversionOptions;
use crate::parser::Utterance;
use crate::rules::RuleBook;

const HTML_LINE_BREAK: &str = "<br>";
const HTML_SPAN_CLOSE: &str = "</span>";
const TEXT_NEWLINE: &str = "\n";
const WEB_SEPARATOR: &str = "<br>\n";

/// The three renderings of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedLog {
    pub flat_log: String,
    /// Empty unless web conversion is enabled.
    pub web_log: String,
    /// Empty unless web conversion is enabled.
    pub iframe_fragments: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogMode {
    Flat,
    Web,
    Iframe,
}

/* ================================= Lines ================================= */

/// One rendered utterance, not yet joined to its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    lead: &'static str,
    /// Opening tag; `None` for compact lines.
    open: Option<String>,
    body: String,
    tail: &'static str,
}

impl Line {
    /// Length in characters as rendered standalone, i.e. including the closing tag
    /// that precedes every opening tag.
    fn char_len(&self) -> usize {
        let tag = self
            .open
            .as_ref()
            .map_or(0, |open| HTML_SPAN_CLOSE.len() + open.chars().count());
        self.lead.len() + tag + self.body.chars().count() + self.tail.len()
    }
}

fn build_line(utterance: &Utterance, text: &str, mode: LogMode) -> Line {
    let flags = &utterance.flags;

    let body = match mode {
        LogMode::Flat => text.to_string(),
        LogMode::Web => text.replace(TEXT_NEWLINE, WEB_SEPARATOR),
        LogMode::Iframe => text.replace(TEXT_NEWLINE, HTML_LINE_BREAK),
    };

    let open = (!flags.compact).then(|| match mode {
        LogMode::Flat => format!(r#"<span style="color:#{};">"#, utterance.color),
        LogMode::Web | LogMode::Iframe => format!(r#"<span class="{}">"#, flags.style_class),
    });

    let lead = match (flags.leading_break, mode) {
        (false, _) => "",
        (true, LogMode::Flat) => TEXT_NEWLINE,
        (true, LogMode::Web) => WEB_SEPARATOR,
        (true, LogMode::Iframe) => HTML_LINE_BREAK,
    };

    let tail = if mode == LogMode::Iframe {
        HTML_LINE_BREAK
    } else {
        ""
    };

    Line {
        lead,
        open,
        body,
        tail,
    }
}

/// Join lines, closing each open span before the next one opens and once at the end.
fn assemble(lines: &[Line], separator: &str) -> String {
    let capacity = lines.iter().map(|l| l.body.len() + 48).sum::<usize>();
    let mut out = String::with_capacity(capacity);
    let mut opened = false;

    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        out.push_str(line.lead);
        if let Some(open) = &line.open {
            if opened {
                out.push_str(HTML_SPAN_CLOSE);
            }
            out.push_str(open);
            opened = true;
        }
        out.push_str(&line.body);
        out.push_str(line.tail);
    }
    if opened {
        out.push_str(HTML_SPAN_CLOSE);
    }
    out
}

/* ============================ Iframe fragments =========================== */

struct IframeChunker {
    budget: usize,
    current: Vec<Line>,
    total: usize,
    fragments: Vec<String>,
}

impl IframeChunker {
    fn new(budget: usize) -> Self {
        IframeChunker {
            budget,
            current: Vec::new(),
            total: 0,
            fragments: Vec::new(),
        }
    }

    fn push(&mut self, line: Line) {
        let len = line.char_len();
        if !self.current.is_empty() && self.total + len > self.budget {
            self.flush();
        }
        self.total += len;
        self.current.push(line);
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        self.fragments.push(assemble(&self.current, ""));
        tracing::trace!(
            fragment = self.fragments.len(),
            lines = self.current.len(),
            chars = self.total,
            "Closed iframe fragment"
        );
        self.current.clear();
        self.total = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.fragments
    }
}

/* ================================ Render ================================= */

/// Render parsed utterances.
///
/// `iframe_budget` is the maximum character length of one iframe fragment before
/// the stylesheet is appended.
pub fn render(
    utterances: &[Utterance],
    options: &ConversionOptions,
    iframe_budget: usize,
) -> ConvertedLog {
    let _span = tracing::info_span!("render", utterances = utterances.len()).entered();

    let web = options.convert_web_log;
    let mut flat_lines = Vec::with_capacity(utterances.len());
    let mut web_lines = Vec::with_capacity(if web { utterances.len() } else { 0 });
    let mut chunker = IframeChunker::new(iframe_budget);

    for utterance in utterances {
        let text = utterance.line_text();
        flat_lines.push(build_line(utterance, &text, LogMode::Flat));
        if web {
            web_lines.push(build_line(utterance, &text, LogMode::Web));
            chunker.push(build_line(utterance, &text, LogMode::Iframe));
        }
    }

    let log = ConvertedLog {
        flat_log: assemble(&flat_lines, TEXT_NEWLINE),
        web_log: assemble(&web_lines, WEB_SEPARATOR),
        iframe_fragments: chunker.finish(),
    };
    tracing::debug!(
        flat_bytes = log.flat_log.len(),
        web_bytes = log.web_log.len(),
        fragments = log.iframe_fragments.len(),
        "Rendered chat log"
    );
    log
}

/// Stylesheet for iframe fragments: `<style>`, the base rules, then one
/// `.class{color:#RRGGBB}` per used class that some rule declares.
pub fn stylesheet(rules: &RuleBook, used_style_classes: &[String], base: &str) -> String {
    let mut css = String::from("<style>");
    css.push_str(base);
    for class in used_style_classes {
        match rules.by_class(class) {
            Some(rule) => css.push_str(&format!(".{class}{{color:#{}}}", rule.color)),
            None => tracing::debug!(class = %class, "No rule declares style class"),
        }
    }
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ConvertFlags;
    use crate::rules::CharacterRule;

    fn utterance(speaker: &str, color: &str, class: &str, text: &str) -> Utterance {
        Utterance {
            speaker: speaker.to_string(),
            color: color.to_string(),
            text: text.to_string(),
            flags: ConvertFlags {
                leading_break: false,
                suppress_name: false,
                compact: false,
                style_class: class.to_string(),
            },
        }
    }

    fn sample() -> Vec<Utterance> {
        let a = utterance("A", "ff0000", "a", "hi");
        let mut b = utterance("B", "ff0000", "a", "yo");
        b.flags.compact = true;
        let mut c = utterance("C", "00ff00", "c", "l1\nl2");
        c.flags.leading_break = true;
        c.flags.suppress_name = true;
        vec![a, b, c]
    }

    fn web_on() -> ConversionOptions {
        ConversionOptions {
            convert_web_log: true,
            ..ConversionOptions::default()
        }
    }

    #[test]
    fn flat_log() {
        let log = render(&sample(), &ConversionOptions::default(), 29_000);
        assert_eq!(
            log.flat_log,
            "<span style=\"color:#ff0000;\">A：hi\nB：yo\n\n</span><span style=\"color:#00ff00;\">l1\nl2</span>"
        );
        assert!(log.web_log.is_empty());
        assert!(log.iframe_fragments.is_empty());
    }

    #[test]
    fn web_log() {
        let log = render(&sample(), &web_on(), 29_000);
        assert_eq!(
            log.web_log,
            "<span class=\"a\">A：hi<br>\nB：yo<br>\n<br>\n</span><span class=\"c\">l1<br>\nl2</span>"
        );
    }

    #[test]
    fn single_iframe_fragment() {
        let log = render(&sample(), &web_on(), 29_000);
        assert_eq!(
            log.iframe_fragments,
            vec!["<span class=\"a\">A：hi<br>B：yo<br><br></span><span class=\"c\">l1<br>l2<br></span>".to_string()]
        );
    }

    #[test]
    fn line_lengths_count_characters() {
        let lines: Vec<usize> = sample()
            .iter()
            .map(|u| build_line(u, &u.line_text(), LogMode::Iframe).char_len())
            .collect();
        assert_eq!(lines, vec![31, 8, 39]);
    }

    #[test]
    fn budget_boundary_is_inclusive() {
        // 31 + 8 == 39 fits exactly; the third line overflows.
        let log = render(&sample(), &web_on(), 39);
        assert_eq!(
            log.iframe_fragments,
            vec![
                "<span class=\"a\">A：hi<br>B：yo<br></span>".to_string(),
                "<br><span class=\"c\">l1<br>l2<br></span>".to_string(),
            ]
        );
        assert_eq!(log.iframe_fragments[0].chars().count(), 39);
    }

    #[test]
    fn compact_only_fragment_has_no_tags() {
        let log = render(&sample(), &web_on(), 38);
        assert_eq!(log.iframe_fragments.len(), 3);
        assert_eq!(log.iframe_fragments[1], "B：yo<br>");
    }

    #[test]
    fn oversized_first_line_stands_alone() {
        let log = render(&sample(), &web_on(), 10);
        assert_eq!(log.iframe_fragments.len(), 3);
        assert_eq!(log.iframe_fragments[0], "<span class=\"a\">A：hi<br></span>");
    }

    #[test]
    fn empty_input_renders_nothing() {
        let log = render(&[], &web_on(), 100);
        assert_eq!(log, ConvertedLog::default());
    }

    #[test]
    fn stylesheet_for_used_classes() {
        let rules = RuleBook::new(
            vec![
                CharacterRule::new("Alice", "ff0000").with_class("a"),
                CharacterRule::new("Alt", "00ff00").with_class("a"),
                CharacterRule::new("Bob", "0000ff").with_class("b"),
            ],
            "Default",
        );
        let used = vec!["b".to_string(), "a".to_string(), "ghost".to_string()];
        assert_eq!(
            stylesheet(&rules, &used, "body{}"),
            "<style>body{}.b{color:#0000ff}.a{color:#ff0000}"
        );
    }
}
