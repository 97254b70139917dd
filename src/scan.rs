// src/scan.rs
//
// Byte-level HTML scanning for chat-log exports.
//
// - Tokenizes into start tags, end tags, text runs and comments. No tree is built.
// - Tag ends are found quote-aware, so '>' inside attribute values never closes a tag.
// - RAW-TEXT elements (script, style, textarea, xmp) are consumed whole; their bodies are
//   surfaced as `RawText` and never contribute paragraphs or visible text.
// - '<' that cannot start markup is ordinary text.
// - Text and attribute values decode character references with HTML5 rules (scraper's
//   html5ever tokenizer). Unknown entities are kept verbatim.
// - UTF-8 safe: only ASCII bytes are ever used as split points.

use memchr::memchr;
use scraper::Html;

/* =============================== Core sets =============================== */

fn is_raw_text(name: &[u8]) -> bool {
    matches_ignore_ascii_case(name, &[b"script", b"style", b"textarea", b"xmp"])
}

/* ============================ Utility predicates ========================= */

#[inline]
fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

#[inline]
fn is_ws(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' || b == b'\x0c'
}

fn matches_ignore_ascii_case(name: &[u8], set: &[&[u8]]) -> bool {
    set.iter().any(|&s| name.eq_ignore_ascii_case(s))
}

/* =============================== Tag parsing ============================= */

#[derive(Clone, Copy, Debug)]
struct TagInfo<'a> {
    name: &'a [u8],
    is_end: bool,
    self_closing: bool,
}

/// Find the '>' for a tag starting at `i` (s[i] == '<'), being quote-aware.
fn find_tag_end(s: &[u8], mut i: usize) -> Option<usize> {
    let n = s.len();
    i += 1;
    let mut quote: u8 = 0;
    while i < n {
        let b = s[i];
        if quote != 0 {
            if b == quote {
                quote = 0;
            }
        } else if b == b'"' || b == b'\'' {
            quote = b;
        } else if b == b'>' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Extract tag name, end/self-closing flags from raw `<...>` bytes.
fn parse_tag_info(tag: &[u8]) -> TagInfo<'_> {
    let n = tag.len();
    let mut i = 1;

    let mut is_end = false;
    if i < n && tag[i] == b'/' {
        is_end = true;
        i += 1;
    }
    let start = i;
    while i < n && is_name_char(tag[i]) {
        i += 1;
    }
    let name = &tag[start..i];

    let mut j = n - 1;
    while j > 0 && is_ws(tag[j - 1]) {
        j -= 1;
    }
    let self_closing = j >= 2 && tag[j - 1] == b'/';

    TagInfo {
        name,
        is_end,
        self_closing,
    }
}

/// Look up attribute `wanted` in a raw start tag.
///
/// Returns the raw (still entity-encoded) value, `Some(b"")` for a bare attribute,
/// or `None` when the tag has no such attribute. The first occurrence wins.
fn find_attr<'a>(tag: &'a [u8], wanted: &[u8]) -> Option<&'a [u8]> {
    let len = tag.len();
    let mut i = 1usize;

    // skip the tag name
    while i < len && is_name_char(tag[i]) {
        i += 1;
    }

    while i < len && tag[i] != b'>' {
        while i < len && (is_ws(tag[i]) || tag[i] == b'/') {
            i += 1;
        }
        if i >= len || tag[i] == b'>' {
            break;
        }

        if !is_name_char(tag[i]) {
            i += 1;
            continue;
        }
        let name_start = i;
        i += 1;
        while i < len && is_name_char(tag[i]) {
            i += 1;
        }
        let name = &tag[name_start..i];
        let hit = name.eq_ignore_ascii_case(wanted);

        while i < len && is_ws(tag[i]) {
            i += 1;
        }

        if i < len && tag[i] == b'=' {
            i += 1;
            while i < len && is_ws(tag[i]) {
                i += 1;
            }
            if i >= len || tag[i] == b'>' {
                return if hit { Some(b"") } else { None };
            }

            let value = if tag[i] == b'"' || tag[i] == b'\'' {
                let q = tag[i];
                i += 1;
                let value_start = i;
                while i < len && tag[i] != q {
                    i += 1;
                }
                let value = &tag[value_start..i];
                if i < len {
                    i += 1;
                }
                value
            } else {
                let value_start = i;
                while i < len && !is_ws(tag[i]) && tag[i] != b'>' {
                    i += 1;
                }
                &tag[value_start..i]
            };
            if hit {
                return Some(value);
            }
        } else if hit {
            return Some(b"");
        }
    }
    None
}

/* ================================ Tokens ================================= */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind<'a> {
    StartTag {
        name: &'a [u8],
        raw: &'a [u8],
        self_closing: bool,
    },
    EndTag {
        name: &'a [u8],
    },
    Text(&'a [u8]),
    /// Body of a RAW-TEXT element.
    RawText(&'a [u8]),
    /// Comments, doctype and processing instructions.
    Markup,
}

/// A token together with its byte range in the scanned input.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub start: usize,
    pub end: usize,
}

impl TokenKind<'_> {
    pub(crate) fn is_start(&self, wanted: &[u8]) -> bool {
        matches!(self, TokenKind::StartTag { name, .. } if name.eq_ignore_ascii_case(wanted))
    }

    pub(crate) fn is_end(&self, wanted: &[u8]) -> bool {
        matches!(self, TokenKind::EndTag { name } if name.eq_ignore_ascii_case(wanted))
    }

    /// Decoded value of `wanted` if this is a start tag carrying that attribute.
    pub(crate) fn attr(&self, wanted: &[u8]) -> Option<String> {
        match self {
            TokenKind::StartTag { raw, .. } => find_attr(raw, wanted).map(decode_entities),
            _ => None,
        }
    }
}

pub(crate) struct Tokenizer<'a> {
    src: &'a [u8],
    pos: usize,
    // name of the RAW-TEXT element whose body comes next
    raw: Option<&'a [u8]>,
}

impl<'a> Tokenizer<'a> {
    pub(crate) fn new(src: &'a [u8]) -> Self {
        Tokenizer {
            src,
            pos: 0,
            raw: None,
        }
    }

    fn emit(&mut self, kind: TokenKind<'a>, end: usize) -> Token<'a> {
        let token = Token {
            kind,
            start: self.pos,
            end,
        };
        self.pos = end;
        token
    }

    /// Body of a RAW-TEXT element: everything up to its matching end tag (or EOF).
    fn raw_body(&mut self, name: &[u8]) -> Token<'a> {
        let src = self.src;
        let n = src.len();
        let mut k = self.pos;
        while let Some(off) = memchr(b'<', &src[k..]) {
            let lt = k + off;
            if lt + 1 < n && src[lt + 1] == b'/' {
                let name_start = lt + 2;
                let mut e = name_start;
                while e < n && is_name_char(src[e]) {
                    e += 1;
                }
                if src[name_start..e].eq_ignore_ascii_case(name) {
                    return self.emit(TokenKind::RawText(&src[self.pos..lt]), lt);
                }
            }
            k = lt + 1;
        }
        self.emit(TokenKind::RawText(&src[self.pos..]), n)
    }

    /// Text run starting at `self.pos`, where `from` is the first index that may hold markup.
    fn text_until_markup(&mut self, from: usize) -> Token<'a> {
        let src = self.src;
        let end = memchr(b'<', &src[from..]).map_or(src.len(), |off| from + off);
        self.emit(TokenKind::Text(&src[self.pos..end]), end)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let src = self.src;
        let n = src.len();
        let i = self.pos;
        if i >= n {
            return None;
        }

        if let Some(name) = self.raw.take() {
            return Some(self.raw_body(name));
        }

        if src[i] != b'<' {
            return Some(self.text_until_markup(i));
        }

        // Comments
        if src[i..].starts_with(b"<!--") {
            let end = find_comment_end(src, i + 4).unwrap_or(n);
            return Some(self.emit(TokenKind::Markup, end));
        }

        let next = src.get(i + 1).copied().unwrap_or(0);
        let is_tag = next.is_ascii_alphabetic()
            || (next == b'/' && src.get(i + 2).is_some_and(u8::is_ascii_alphabetic));
        let is_decl = next == b'!' || next == b'?';
        if !is_tag && !is_decl {
            return Some(self.text_until_markup(i + 1));
        }

        let Some(j) = find_tag_end(src, i) else {
            // Unterminated markup: the rest of the input is text.
            return Some(self.emit(TokenKind::Text(&src[i..]), n));
        };
        if is_decl {
            return Some(self.emit(TokenKind::Markup, j + 1));
        }

        let raw = &src[i..=j];
        let info = parse_tag_info(raw);
        let kind = if info.is_end {
            TokenKind::EndTag { name: info.name }
        } else {
            if is_raw_text(info.name) && !info.self_closing {
                self.raw = Some(info.name);
            }
            TokenKind::StartTag {
                name: info.name,
                raw,
                self_closing: info.self_closing,
            }
        };
        Some(self.emit(kind, j + 1))
    }
}

/// Index just past the "-->" closing a comment whose body starts at `from`.
fn find_comment_end(s: &[u8], from: usize) -> Option<usize> {
    let mut k = from;
    while let Some(off) = memchr(b'-', &s[k..]) {
        let dash = k + off;
        if s[dash..].starts_with(b"-->") {
            return Some(dash + 3);
        }
        k = dash + 1;
    }
    None
}

/* ================================= Text ================================== */

/// Visible text of an element body.
///
/// With `br_newlines`, every `<br>` becomes a literal '\n'; otherwise line-break
/// elements contribute nothing. Tags are dropped, comments and RAW-TEXT bodies are
/// skipped, entities are decoded. No whitespace is trimmed.
pub(crate) fn element_text(body: &[u8], br_newlines: bool) -> String {
    let mut out = String::with_capacity(body.len());
    for token in Tokenizer::new(body) {
        match token.kind {
            TokenKind::Text(text) => out.push_str(&decode_entities(text)),
            TokenKind::StartTag { name, .. } if br_newlines && name.eq_ignore_ascii_case(b"br") => {
                out.push('\n');
            }
            _ => {}
        }
    }
    out
}

/// Decode character references the way an HTML5 parser does for text content:
/// the full named-entity table, legacy names without ';', and numeric references
/// with their replacement rules (`&#0;` → U+FFFD). Unknown entities stay verbatim,
/// invalid UTF-8 is replaced.
pub(crate) fn decode_entities(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if memchr(b'&', text.as_bytes()).is_none() {
        return text.into_owned();
    }

    // '<' is already known to be text here; keep the parser from reading it as a tag.
    let escaped = text.replace('<', "&lt;");
    let fragment = Html::parse_fragment(&escaped);
    fragment.root_element().text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind<'_>> {
        Tokenizer::new(src.as_bytes()).map(|t| t.kind).collect()
    }

    #[test]
    fn quoted_gt_does_not_close_tag() {
        let src = r#"<p title="a>b" style="color:#fff;">x</p>"#;
        let tokens = kinds(src);
        assert!(tokens[0].is_start(b"p"));
        assert_eq!(tokens[0].attr(b"style").as_deref(), Some("color:#fff;"));
        assert_eq!(tokens[0].attr(b"title").as_deref(), Some("a>b"));
        assert_eq!(tokens[1], TokenKind::Text(b"x"));
        assert!(tokens[2].is_end(b"p"));
    }

    #[test]
    fn attribute_lookup_variants() {
        let tag = b"<p data-x STYLE = 'color:red' hidden>";
        assert_eq!(find_attr(tag, b"style"), Some(&b"color:red"[..]));
        assert_eq!(find_attr(tag, b"hidden"), Some(&b""[..]));
        assert_eq!(find_attr(tag, b"data-x"), Some(&b""[..]));
        assert_eq!(find_attr(tag, b"class"), None);
        assert_eq!(find_attr(b"<p class=a>", b"class"), Some(&b"a"[..]));
    }

    #[test]
    fn script_body_is_raw() {
        let tokens = kinds("<script>if (a<b) { x = '<p>'; }</script><p>");
        assert!(tokens[0].is_start(b"script"));
        assert_eq!(tokens[1], TokenKind::RawText(b"if (a<b) { x = '<p>'; }"));
        assert!(tokens[2].is_end(b"script"));
        assert!(tokens[3].is_start(b"p"));
    }

    #[test]
    fn stray_lt_is_text() {
        let tokens = kinds("a < b <3");
        let text: Vec<u8> = tokens
            .iter()
            .flat_map(|t| match t {
                TokenKind::Text(s) => s.to_vec(),
                _ => Vec::new(),
            })
            .collect();
        assert_eq!(text, b"a < b <3");
    }

    #[test]
    fn comments_are_skipped_in_text() {
        assert_eq!(element_text(b"a<!-- <br> -->b", true), "ab");
    }

    #[test]
    fn br_handling() {
        assert_eq!(element_text(b"one<br>two<br/>three", true), "one\ntwo\nthree");
        assert_eq!(element_text(b"one<br>two", false), "onetwo");
        assert_eq!(element_text(b"<b>bold</b> <i>it</i>", false), "bold it");
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities(b"a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities(b"&quot;q&quot; &#39;s&#39;"), "\"q\" 's'");
        assert_eq!(decode_entities(b"&#x3042;&#12354;"), "ああ");
        assert_eq!(decode_entities(b"&unknown; & a<b"), "&unknown; & a<b");
        assert_eq!(decode_entities("日本語&nbsp;".as_bytes()), "日本語\u{a0}");
    }

    #[test]
    fn html5_references() {
        assert_eq!(
            decode_entities(b"a &hearts; &copy; b &#0; c &amp d"),
            "a \u{2665} \u{a9} b \u{FFFD} c & d"
        );
        assert_eq!(decode_entities(b"&copy2024 &lt"), "\u{a9}2024 <");
        assert_eq!(decode_entities(b"&#x110000;&#128512;"), "\u{FFFD}\u{1F600}");
        assert_eq!(
            element_text(b"<b>&hearts;</b>&nbsp;x<br>&#0;", true),
            "\u{2665}\u{a0}x\n\u{FFFD}"
        );
    }

    #[test]
    fn unterminated_tag_is_text() {
        let tokens = kinds("ok <span class=\"x");
        assert_eq!(tokens.last(), Some(&TokenKind::Text(b"<span class=\"x")));
    }
}
