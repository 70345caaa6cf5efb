//! Post-processing: deterministic cleanup of raw model replies.
//!
//! Even when told not to, models sometimes wrap their answer in a
//! ` ```markdown ` fence, use `\r\n` line endings, or emit zero-width
//! characters. These rules fix such quirks without touching content; LaTeX
//! spans pass through byte-for-byte.
//!
//! Rules run in [`RULES`] order. Fences are stripped before line endings are
//! unified so the fence regex sees the reply as sent; blank-run squeezing
//! follows right-trimming so whitespace-only lines count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

type Rule = fn(&str) -> String;

const RULES: [(&str, Rule); 5] = [
    ("unfence", unfence),
    ("unify-newlines", unify_newlines),
    ("rstrip-lines", rstrip_lines),
    ("squeeze-blank-runs", squeeze_blank_runs),
    ("drop-invisible", drop_invisible),
];

/// Apply every cleanup rule to a raw reply, then trim the ends.
pub fn clean_response(input: &str) -> String {
    let cleaned = RULES
        .iter()
        .fold(input.to_string(), |text, (_name, rule)| rule(&text));
    cleaned.trim().to_string()
}

static RE_WHOLE_REPLY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|latex|tex|text)?\r?\n(.*?)\r?\n```\s*$")
        .expect("valid fence regex")
});

static RE_BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{4,}").expect("valid blank-run regex"));

/// Zero-width space, BOM, soft hyphen, ZWNJ, ZWJ, word joiner.
const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

/// Remove a fence that wraps the entire reply. Inner code blocks stay.
fn unfence(text: &str) -> String {
    match RE_WHOLE_REPLY_FENCE.captures(text.trim()) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    }
}

fn unify_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn rstrip_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    lines.join("\n")
}

/// At most two blank lines in a row.
fn squeeze_blank_runs(text: &str) -> String {
    RE_BLANK_RUN.replace_all(text, "\n\n\n").into_owned()
}

fn drop_invisible(text: &str) -> String {
    text.replace(INVISIBLE, "")
}
