//! LaTeX → MathML conversion of `$…$` and `$$…$$` spans.
//!
//! Spans are found in a single left-to-right pass where a display span
//! (`$$…$$`) wins over an inline one starting at the same `$`. Each span is
//! converted on its own; a span the converter rejects stays in the text
//! exactly as written, delimiters included.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

/// Whether a span was written as display (`$$`) or inline (`$`) math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathDisplay {
    Block,
    Inline,
}

/// Converts one LaTeX expression (without delimiters) to markup.
pub trait MathConverter: Send + Sync {
    fn convert(&self, latex: &str, display: MathDisplay) -> Result<String, String>;
}

/// MathML conversion backed by the `latex2mathml` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexToMathml;

impl MathConverter for LatexToMathml {
    fn convert(&self, latex: &str, display: MathDisplay) -> Result<String, String> {
        let style = match display {
            MathDisplay::Block => latex2mathml::DisplayStyle::Block,
            MathDisplay::Inline => latex2mathml::DisplayStyle::Inline,
        };
        let markup = latex2mathml::latex_to_mathml(latex, style).map_err(|e| e.to_string())?;
        // Unknown commands come back as Ok with an inline error marker.
        match markup.find(PARSE_ERROR_MARKER) {
            Some(at) => Err(markup[at..]
                .split("</mtext>")
                .next()
                .unwrap_or(PARSE_ERROR_MARKER)
                .to_string()),
            None => Ok(markup),
        }
    }
}

const PARSE_ERROR_MARKER: &str = "[PARSE ERROR";

static RE_MATH_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\$\$(.+?)\$\$|\$([^$\n]+?)\$").expect("valid math span regex")
});

/// Splits a span match into its LaTeX body and display kind.
fn span_parts<'t>(caps: &Captures<'t>) -> Option<(&'t str, MathDisplay)> {
    match (caps.get(1), caps.get(2)) {
        (Some(m), _) => Some((m.as_str().trim(), MathDisplay::Block)),
        (None, Some(m)) => Some((m.as_str().trim(), MathDisplay::Inline)),
        (None, None) => None,
    }
}

/// Converts one matched span, or `None` when it must stay as written.
fn convert_span(caps: &Captures<'_>, converter: &dyn MathConverter) -> Option<String> {
    let (latex, display) = span_parts(caps)?;
    match converter.convert(latex, display) {
        Ok(markup) => Some(markup),
        Err(e) => {
            debug!("Keeping LaTeX span {:?} as-is: {}", &caps[0], e);
            None
        }
    }
}

/// Replace every math span in `text` with its converted markup.
pub fn convert_math_spans(text: &str, converter: &dyn MathConverter) -> String {
    RE_MATH_SPAN
        .replace_all(text, |caps: &Captures<'_>| {
            convert_span(caps, converter).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

const SLOT_OPEN: char = '\u{E000}';
const SLOT_CLOSE: char = '\u{E001}';

static RE_SLOT: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}(\\d+)\u{E001}").expect("valid math slot regex"));

/// Text whose math spans were moved out of the way of a Markdown parser.
///
/// Every span is replaced by a numbered slot made of private-use
/// characters, which Markdown treats as plain text. [`restore`] puts the
/// HTML fragments back once the surrounding Markdown has been rendered.
///
/// [`restore`]: ProtectedMath::restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedMath {
    pub text: String,
    fragments: Vec<String>,
}

impl ProtectedMath {
    /// Replace each slot in `html` with its fragment.
    pub fn restore(&self, html: &str) -> String {
        RE_SLOT
            .replace_all(html, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| self.fragments.get(n))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Convert every span and park the result behind a slot.
///
/// A span the converter rejects is kept as its original source, escaped for
/// HTML, so Markdown never re-reads the LaTeX.
pub fn protect_math_spans(text: &str, converter: &dyn MathConverter) -> ProtectedMath {
    let mut fragments = Vec::new();
    let text = RE_MATH_SPAN
        .replace_all(text, |caps: &Captures<'_>| {
            let fragment = convert_span(caps, converter)
                .unwrap_or_else(|| escape_html(&caps[0]));
            let slot = format!("{SLOT_OPEN}{}{SLOT_CLOSE}", fragments.len());
            fragments.push(fragment);
            slot
        })
        .into_owned();
    ProtectedMath { text, fragments }
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
