use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::HashMap;

use crate::normalize;

pub const DEFAULT_TEXT_LOSS_TOLERANCE: f64 = 0.01;

/// Bounds acceptable non-numeric token loss to formatting noise. The
/// numeric-token multiset check is what guards data; this only caps
/// incidental whitespace and word churn.
#[derive(Clone, Copy, Debug)]
pub struct ReducePolicy {
    pub text_loss_tolerance: f64,
}

impl Default for ReducePolicy {
    fn default() -> Self {
        Self {
            text_loss_tolerance: DEFAULT_TEXT_LOSS_TOLERANCE,
        }
    }
}

static TABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<table[\s>]").unwrap());
static ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<tr[\s>]").unwrap());
static CELL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<t[dh][\s>]").unwrap());
static ELEMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([A-Za-z][^\s>/]*)([^>]*)>").unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][-A-Za-z0-9_:.]*)(\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+))?"#).unwrap()
});

// Presentation-only attributes. Structural attributes (colspan, rowspan,
// alignment, width) are kept because row/column relationships carry meaning.
const PRESENTATIONAL_ATTRS: &[&str] = &[
    "style", "class", "color", "bgcolor", "background", "font", "face",
];

/// Strip presentation markup from a value, guaranteed not to alter or drop
/// any numeric token. When no candidate can be proven safe, the original is
/// returned untouched.
pub fn reduce(markup: &str) -> String {
    reduce_with_policy(markup, &ReducePolicy::default())
}

pub fn reduce_with_policy(markup: &str, policy: &ReducePolicy) -> String {
    // No markup delimiters, nothing to do
    if !markup.contains('<') {
        return markup.to_string();
    }
    match verified_reduction(markup, policy) {
        Some(reduced) => reduced,
        None => markup.to_string(),
    }
}

fn verified_reduction(markup: &str, policy: &ReducePolicy) -> Option<String> {
    let rendered = render_text(markup);
    let numbers_before = normalize::token_counts(&rendered);
    let words_before = word_counts(&rendered);

    let stripped = strip_presentational(markup);
    let candidates = if TABLE_RE.is_match(markup) {
        // Tables keep their structure: only the attribute-stripped candidate
        // qualifies, and row/cell cardinality must survive
        if row_cell_shape(markup) != row_cell_shape(&stripped) {
            return None;
        }
        vec![stripped]
    } else {
        vec![rendered.clone(), stripped]
    };

    let mut best: Option<String> = None;
    for candidate in candidates {
        if candidate.len() >= markup.len() {
            continue;
        }
        let text = render_text(&candidate);
        if normalize::token_counts(&text) != numbers_before {
            log::debug!("reduction candidate rejected: numeric token mismatch");
            continue;
        }
        if word_loss(&words_before, &word_counts(&text)) > policy.text_loss_tolerance {
            log::debug!("reduction candidate rejected: text loss over tolerance");
            continue;
        }
        if best.as_ref().map_or(true, |b| candidate.len() < b.len()) {
            best = Some(candidate);
        }
    }

    best
}

/// The text a reader would see: tags dropped, entities decoded, whitespace
/// collapsed.
fn render_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let joined = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    normalize::clean_text(&joined)
}

fn strip_presentational(markup: &str) -> String {
    ELEMENT_RE
        .replace_all(markup, |caps: &regex::Captures| {
            let name = &caps[1];
            let blob = caps[2].trim_end();
            let (blob, self_close) = match blob.strip_suffix('/') {
                Some(rest) => (rest, "/"),
                None => (blob, ""),
            };

            let mut kept = String::new();
            for attr in ATTR_RE.captures_iter(blob) {
                let key = attr[1].rsplit(':').next().unwrap_or(&attr[1]);
                if PRESENTATIONAL_ATTRS.contains(&key.to_ascii_lowercase().as_str()) {
                    continue;
                }
                kept.push(' ');
                kept.push_str(&attr[0]);
            }

            format!("<{}{}{}>", name, kept, self_close)
        })
        .into_owned()
}

fn row_cell_shape(markup: &str) -> (usize, usize) {
    (
        ROW_RE.find_iter(markup).count(),
        CELL_RE.find_iter(markup).count(),
    )
}

fn word_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in normalize::word_tokens(text) {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}

/// Fraction of non-numeric tokens lost between before and after.
fn word_loss(before: &HashMap<String, usize>, after: &HashMap<String, usize>) -> f64 {
    let total: usize = before.values().sum();
    if total == 0 {
        return 0.0;
    }
    let preserved: usize = before
        .iter()
        .map(|(word, count)| (*count).min(after.get(word).copied().unwrap_or(0)))
        .sum();
    (total - preserved) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through_unchanged() {
        assert_eq!(reduce("$123,456.78"), "$123,456.78");
        assert_eq!(reduce("no numbers here"), "no numbers here");
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let once = reduce(r#"<span style="color:red;">$123,456.78</span>"#);
        assert_eq!(reduce(&once), once);
    }

    #[test]
    fn test_styled_span_keeps_value_loses_style() {
        let reduced = reduce(r#"<span style="color:red;">$123,456.78</span>"#);
        assert!(reduced.contains("$123,456.78"));
        assert!(!reduced.contains("style"));
    }

    #[test]
    fn test_numeric_preservation_over_token_shapes() {
        for input in [
            r#"<div><span class="neg">(1,234)</span> and <b>45.2%</b></div>"#,
            r#"<td style="x">$95,281</td><td>+13.0%</td>"#,
            r#"<p>net of &#36;1,000.50 fees</p>"#,
        ] {
            let reduced = reduce(input);
            assert!(
                normalize::tokens_match(&render_text(input), &render_text(&reduced)),
                "token set changed for {}",
                input
            );
        }
    }

    #[test]
    fn test_table_keeps_rows_cells_and_literals() {
        let cell = |v: &str| format!(r#"<td style="font-size:10px;" align="right">{}</td>"#, v);
        let values = [
            "$95,281", "+13.0%", "$84,310", "(2.1%)", "1,204", "88", "$17,906", "21.4%", "$14,752",
            "3.3%", "902", "77", "label", "label", "label", "label", "$1,250.75", "9.9%", "450",
            "12", "$3,001", "(450)", "0.5%", "7",
        ];
        let mut rows = String::new();
        for chunk in values.chunks(4) {
            rows.push_str("<tr>");
            for v in chunk {
                rows.push_str(&cell(v));
            }
            rows.push_str("</tr>");
        }
        let table = format!(r#"<table style="border:1px;" class="data">{}</table>"#, rows);

        let reduced = reduce(&table);
        assert!(reduced.len() < table.len());
        assert_eq!(row_cell_shape(&reduced), (6, 24));
        for v in values {
            assert!(reduced.contains(v), "lost literal {}", v);
        }
        assert!(!reduced.contains("style"));
        // Structural attributes survive
        assert!(reduced.contains("align=\"right\""));
    }

    #[test]
    fn test_rejects_when_text_loss_over_tolerance() {
        // The plain-text candidate drops nothing here, but a zero-tolerance
        // policy still accepts it; a candidate that loses words must not win
        let policy = ReducePolicy {
            text_loss_tolerance: 0.0,
        };
        let markup = r#"<span style="x">total revenue $5,000</span>"#;
        let reduced = reduce_with_policy(markup, &policy);
        assert!(reduced.contains("total revenue"));
        assert!(reduced.contains("$5,000"));
    }

    #[test]
    fn test_broken_markup_falls_back_to_original() {
        let markup = "<table><tr><td>$1,2";
        // Nothing to strip, so no candidate is smaller and the original
        // comes back byte-identical
        assert_eq!(reduce(markup), markup);
    }
}
