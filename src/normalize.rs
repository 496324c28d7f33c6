use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// The one numeric-token grammar shared by extraction, reduction and
/// verification: optional sign and currency symbol, grouped digits, optional
/// decimal part, optional percent, parenthesized form for negatives.
pub static NUMERIC_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+\-]?[$€£]?\(?\d+(?:,\d{3})*(?:\.\d+)?\)?%?").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalize a text token without semantic change: decode HTML entities,
/// collapse whitespace, normalize Unicode (NFKC).
pub fn clean_text(input: &str) -> String {
    let decoded = decode_html_entities(input);
    let collapsed = WHITESPACE_RE.replace_all(&decoded, " ");
    collapsed.trim().nfkc().collect()
}

pub fn numeric_tokens(text: &str) -> Vec<String> {
    NUMERIC_TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Numeric tokens as a multiset. Multiset equality between a raw value and
/// its reduced form is the central preservation invariant.
pub fn token_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in numeric_tokens(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

pub fn tokens_match(a: &str, b: &str) -> bool {
    token_counts(a) == token_counts(b)
}

/// Non-numeric words, lowercased, for the bounded-loss check.
pub fn word_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| !is_numeric(w))
        .map(|w| w.to_lowercase())
        .collect()
}

pub fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.parse::<f64>().is_ok() {
        return true;
    }
    NUMERIC_TOKEN_RE
        .find(trimmed)
        .map(|m| m.start() == 0 && m.end() == trimmed.len())
        .unwrap_or(false)
}

/// Format a fact value for display based on its unit.
pub fn format_value(value: &str, unit: Option<&str>) -> String {
    let raw = value.trim();
    let num: f64 = match raw.parse() {
        Ok(n) => n,
        // Not numeric, return as-is
        Err(_) => return raw.to_string(),
    };

    let formatted = format!("{:.2}", num);
    let (int_part, dec_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let grouped = group_thousands(int_part);
    let display = if num.fract() == 0.0 {
        grouped.clone()
    } else {
        format!("{}.{}", grouped, dec_part)
    };

    match unit {
        Some(u) if u.contains("USD") => format!("${}", display),
        Some(u) if u.to_lowercase().contains("share") => format!("{} shares", grouped),
        Some(u) => format!("{} {}", display, u),
        None => display,
    }
}

fn group_thousands(int_part: &str) -> String {
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut result = String::new();
    let chars: Vec<_> = digits.chars().collect();
    for (i, c) in chars.iter().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, *c);
    }

    format!("{}{}", sign, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_tokens() {
        let tokens = numeric_tokens("Revenue of $123,456.78 rose +13.0% from (1,234)");
        assert_eq!(tokens, vec!["$123,456.78", "+13.0%", "(1,234)"]);
    }

    #[test]
    fn test_token_counts_are_multisets() {
        assert!(tokens_match("5 5 7", "7 5 5"));
        assert!(!tokens_match("5 5 7", "5 7"));
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("1234.56"));
        assert!(is_numeric("$1,234"));
        assert!(is_numeric("(45.2)"));
        assert!(is_numeric("13.0%"));
        assert!(!is_numeric("revenue"));
        assert!(!is_numeric(""));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("a &amp; b"), "a & b");
        assert_eq!(clean_text("  spaced \n\t out  "), "spaced out");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value("1234.56", Some("iso4217:USD")), "$1,234.56");
        assert_eq!(format_value("1000000", Some("shares")), "1,000,000 shares");
        assert_eq!(format_value("1234", None), "1,234");
        assert_eq!(format_value("-1234567", None), "-1,234,567");
        assert_eq!(format_value("text", None), "text");
    }
}
