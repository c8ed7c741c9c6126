//! Payment-card number domain logic.
//!
//! OCR output rarely reproduces a card number verbatim: separators vary,
//! groups get split across tokens and lengths differ by issuer. The matcher
//! therefore applies several tolerant patterns and keeps anything whose digit
//! count is a plausible card length.

use super::{digits_only, PatternMatcher};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::ops::RangeInclusive;

/// Digit counts accepted as a card number.
pub const PLAUSIBLE_LENGTHS: RangeInclusive<usize> = 15..=19;

/// Number of trailing digits left visible by policy.
pub const TAIL_LEN: usize = 4;

/// A card number found in page text, normalized for block lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveMatch {
    pub raw_matched: String,
    pub digits: String,
    pub groups: Vec<String>,
    pub tail: String,
    pub label: String,
}

impl SensitiveMatch {
    /// Builds a match from its literal and digit-only forms.
    ///
    /// Returns `None` unless `digits` is 15-19 ASCII digits.
    pub fn new(raw_matched: impl Into<String>, digits: impl Into<String>) -> Option<Self> {
        let digits = digits.into();
        if !PLAUSIBLE_LENGTHS.contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let split = digits.len() - TAIL_LEN;
        let tail = digits[split..].to_string();
        let groups = if digits.len() == 16 {
            chunk(&digits, 4)
        } else {
            let head = &digits[..split];
            let mut groups = chunk(head, head.len().div_ceil(3));
            groups.push(tail.clone());
            groups
        };

        Some(Self {
            raw_matched: raw_matched.into(),
            label: format!("**** **** **** {}", tail),
            digits,
            groups,
            tail,
        })
    }

    /// Every group except the trailing one.
    pub fn leading_groups(&self) -> &[String] {
        &self.groups[..self.groups.len() - 1]
    }

    /// Every contiguous `size`-digit window of the number.
    pub fn windows(&self, size: usize) -> impl Iterator<Item = &str> {
        let digits = self.digits.as_str();
        (0..(digits.len() + 1).saturating_sub(size)).map(move |i| &digits[i..i + size])
    }
}

fn chunk(digits: &str, size: usize) -> Vec<String> {
    digits
        .as_bytes()
        .chunks(size.max(1))
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

/// Tolerant payment-card number matcher.
///
/// Recognizes:
/// - 4111 1111 1111 1111 / 4111-1111-1111-1111
/// - 4111111111111111
/// - 378282 246310 005 and other 4-6 digit triples
#[derive(Debug, Clone, Default)]
pub struct CardNumberMatcher;

impl CardNumberMatcher {
    /// Creates a new card number matcher.
    pub fn new() -> Self {
        Self
    }

    /// Four groups of four separated by a space or hyphen.
    pub fn grouped_pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"\b\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}\b").expect("Valid grouped card regex")
        });
        &PATTERN
    }

    /// Sixteen digits with no separator.
    pub fn contiguous_pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\b\d{16}\b").expect("Valid contiguous card regex"));
        &PATTERN
    }

    /// Three groups of four to six digits.
    pub fn irregular_pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"\b\d{4,6}[ -]\d{4,6}[ -]\d{4,6}\b").expect("Valid irregular card regex")
        });
        &PATTERN
    }

    fn digit_runs() -> &'static Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\d+").expect("Valid digit run regex"));
        &PATTERN
    }

    /// Re-spaces a 16-digit run as `dddd dddd dddd dddd`.
    pub fn canonical_spacing(digits: &str) -> String {
        chunk(digits, 4).join(" ")
    }

    /// Replaces every plausible card number in `text` with its masked label.
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for pattern in [
            Self::grouped_pattern(),
            Self::contiguous_pattern(),
            Self::irregular_pattern(),
            Self::digit_runs(),
        ] {
            let next = pattern
                .replace_all(&masked, |caps: &Captures<'_>| {
                    let literal = &caps[0];
                    self.normalize(literal)
                        .and_then(|digits| SensitiveMatch::new(literal, digits))
                        .map_or_else(|| literal.to_string(), |m| m.label)
                })
                .into_owned();
            masked = next;
        }
        masked
    }
}

impl PatternMatcher for CardNumberMatcher {
    fn extract_all(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let mut push = |candidate: String| {
            if !found.contains(&candidate) {
                found.push(candidate);
            }
        };

        for pattern in [
            Self::grouped_pattern(),
            Self::contiguous_pattern(),
            Self::irregular_pattern(),
        ] {
            for m in pattern.find_iter(text) {
                push(m.as_str().to_string());
            }
        }

        // Bare 16-digit runs the word-bounded patterns can miss, e.g. "No.4111..."
        for run in Self::digit_runs().find_iter(text) {
            if run.as_str().len() == 16 {
                push(Self::canonical_spacing(run.as_str()));
            }
        }

        found
    }

    fn normalize(&self, text: &str) -> Option<String> {
        let digits = digits_only(text);
        PLAUSIBLE_LENGTHS.contains(&digits.len()).then_some(digits)
    }
}
