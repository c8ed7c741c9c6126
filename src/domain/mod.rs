//! Domain models and business logic for card-number detection.
//!
//! This module holds the entities that flow through the pipeline
//! ([`TextBlock`], [`SensitiveMatch`], [`RedactionElement`]) and the
//! pattern matcher that finds card numbers in recognized text.

pub mod block;
pub mod card;
pub mod element;

pub use block::{BlockKind, TextBlock};
pub use card::{CardNumberMatcher, SensitiveMatch};
pub use element::{RedactionElement, WordBox};

/// Trait for pattern matching strategies over recognized page text.
pub trait PatternMatcher: Send + Sync {
    /// Distinct candidate literals found in `text`, in discovery order.
    fn extract_all(&self, text: &str) -> Vec<String>;

    /// Digit-only form of a candidate, or `None` when it is implausible.
    fn normalize(&self, text: &str) -> Option<String>;

    /// Runs extraction and normalization, keeping the first candidate for
    /// each distinct digit string.
    fn find_matches(&self, text: &str) -> Vec<SensitiveMatch> {
        let mut matches: Vec<SensitiveMatch> = Vec::new();
        for literal in self.extract_all(text) {
            let Some(digits) = self.normalize(&literal) else {
                continue;
            };
            if matches.iter().any(|m| m.digits == digits) {
                continue;
            }
            if let Some(m) = SensitiveMatch::new(literal, digits) {
                matches.push(m);
            }
        }
        matches
    }
}

/// Strips every non-ASCII-digit character.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("4111-1111 1111.1111"), "4111111111111111");
        assert_eq!(digits_only("no digits"), "");
    }
}
