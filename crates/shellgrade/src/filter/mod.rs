//! Output normalization for semantic comparison.
//!
//! Interactive shells decorate their output with colour codes, cursor motion
//! and bracketed-paste toggles from their line editor, and the terminal driver
//! turns every newline into `\r\n`. [`OutputFilter`] removes all of that so a
//! strict case can ask the simple question "is anything left?".
//!
//! The escape grammar is a regular expression and can be replaced with
//! [`OutputFilter::with_grammar`] when a terminal emits sequences the default
//! grammar does not cover.

use crate::model::DEFAULT_ESCAPE_GRAMMAR;
use crate::runner::{HarnessError, HarnessResult};
use regex::Regex;

/// Strips terminal control sequences and line-ending noise.
#[derive(Clone, Debug)]
pub struct OutputFilter {
    escape: Regex,
}

impl OutputFilter {
    /// Build a filter for a custom escape-sequence grammar.
    pub fn with_grammar(grammar: &str) -> HarnessResult<Self> {
        let escape =
            Regex::new(grammar).map_err(|err| HarnessError::invalid_pattern(grammar, err))?;
        Ok(Self { escape })
    }

    /// Grammar this filter strips.
    #[must_use]
    pub fn grammar(&self) -> &str {
        self.escape.as_str()
    }

    /// Remove escape sequences, carriage returns and line feeds.
    ///
    /// Removal can splice the halves of a split sequence together (for example
    /// `"\x1b\r[0m"`), so passes repeat until nothing changes. That keeps the
    /// function idempotent: `filter(filter(s)) == filter(s)`.
    #[must_use]
    pub fn filter(&self, text: &str) -> String {
        let mut current = self.single_pass(text);
        loop {
            let next = self.single_pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn single_pass(&self, text: &str) -> String {
        self.escape
            .replace_all(text, "")
            .chars()
            .filter(|ch| *ch != '\r' && *ch != '\n')
            .collect()
    }
}

impl Default for OutputFilter {
    fn default() -> Self {
        Self {
            // The built-in grammar is a compile-time constant covered by tests.
            #[allow(clippy::expect_used)]
            escape: Regex::new(DEFAULT_ESCAPE_GRAMMAR).expect("default escape grammar is valid"),
        }
    }
}
