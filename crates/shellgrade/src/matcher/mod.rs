//! Expectation matching over captured terminal output.
//!
//! Patterns are regular expressions with search semantics: they may match
//! anywhere in the unconsumed buffer. Matching runs on raw bytes so a read that
//! splits a multi-byte character never corrupts the buffer; text is decoded
//! only when a [`MatchResult`] is handed out.

use crate::filter::OutputFilter;
use crate::model::{Exactness, MAX_REGEX_PATTERN_LEN};
use crate::runner::{HarnessError, HarnessResult};
use regex::bytes::{Regex, RegexBuilder};
use std::fmt;

/// Compiled regex size limit; keeps pathological patterns from exhausting memory.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A compiled expectation.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a regular expression.
    ///
    /// # Errors
    /// `E_INVALID_PATTERN` if the pattern is too long or does not compile.
    pub fn new(source: &str) -> HarnessResult<Self> {
        if source.len() > MAX_REGEX_PATTERN_LEN {
            return Err(HarnessError::invalid_pattern(
                source,
                format!("pattern exceeds {MAX_REGEX_PATTERN_LEN} bytes"),
            ));
        }
        let regex = RegexBuilder::new(source)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|err| HarnessError::invalid_pattern(source, err))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Source text of the pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Outcome of searching a buffer for a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    /// Whether the pattern was found.
    pub matched: bool,
    /// Text preceding the match.
    pub before: String,
    /// The matched text itself.
    pub matched_text: String,
    /// Everything up to and including the match.
    pub consumed_text: String,
    consumed_len: usize,
}

impl MatchResult {
    /// A search that found nothing.
    #[must_use]
    pub fn no_match() -> Self {
        Self {
            matched: false,
            before: String::new(),
            matched_text: String::new(),
            consumed_text: String::new(),
            consumed_len: 0,
        }
    }

    /// Number of buffer bytes the match consumes.
    #[must_use]
    pub fn consumed_len(&self) -> usize {
        self.consumed_len
    }
}

/// Search `haystack` for the leftmost match of `pattern`.
#[must_use]
pub fn search(haystack: &[u8], pattern: &Pattern) -> MatchResult {
    let Some(found) = pattern.regex.find(haystack) else {
        return MatchResult::no_match();
    };
    let before = haystack.get(..found.start()).unwrap_or_default();
    let consumed = haystack.get(..found.end()).unwrap_or_default();
    MatchResult {
        matched: true,
        before: String::from_utf8_lossy(before).into_owned(),
        matched_text: String::from_utf8_lossy(found.as_bytes()).into_owned(),
        consumed_text: String::from_utf8_lossy(consumed).into_owned(),
        consumed_len: found.end(),
    }
}

/// Check the text a case left before the next prompt.
///
/// Loose cases accept anything. Strict cases accept only text that filters to
/// nothing; otherwise the filtered leftover is returned for the diagnostic.
pub fn check_exactness(
    exactness: Exactness,
    trailing: &str,
    filter: &OutputFilter,
) -> Result<(), String> {
    match exactness {
        Exactness::Loose => Ok(()),
        Exactness::Strict => {
            let leftover = filter.filter(trailing);
            if leftover.is_empty() {
                Ok(())
            } else {
                Err(leftover)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_finds_match_anywhere() {
        let pattern = Pattern::new("Seinfeld").unwrap();
        let result = search(b"Friends\r\nSeinfeld\r\n#? ", &pattern);
        assert!(result.matched);
        assert_eq!(result.before, "Friends\r\n");
        assert_eq!(result.matched_text, "Seinfeld");
        assert_eq!(result.consumed_text, "Friends\r\nSeinfeld");
        assert_eq!(result.consumed_len(), 17);
    }

    #[test]
    fn empty_pattern_matches_at_start() {
        let pattern = Pattern::new("").unwrap();
        let result = search(b"anything", &pattern);
        assert!(result.matched);
        assert_eq!(result.before, "");
        assert_eq!(result.consumed_len(), 0);
    }

    #[test]
    fn no_match_reports_unmatched() {
        let pattern = Pattern::new("absent").unwrap();
        let result = search(b"present", &pattern);
        assert_eq!(result, MatchResult::no_match());
    }

    #[test]
    fn prompt_pattern_matches_marker_and_space() {
        let pattern = Pattern::new(crate::model::DEFAULT_PROMPT_PATTERN).unwrap();
        let result = search(b"/tmp\r\n#? ", &pattern);
        assert!(result.matched);
        assert_eq!(result.before, "/tmp\r\n");
        assert_eq!(result.matched_text, "#? ");
    }

    #[test]
    fn alternation_patterns_match_either_branch() {
        let pattern = Pattern::new("Command not found|No such file").unwrap();
        assert!(search(b"foo: No such file or directory", &pattern).matched);
        assert!(search(b"foo: Command not found", &pattern).matched);
    }

    #[test]
    fn split_utf8_in_buffer_is_decoded_lossily() {
        let pattern = Pattern::new("end").unwrap();
        let result = search(b"\xe2\x9c end", &pattern);
        assert!(result.matched);
        assert!(result.before.ends_with(' '));
    }


    #[test]
    fn overlong_pattern_is_rejected() {
        let source = "a".repeat(MAX_REGEX_PATTERN_LEN + 1);
        assert!(Pattern::new(&source).is_err());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = Pattern::new("([unclosed").unwrap_err();
        assert_eq!(err.code, crate::runner::ErrorCode::InvalidPattern);
    }

    #[test]
    fn loose_mode_tolerates_extra_output() {
        let filter = OutputFilter::default();
        assert!(check_exactness(Exactness::Loose, "lots of\r\nnoise", &filter).is_ok());
    }

    #[test]
    fn strict_mode_accepts_only_control_noise() {
        let filter = OutputFilter::default();
        assert!(check_exactness(Exactness::Strict, "\r\n\x1b[0m", &filter).is_ok());
        assert!(check_exactness(Exactness::Strict, "", &filter).is_ok());
    }

    #[test]
    fn strict_mode_reports_filtered_leftover() {
        let filter = OutputFilter::default();
        let err = check_exactness(Exactness::Strict, "\r\nextra\x1b[0m\r\n", &filter).unwrap_err();
        assert_eq!(err, "extra");
    }
}
