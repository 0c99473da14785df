use serde::{Deserialize, Serialize};

/// How much output a case tolerates besides its expected pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exactness {
    /// The pattern must appear somewhere before the next prompt; anything else is ignored.
    Loose,
    /// After filtering, nothing but the match may appear before the next prompt.
    Strict,
}

impl Exactness {
    /// Map the table's `expect_no_extra_output` flag onto an exactness mode.
    #[must_use]
    pub fn from_flag(expect_no_extra_output: bool) -> Self {
        if expect_no_extra_output {
            Self::Strict
        } else {
            Self::Loose
        }
    }
}

/// One scripted exchange with the shell under test.
///
/// Built once from the case table before the run and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Line sent to the shell (without the line terminator).
    pub input: String,
    /// Regular expression searched for in the shell's response.
    pub expected_pattern: String,
    /// Whether the response must contain nothing besides the match.
    pub expect_no_extra_output: bool,
    /// Weight of this case in the raw score.
    pub points: u32,
}

impl TestCase {
    /// Build a case from the `(input, pattern, strict, points)` tuple used by the case table.
    #[must_use]
    pub fn new(
        input: impl Into<String>,
        expected_pattern: impl Into<String>,
        expect_no_extra_output: bool,
        points: u32,
    ) -> Self {
        Self {
            input: input.into(),
            expected_pattern: expected_pattern.into(),
            expect_no_extra_output,
            points,
        }
    }

    /// Exactness mode requested by this case.
    #[must_use]
    pub fn exactness(&self) -> Exactness {
        Exactness::from_flag(self.expect_no_extra_output)
    }
}
