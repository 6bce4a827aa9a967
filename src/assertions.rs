//! Result-code assertions and the pass/fail tally
//!
//! Every check in the smoke test boils down to "did this step end with the
//! result code we expected". [`Tally::check`] records the verdict, prints one
//! line for it and keeps the counters the exit code is computed from.
//!
//! # Example
//!
//! ```
//! use rbac_smoke::assertions::Tally;
//!
//! let mut tally = Tally::plain();
//! assert!(tally.check("call fails without RBAC", 1, 1));
//! assert!(!tally.check("call succeeds with RBAC", 1, 0));
//! assert_eq!((tally.passed(), tally.failed()), (1, 1));
//! ```

use std::fmt;

use owo_colors::{OwoColorize, Stream};

/// Outcome of a single assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// A recorded assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub description: String,
    pub observed: i32,
    pub expected: i32,
    pub verdict: Verdict,
}

/// Pass/fail counters plus the record of every assertion made
#[derive(Debug, Default)]
pub struct Tally {
    passed: u32,
    failed: u32,
    outcomes: Vec<Outcome>,
    styled: bool,
}

impl Tally {
    /// Tally that highlights verdicts when stdout supports it
    pub fn new() -> Self {
        Self {
            styled: true,
            ..Default::default()
        }
    }

    /// Tally that never emits ANSI escapes
    pub fn plain() -> Self {
        Self::default()
    }

    /// Compare an observed result code against the expected one
    ///
    /// Increments exactly one counter, prints the result line and returns
    /// whether the assertion passed.
    pub fn check(&mut self, description: &str, observed: i32, expected: i32) -> bool {
        let verdict = if observed == expected {
            self.passed += 1;
            Verdict::Pass
        } else {
            self.failed += 1;
            Verdict::Fail
        };

        let outcome = Outcome {
            description: description.to_string(),
            observed,
            expected,
            verdict,
        };
        println!("{}", format_result(&outcome, self.styled));
        self.outcomes.push(outcome);

        verdict == Verdict::Pass
    }

    /// Record a failure of a step that has no result code of its own
    pub fn fail(&mut self, description: &str) -> bool {
        self.check(description, 1, 0)
    }

    pub fn passed(&self) -> u32 {
        self.passed
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    /// Number of assertions executed
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Final one-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} assertions, {} passed, {} failed",
            self.total(),
            self.passed,
            self.failed
        )
    }
}

/// Format the one-line report for an assertion
///
/// With `styled` set the verdict is bold whenever stdout supports colors.
pub fn format_result(outcome: &Outcome, styled: bool) -> String {
    let verdict = if styled {
        outcome
            .verdict
            .if_supports_color(Stream::Stdout, |text| text.bold())
            .to_string()
    } else {
        outcome.verdict.to_string()
    };

    match outcome.verdict {
        Verdict::Pass => format!("{verdict}: {}", outcome.description),
        Verdict::Fail => format!(
            "{verdict}: {} (got {}, expected {})",
            outcome.description, outcome.observed, outcome.expected
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pass_iff_equal() {
        for observed in -2..=3 {
            for expected in -2..=3 {
                let mut tally = Tally::plain();
                let passed = tally.check("code", observed, expected);

                assert_eq!(passed, observed == expected);
                assert_eq!(tally.total(), 1, "exactly one counter per check");
                assert_eq!(tally.passed(), u32::from(passed));
                assert_eq!(tally.failed(), u32::from(!passed));
            }
        }
    }

    #[test]
    fn test_total_matches_assertions() {
        let mut tally = Tally::plain();
        tally.check("a", 0, 0);
        tally.check("b", 1, 0);
        tally.check("c", 1, 1);
        tally.fail("d");

        assert_eq!(tally.passed(), 2);
        assert_eq!(tally.failed(), 2);
        assert_eq!(tally.total(), 4);
        assert_eq!(tally.outcomes().len(), 4);
        assert_eq!(tally.outcomes()[3].verdict, Verdict::Fail);
        assert_eq!(tally.summary(), "4 assertions, 2 passed, 2 failed");
    }

    #[test]
    fn test_check_short_circuits() {
        let mut tally = Tally::plain();
        let both = tally.check("first", 1, 0) && tally.check("second", 0, 0);

        assert!(!both);
        assert_eq!(tally.total(), 1);
    }

    #[test]
    fn test_format_result_plain() {
        let outcome = Outcome {
            description: "function call fails without RBAC".to_string(),
            observed: 1,
            expected: 1,
            verdict: Verdict::Pass,
        };
        assert_eq!(
            format_result(&outcome, false),
            "PASS: function call fails without RBAC"
        );

        let outcome = Outcome {
            verdict: Verdict::Fail,
            observed: 0,
            ..outcome
        };
        assert_eq!(
            format_result(&outcome, false),
            "FAIL: function call fails without RBAC (got 0, expected 1)"
        );
    }

    #[test]
    fn test_format_result_styled() {
        let outcome = Outcome {
            description: "x".to_string(),
            observed: 0,
            expected: 0,
            verdict: Verdict::Pass,
        };

        owo_colors::set_override(true);
        let styled = format_result(&outcome, true);
        owo_colors::unset_override();

        assert_eq!(styled, format!("{}: x", "PASS".bold()));
        assert_ne!(styled, "PASS: x");
        // plain output ignores the override entirely
        owo_colors::set_override(true);
        let plain = format_result(&outcome, false);
        owo_colors::unset_override();
        assert_eq!(plain, "PASS: x");
    }
}
