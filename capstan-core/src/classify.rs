use crate::outcome::{ApplyOutput, Outcome};
use serde::{Deserialize, Serialize};

/// Maps a captured apply result to an [`Outcome`].
pub trait Classify {
    fn classify(&self, output: &ApplyOutput) -> Outcome;
}

impl<F> Classify for F
where
    F: Fn(&ApplyOutput) -> Outcome,
{
    fn classify(&self, output: &ApplyOutput) -> Outcome {
        self(output)
    }
}

pub const CAPACITY_PATTERNS: [&str; 3] = [
    "Error: 500-InternalError",
    "capacity",
    "Out of host capacity",
];

pub const RATE_LIMIT_PATTERNS: [&str; 2] = ["429", "Too Many Requests"];

/// One row of the pattern table: any pattern hit yields `outcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub outcome: Outcome,
    pub patterns: Vec<String>,
}

impl PatternRule {
    pub fn new<I, S>(outcome: Outcome, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcome,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| !p.is_empty() && text.contains(p.as_str()))
    }
}

/// Ordered, case-sensitive substring classifier.
///
/// Exit code `0` is always [`Outcome::Success`]. Otherwise rules are tried in
/// order against stdout+stderr and the first hit wins; no hit is
/// [`Outcome::Fatal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternClassifier {
    rules: Vec<PatternRule>,
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new(vec![
            PatternRule::new(Outcome::RetryableCapacity, CAPACITY_PATTERNS),
            PatternRule::new(Outcome::RetryableRateLimit, RATE_LIMIT_PATTERNS),
        ])
    }
}

impl PatternClassifier {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Appends a rule with the lowest priority.
    #[must_use]
    pub fn with_rule(mut self, rule: PatternRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }
}

impl Classify for PatternClassifier {
    fn classify(&self, output: &ApplyOutput) -> Outcome {
        if output.is_success() {
            return Outcome::Success;
        }

        let text = output.combined();
        self.rules
            .iter()
            .find(|rule| rule.matches(&text))
            .map_or(Outcome::Fatal, |rule| rule.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stdout: &str, stderr: &str) -> ApplyOutput {
        ApplyOutput::new(1, stdout, stderr)
    }

    #[test]
    fn zero_exit_is_success_regardless_of_text() {
        let classifier = PatternClassifier::default();
        for text in ["", "Out of host capacity", "429 Too Many Requests", "panic"] {
            let out = ApplyOutput::new(0, text, text);
            assert_eq!(classifier.classify(&out), Outcome::Success, "text={text:?}");
        }
    }

    #[test]
    fn capacity_markers_are_retryable_capacity() {
        let classifier = PatternClassifier::default();
        for text in [
            "Error: 500-InternalError, Out of host capacity.",
            "insufficient capacity in AD-1",
            "Out of host capacity",
        ] {
            assert_eq!(
                classifier.classify(&failed(text, "")),
                Outcome::RetryableCapacity,
                "text={text:?}"
            );
        }
    }

    #[test]
    fn markers_in_stderr_are_honored() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify(&failed("", "Error: 429 Too Many Requests")),
            Outcome::RetryableRateLimit
        );
        assert_eq!(
            classifier.classify(&failed("", "Out of host capacity")),
            Outcome::RetryableCapacity
        );
    }

    #[test]
    fn capacity_wins_over_rate_limit() {
        let classifier = PatternClassifier::default();
        let out = failed("429 Too Many Requests", "Out of host capacity");
        assert_eq!(classifier.classify(&out), Outcome::RetryableCapacity);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify(&failed("OUT OF HOST CAPACITY", "")),
            Outcome::Fatal
        );
        assert_eq!(
            classifier.classify(&failed("too many requests", "")),
            Outcome::Fatal
        );
    }

    #[test]
    fn unknown_failure_is_fatal() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify(&failed("Error: Invalid provider configuration", "")),
            Outcome::Fatal
        );
    }

    #[test]
    fn appended_rule_extends_table() {
        let classifier = PatternClassifier::default().with_rule(PatternRule::new(
            Outcome::RetryableCapacity,
            ["LimitExceeded"],
        ));
        assert_eq!(
            classifier.classify(&failed("LimitExceeded: core quota", "")),
            Outcome::RetryableCapacity
        );
    }

    #[test]
    fn empty_patterns_never_match() {
        let classifier =
            PatternClassifier::new(vec![PatternRule::new(Outcome::RetryableCapacity, [""])]);
        assert_eq!(classifier.classify(&failed("anything", "")), Outcome::Fatal);
    }

    #[test]
    fn closures_classify() {
        let always_rate_limited = |_: &ApplyOutput| Outcome::RetryableRateLimit;
        assert_eq!(
            always_rate_limited.classify(&failed("", "")),
            Outcome::RetryableRateLimit
        );
    }
}
