// src/exec/policy.rs

//! Warnings-as-errors policy for task output.

use regex::Regex;

use crate::config::model::DEFAULT_WARNING_PATTERN;
use crate::errors::TaskError;

/// Fails `warnings_as_errors` tasks whose output contains a line matching
/// the configured warning pattern, even when the process exits 0.
#[derive(Debug, Clone)]
pub struct WarningPolicy {
    pattern: Regex,
}

impl WarningPolicy {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    /// A `PolicyViolation` if `line` matches the warning pattern.
    pub fn check(&self, line: &str) -> Option<TaskError> {
        self.pattern
            .is_match(line)
            .then(|| TaskError::PolicyViolation {
                pattern: self.pattern.as_str().to_string(),
                line: line.trim_end().to_string(),
            })
    }
}

impl Default for WarningPolicy {
    fn default() -> Self {
        Self::new(Regex::new(DEFAULT_WARNING_PATTERN).expect("default warning pattern is valid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn javac_warning_is_a_violation() {
        let policy = WarningPolicy::default();
        assert_eq!(policy.check("Compiling 3 source files"), None);

        match policy.check("Foo.java:12: warning: [deprecation] bar() in Baz has been deprecated") {
            Some(TaskError::PolicyViolation { line, .. }) => assert!(line.starts_with("Foo.java:12")),
            other => panic!("expected a policy violation, got {other:?}"),
        }
    }

    #[test]
    fn clean_output_passes() {
        let policy = WarningPolicy::new(Regex::new("^WARN").unwrap());
        assert_eq!(policy.check("no WARN at start"), None);
        assert!(policy.check("WARN: unchecked cast").is_some());
    }
}
