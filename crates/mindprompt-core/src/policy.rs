//! Failure Policy Table
//!
//! What each user-facing operation does when a collaborator fails. Credit
//! accounting denies on error, prompt synthesis degrades to a template.

use serde::Serialize;

/// Behaviour of an operation when its backing call fails
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Answer with the most restrictive value (no credits, not granted)
    FailClosed,
    /// Answer with a degraded but usable value
    FailOpen,
}

/// Operations covered by the table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CheckCredits,
    ConsumeCredit,
    GeneratePrompt,
}

impl Operation {
    pub const fn failure_policy(self) -> FailurePolicy {
        match self {
            Self::CheckCredits | Self::ConsumeCredit => FailurePolicy::FailClosed,
            Self::GeneratePrompt => FailurePolicy::FailOpen,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckCredits => "check_credits",
            Self::ConsumeCredit => "consume_credit",
            Self::GeneratePrompt => "generate_prompt",
        }
    }

    /// Resolve a failed call into the value the policy prescribes.
    ///
    /// `fallback` must produce the restrictive value for fail-closed
    /// operations and the degraded value for fail-open ones. The error is
    /// logged; it never reaches the caller.
    pub fn recover<T, E, F>(self, result: Result<T, E>, fallback: F) -> T
    where
        E: std::fmt::Display,
        F: FnOnce() -> T,
    {
        match result {
            Ok(value) => value,
            Err(err) => {
                match self.failure_policy() {
                    FailurePolicy::FailClosed => tracing::error!(
                        operation = self.as_str(),
                        error = %err,
                        "Operation failed, denying"
                    ),
                    FailurePolicy::FailOpen => tracing::warn!(
                        operation = self.as_str(),
                        error = %err,
                        "Operation failed, using fallback"
                    ),
                }
                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        assert_eq!(
            Operation::CheckCredits.failure_policy(),
            FailurePolicy::FailClosed
        );
        assert_eq!(
            Operation::ConsumeCredit.failure_policy(),
            FailurePolicy::FailClosed
        );
        assert_eq!(
            Operation::GeneratePrompt.failure_policy(),
            FailurePolicy::FailOpen
        );
    }

    #[test]
    fn test_recover_passes_success_through() {
        let granted = Operation::ConsumeCredit.recover(Ok::<_, String>(true), || false);
        assert!(granted);

        let granted = Operation::ConsumeCredit.recover(Err("store down".to_string()), || false);
        assert!(!granted);
    }
}
