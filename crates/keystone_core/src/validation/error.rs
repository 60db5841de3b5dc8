//! Rule declaration errors.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raised when a declarative rule specification cannot be compiled.
///
/// These are declaration bugs, never validation outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCompileError {
    EmptyRuleName {
        field: String,
    },
    MalformedToken {
        field: String,
        token: String,
    },
    UnknownRule {
        field: String,
        rule: String,
    },
    InvalidArguments {
        field: String,
        rule: String,
        reason: String,
    },
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },
    MalformedSpec(String),
}

impl Display for RuleCompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRuleName { field } => {
                write!(f, "field `{field}` declares a rule with an empty name")
            }
            Self::MalformedToken { field, token } => {
                write!(f, "field `{field}` has malformed rule token `{token}`")
            }
            Self::UnknownRule { field, rule } => {
                write!(f, "field `{field}` uses unknown rule `{rule}`")
            }
            Self::InvalidArguments {
                field,
                rule,
                reason,
            } => write!(
                f,
                "field `{field}` rule `{rule}` has invalid arguments: {reason}"
            ),
            Self::InvalidPattern {
                field,
                pattern,
                reason,
            } => write!(
                f,
                "field `{field}` regex `{pattern}` does not compile: {reason}"
            ),
            Self::MalformedSpec(message) => write!(f, "malformed rule spec: {message}"),
        }
    }
}

impl Error for RuleCompileError {}
