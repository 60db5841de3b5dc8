//! Typed value rules.
//!
//! Each `Rule` is built once from a `RuleEntry` and then evaluated many
//! times. `check` returns `Err(message)` with a field-scoped, human-readable
//! message; values of an unexpected type fail the rule instead of erroring.

use crate::model::value::Value;
use crate::validation::error::RuleCompileError;
use crate::validation::spec::{parse_literal, RuleEntry};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("valid email regex")
});
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^\s/?#]+[^\s]*$").expect("valid url regex")
});

/// One compiled value rule.
#[derive(Debug, Clone)]
pub enum Rule {
    NotEmpty,
    Positive,
    Negative,
    Min { limit: f64, inclusive: bool },
    Max { limit: f64, inclusive: bool },
    Between { min: f64, max: f64, inclusive: bool },
    Length { min: Option<usize>, max: Option<usize> },
    Equals(Value),
    In(Vec<Value>),
    Email,
    Url,
    Alpha,
    Alnum,
    Digit,
    Numeric,
    IntVal,
    FloatVal,
    BoolVal,
    StringType,
    Date { format: Option<String> },
    Regex(Regex),
    NoWhitespace,
    Lowercase,
    Uppercase,
}

impl Rule {
    /// Builds a rule from a declared entry; names match case-insensitively.
    pub fn build(field: &str, entry: &RuleEntry) -> Result<Self, RuleCompileError> {
        let name = entry.name.trim();
        let args = Args {
            field,
            rule: name,
            values: &entry.args,
        };

        let rule = match name.to_ascii_lowercase().as_str() {
            "notempty" => args.none(Self::NotEmpty)?,
            "positive" => args.none(Self::Positive)?,
            "negative" => args.none(Self::Negative)?,
            "min" => {
                args.arity(1, 2)?;
                Self::Min {
                    limit: args.number(0)?,
                    inclusive: args.flag(1, true)?,
                }
            }
            "max" => {
                args.arity(1, 2)?;
                Self::Max {
                    limit: args.number(0)?,
                    inclusive: args.flag(1, true)?,
                }
            }
            "between" => {
                args.arity(2, 3)?;
                let (min, max) = (args.number(0)?, args.number(1)?);
                if min > max {
                    return Err(args.invalid(format!("min {min} is greater than max {max}")));
                }
                Self::Between {
                    min,
                    max,
                    inclusive: args.flag(2, true)?,
                }
            }
            "length" => {
                args.arity(1, 2)?;
                let min = args.optional_len(0)?;
                let max = args.optional_len(1)?;
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(args.invalid(format!("min {lo} is greater than max {hi}")));
                    }
                }
                Self::Length { min, max }
            }
            "equals" => {
                args.arity(1, 1)?;
                Self::Equals(literal(&entry.args[0]))
            }
            "in" => {
                if entry.args.is_empty() {
                    return Err(args.invalid("expected at least one allowed value".into()));
                }
                Self::In(entry.args.iter().map(literal).collect())
            }
            "email" => args.none(Self::Email)?,
            "url" => args.none(Self::Url)?,
            "alpha" => args.none(Self::Alpha)?,
            "alnum" => args.none(Self::Alnum)?,
            "digit" => args.none(Self::Digit)?,
            "numeric" => args.none(Self::Numeric)?,
            "intval" => args.none(Self::IntVal)?,
            "floatval" => args.none(Self::FloatVal)?,
            "boolval" => args.none(Self::BoolVal)?,
            "stringtype" => args.none(Self::StringType)?,
            "date" => {
                args.arity(0, 1)?;
                let format = match entry.args.first() {
                    Some(Value::Text(format)) if !format.trim().is_empty() => Some(format.clone()),
                    Some(other) => {
                        return Err(args.invalid(format!("format must be text, got {other}")));
                    }
                    None => None,
                };
                Self::Date { format }
            }
            "regex" => {
                args.arity(1, 1)?;
                let pattern = entry.args[0].to_string();
                let compiled =
                    Regex::new(&pattern).map_err(|err| RuleCompileError::InvalidPattern {
                        field: field.to_string(),
                        pattern: pattern.clone(),
                        reason: err.to_string(),
                    })?;
                Self::Regex(compiled)
            }
            "nowhitespace" => args.none(Self::NoWhitespace)?,
            "lowercase" => args.none(Self::Lowercase)?,
            "uppercase" => args.none(Self::Uppercase)?,
            "" => {
                return Err(RuleCompileError::EmptyRuleName {
                    field: field.to_string(),
                })
            }
            _ => {
                return Err(RuleCompileError::UnknownRule {
                    field: field.to_string(),
                    rule: name.to_string(),
                })
            }
        };
        Ok(rule)
    }

    /// Canonical rule name used in messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotEmpty => "notEmpty",
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Min { .. } => "min",
            Self::Max { .. } => "max",
            Self::Between { .. } => "between",
            Self::Length { .. } => "length",
            Self::Equals(_) => "equals",
            Self::In(_) => "in",
            Self::Email => "email",
            Self::Url => "url",
            Self::Alpha => "alpha",
            Self::Alnum => "alnum",
            Self::Digit => "digit",
            Self::Numeric => "numeric",
            Self::IntVal => "intVal",
            Self::FloatVal => "floatVal",
            Self::BoolVal => "boolVal",
            Self::StringType => "stringType",
            Self::Date { .. } => "date",
            Self::Regex(_) => "regex",
            Self::NoWhitespace => "noWhitespace",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
        }
    }

    /// Evaluates the rule against one field value.
    pub fn check(&self, field: &str, value: &Value) -> Result<(), String> {
        let ok = match self {
            Self::NotEmpty => !is_empty(value),
            Self::Positive => value.as_f64().is_some_and(|n| n > 0.0),
            Self::Negative => value.as_f64().is_some_and(|n| n < 0.0),
            Self::Min { limit, inclusive } => value
                .as_f64()
                .is_some_and(|n| if *inclusive { n >= *limit } else { n > *limit }),
            Self::Max { limit, inclusive } => value
                .as_f64()
                .is_some_and(|n| if *inclusive { n <= *limit } else { n < *limit }),
            Self::Between {
                min,
                max,
                inclusive,
            } => value.as_f64().is_some_and(|n| {
                if *inclusive {
                    n >= *min && n <= *max
                } else {
                    n > *min && n < *max
                }
            }),
            Self::Length { min, max } => length_of(value).is_some_and(|len| {
                min.map_or(true, |lo| len >= lo) && max.map_or(true, |hi| len <= hi)
            }),
            Self::Equals(expected) => loosely_equal(value, expected),
            Self::In(allowed) => allowed.iter().any(|candidate| loosely_equal(value, candidate)),
            Self::Email => text(value).is_some_and(|s| EMAIL_RE.is_match(s)),
            Self::Url => text(value).is_some_and(|s| URL_RE.is_match(s)),
            Self::Alpha => non_empty_text_all(value, char::is_alphabetic),
            Self::Alnum => non_empty_text_all(value, char::is_alphanumeric),
            Self::Digit => match value {
                Value::Int(n) => *n >= 0,
                other => non_empty_text_all(other, |c| c.is_ascii_digit()),
            },
            Self::Numeric => value.as_f64().is_some(),
            Self::IntVal => match value {
                Value::Int(_) => true,
                Value::Text(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            Self::FloatVal => matches!(value, Value::Int(_) | Value::Float(_))
                || text(value).is_some_and(|s| s.trim().parse::<f64>().is_ok()),
            Self::BoolVal => match value {
                Value::Bool(_) => true,
                Value::Int(n) => *n == 0 || *n == 1,
                Value::Text(s) => matches!(
                    s.trim().to_ascii_lowercase().as_str(),
                    "true" | "false" | "1" | "0" | "yes" | "no" | "on" | "off"
                ),
                _ => false,
            },
            Self::StringType => matches!(value, Value::Text(_)),
            Self::Date { format } => is_date(value, format.as_deref()),
            Self::Regex(pattern) => text(value).is_some_and(|s| pattern.is_match(s)),
            Self::NoWhitespace => !value.to_string().chars().any(char::is_whitespace),
            Self::Lowercase => text(value).is_some_and(|s| s == s.to_lowercase()),
            Self::Uppercase => text(value).is_some_and(|s| s == s.to_uppercase()),
        };

        if ok {
            Ok(())
        } else {
            Err(self.message(field))
        }
    }

    fn message(&self, field: &str) -> String {
        match self {
            Self::NotEmpty => format!("{field} must not be empty"),
            Self::Positive => format!("{field} must be positive"),
            Self::Negative => format!("{field} must be negative"),
            Self::Min { limit, inclusive } => {
                let op = if *inclusive { "greater than or equal to" } else { "greater than" };
                format!("{field} must be {op} {limit}")
            }
            Self::Max { limit, inclusive } => {
                let op = if *inclusive { "less than or equal to" } else { "less than" };
                format!("{field} must be {op} {limit}")
            }
            Self::Between { min, max, inclusive } => {
                let suffix = if *inclusive { "inclusive" } else { "exclusive" };
                format!("{field} must be between {min} and {max} ({suffix})")
            }
            Self::Length { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("{field} must have a length between {lo} and {hi}"),
                (Some(lo), None) => format!("{field} must have a length of at least {lo}"),
                (None, Some(hi)) => format!("{field} must have a length of at most {hi}"),
                (None, None) => format!("{field} must have a length"),
            },
            Self::Equals(expected) => format!("{field} must equal {expected}"),
            Self::In(allowed) => format!("{field} must be one of {}", Value::List(allowed.clone())),
            Self::Email => format!("{field} must be a valid email address"),
            Self::Url => format!("{field} must be a valid URL"),
            Self::Alpha => format!("{field} must contain only letters"),
            Self::Alnum => format!("{field} must contain only letters and digits"),
            Self::Digit => format!("{field} must contain only digits"),
            Self::Numeric => format!("{field} must be numeric"),
            Self::IntVal => format!("{field} must be an integer"),
            Self::FloatVal => format!("{field} must be a float number"),
            Self::BoolVal => format!("{field} must be a boolean value"),
            Self::StringType => format!("{field} must be a string"),
            Self::Date { format: Some(format) } => {
                format!("{field} must be a valid date in the format {format}")
            }
            Self::Date { format: None } => format!("{field} must be a valid date"),
            Self::Regex(pattern) => format!("{field} must match {}", pattern.as_str()),
            Self::NoWhitespace => format!("{field} must not contain whitespace"),
            Self::Lowercase => format!("{field} must be lowercase"),
            Self::Uppercase => format!("{field} must be uppercase"),
        }
    }
}

struct Args<'a> {
    field: &'a str,
    rule: &'a str,
    values: &'a [Value],
}

impl Args<'_> {
    fn invalid(&self, reason: String) -> RuleCompileError {
        RuleCompileError::InvalidArguments {
            field: self.field.to_string(),
            rule: self.rule.to_string(),
            reason,
        }
    }

    fn none(&self, rule: Rule) -> Result<Rule, RuleCompileError> {
        self.arity(0, 0)?;
        Ok(rule)
    }

    fn arity(&self, min: usize, max: usize) -> Result<(), RuleCompileError> {
        let count = self.values.len();
        if count < min || count > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min}..={max}")
            };
            return Err(self.invalid(format!("expected {expected} arguments, got {count}")));
        }
        Ok(())
    }

    fn number(&self, index: usize) -> Result<f64, RuleCompileError> {
        self.values
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.invalid(format!("argument {} must be a number", index + 1)))
    }

    fn flag(&self, index: usize, default: bool) -> Result<bool, RuleCompileError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(Value::Text(raw)) => match raw.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(self.invalid(format!("argument {} must be a boolean", index + 1))),
            },
            Some(_) => Err(self.invalid(format!("argument {} must be a boolean", index + 1))),
        }
    }

    fn optional_len(&self, index: usize) -> Result<Option<usize>, RuleCompileError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| {
                    self.invalid(format!(
                        "argument {} must be a non-negative integer",
                        index + 1
                    ))
                }),
        }
    }
}

/// Structured args arrive typed; text args from code may still need typing.
fn literal(value: &Value) -> Value {
    match value {
        Value::Text(raw) => parse_literal(raw),
        other => other.clone(),
    }
}

fn text(value: &Value) -> Option<&str> {
    value.as_str()
}

fn non_empty_text_all(value: &Value, predicate: impl Fn(char) -> bool) -> bool {
    text(value).is_some_and(|s| !s.is_empty() && s.chars().all(&predicate))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.trim().is_empty(),
        Value::List(items) => items.is_empty(),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Text(s) => Some(s.chars().count()),
        Value::List(items) => Some(items.len()),
        _ => None,
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Text(_), Value::Text(_)) => false,
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => left.to_string() == right.to_string(),
        },
    }
}

fn is_date(value: &Value, format: Option<&str>) -> bool {
    let raw = match value {
        Value::DateTime(_) => return true,
        Value::Text(raw) => raw.trim(),
        _ => return false,
    };
    match format {
        Some(format) => {
            NaiveDateTime::parse_from_str(raw, format).is_ok()
                || NaiveDate::parse_from_str(raw, format).is_ok()
        }
        None => {
            DateTime::parse_from_rfc3339(raw).is_ok()
                || NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").is_ok()
                || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        }
    }
}
