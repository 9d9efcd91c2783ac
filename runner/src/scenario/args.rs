//! Positional scenario arguments

use std::fmt;

use super::ScenarioError;

/// A positional argument, coerced to an integer when it parses as one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioArg {
    Int(i64),
    Text(String),
}

impl ScenarioArg {
    /// Coerce a raw command-line value
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => ScenarioArg::Int(n),
            Err(_) => ScenarioArg::Text(raw.to_string()),
        }
    }

    /// Coerce every value of a list
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Vec<Self> {
        raw.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScenarioArg::Int(n) => Some(*n),
            ScenarioArg::Text(_) => None,
        }
    }

    /// Read argument `index` as a non-negative integer, falling back to `default`
    pub fn uint_or(args: &[ScenarioArg], index: usize, default: u64) -> Result<u64, ScenarioError> {
        match args.get(index) {
            None => Ok(default),
            Some(ScenarioArg::Int(n)) => u64::try_from(*n).map_err(|_| ScenarioError::InvalidArgument {
                index,
                reason: format!("expected a non-negative integer, got {}", n),
            }),
            Some(ScenarioArg::Text(s)) => Err(ScenarioError::InvalidArgument {
                index,
                reason: format!("expected an integer, got '{}'", s),
            }),
        }
    }
}

impl fmt::Display for ScenarioArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioArg::Int(n) => write!(f, "{}", n),
            ScenarioArg::Text(s) => f.write_str(s),
        }
    }
}
