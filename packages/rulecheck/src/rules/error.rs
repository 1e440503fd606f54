//! Errors reported while loading rules.

use derive_more::Display;

/// Identifies the rule an error belongs to.
///
/// Rules are named when the definition carries a usable `name`, and located
/// by their zero-based position in the source otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RuleRef {
    #[display("rule `{_0}`")]
    Named(String),

    #[display("rule at index {_0}")]
    Position(usize),

    /// The error concerns the source as a whole rather than a single rule.
    #[display("document")]
    Document,
}

/// An error that rejected a rule (or a whole source) at load time.
///
/// A rejected rule never becomes usable; other rules in the same source are
/// unaffected unless the source could not be parsed at all.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The rule source could not be read.
    #[error("{source_name}: read rule source: {error}")]
    Read {
        source_name: String,
        #[source]
        error: std::io::Error,
    },

    /// The rule source is not well-formed YAML or JSON.
    #[error("{source_name}{}: malformed rule source: {message}", location(.line, .column))]
    Parse {
        source_name: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    /// A field is missing or holds an invalid value.
    #[error("{source_name}: {rule}: field `{field}`: {message}")]
    Schema {
        source_name: String,
        rule: RuleRef,
        field: String,
        message: String,
    },

    /// A filter pattern is not a valid regular expression.
    #[error("{source_name}: {rule}: filter {index}: invalid pattern `{pattern}`: {error}")]
    Pattern {
        source_name: String,
        rule: RuleRef,
        index: usize,
        pattern: String,
        #[source]
        error: regex::Error,
    },
}

impl LoadError {
    /// The name of the source that produced this error.
    pub fn source_name(&self) -> &str {
        match self {
            LoadError::Read { source_name, .. }
            | LoadError::Parse { source_name, .. }
            | LoadError::Schema { source_name, .. }
            | LoadError::Pattern { source_name, .. } => source_name,
        }
    }

    /// The rule this error rejected, if it concerns a single rule.
    pub fn rule(&self) -> Option<&RuleRef> {
        match self {
            LoadError::Schema { rule, .. } | LoadError::Pattern { rule, .. } => match rule {
                RuleRef::Document => None,
                rule => Some(rule),
            },
            LoadError::Read { .. } | LoadError::Parse { .. } => None,
        }
    }
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(":{line}:{column}"),
        (Some(line), None) => format!(":{line}"),
        _ => String::new(),
    }
}
