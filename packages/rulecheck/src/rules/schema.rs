//! Schema types for user-defined rules.
//!
//! There are two layers here: the `*Definition` types mirror what a rule file
//! may contain (every field optional, kinds as plain strings), and [`Rule`] and
//! friends are the validated form produced by the loader. Splitting them lets
//! the loader report exactly which field is missing or invalid rather than a
//! generic deserialization failure.

use std::collections::BTreeSet;

use derive_more::Display;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::Value;

use crate::{
    snippet::{Match, Span},
    template::Captures,
};

/// A single validated rule definition.
///
/// ```yaml
/// name: no-console-log
/// description: Remove debugging output before committing.
/// filters:
///   - kind: file_extension
///     pattern: "\\.(js|ts)$"
///   - kind: content
///     pattern: "console\\.log"
/// actions:
///   - kind: enforce
///     message: remove console.log from {{ $file_path }}
/// metadata:
///   priority: high
///   version: 1.0.0
///   tags: [javascript]
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    /// Unique identifier for this rule within a loaded rule set.
    pub name: String,

    /// Human-readable description of the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The filters that must all match for the rule to fire.
    ///
    /// Filters are evaluated in the order in which they are defined. An empty
    /// list matches every file.
    pub filters: Vec<Filter>,

    /// The actions emitted, in declaration order, when the rule fires.
    pub actions: Vec<Action>,

    /// Example input/output pairs; documentation only, never evaluated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,

    /// Advisory metadata. Does not affect evaluation.
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// A predicate a rule requires to match before firing.
#[derive(Debug, Clone, Serialize)]
pub struct Filter {
    /// What the pattern is matched against.
    pub kind: FilterKind,

    /// The compiled pattern.
    pub pattern: RegexMatcher,
}

/// The subject a filter is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Matched against the file path.
    ///
    /// Despite the name, the pattern sees the whole path, so
    /// `"^src/.*\\.rs$"` is as valid as `"\\.rs$"`.
    FileExtension,

    /// Matched against the file content.
    Content,
}

serde_plain::derive_display_from_serialize!(FilterKind);
serde_plain::derive_fromstr_from_deserialize!(FilterKind);

/// An effect emitted when a rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    /// How strongly the action should be treated by the caller.
    pub kind: ActionKind,

    /// Message template; see [`crate::template`] for placeholders.
    pub message: String,
}

/// The kind of an action, ordered from weakest to strongest.
///
/// The engine never escalates on its own; callers decide what each kind
/// means (for example, failing a build only on [`ActionKind::Enforce`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Informational output.
    Message,

    /// Advisory: the change is recommended.
    Suggest,

    /// Mandatory: the change is required.
    Enforce,
}

serde_plain::derive_display_from_serialize!(ActionKind);
serde_plain::derive_fromstr_from_deserialize!(ActionKind);

/// An example input and the output the rule author expects after applying the rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

/// Advisory rule metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl Metadata {
    /// Whether no metadata was provided at all.
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.version.is_none() && self.tags.is_empty()
    }
}

/// Rule priority. Informational only: rules always evaluate in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

serde_plain::derive_display_from_serialize!(Priority);
serde_plain::derive_fromstr_from_deserialize!(Priority);

/// A rule as written in a rule file, before validation.
///
/// Fields are kept as raw values so that a value of the wrong type is
/// reported against its own field path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleDefinition {
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub filters: Option<Value>,
    pub actions: Option<Value>,
    pub examples: Option<Value>,
    pub metadata: Option<Value>,
}

/// A filter as written in a rule file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterDefinition {
    pub kind: Option<Value>,
    pub pattern: Option<Value>,
}

/// An action as written in a rule file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionDefinition {
    pub kind: Option<Value>,
    pub message: Option<Value>,
}

/// Metadata as written in a rule file.
///
/// `version` accepts numbers too, because YAML reads `1.0` as a float.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataDefinition {
    pub priority: Option<Value>,
    pub version: Option<Value>,
    pub tags: Option<Value>,
}

/// Match on a regex pattern.
///
/// Inline flags are supported: `(?s)` lets `.` match newlines, `(?m)` makes
/// `^`/`$` match at line boundaries, `(?i)` ignores case.
#[derive(Debug, Clone, Display)]
#[display("{_0}")]
pub struct RegexMatcher(Regex);

impl RegexMatcher {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(RegexMatcher)
    }

    /// The pattern this matcher was compiled from.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the first match in `s` along with its capture groups.
    ///
    /// Captures are stored as:
    /// - `"0"`, `"1"`, `"2"`, etc. for positional captures
    /// - Named keys for named capture groups (e.g., `"class"`)
    pub fn first_match(&self, s: &str) -> Option<Match> {
        let caps = self.0.captures(s)?;
        let span = Span::from(caps.get(0)?.range());

        let mut captures = Captures::new();
        for (i, cap) in caps.iter().enumerate() {
            if let Some(cap) = cap {
                captures.insert(i.to_string(), cap.as_str().to_string());
            }
        }
        for name in self.0.capture_names().flatten() {
            if let Some(cap) = caps.name(name) {
                captures.insert(name.to_string(), cap.as_str().to_string());
            }
        }

        Some(Match {
            line: span.line_in(s),
            span,
            captures,
        })
    }
}

impl Serialize for RegexMatcher {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}
