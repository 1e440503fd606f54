//! Parsing and validation of rule sources.

use std::collections::{BTreeSet, HashSet};
use std::ffi::OsStr;
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::ops::Range;
use std::path::Path;

use derive_more::Display;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use tap::Tap;
use walkdir::WalkDir;

use super::error::{LoadError, RuleRef};
use super::schema::{
    Action, ActionDefinition, ActionKind, Filter, FilterDefinition, FilterKind, Metadata,
    MetadataDefinition, Priority, RegexMatcher, Rule, RuleDefinition,
};

/// The syntax of a rule source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Format {
    #[display("yaml")]
    Yaml,

    #[display("json")]
    Json,
}

impl Format {
    /// Pick the format from a path's extension: `.json` is JSON, anything else
    /// (`.rules`, `.yaml`, `.yml`, no extension) is YAML.
    pub fn for_path(path: &Path) -> Self {
        if path.extension() == Some(OsStr::new("json")) {
            Format::Json
        } else {
            Format::Yaml
        }
    }
}

/// Extensions picked up when walking a directory of rule sources.
const RULE_EXTENSIONS: [&str; 4] = ["rules", "yaml", "yml", "json"];

/// The result of loading one or more rule sources.
///
/// Loading is partial: every valid rule is kept, and every rejected rule (or
/// unparseable source) contributes one entry to `errors`.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Valid rules, in load order.
    pub rules: Vec<Rule>,

    /// Errors for rejected rules and sources, in load order.
    pub errors: Vec<LoadError>,

    /// Which rules came from which source.
    pub sources: Vec<SourceSummary>,
}

impl LoadReport {
    /// Iterate over each loaded source with the rules it contributed.
    pub fn rules_by_source(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.sources
            .iter()
            .map(|source| (source.name.as_str(), &self.rules[source.rules.clone()]))
    }

    /// Find a loaded rule by name.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

/// The rules contributed by a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    /// File path or caller-provided label.
    pub name: String,

    /// Indexes into [`LoadReport::rules`].
    pub rules: Range<usize>,
}

/// Accumulates rules from any number of sources into one rule set.
///
/// Rule names must be unique across everything loaded by the same loader;
/// a later duplicate is rejected with a schema error on `name`.
#[derive(Debug, Default)]
pub struct Loader {
    names: HashSet<String>,
    report: LoadReport,
}

impl Loader {
    /// Load rules from a text buffer. Returns the number of rules accepted.
    #[tracing::instrument(skip(self, text))]
    pub fn load_str(&mut self, source_name: &str, text: &str, format: Format) -> usize {
        let (rules, errors) = parse_source(source_name, text, format);
        self.report.errors.extend(errors);

        let start = self.report.rules.len();
        for rule in rules {
            if self.names.contains(&rule.name) {
                tracing::warn!(rule = %rule.name, source_name, "duplicate rule name");
                self.report.errors.push(LoadError::Schema {
                    source_name: source_name.to_string(),
                    rule: RuleRef::Named(rule.name),
                    field: String::from("name"),
                    message: String::from("duplicate rule name in the loaded rule set"),
                });
                continue;
            }

            self.names.insert(rule.name.clone());
            self.report.rules.push(rule);
        }

        let end = self.report.rules.len();
        self.report.sources.push(SourceSummary {
            name: source_name.to_string(),
            rules: start..end,
        });
        end - start
    }

    /// Load rules from a file, or from every rule file under a directory.
    ///
    /// Directories are walked recursively in file name order, loading files
    /// with a `.rules`, `.yaml`, `.yml` or `.json` extension. Missing paths are
    /// skipped.
    #[tracing::instrument(skip(self))]
    pub fn load_path(&mut self, path: &Path) {
        if !path.is_dir() {
            self.load_file(path);
            return;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(?error, ?path, "walking directory");
                    continue;
                }
            };

            if entry.file_type().is_file() && is_rule_file(entry.path()) {
                self.load_file(entry.path());
            }
        }
    }

    /// Finish loading and return the accumulated report.
    pub fn finish(self) -> LoadReport {
        self.report
    }

    fn load_file(&mut self, path: &Path) {
        let source_name = path.display().to_string();
        match read_to_string(path) {
            Ok(text) => {
                self.load_str(&source_name, &text, Format::for_path(path));
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!(?path, "rule source does not exist, skipping");
            }
            Err(error) => self.report.errors.push(LoadError::Read { source_name, error }),
        }
    }
}

fn is_rule_file(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| RULE_EXTENSIONS.contains(&ext));
    by_extension || path.file_name() == Some(OsStr::new(".rules"))
}

/// Parse and validate every rule in a single source.
///
/// Returns the accepted rules and one error per rejected rule. A source that
/// is not syntactically valid yields a single [`LoadError::Parse`] and no rules.
/// Names are not checked for uniqueness here; see [`Loader`].
pub fn parse_source(source_name: &str, text: &str, format: Format) -> (Vec<Rule>, Vec<LoadError>) {
    let document = match parse_document(source_name, text, format) {
        Ok(document) => document,
        Err(error) => return (Vec::new(), vec![error]),
    };

    let entries = match split_document(source_name, document) {
        Ok(entries) => entries,
        Err(error) => return (Vec::new(), vec![error]),
    };

    let mut rules = Vec::new();
    let mut errors = Vec::new();
    for (position, entry) in entries.into_iter().enumerate() {
        match parse_rule(source_name, position, entry) {
            Ok(rule) => rules.push(rule),
            Err(error) => {
                tracing::debug!(%error, "rejected rule");
                errors.push(error);
            }
        }
    }

    (rules, errors)
}

fn parse_document(source_name: &str, text: &str, format: Format) -> Result<Value, LoadError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    match format {
        Format::Yaml => serde_yaml::from_str::<Value>(text).map_err(|error| {
            let location = error.location();
            LoadError::Parse {
                source_name: source_name.to_string(),
                line: location.as_ref().map(|l| l.line()),
                column: location.as_ref().map(|l| l.column()),
                message: error.to_string(),
            }
        }),
        Format::Json => serde_json::from_str::<Value>(text).map_err(|error| LoadError::Parse {
            source_name: source_name.to_string(),
            line: Some(error.line()).filter(|&line| line > 0),
            column: Some(error.column()).filter(|&column| column > 0),
            message: error.to_string(),
        }),
    }
    .tap(|document| tracing::trace!(?document, "parsed rule source"))
}

/// Split a parsed document into its rule entries.
///
/// Accepted shapes: a single rule mapping, a sequence of rules, or a mapping
/// with a `rules` sequence and an optional `version: 1`.
fn split_document(source_name: &str, document: Value) -> Result<Vec<Value>, LoadError> {
    let document_error = |field: &str, message: &str| LoadError::Schema {
        source_name: source_name.to_string(),
        rule: RuleRef::Document,
        field: field.to_string(),
        message: message.to_string(),
    };

    match document {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(entries) => Ok(entries),
        Value::Mapping(mut mapping) if mapping.contains_key("rules") => {
            if let Some(version) = mapping.get("version") {
                if version.as_u64() != Some(1) {
                    return Err(document_error("version", "unsupported version, expected 1"));
                }
            }

            match mapping.remove("rules") {
                Some(Value::Sequence(entries)) => Ok(entries),
                Some(Value::Null) => Ok(Vec::new()),
                _ => Err(document_error("rules", "expected a sequence of rules")),
            }
        }
        mapping @ Value::Mapping(_) => Ok(vec![mapping]),
        _ => Err(document_error(
            "(root)",
            "expected a rule, a sequence of rules, or a mapping with a `rules` key",
        )),
    }
}

fn parse_rule(source_name: &str, position: usize, entry: Value) -> Result<Rule, LoadError> {
    let rule_ref = entry
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map(|name| RuleRef::Named(name.to_string()))
        .unwrap_or(RuleRef::Position(position));

    let schema_error = |field: &str, message: &str| LoadError::Schema {
        source_name: source_name.to_string(),
        rule: rule_ref.clone(),
        field: field.to_string(),
        message: message.to_string(),
    };

    if !entry.is_mapping() {
        let message = format!("expected a rule mapping, found {}", describe(&entry));
        return Err(schema_error("(rule)", &message));
    }
    let definition = from_field::<RuleDefinition>(entry).map_err(|m| schema_error("(rule)", &m))?;

    let name = match string_field(definition.name).map_err(|m| schema_error("name", &m))? {
        None => return Err(schema_error("name", "missing required field")),
        Some(name) if name.trim().is_empty() => {
            return Err(schema_error("name", "must not be empty"));
        }
        Some(name) => name,
    };

    let description =
        string_field(definition.description).map_err(|m| schema_error("description", &m))?;

    let filters = sequence_field(definition.filters)
        .map_err(|m| schema_error("filters", &m))?
        .ok_or_else(|| schema_error("filters", "missing required field"))?
        .into_iter()
        .enumerate()
        .map(|(index, filter)| parse_filter(source_name, &rule_ref, index, filter))
        .collect::<Result<Vec<_>, _>>()?;

    let actions = sequence_field(definition.actions)
        .map_err(|m| schema_error("actions", &m))?
        .ok_or_else(|| schema_error("actions", "missing required field"))?
        .into_iter()
        .enumerate()
        .map(|(index, action)| parse_action(index, action).map_err(|(f, m)| schema_error(&f, &m)))
        .collect::<Result<Vec<_>, _>>()?;

    let examples = match definition.examples {
        None | Some(Value::Null) => Vec::new(),
        Some(examples) => from_field(examples).map_err(|m| schema_error("examples", &m))?,
    };

    let metadata = match definition.metadata {
        None | Some(Value::Null) => Metadata::default(),
        Some(metadata) => parse_metadata(metadata).map_err(|(f, m)| schema_error(&f, &m))?,
    };

    if filters.is_empty() {
        tracing::warn!(rule = %name, source_name, "rule has no filters and matches every file");
    }

    Ok(Rule {
        name,
        description,
        filters,
        actions,
        examples,
        metadata,
    })
}

fn parse_filter(
    source_name: &str,
    rule: &RuleRef,
    index: usize,
    filter: Value,
) -> Result<Filter, LoadError> {
    let schema_error = |field: &str, message: String| LoadError::Schema {
        source_name: source_name.to_string(),
        rule: rule.clone(),
        field: format!("filters[{index}]{field}"),
        message,
    };

    let filter = from_field::<FilterDefinition>(filter).map_err(|m| schema_error("", m))?;

    let kind = string_field(filter.kind)
        .map_err(|m| schema_error(".kind", m))?
        .ok_or_else(|| schema_error(".kind", String::from("missing required field")))?
        .parse::<FilterKind>()
        .map_err(|error| schema_error(".kind", error.to_string()))?;

    let pattern = string_field(filter.pattern)
        .map_err(|m| schema_error(".pattern", m))?
        .ok_or_else(|| schema_error(".pattern", String::from("missing required field")))?;

    let compiled = RegexMatcher::new(&pattern).map_err(|error| LoadError::Pattern {
        source_name: source_name.to_string(),
        rule: rule.clone(),
        index,
        pattern,
        error,
    })?;

    Ok(Filter {
        kind,
        pattern: compiled,
    })
}

/// Field errors are returned as `(field, message)` and wrapped by the caller.
fn parse_action(index: usize, action: Value) -> Result<Action, (String, String)> {
    let field = |name: &str| format!("actions[{index}]{name}");

    let action = from_field::<ActionDefinition>(action).map_err(|m| (field(""), m))?;

    let kind = string_field(action.kind)
        .map_err(|m| (field(".kind"), m))?
        .ok_or_else(|| (field(".kind"), String::from("missing required field")))?
        .parse::<ActionKind>()
        .map_err(|error| (field(".kind"), error.to_string()))?;

    let message = string_field(action.message)
        .map_err(|m| (field(".message"), m))?
        .ok_or_else(|| (field(".message"), String::from("missing required field")))?;

    Ok(Action { kind, message })
}

fn parse_metadata(metadata: Value) -> Result<Metadata, (String, String)> {
    let metadata = from_field::<MetadataDefinition>(metadata)
        .map_err(|m| (String::from("metadata"), m))?;

    let priority = string_field(metadata.priority)
        .map_err(|m| (String::from("metadata.priority"), m))?
        .map(|priority| priority.parse::<Priority>())
        .transpose()
        .map_err(|error| (String::from("metadata.priority"), error.to_string()))?;

    let version = match metadata.version {
        None | Some(Value::Null) => None,
        Some(Value::String(version)) => Some(version),
        Some(Value::Number(version)) => Some(version.to_string()),
        Some(other) => {
            return Err((
                String::from("metadata.version"),
                format!("expected a version string, found {}", describe(&other)),
            ));
        }
    };

    let tags = sequence_field(metadata.tags)
        .map_err(|m| (String::from("metadata.tags"), m))?
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, tag)| match string_field(Some(tag)) {
            Ok(tag) => tag.map(Ok),
            Err(m) => Some(Err((format!("metadata.tags[{index}]"), m))),
        })
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(Metadata {
        priority,
        version,
        tags,
    })
}

/// Deserialize a raw field value into its definition type.
fn from_field<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_yaml::from_value(value).map_err(|error| error.to_string())
}

/// A string field; `null` counts as absent.
fn string_field(value: Option<Value>) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(format!("expected a string, found {}", describe(&other))),
    }
}

/// A sequence field; `null` counts as absent.
fn sequence_field(value: Option<Value>) -> Result<Option<Vec<Value>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Sequence(values)) => Ok(Some(values)),
        Some(other) => Err(format!("expected a sequence, found {}", describe(&other))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
