//! Rule evaluation against files.
//!
//! Evaluation is a pure function of the rule set, the [`MatchContext`] and the
//! [`EvalOptions`]: rules are evaluated in load order, every filter of a rule
//! must match (stopping at the first one that does not), and matched rules
//! emit their actions in declaration order. Priority metadata never affects
//! ordering, and no attempt is made to reconcile rules whose actions conflict.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    rules::{ActionKind, FilterKind, Rule},
    snippet::Match,
    template::{self, Captures},
};

mod guard;

/// The subject being evaluated: a file path and its content.
///
/// Both are shared buffers so that a guarded filter can hand them to a helper
/// thread without copying.
#[derive(Debug, Clone)]
pub struct MatchContext {
    path: Arc<str>,
    content: Arc<str>,
    truncated_at: Option<u64>,
}

impl MatchContext {
    /// Create a context from an in-memory path and content.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: Arc::from(path.into()),
            content: Arc::from(content.into()),
            truncated_at: None,
        }
    }

    /// Read a file into a context, reading at most `max_bytes` bytes.
    ///
    /// Content beyond the limit is dropped and the context is marked as
    /// truncated. A multi-byte character split by the limit is dropped too;
    /// any other invalid UTF-8 is an error.
    #[tracing::instrument]
    pub fn read(path: &Path, max_bytes: u64) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open file: {path:?}"))?;

        let mut buf = Vec::new();
        file.take(max_bytes.saturating_add(1))
            .read_to_end(&mut buf)
            .with_context(|| format!("read file: {path:?}"))?;

        let truncated = buf.len() as u64 > max_bytes;
        if truncated {
            buf.truncate(usize::try_from(max_bytes).unwrap_or(buf.len()));
        }

        let content = match String::from_utf8(buf) {
            Ok(content) => content,
            Err(error) if truncated && error.utf8_error().error_len().is_none() => {
                let valid = error.utf8_error().valid_up_to();
                let mut bytes = error.into_bytes();
                bytes.truncate(valid);
                String::from_utf8(bytes).with_context(|| format!("decode file: {path:?}"))?
            }
            Err(error) => return Err(error).with_context(|| format!("decode file: {path:?}")),
        };

        if truncated {
            tracing::debug!(?path, max_bytes, "content truncated");
        }

        Ok(Self {
            path: Arc::from(path.to_string_lossy().into_owned()),
            content: Arc::from(content),
            truncated_at: truncated.then_some(max_bytes),
        })
    }

    /// Replace the path, keeping the content and its truncation state.
    pub fn with_path(self, path: impl Into<String>) -> Self {
        Self {
            path: Arc::from(path.into()),
            ..self
        }
    }

    /// The file path filters of kind `file_extension` are matched against.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The content filters of kind `content` are matched against.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The byte limit the content was truncated to, if it was.
    pub fn truncated_at(&self) -> Option<u64> {
        self.truncated_at
    }

    fn subject(&self, kind: FilterKind) -> &Arc<str> {
        match kind {
            FilterKind::FileExtension => &self.path,
            FilterKind::Content => &self.content,
        }
    }
}

/// Tuning for a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Upper bound on one filter evaluation; `None` disables the guard.
    pub filter_timeout: Option<Duration>,

    /// Subjects shorter than this many bytes are matched without the guard.
    pub guard_threshold: usize,
}

impl EvalOptions {
    pub const DEFAULT_FILTER_TIMEOUT: Duration = Duration::from_secs(1);
    pub const DEFAULT_GUARD_THRESHOLD: usize = 64 * 1024;
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            filter_timeout: Some(Self::DEFAULT_FILTER_TIMEOUT),
            guard_threshold: Self::DEFAULT_GUARD_THRESHOLD,
        }
    }
}

/// A non-fatal problem encountered during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A filter did not finish in time and was treated as non-matching.
    #[error("rule `{rule}`: filter {index} did not finish within {timeout:?}; treated as not matching")]
    EvaluationTimeout {
        rule: String,
        index: usize,
        timeout: Duration,
    },

    /// Only a prefix of the file was evaluated.
    #[error("content truncated to the first {limit} bytes")]
    ContentTruncated { limit: u64 },
}

/// An action emitted by a matched rule, with its message resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredAction {
    pub kind: ActionKind,
    pub message: String,
}

/// Where a filter matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterMatch {
    /// Declaration index of the filter within its rule.
    pub index: usize,

    pub kind: FilterKind,

    #[serde(flatten)]
    pub location: Match,
}

/// The result of evaluating one rule against one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Name of the evaluated rule.
    pub rule: String,

    /// Whether every filter matched.
    pub matched: bool,

    /// Fired actions in declaration order; empty unless matched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<FiredAction>,

    /// First match of each filter, in filter order; empty unless matched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<FilterMatch>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl MatchResult {
    fn missed(rule: &Rule, warnings: Vec<Warning>) -> Self {
        Self {
            rule: rule.name.clone(),
            matched: false,
            actions: Vec::new(),
            matches: Vec::new(),
            warnings,
        }
    }

    /// Whether an `enforce` action fired.
    pub fn enforced(&self) -> bool {
        self.strongest() == Some(ActionKind::Enforce)
    }

    /// The strongest action kind that fired, if any.
    pub fn strongest(&self) -> Option<ActionKind> {
        self.actions.iter().map(|action| action.kind).max()
    }

    /// The line to report this result against: the first content match, or
    /// line 1 when the rule has no content filter.
    pub fn line(&self) -> usize {
        self.matches
            .iter()
            .find(|m| m.kind == FilterKind::Content)
            .map(|m| m.location.line)
            .unwrap_or(1)
    }
}

/// Whether any result fired an `enforce` action.
pub fn any_enforced(results: &[MatchResult]) -> bool {
    results.iter().any(MatchResult::enforced)
}

/// Evaluate one rule against a context.
///
/// A truncated context adds a [`Warning::ContentTruncated`] to the result,
/// whether or not the rule matched.
pub fn evaluate_rule(rule: &Rule, context: &MatchContext, options: &EvalOptions) -> MatchResult {
    let mut warnings = context
        .truncated_at()
        .map(|limit| Warning::ContentTruncated { limit })
        .into_iter()
        .collect::<Vec<_>>();
    let mut captures = Captures::new();
    let mut matches = Vec::with_capacity(rule.filters.len());

    for (index, filter) in rule.filters.iter().enumerate() {
        match guard::run(&filter.pattern, context.subject(filter.kind), options) {
            guard::Outcome::Matched(location) => {
                captures.extend(location.captures.clone());
                matches.push(FilterMatch {
                    index,
                    kind: filter.kind,
                    location,
                });
            }
            guard::Outcome::Missed => return MatchResult::missed(rule, warnings),
            guard::Outcome::TimedOut(timeout) => {
                tracing::warn!(
                    rule = %rule.name,
                    index,
                    ?timeout,
                    path = context.path(),
                    "filter timed out"
                );
                warnings.push(Warning::EvaluationTimeout {
                    rule: rule.name.clone(),
                    index,
                    timeout,
                });
                return MatchResult::missed(rule, warnings);
            }
        }
    }

    captures.insert(String::from("rule"), rule.name.clone());
    captures.insert(String::from("file_path"), context.path().to_string());

    let actions = rule
        .actions
        .iter()
        .map(|action| FiredAction {
            kind: action.kind,
            message: template::interpolate(&action.message, &captures),
        })
        .collect();

    MatchResult {
        rule: rule.name.clone(),
        matched: true,
        actions,
        matches,
        warnings,
    }
}

/// Evaluate rules against a context with explicit options.
///
/// Returns one result per rule, in the order the rules are given.
#[tracing::instrument(skip_all, fields(path = context.path(), rules = rules.len()))]
pub fn evaluate_with(
    rules: &[Rule],
    context: &MatchContext,
    options: &EvalOptions,
) -> Vec<MatchResult> {
    rules
        .iter()
        .map(|rule| evaluate_rule(rule, context, options))
        .collect()
}

/// Evaluate rules against a context with default options.
pub fn evaluate(rules: &[Rule], context: &MatchContext) -> Vec<MatchResult> {
    evaluate_with(rules, context, &EvalOptions::default())
}

/// The results of evaluating a rule set against one file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,

    /// One result per rule, in rule order.
    pub results: Vec<MatchResult>,
}

impl FileReport {
    /// Results of rules that matched.
    pub fn matched(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter().filter(|result| result.matched)
    }

    /// Distinct warnings across all results, in rule order.
    ///
    /// Truncation is reported by every result, but listed here once.
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.results
            .iter()
            .flat_map(|result| &result.warnings)
            .unique()
    }
}

/// An immutable rule set with evaluation options, shareable across threads.
#[derive(Debug, Clone)]
pub struct Engine {
    rules: Arc<[Rule]>,
    options: EvalOptions,
}

impl Engine {
    /// Create an engine with default options.
    pub fn new(rules: impl Into<Arc<[Rule]>>) -> Self {
        Self {
            rules: rules.into(),
            options: EvalOptions::default(),
        }
    }

    /// Replace the evaluation options.
    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// The rules this engine evaluates, in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate every rule against a single context.
    pub fn evaluate(&self, context: &MatchContext) -> Vec<MatchResult> {
        evaluate_with(&self.rules, context, &self.options)
    }

    /// Evaluate many contexts in parallel; results keep the input order.
    pub fn evaluate_all(&self, contexts: &[MatchContext]) -> Vec<Vec<MatchResult>> {
        contexts
            .par_iter()
            .map(|context| self.evaluate(context))
            .collect()
    }

    /// Read and evaluate files in parallel; reports keep the input order.
    ///
    /// At most `max_bytes` of each file are read. Files that cannot be read
    /// or are not UTF-8 are skipped.
    #[tracing::instrument(skip_all, fields(files = paths.len()))]
    pub fn evaluate_files(&self, paths: &[PathBuf], max_bytes: u64) -> Vec<FileReport> {
        paths
            .par_iter()
            .filter_map(|path| match MatchContext::read(path, max_bytes) {
                Ok(context) => Some(self.report(path, &context)),
                Err(error) => {
                    tracing::debug!(?path, error = %error, "skipping file (could not read)");
                    None
                }
            })
            .collect()
    }

    fn report(&self, path: &Path, context: &MatchContext) -> FileReport {
        if let Some(limit) = context.truncated_at() {
            tracing::warn!(?path, limit, "evaluated a truncated prefix of the file");
        }

        FileReport {
            path: path.to_path_buf(),
            results: self.evaluate(context),
        }
    }
}
