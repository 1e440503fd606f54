//! Source code snippet rendering for matched rules.
//!
//! Uses `annotate-snippets` to render compiler-like diagnostic output,
//! pointing to the exact location of matches in source code.

use std::ops::Range;

use annotate_snippets::{Level, Renderer, Snippet};
use bon::Builder;
use derive_more::AsRef;
use serde::Serialize;

use crate::template::Captures;

/// Source code to be annotated.
#[derive(Debug, Clone, PartialEq, Eq, AsRef)]
pub struct Source(String);

impl Source {
    /// Annotate the source code with the given annotations.
    ///
    /// Lines without annotations are folded away, so this is safe to use on
    /// large files.
    ///
    /// # Examples
    ///
    /// Produces output similar to Rust compiler diagnostics:
    ///
    /// ```text
    /// error: no-console-log
    ///    |
    ///  5 |     console.log(user);
    ///    |     ^^^^^^^^^^^ remove console.log
    ///    |
    /// ```
    pub fn annotate(
        &self,
        title: &str,
        annotations: impl IntoIterator<Item = impl Into<Annotation>>,
    ) -> String {
        // `annotate_snippets` borrows every label, so the owned annotations
        // have to outlive the rendered message.
        let annotations = annotations.into_iter().map(Into::into).collect::<Vec<_>>();
        let annotations = annotations
            .iter()
            .map(|Annotation { span, label }| Level::Error.span(span.range()).label(label));

        let snippet = Snippet::source(self.0.as_ref())
            .fold(true)
            .annotations(annotations);
        let message = Level::Error.title(title).snippet(snippet);
        Renderer::plain().render(message).to_string()
    }
}

impl<S: Into<String>> From<S> for Source {
    fn from(source: S) -> Self {
        Self(source.into())
    }
}

/// An annotation on a source code snippet.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct Annotation {
    /// The byte range of the annotation.
    #[builder(into)]
    pub span: Span,

    /// The label of the annotation.
    #[builder(into, default = Annotation::DEFAULT_LABEL)]
    pub label: String,
}

impl Annotation {
    /// The default label for an annotation if created without a label.
    pub const DEFAULT_LABEL: &str = "matched pattern";
}

impl<S: Into<Span>, L: Into<String>> From<(S, L)> for Annotation {
    fn from((span, label): (S, L)) -> Self {
        Self {
            span: span.into(),
            label: label.into(),
        }
    }
}

impl<S: Into<Span>> From<S> for Annotation {
    fn from(span: S) -> Self {
        Self {
            span: span.into(),
            label: Self::DEFAULT_LABEL.into(),
        }
    }
}

/// A byte range in source content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder, Serialize)]
pub struct Span {
    /// Start byte offset.
    pub start: usize,

    /// End byte offset.
    pub end: usize,
}

impl Span {
    /// View the span as a `Range<usize>`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The 1-based line number on which this span starts within `content`.
    pub fn line_in(&self, content: &str) -> usize {
        let end = self.start.min(content.len());
        content.as_bytes()[..end]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

/// A match with capture groups for template interpolation.
///
/// Carries the location (span and line) and captured data from a regex
/// match, so messages can be interpolated and reported against a line.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize)]
pub struct Match {
    /// The byte range of the match.
    #[builder(into)]
    pub span: Span,

    /// The 1-based line on which the match starts.
    #[builder(default = 1)]
    pub line: usize,

    /// Captured groups from the regex match.
    ///
    /// Keys are `"0"`, `"1"`, `"2"` for positional captures,
    /// and the capture name for named captures.
    #[builder(default)]
    #[serde(skip_serializing_if = "Captures::is_empty")]
    pub captures: Captures,
}
