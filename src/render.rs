//! Render-target seam and the full-buffer formatting transform.
//!
//! Formatting is not incrementally composable (an unclosed code fence or list
//! changes how everything before it renders), so the controller always hands
//! the whole accumulated text to the formatter.

use crate::events::ResponseMetrics;

/// Content written into a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content<'a> {
    Text(&'a str),
    Html(&'a str),
}

impl<'a> Content<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Text(value) | Self::Html(value) => value,
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html(_))
    }
}

/// Where a session writes its visible output.
pub trait RenderTarget {
    /// Replace the visible content.
    fn set_content(&mut self, content: Content<'_>);

    /// Attach reported performance metrics next to the content.
    fn annotate_metrics(&mut self, metrics: &ResponseMetrics) {
        let _ = metrics;
    }
}

impl<T: RenderTarget + ?Sized> RenderTarget for &mut T {
    fn set_content(&mut self, content: Content<'_>) {
        (**self).set_content(content);
    }

    fn annotate_metrics(&mut self, metrics: &ResponseMetrics) {
        (**self).annotate_metrics(metrics);
    }
}

/// Output of a formatter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Text(String),
    Html(String),
}

impl Rendered {
    pub fn as_content(&self) -> Content<'_> {
        match self {
            Self::Text(value) => Content::Text(value),
            Self::Html(value) => Content::Html(value),
        }
    }
}

/// Whole-buffer transform from accumulated assistant text to displayable output.
pub trait ContentFormatter: Send + Sync {
    fn format(&self, accumulated: &str) -> Rendered;
}

/// CommonMark to HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

impl ContentFormatter for MarkdownFormatter {
    fn format(&self, accumulated: &str) -> Rendered {
        Rendered::Html(markdown::to_html(accumulated))
    }
}

/// Identity transform for targets that display raw text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextFormatter;

impl ContentFormatter for PlainTextFormatter {
    fn format(&self, accumulated: &str) -> Rendered {
        Rendered::Text(accumulated.to_owned())
    }
}

/// In-memory render target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlBuffer {
    content: String,
    is_html: bool,
    metrics: Option<ResponseMetrics>,
    writes: usize,
}

impl HtmlBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_html(&self) -> bool {
        self.is_html
    }

    pub fn metrics(&self) -> Option<&ResponseMetrics> {
        self.metrics.as_ref()
    }

    /// Number of `set_content` calls received.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl RenderTarget for HtmlBuffer {
    fn set_content(&mut self, content: Content<'_>) {
        self.content.clear();
        self.content.push_str(content.as_str());
        self.is_html = content.is_html();
        self.writes += 1;
    }

    fn annotate_metrics(&mut self, metrics: &ResponseMetrics) {
        self.metrics = Some(metrics.clone());
    }
}
