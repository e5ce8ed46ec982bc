use std::io::Write;

use chat_stream::{Content, RenderTarget, ResponseMetrics};
use tracing::{debug, warn};

/// Render target that streams plain text to a terminal writer.
///
/// Every update carries the whole accumulated text; only the part not yet on
/// screen is written. A rewrite that does not extend the printed text starts
/// over on a fresh line.
#[derive(Debug)]
pub struct TerminalTarget<W: Write> {
    out: W,
    printed: String,
}

impl<W: Write> TerminalTarget<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: String::new(),
        }
    }

    pub fn printed(&self) -> &str {
        &self.printed
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(error) = result {
            warn!(%error, "terminal write failed");
        }
    }
}

impl<W: Write> RenderTarget for TerminalTarget<W> {
    fn set_content(&mut self, content: Content<'_>) {
        match content {
            Content::Text(text) => {
                let suffix = text.strip_prefix(self.printed.as_str());
                match suffix {
                    Some(suffix) => {
                        self.write(suffix);
                        self.printed.push_str(suffix);
                    }
                    None => {
                        self.write("\n");
                        self.write(text);
                        self.printed = text.to_owned();
                    }
                }
            }
            Content::Html(html) => {
                debug!(bytes = html.len(), "final html render not shown in terminal");
            }
        }
    }

    fn annotate_metrics(&mut self, metrics: &ResponseMetrics) {
        if let Some(annotation) = metrics.annotation() {
            self.write(&format!("\n[{annotation}]"));
        }
    }
}
