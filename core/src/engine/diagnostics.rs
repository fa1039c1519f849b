//! Error log kept per session
//!
//! Holds the text of the most recent error and an accumulated log of errors and
//! warnings that the host can read (and clear) through the query surface.

use super::errors::ScriptError;

#[derive(Debug, Default, Clone)]
pub struct DiagnosticLog {
    last_error: String,
    log: Vec<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, err: &ScriptError) {
        let text = err.to_string();
        tracing::error!(kind = ?err.kind(), "{}", text);
        self.log.push(text.clone());
        self.last_error = text;
    }

    /// Soft warning; does not replace the last error text.
    pub fn record_warning(&mut self, text: impl Into<String>) {
        let text = format!("Warning: {}", text.into());
        tracing::warn!("{}", text);
        self.log.push(text);
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Log lines joined with newlines, optionally clearing them.
    pub fn current_log(&mut self, clear: bool) -> String {
        let text = self.log.join("\n");
        if clear {
            self.log.clear();
        }
        text
    }

    pub fn entries(&self) -> &[String] {
        &self.log
    }
}
