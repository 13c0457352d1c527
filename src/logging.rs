//! Structured logging for allow/block decisions.
//!
//! Two channels live here:
//!
//! - [`init_diagnostics`] installs the `tracing` subscriber used for
//!   diagnostics. It always writes to stderr because stdout carries the hook
//!   response.
//! - [`DecisionLogger`] appends one line per decision to an optional file, as
//!   text or JSON, with optional redaction of arguments.
//!
//! Failing to write a log line never changes a decision.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::evaluator::{EvaluationResult, Verdict};
use crate::normalize::tokenize_words;

/// Environment variable holding an `EnvFilter` directive for diagnostics.
pub const LOG_FILTER_ENV: &str = "ASG_LOG";

// ============================================================================
// Configuration Types
// ============================================================================

/// Decision log configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the decision log is enabled.
    pub enabled: bool,
    /// Path to log file. Supports ~ expansion.
    pub file: Option<String>,
    /// Output format: "text" or "json".
    pub format: LogFormat,
    /// Redaction settings.
    pub redaction: RedactionConfig,
    /// Events to log.
    pub events: LogEventFilter,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Redaction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub mode: RedactionMode,
    pub max_argument_len: usize,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: RedactionMode::Arguments,
            max_argument_len: 50,
        }
    }
}

/// Redaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    None,
    /// Truncate long words, keep the command shape.
    #[default]
    Arguments,
    Full,
}

/// Which decisions reach the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEventFilter {
    pub block: bool,
    pub allow: bool,
}

impl Default for LogEventFilter {
    fn default() -> Self {
        Self {
            block: true,
            allow: false,
        }
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Install the stderr `tracing` subscriber.
///
/// `ASG_LOG` takes precedence; otherwise the level is `warn`, or `debug` when
/// `verbose` is set. Calling this twice is harmless.
pub fn init_diagnostics(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "agent_shell_gate={default_level},asg={default_level}"
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

// ============================================================================
// Log Entry
// ============================================================================

/// A structured log entry for one decision.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub decision: Verdict,
    pub command: String,
    pub executables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LogEntry {
    /// Create a new log entry from an evaluation result.
    #[must_use]
    pub fn from_result(
        result: &EvaluationResult,
        command: &str,
        redaction: &RedactionConfig,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            decision: result.verdict,
            command: redact_command(command, redaction),
            executables: result
                .segments
                .iter()
                .filter_map(|s| s.executable.clone())
                .collect(),
            rule: result.reason.as_ref().map(crate::evaluator::BlockReason::rule),
            reason: result.reason_text(),
        }
    }

    /// Format as text log line.
    #[must_use]
    pub fn format_text(&self) -> String {
        let mut line = format!(
            "[{}] {} \"{}\"",
            self.timestamp,
            self.decision.as_str().to_uppercase(),
            self.command
        );
        if let Some(rule) = self.rule {
            line.push_str(&format!(" [{rule}]"));
        }
        if let Some(ref reason) = self.reason {
            line.push_str(&format!(" -- {reason}"));
        }
        line
    }

    /// Format as JSON line.
    #[must_use]
    pub fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// Logger
// ============================================================================

/// Append-only decision log.
pub struct DecisionLogger {
    config: LoggingConfig,
    writer: Mutex<BufWriter<File>>,
}

impl DecisionLogger {
    /// Open the configured log file.
    ///
    /// Returns `None` when logging is disabled, no file is set, or the file
    /// cannot be opened (the latter with a warning).
    #[must_use]
    pub fn new(config: &LoggingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let path = expand_tilde(config.file.as_deref()?);
        match open_log_file(&path) {
            Ok(file) => Some(Self {
                config: config.clone(),
                writer: Mutex::new(BufWriter::new(file)),
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "decision log unavailable");
                None
            }
        }
    }

    /// Log an evaluation result if the event filter selects it.
    pub fn log(&self, result: &EvaluationResult, command: &str) {
        if !self.should_log(result) {
            return;
        }
        let entry = LogEntry::from_result(result, command, &self.config.redaction);
        let line = match self.config.format {
            LogFormat::Text => entry.format_text(),
            LogFormat::Json => entry.format_json(),
        };
        if let Ok(mut w) = self.writer.lock() {
            if let Err(e) = writeln!(w, "{line}").and_then(|()| w.flush()) {
                tracing::warn!(error = %e, "failed to write decision log");
            }
        }
    }

    const fn should_log(&self, result: &EvaluationResult) -> bool {
        match result.verdict {
            Verdict::Allow => self.config.events.allow,
            Verdict::Block => self.config.events.block,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Apply the configured redaction to a command before it is written out.
#[must_use]
pub fn redact_command(command: &str, config: &RedactionConfig) -> String {
    if !config.enabled {
        return command.to_string();
    }
    match config.mode {
        RedactionMode::None => command.to_string(),
        RedactionMode::Full => "[REDACTED]".to_string(),
        RedactionMode::Arguments => redact_arguments(command, config.max_argument_len),
    }
}

/// Truncate every word longer than `max_len` characters, keeping the text
/// between words intact. Text that does not tokenize is fully redacted.
fn redact_arguments(command: &str, max_len: usize) -> String {
    let Ok(words) = tokenize_words(command) else {
        return "[REDACTED]".to_string();
    };

    let mut out = String::with_capacity(command.len());
    let mut cursor = 0;
    for word in &words {
        out.push_str(&command[cursor..word.byte_range.start]);
        match word.raw.char_indices().nth(max_len) {
            Some((cut, _)) => {
                out.push_str(&word.raw[..cut]);
                out.push_str("...");
            }
            None => out.push_str(word.raw),
        }
        cursor = word.byte_range.end;
    }
    out.push_str(&command[cursor..]);
    out
}
