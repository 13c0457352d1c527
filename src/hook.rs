//! Agent hook protocol handling.
//!
//! The agent runtime sends one JSON record per tool invocation on stdin:
//!
//! ```json
//! {"tool_name": "Bash", "tool_input": {"command": "npm run build"}}
//! ```
//!
//! An allowed command produces no output. A blocked one produces
//! `{"decision": "block", "reason": "..."}` on stdout plus a human-readable
//! warning on stderr. The exit code is 0 either way.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, IsTerminal, Read, Write};

use crate::config::GeneralConfig;

/// Input record from the agent's pre-tool-use hook.
#[derive(Debug, Deserialize)]
pub struct HookInput {
    /// The name of the tool being invoked (e.g., "Bash", "Read", "Write").
    pub tool_name: Option<String>,

    /// Tool-specific input parameters.
    pub tool_input: Option<ToolInput>,
}

/// Tool-specific input containing the command to execute.
#[derive(Debug, Deserialize)]
pub struct ToolInput {
    /// The command string (for shell tools). Kept as a raw value so a
    /// non-string command is reported rather than rejected by serde.
    pub command: Option<serde_json::Value>,
}

/// Response written to stdout when a command is blocked.
#[derive(Debug, Serialize)]
pub struct HookOutput<'a> {
    /// Always "block".
    pub decision: &'static str,

    /// Human-readable explanation of the decision.
    pub reason: Cow<'a, str>,
}

impl<'a> HookOutput<'a> {
    #[must_use]
    pub fn block(reason: impl Into<Cow<'a, str>>) -> Self {
        Self {
            decision: "block",
            reason: reason.into(),
        }
    }
}

/// Error type for reading and parsing hook input.
#[derive(Debug, thiserror::Error)]
pub enum HookReadError {
    /// Failed to read from stdin.
    #[error("failed to read hook input: {0}")]
    Io(#[from] io::Error),
    /// Input exceeded the configured size limit.
    #[error("hook input exceeds {limit} bytes")]
    InputTooLarge { limit: usize },
    /// Failed to parse JSON input.
    #[error("hook input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the gate should do with one hook record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookRequest {
    /// Not a shell tool; pass through without output.
    Skip,
    /// A shell command to evaluate.
    Command(String),
    /// A shell-tool record without a usable command.
    Malformed(&'static str),
}

/// Read and parse hook input from stdin.
///
/// # Errors
///
/// See [`read_hook_input_from`].
pub fn read_hook_input(max_bytes: usize) -> Result<HookInput, HookReadError> {
    read_hook_input_from(io::stdin().lock(), max_bytes)
}

/// Read and parse one hook record from `reader`, refusing more than
/// `max_bytes`.
///
/// # Errors
///
/// Returns [`HookReadError::Io`] if the reader fails, [`HookReadError::Json`]
/// if the input is not valid hook JSON, or [`HookReadError::InputTooLarge`] if
/// the input exceeds `max_bytes`.
pub fn read_hook_input_from<R: Read>(
    reader: R,
    max_bytes: usize,
) -> Result<HookInput, HookReadError> {
    let mut input = Vec::with_capacity(256);
    // Read up to limit + 1 to detect overflow
    reader
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut input)?;

    if input.len() > max_bytes {
        return Err(HookReadError::InputTooLarge { limit: max_bytes });
    }

    Ok(serde_json::from_slice(&input)?)
}

/// Decide whether a parsed record carries a command to gate.
#[must_use]
pub fn classify_request(input: &HookInput, general: &GeneralConfig) -> HookRequest {
    let Some(tool_name) = input.tool_name.as_deref() else {
        return HookRequest::Malformed("missing tool_name");
    };
    if !general.is_shell_tool(tool_name) {
        return HookRequest::Skip;
    }

    let Some(tool_input) = input.tool_input.as_ref() else {
        return HookRequest::Malformed("missing tool_input");
    };
    match tool_input.command.as_ref() {
        Some(serde_json::Value::String(command)) => HookRequest::Command(command.clone()),
        Some(_) => HookRequest::Malformed("tool_input.command is not a string"),
        None => HookRequest::Malformed("missing tool_input.command"),
    }
}

/// Configure colored output from the `color` setting and TTY detection.
pub fn configure_colors(mode: &str) {
    match mode {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => {
            if !io::stderr().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

/// Print a boxed warning to stderr for human visibility.
pub fn print_colorful_warning(command: &str, reason: &str, rule: Option<&str>) {
    // Box width (content area, excluding border characters)
    const WIDTH: usize = 70;

    let stderr = io::stderr();
    let mut handle = stderr.lock();
    let side = "│".red();

    let _ = writeln!(handle);
    let _ = writeln!(handle, "{}{}{}", "╭".red(), "─".repeat(WIDTH).red(), "╮".red());

    let header = "  BLOCKED  agent-shell-gate";
    let _ = writeln!(
        handle,
        "{side}  {}  {}{}{side}",
        "BLOCKED".white().on_red().bold(),
        "agent-shell-gate".bright_black(),
        " ".repeat(WIDTH.saturating_sub(header.len() + 2)),
    );

    let _ = writeln!(
        handle,
        "{}{}{}",
        "├".red(),
        "─".repeat(WIDTH).red().dimmed(),
        "┤".red()
    );

    if let Some(rule) = rule {
        let line_len = "  Rule: ".len() + rule.len();
        let _ = writeln!(
            handle,
            "{side}  {} {}{}{side}",
            "Rule:".bright_black(),
            rule.yellow(),
            " ".repeat(WIDTH.saturating_sub(line_len)),
        );
    }

    // Reason section - wrap long reasons
    let reason_label = "  Reason: ";
    let wrapped = wrap_text(reason, WIDTH - reason_label.len() - 1);
    for (i, line) in wrapped.iter().enumerate() {
        let padding = " ".repeat(WIDTH.saturating_sub(reason_label.len() + line.chars().count()));
        if i == 0 {
            let _ = writeln!(
                handle,
                "{side}  {} {}{padding}{side}",
                "Reason:".yellow().bold(),
                line.white(),
            );
        } else {
            let indent = " ".repeat(reason_label.len());
            let _ = writeln!(handle, "{side}{indent}{}{padding}{side}", line.white());
        }
    }

    let display_cmd = truncate_for_display(command, 50);
    let cmd_line_len = "  Command: ".len() + display_cmd.chars().count();
    let _ = writeln!(
        handle,
        "{side}  {} {}{}{side}",
        "Command:".cyan().bold(),
        display_cmd.bright_white().bold(),
        " ".repeat(WIDTH.saturating_sub(cmd_line_len)),
    );

    let _ = writeln!(
        handle,
        "{}{}{}",
        "├".red(),
        "─".repeat(WIDTH).red().dimmed(),
        "┤".red()
    );

    let escaped = command.replace('\'', "'\\''");
    let explain = format!("asg test '{}'", truncate_for_display(&escaped, 45));
    let explain_len = "  Inspect: $ ".len() + explain.chars().count();
    let _ = writeln!(
        handle,
        "{side}  {} {} {}{}{side}",
        "Inspect:".bright_black(),
        "$".bright_black(),
        explain.cyan(),
        " ".repeat(WIDTH.saturating_sub(explain_len)),
    );

    let _ = writeln!(handle, "{}{}{}", "╰".red(), "─".repeat(WIDTH).red(), "╯".red());
    let _ = writeln!(handle);
}

/// Truncate to `max_chars` characters, ending in "..." when cut.
fn truncate_for_display(s: &str, max_chars: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_chars {
        return Cow::Borrowed(s);
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    Cow::Owned(format!("{kept}..."))
}

/// Greedy word wrap; always returns at least one line.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for word in text.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.chars().count() + 1 + word.chars().count() <= width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Write a block response to `out`.
///
/// # Errors
///
/// Returns serialization or I/O errors from writing to `out`.
pub fn write_block_response<W: Write>(mut out: W, reason: &str) -> io::Result<()> {
    serde_json::to_writer(&mut out, &HookOutput::block(reason))?;
    writeln!(out)?;
    out.flush()
}

/// Emit a block decision: JSON on stdout, boxed warning on stderr.
#[cold]
#[inline(never)]
pub fn output_block(command: &str, reason: &str, rule: Option<&str>) {
    print_colorful_warning(command, reason, rule);

    if let Err(e) = write_block_response(io::stdout().lock(), reason) {
        tracing::error!(error = %e, "failed to write hook response");
    }
}
