//! Decision aggregator: one raw command in, one verdict out.
//!
//! # Pipeline
//!
//! 1. **Size limit** - oversized input is blocked without being scanned
//! 2. **Block overrides** - operator-configured regexes over the raw text
//! 3. **Extraction** - split on chain operators, resolve executables
//! 4. **Classification** - each command is tagged once as a [`CommandKind`]
//! 5. **Dispatch** - chmod / init-script / process-management validators or
//!    the plain allowlist; inline `sh -c` scripts are evaluated recursively
//! 6. **Aggregation** - allow only if every sub-command is allowed
//!
//! The evaluator is a pure function of its inputs. It does no I/O and keeps
//! no state, so evaluating the same command twice yields the same result.
//!
//! # Example
//!
//! ```
//! use agent_shell_gate::evaluator::evaluate_command;
//! use agent_shell_gate::policy::Policy;
//!
//! let policy = Policy::default();
//! assert!(evaluate_command("chmod +x init.sh && ./init.sh", &policy).is_allowed());
//! assert!(evaluate_command("./setup.sh", &policy).is_blocked());
//! ```

use serde::Serialize;
use std::fmt;

use crate::extract::{Extracted, ResolvedCommand, SuspiciousKind, extract_commands};
use crate::normalize::TokenizeError;
use crate::policy::Policy;
use crate::validators::{
    ChmodViolation, InitScriptViolation, ProcessViolation, references_init_script, validate_chmod,
    validate_init_script, validate_process_targets,
};

/// Final allow/block verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Block,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

/// Which rule judges a resolved command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    General,
    Chmod,
    InitScript,
    ProcessManagement,
}

impl CommandKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::General => "allowlist",
            Self::Chmod => "chmod",
            Self::InitScript => "init-script",
            Self::ProcessManagement => "process-management",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a command was blocked. `Display` is the user-visible reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockReason {
    #[error("command is {len} bytes, over the {limit}-byte limit")]
    TooLarge { len: usize, limit: usize },
    #[error("blocked by policy override: {0}")]
    Override(String),
    #[error("could not parse command for security validation")]
    NoCommands,
    #[error("could not parse command for security validation ({0})")]
    Unparseable(TokenizeError),
    #[error("indirect/obfuscated invocation ({0}) is not allowed")]
    Suspicious(SuspiciousKind),
    #[error("command '{0}' is not in the allowlist")]
    NotAllowlisted(String),
    #[error(transparent)]
    Chmod(#[from] ChmodViolation),
    #[error(transparent)]
    InitScript(#[from] InitScriptViolation),
    #[error(transparent)]
    Process(#[from] ProcessViolation),
    #[error("inline shell script blocked: {0}")]
    InlineScript(Box<BlockReason>),
    #[error("shell scripts nested more than {0} levels deep are not allowed")]
    NestingTooDeep(usize),
    #[error("'{0}' reading commands from stdin cannot be inspected")]
    StdinScript(String),
}

impl BlockReason {
    /// Short stable identifier for logs and JSON output.
    #[must_use]
    pub const fn rule(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "size-limit",
            Self::Override(_) => "override",
            Self::NoCommands | Self::Unparseable(_) => "unparseable",
            Self::Suspicious(_) => "suspicious",
            Self::NotAllowlisted(_) => "allowlist",
            Self::Chmod(_) => "chmod",
            Self::InitScript(_) => "init-script",
            Self::Process(_) => "process-target",
            Self::InlineScript(_) => "inline-script",
            Self::NestingTooDeep(_) => "nesting",
            Self::StdinScript(_) => "stdin-script",
        }
    }
}

/// Verdict for one extracted segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentVerdict {
    pub segment: String,
    /// Canonical executable, when the segment resolved to one.
    pub executable: Option<String>,
    /// Rule that judged the segment, when it resolved to a command.
    pub kind: Option<CommandKind>,
    /// `None` means the segment was allowed.
    pub block: Option<BlockReason>,
}

impl SegmentVerdict {
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        if self.block.is_some() {
            Verdict::Block
        } else {
            Verdict::Allow
        }
    }
}

/// Result of evaluating one raw command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    /// Reason for the block: the first suspicious construct if any, otherwise
    /// the first failing segment.
    pub reason: Option<BlockReason>,
    /// Per-segment verdicts in input order.
    pub segments: Vec<SegmentVerdict>,
}

impl EvaluationResult {
    fn blocked(reason: BlockReason, segments: Vec<SegmentVerdict>) -> Self {
        Self {
            verdict: Verdict::Block,
            reason: Some(reason),
            segments,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    #[inline]
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Block
    }

    /// Rendered block reason.
    #[must_use]
    pub fn reason_text(&self) -> Option<String> {
        self.reason.as_ref().map(ToString::to_string)
    }

    /// Every failing segment's reason, in order.
    pub fn block_reasons(&self) -> impl Iterator<Item = &BlockReason> {
        self.segments.iter().filter_map(|s| s.block.as_ref())
    }
}

/// Tag a resolved command with the rule that judges it.
#[must_use]
pub fn classify(command: &ResolvedCommand<'_>, policy: &Policy) -> CommandKind {
    if command.executable == "chmod" {
        CommandKind::Chmod
    } else if references_init_script(command, policy) {
        CommandKind::InitScript
    } else if policy.is_process_manager(&command.executable) {
        CommandKind::ProcessManagement
    } else {
        CommandKind::General
    }
}

/// Evaluate a raw command against a policy.
#[must_use]
pub fn evaluate_command(command: &str, policy: &Policy) -> EvaluationResult {
    evaluate_at_depth(command, policy, 0)
}

fn evaluate_at_depth(command: &str, policy: &Policy, depth: usize) -> EvaluationResult {
    if command.len() > policy.max_command_bytes() {
        return EvaluationResult::blocked(
            BlockReason::TooLarge {
                len: command.len(),
                limit: policy.max_command_bytes(),
            },
            Vec::new(),
        );
    }

    if let Some(pattern) = policy.matching_block_pattern(command) {
        return EvaluationResult::blocked(
            BlockReason::Override(pattern.reason.clone()),
            Vec::new(),
        );
    }

    let extracted = extract_commands(command);
    if extracted.is_empty() {
        return EvaluationResult::blocked(BlockReason::NoCommands, Vec::new());
    }

    let last = extracted.len() - 1;
    let segments: Vec<SegmentVerdict> = extracted
        .iter()
        .enumerate()
        .map(|(index, item)| judge_segment(item, policy, depth, index < last))
        .collect();

    let suspicious = segments
        .iter()
        .filter_map(|s| s.block.as_ref())
        .find(|r| matches!(r, BlockReason::Suspicious(_)));
    let reason = suspicious
        .or_else(|| segments.iter().find_map(|s| s.block.as_ref()))
        .cloned();

    match reason {
        Some(reason) => EvaluationResult::blocked(reason, segments),
        None => EvaluationResult {
            verdict: Verdict::Allow,
            reason: None,
            segments,
        },
    }
}

fn judge_segment(
    item: &Extracted<'_>,
    policy: &Policy,
    depth: usize,
    followed: bool,
) -> SegmentVerdict {
    let verdict = match item {
        Extracted::Suspicious(construct) => SegmentVerdict {
            segment: construct.raw_segment.to_string(),
            executable: None,
            kind: None,
            block: Some(BlockReason::Suspicious(construct.kind)),
        },
        Extracted::Unparseable { raw_segment, error } => SegmentVerdict {
            segment: (*raw_segment).to_string(),
            executable: None,
            kind: None,
            block: Some(BlockReason::Unparseable(*error)),
        },
        Extracted::Command(command) => {
            let kind = classify(command, policy);
            SegmentVerdict {
                segment: command.raw_segment.to_string(),
                executable: Some(command.executable.clone()),
                kind: Some(kind),
                block: judge_command(command, kind, policy, depth, followed).err(),
            }
        }
    };

    tracing::debug!(
        segment = %verdict.segment,
        executable = verdict.executable.as_deref().unwrap_or("-"),
        kind = verdict.kind.map_or("-", CommandKind::label),
        verdict = verdict.verdict().as_str(),
        "segment judged"
    );

    verdict
}

fn judge_command(
    command: &ResolvedCommand<'_>,
    kind: CommandKind,
    policy: &Policy,
    depth: usize,
    followed: bool,
) -> Result<(), BlockReason> {
    match kind {
        CommandKind::Chmod => Ok(validate_chmod(command)?),
        CommandKind::InitScript => {
            validate_init_script(command, policy)?;
            if followed {
                return Err(InitScriptViolation::FollowedByCommand.into());
            }
            Ok(())
        }
        CommandKind::ProcessManagement => Ok(validate_process_targets(command, policy)?),
        CommandKind::General => {
            if !policy.is_allowed(&command.executable) {
                return Err(BlockReason::NotAllowlisted(command.executable.clone()));
            }
            if policy.is_shell_interpreter(&command.executable) {
                if let Some(script) = inline_script(command.args()) {
                    return judge_inline_script(script, policy, depth);
                }
                if reads_script_from_stdin(command.args()) {
                    return Err(BlockReason::StdinScript(command.executable.clone()));
                }
            }
            Ok(())
        }
    }
}

fn judge_inline_script(script: &str, policy: &Policy, depth: usize) -> Result<(), BlockReason> {
    if depth >= policy.max_shell_depth() {
        return Err(BlockReason::NestingTooDeep(policy.max_shell_depth()));
    }
    let inner = evaluate_at_depth(script, policy, depth + 1);
    match inner.reason {
        Some(reason) => Err(BlockReason::InlineScript(Box::new(reason))),
        None => Ok(()),
    }
}

/// The `-c` argument of a shell invocation (`bash -c '...'`, `sh -ec '...'`).
///
/// Any short-option cluster containing `c` counts, wherever it appears, so
/// `bash -o pipefail -c '...'` is still inspected. A trailing `-c` with no
/// script yields the empty string, which evaluates to a block.
fn inline_script(args: &[String]) -> Option<&str> {
    let position = args.iter().position(|arg| {
        arg.strip_prefix('-')
            .is_some_and(|flags| !flags.starts_with('-') && flags.contains('c'))
    })?;
    Some(args.get(position + 1).map_or("", String::as_str))
}

/// Whether a shell invocation takes its script from stdin (`curl ... | sh`,
/// `bash -s`): no script operand, or an `s` in a short-option cluster.
fn reads_script_from_stdin(args: &[String]) -> bool {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--" => return iter.next().is_none(),
            "--version" | "--help" => return false,
            "-o" | "+o" | "-O" | "+O" | "--rcfile" | "--init-file" => {
                iter.next();
            }
            long if long.starts_with("--") => {}
            flags if flags.starts_with('-') || flags.starts_with('+') => {
                if flags.contains('s') {
                    return true;
                }
            }
            _ => return false,
        }
    }
    true
}
