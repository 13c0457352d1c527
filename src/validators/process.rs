//! Process-management rule (`pkill` by default).
//!
//! The agent may stop its own dev servers and nothing else. A target is a
//! regular expression to `pkill`, so it must equal a configured dev process
//! exactly. With `-f` the pattern is a command line (`'node server.js'`): its
//! first word must be a dev process (bare or as a plain path) and the rest
//! may not carry operators that widen the match. Options that invert or
//! otherwise change which processes match are rejected.

use crate::extract::ResolvedCommand;
use crate::normalize::canonical_name;
use crate::policy::Policy;

/// Long options that take no value.
const BOOLEAN_LONG_FLAGS: &[&str] = &[
    "--full",
    "--exact",
    "--ignore-case",
    "--newest",
    "--oldest",
];

/// Short flags that take no value.
const BOOLEAN_SHORT_FLAGS: &[u8] = b"fxino";

/// Characters that make a target match more than its literal text.
const REGEX_METACHARACTERS: &[char] = &[
    '.', '|', '*', '+', '?', '[', ']', '(', ')', '{', '}', '^', '$', '\\',
];

/// Options whose value narrows the match (by user), allowed with a value.
const VALUE_FLAGS: &[&str] = &["-u", "-U", "--euid", "--uid", "--signal"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessViolation {
    #[error("{0} requires a process name to target")]
    MissingTarget(String),
    #[error("disallowed process target '{target}' for {manager}; allowed: {allowed}")]
    DisallowedTarget {
        manager: String,
        target: String,
        allowed: String,
    },
    #[error("{manager} option '{option}' is not allowed")]
    DisallowedOption { manager: String, option: String },
}

/// Validate a process-management invocation.
///
/// # Errors
///
/// Returns the first [`ProcessViolation`] found.
pub fn validate_process_targets(
    command: &ResolvedCommand<'_>,
    policy: &Policy,
) -> Result<(), ProcessViolation> {
    let manager = &command.executable;
    let Targets { patterns, full } = collect_targets(manager, command.args())?;

    if patterns.is_empty() {
        return Err(ProcessViolation::MissingTarget(manager.clone()));
    }

    for target in patterns {
        if !names_dev_process(target, full, policy) {
            return Err(ProcessViolation::DisallowedTarget {
                manager: manager.clone(),
                target: target.to_string(),
                allowed: policy.dev_processes().collect::<Vec<_>>().join(", "),
            });
        }
    }

    Ok(())
}

/// Whether `target` can only match configured dev processes.
fn names_dev_process(target: &str, full: bool, policy: &Policy) -> bool {
    if policy.is_dev_process(target) {
        return true;
    }
    if !full {
        return false;
    }

    let mut words = target.split_whitespace();
    let Some(process) = words.next() else {
        return false;
    };
    if process.contains(REGEX_METACHARACTERS)
        || !policy.is_dev_process(canonical_name(process))
    {
        return false;
    }
    // A dot in the remaining words still matches a single character, so file
    // names like `server.js` stay usable.
    words.all(|word| !word.contains(|c: char| c != '.' && REGEX_METACHARACTERS.contains(&c)))
}

/// Target patterns and whether they match the full command line (`-f`).
struct Targets<'a> {
    patterns: Vec<&'a str>,
    full: bool,
}

fn collect_targets<'a>(
    manager: &str,
    args: &'a [String],
) -> Result<Targets<'a>, ProcessViolation> {
    let mut patterns = Vec::new();
    let mut full = false;
    let mut iter = args.iter();
    let mut options_ended = false;

    while let Some(arg) = iter.next() {
        if options_ended || !arg.starts_with('-') || arg == "-" {
            patterns.push(arg.as_str());
            continue;
        }
        if arg == "--" {
            options_ended = true;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            // The value is a user or signal name, not a target.
            iter.next();
            continue;
        }
        if is_allowed_flag(arg) {
            full |= arg == "--full" || is_short_cluster_with(arg, b'f');
            continue;
        }
        return Err(ProcessViolation::DisallowedOption {
            manager: manager.to_string(),
            option: arg.clone(),
        });
    }

    Ok(Targets { patterns, full })
}

fn is_short_cluster_with(arg: &str, flag: u8) -> bool {
    !arg.starts_with("--")
        && arg.len() > 1
        && arg[1..].bytes().all(|b| BOOLEAN_SHORT_FLAGS.contains(&b))
        && arg.bytes().any(|b| b == flag)
}

fn is_allowed_flag(arg: &str) -> bool {
    if let Some(long) = arg.strip_prefix("--") {
        return BOOLEAN_LONG_FLAGS.contains(&arg) || long.starts_with("signal=");
    }
    let short = &arg[1..];
    // Signal forms: -9, -KILL, -SIGTERM, -USR1
    let is_signal_number = short.bytes().all(|b| b.is_ascii_digit());
    let is_signal_name = short.len() >= 2
        && short.starts_with(|c: char| c.is_ascii_uppercase())
        && short
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if is_signal_number || is_signal_name {
        return true;
    }
    short.bytes().all(|b| BOOLEAN_SHORT_FLAGS.contains(&b))
}
