//! Command extraction: raw command string → ordered sub-commands.
//!
//! The extractor partitions a compound command on unquoted chain operators
//! and resolves each piece to a canonical executable name. Pieces it cannot
//! resolve safely are returned as markers instead of being dropped:
//!
//! - [`Extracted::Suspicious`] for substitution / `eval` indirection, which is
//!   never looked into;
//! - [`Extracted::Unparseable`] for text that does not tokenize.
//!
//! The only text that disappears is whitespace, the operators themselves and
//! segments made purely of `NAME=value` assignments (nothing executes there).

use memchr::memmem;
use std::fmt;
use std::ops::Range;

use crate::normalize::{self, TokenizeError, canonical_name, is_env_assignment};

/// A piece of the raw command between chain operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Trimmed segment text.
    pub text: &'a str,
    /// Byte range of `text` inside the raw command.
    pub byte_range: Range<usize>,
}

/// Kinds of indirection that make a segment impossible to judge statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspiciousKind {
    /// `$( ... )`
    CommandSubstitution,
    /// `` `...` ``
    Backtick,
    /// `<( ... )` or `>( ... )`
    ProcessSubstitution,
    /// An `eval` word.
    Eval,
}

impl SuspiciousKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CommandSubstitution => "command substitution",
            Self::Backtick => "backtick substitution",
            Self::ProcessSubstitution => "process substitution",
            Self::Eval => "eval",
        }
    }
}

impl fmt::Display for SuspiciousKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A segment that was resolved to a concrete executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand<'a> {
    /// Canonical executable name (final path component of the command word).
    pub executable: String,
    /// The segment exactly as written, assignments included.
    pub raw_segment: &'a str,
    /// Dequoted words starting at the command word (`words[0]`).
    pub words: Vec<String>,
}

impl ResolvedCommand<'_> {
    /// The command word as written after quote removal (`./init.sh`,
    /// `/usr/bin/node`, `git`).
    #[must_use]
    pub fn command_word(&self) -> &str {
        self.words.first().map_or("", String::as_str)
    }

    /// Arguments following the command word.
    #[must_use]
    pub fn args(&self) -> &[String] {
        self.words.get(1..).unwrap_or_default()
    }
}

/// A segment that contains indirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspiciousConstruct<'a> {
    pub kind: SuspiciousKind,
    pub raw_segment: &'a str,
}

/// One element of the extractor's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted<'a> {
    Command(ResolvedCommand<'a>),
    Suspicious(SuspiciousConstruct<'a>),
    Unparseable {
        raw_segment: &'a str,
        error: TokenizeError,
    },
}

impl<'a> Extracted<'a> {
    /// The segment text this element was derived from.
    #[must_use]
    pub fn raw_segment(&self) -> &'a str {
        match self {
            Self::Command(cmd) => cmd.raw_segment,
            Self::Suspicious(s) => s.raw_segment,
            Self::Unparseable { raw_segment, .. } => *raw_segment,
        }
    }
}

/// Split a raw command on unquoted chain operators.
///
/// Separators are `&&`, `||`, `;`, `|`, a lone `&` and newline. An `&` that
/// belongs to a redirection (`2>&1`, `<&3`, `&>`, `&>>`) does not separate.
/// Quotes and backslash escapes suppress splitting. An unterminated quote swallows the
/// remainder into the current segment; tokenizing that segment later fails.
#[must_use]
pub fn split_segments(command: &str) -> Vec<Segment<'_>> {
    let bytes = command.as_bytes();
    let len = bytes.len();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;
    // Set right after an unquoted, unescaped `>` or `<`.
    let mut after_redirect = false;

    while i < len {
        let b = bytes[i];

        if in_single {
            if b == b'\'' {
                in_single = false;
            }
            after_redirect = false;
            i += 1;
            continue;
        }

        if b == b'\\' {
            after_redirect = false;
            i = (i + 2).min(len);
            continue;
        }

        if in_double {
            if b == b'"' {
                in_double = false;
            }
            after_redirect = false;
            i += 1;
            continue;
        }

        let op_len = match b {
            b'\'' => {
                in_single = true;
                0
            }
            b'"' => {
                in_double = true;
                0
            }
            b';' | b'\n' => 1,
            b'|' | b'&' if bytes.get(i + 1) == Some(&b) => 2,
            b'&' if after_redirect || bytes.get(i + 1) == Some(&b'>') => 0,
            b'|' | b'&' => 1,
            _ => 0,
        };
        after_redirect = matches!(b, b'>' | b'<');

        if op_len > 0 {
            push_segment(command, start, i, &mut segments);
            i += op_len;
            start = i;
        } else {
            i += 1;
        }
    }

    push_segment(command, start, len, &mut segments);
    segments
}

fn push_segment<'a>(command: &'a str, start: usize, end: usize, out: &mut Vec<Segment<'a>>) {
    let piece = &command[start..end];
    let text = piece.trim();
    if text.is_empty() {
        return;
    }
    let offset = start + (piece.len() - piece.trim_start().len());
    out.push(Segment {
        text,
        byte_range: offset..offset + text.len(),
    });
}

/// Detect indirection in a segment without interpreting it.
///
/// Substitution markers are matched anywhere in the text, quoted or not.
#[must_use]
pub fn detect_suspicious(segment: &str) -> Option<SuspiciousKind> {
    let bytes = segment.as_bytes();

    if memmem::find(bytes, b"$(").is_some() {
        return Some(SuspiciousKind::CommandSubstitution);
    }
    if memchr::memchr(b'`', bytes).is_some() {
        return Some(SuspiciousKind::Backtick);
    }
    if memmem::find(bytes, b"<(").is_some() || memmem::find(bytes, b">(").is_some() {
        return Some(SuspiciousKind::ProcessSubstitution);
    }
    if segment
        .split_whitespace()
        .map(|w| w.trim_matches(|c| matches!(c, '"' | '\'' | '\\' | '(' | ')' | '{' | '}')))
        .any(|w| canonical_name(w) == "eval")
    {
        return Some(SuspiciousKind::Eval);
    }

    None
}

/// Resolve one segment.
///
/// Returns `None` when the segment is nothing but assignments.
#[must_use]
pub fn resolve_segment(segment: &str) -> Option<Extracted<'_>> {
    if let Some(kind) = detect_suspicious(segment) {
        return Some(Extracted::Suspicious(SuspiciousConstruct {
            kind,
            raw_segment: segment,
        }));
    }

    let words = match normalize::tokenize_words(segment) {
        Ok(words) => words,
        Err(error) => {
            return Some(Extracted::Unparseable {
                raw_segment: segment,
                error,
            });
        }
    };

    let first_command = words.iter().position(|w| !is_env_assignment(w.raw))?;
    let words: Vec<String> = words[first_command..]
        .iter()
        .map(|w| w.unquoted().into_owned())
        .collect();
    let executable = canonical_name(&words[0]).to_string();

    Some(Extracted::Command(ResolvedCommand {
        executable,
        raw_segment: segment,
        words,
    }))
}

/// Split and resolve a raw command into its ordered sub-commands.
#[must_use]
pub fn extract_commands(command: &str) -> Vec<Extracted<'_>> {
    split_segments(command)
        .into_iter()
        .filter_map(|segment| resolve_segment(segment.text))
        .collect()
}

/// Canonical executable names only, in order. Markers are skipped.
#[must_use]
pub fn executable_names(command: &str) -> Vec<String> {
    extract_commands(command)
        .into_iter()
        .filter_map(|e| match e {
            Extracted::Command(cmd) => Some(cmd.executable),
            _ => None,
        })
        .collect()
}
