//! Word-level shell grammar used by the command extractor.
//!
//! This is deliberately not a shell parser. It only knows enough to:
//!
//! - split a segment into words while honoring single quotes, double quotes
//!   and backslash escapes;
//! - recognize leading `NAME=value` assignment words;
//! - remove quoting from a word;
//! - reduce a command word to its canonical executable name.
//!
//! Anything it cannot tokenize (an unterminated quote) is reported as an
//! error so the caller can block instead of guessing.

use smallvec::SmallVec;
use std::borrow::Cow;
use std::ops::Range;

/// A single shell word, borrowed from the segment it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word<'a> {
    /// The word exactly as written (quotes and escapes intact).
    pub raw: &'a str,
    /// Byte range of the word inside its segment.
    pub byte_range: Range<usize>,
}

impl Word<'_> {
    /// The word with quoting removed.
    #[must_use]
    pub fn unquoted(&self) -> Cow<'_, str> {
        dequote(self.raw)
    }
}

pub type Words<'a> = SmallVec<[Word<'a>; 8]>;

/// Why a segment could not be split into words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("unterminated single quote")]
    UnterminatedSingleQuote,
    #[error("unterminated double quote")]
    UnterminatedDoubleQuote,
    #[error("dangling escape at end of input")]
    DanglingEscape,
}

/// Split a segment into words.
///
/// `(` and `)` are emitted as standalone words so a subshell such as
/// `(rm -rf /)` surfaces `(` as its command word rather than hiding `rm`
/// behind it.
///
/// # Errors
///
/// Returns a [`TokenizeError`] when a quote is left open or the segment ends
/// with a lone backslash.
pub fn tokenize_words(segment: &str) -> Result<Words<'_>, TokenizeError> {
    let bytes = segment.as_bytes();
    let len = bytes.len();
    let mut words = Words::new();
    let mut i = 0;

    while i < len {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            break;
        }

        if matches!(bytes[i], b'(' | b')') {
            words.push(Word {
                raw: &segment[i..=i],
                byte_range: i..i + 1,
            });
            i += 1;
            continue;
        }

        let start = i;
        i = consume_word_token(bytes, i, len)?;
        words.push(Word {
            raw: &segment[start..i],
            byte_range: start..i,
        });
    }

    Ok(words)
}

/// Advance past one word starting at `i`, returning the index just after it.
///
/// Stops at unquoted whitespace, `(` or `)`. Quote and escape handling mirrors
/// POSIX: nothing is special inside single quotes, and inside double quotes
/// only `\` escapes.
///
/// # Errors
///
/// Returns a [`TokenizeError`] on an open quote or trailing backslash.
pub fn consume_word_token(bytes: &[u8], mut i: usize, len: usize) -> Result<usize, TokenizeError> {
    while i < len {
        match bytes[i] {
            b if b.is_ascii_whitespace() => break,
            b'(' | b')' => break,
            b'\\' => {
                if i + 1 >= len {
                    return Err(TokenizeError::DanglingEscape);
                }
                i += 2;
            }
            b'\'' => {
                i += 1;
                while i < len && bytes[i] != b'\'' {
                    i += 1;
                }
                if i >= len {
                    return Err(TokenizeError::UnterminatedSingleQuote);
                }
                i += 1;
            }
            b'"' => {
                i += 1;
                loop {
                    if i >= len {
                        return Err(TokenizeError::UnterminatedDoubleQuote);
                    }
                    match bytes[i] {
                        b'"' => {
                            i += 1;
                            break;
                        }
                        b'\\' => i = (i + 2).min(len),
                        _ => i += 1,
                    }
                }
            }
            _ => i += 1,
        }
    }

    Ok(i)
}

/// Remove shell quoting from a single word.
///
/// Returns the input unchanged (borrowed) when it contains no quoting.
#[must_use]
pub fn dequote(word: &str) -> Cow<'_, str> {
    if !word.contains(['\'', '"', '\\']) {
        return Cow::Borrowed(word);
    }

    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '\\' if !in_single => match chars.next() {
                // Line continuation disappears entirely.
                Some('\n') => {}
                Some(next) if in_double && !matches!(next, '"' | '\\' | '$' | '`') => {
                    out.push('\\');
                    out.push(next);
                }
                Some(next) => out.push(next),
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }

    Cow::Owned(out)
}

/// Whether `word` is a `NAME=value` environment assignment.
///
/// `NAME` must be a shell identifier: ASCII letters, digits and `_`, not
/// starting with a digit.
#[inline]
#[must_use]
pub fn is_env_assignment(word: &str) -> bool {
    let Some((key, _value)) = word.split_once('=') else {
        return false;
    };
    let mut key_bytes = key.bytes();
    key_bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && key_bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Final `/`-delimited component of a (dequoted) command word.
///
/// `/usr/local/bin/node` and `node` both yield `node`; a trailing slash yields
/// the empty string, which never matches a policy entry.
#[inline]
#[must_use]
pub fn canonical_name(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

/// Whether a command word names a file by path rather than by `PATH` lookup.
#[inline]
#[must_use]
pub fn is_path_invocation(word: &str) -> bool {
    word.contains('/')
}
