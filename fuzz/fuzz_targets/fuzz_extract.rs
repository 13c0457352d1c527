//! Fuzz target for segment splitting and command resolution.

#![no_main]

use libfuzzer_sys::fuzz_target;

use agent_shell_gate::extract::{Extracted, extract_commands};
use agent_shell_gate::normalize::tokenize_words;

fuzz_target!(|data: &[u8]| {
    let Ok(command) = std::str::from_utf8(data) else {
        return;
    };

    for item in extract_commands(command) {
        if let Extracted::Command(resolved) = item {
            // A resolved executable is a bare name, never a path.
            assert!(!resolved.executable.contains('/'));
            assert!(!resolved.words.is_empty());
        }
    }

    // Tokenizing arbitrary text either fails cleanly or yields in-bounds ranges.
    if let Ok(words) = tokenize_words(command) {
        for word in &words {
            assert!(word.byte_range.end <= command.len());
            assert_eq!(&command[word.byte_range.clone()], word.raw);
        }
    }
});
