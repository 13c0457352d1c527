//! Fuzz target for the main evaluator entry point.
//!
//! Looks for panics on arbitrary command strings and checks that a verdict
//! is stable across repeated evaluation.

#![no_main]

use libfuzzer_sys::fuzz_target;

use agent_shell_gate::evaluator::evaluate_command;
use agent_shell_gate::policy::Policy;
use std::sync::LazyLock;

static POLICY: LazyLock<Policy> = LazyLock::new(Policy::default);

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = std::str::from_utf8(data) {
        let first = evaluate_command(command, &POLICY);
        let second = evaluate_command(command, &POLICY);
        assert_eq!(first, second, "non-deterministic verdict for {command:?}");
        assert_eq!(first.is_blocked(), first.reason.is_some());
    }
});
