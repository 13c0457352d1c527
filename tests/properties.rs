//! Property tests for the evaluator.
//!
//! - evaluation is deterministic and never panics on arbitrary input;
//! - a command word's directory never changes the verdict;
//! - a chain is blocked exactly when one of its parts is blocked, except that
//!   `./init.sh` blocks any chain that continues after it.

use agent_shell_gate::evaluator::{Verdict, evaluate_command};
use agent_shell_gate::policy::Policy;
use proptest::prelude::*;

/// Stand-alone commands with a known verdict. `./init.sh` is left out: it
/// composes only as the last part of a chain, which has its own property.
const POOL: &[&str] = &[
    "ls -la",
    "git status",
    "npm run build",
    "pkill node",
    "pkill -f 'node server.js'",
    "chmod +x init.sh",
    "echo 'a && b'",
    "reboot",
    "python app.py",
    "pkill chrome",
    "chmod 777 x",
    "./setup.sh",
    "killall node",
];

const OPERATORS: &[&str] = &[" && ", " || ", "; ", " | ", " & ", "\n"];

const NAMES: &[&str] = &[
    "ls", "cat", "node", "npm", "git", "rm", "bash", "python", "wget", "shutdown", "pkill",
    "chmod", "killall",
];

const DIRS: &[&str] = &["/usr/bin/", "/usr/local/bin/", "/opt/homebrew/bin/", "./node_modules/.bin/"];

const INIT_SCRIPT: &str = "./init.sh";

fn verdict(cmd: &str) -> Verdict {
    evaluate_command(cmd, &Policy::default()).verdict
}

fn join_chain(parts: &[&str], ops: &[&str]) -> String {
    let mut chain = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            chain.push_str(ops[(i - 1) % ops.len()]);
        }
        chain.push_str(part);
    }
    chain
}

proptest! {
    #[test]
    fn evaluation_is_deterministic(cmd in prop_oneof![
        "\\PC{0,300}",
        "[a-z ;&|$()`'\"\\\\=+-]{0,120}",
    ]) {
        let policy = Policy::default();
        let first = evaluate_command(&cmd, &policy);
        let second = evaluate_command(&cmd, &policy);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn blocked_results_always_carry_a_reason(cmd in "\\PC{0,200}") {
        let result = evaluate_command(&cmd, &Policy::default());
        prop_assert_eq!(result.is_blocked(), result.reason.is_some());
    }

    #[test]
    fn directory_of_command_word_is_irrelevant(
        name in proptest::sample::select(NAMES),
        dir in proptest::sample::select(DIRS),
        args in proptest::collection::vec("[a-z0-9+.]{1,8}", 0..4),
    ) {
        let args = args.join(" ");
        let bare = format!("{name} {args}");
        let qualified = format!("{dir}{name} {args}");
        prop_assert_eq!(verdict(&bare), verdict(&qualified), "{} vs {}", bare, qualified);
    }

    #[test]
    fn chain_blocks_iff_a_part_blocks(
        parts in proptest::collection::vec(proptest::sample::select(POOL), 1..5),
        ops in proptest::collection::vec(proptest::sample::select(OPERATORS), 4),
    ) {
        let chain = join_chain(&parts, &ops);

        let any_blocked = parts.iter().any(|p| verdict(p) == Verdict::Block);
        let expected = if any_blocked { Verdict::Block } else { Verdict::Allow };
        prop_assert_eq!(verdict(&chain), expected, "chain: {:?}", chain);
    }

    #[test]
    fn init_script_composes_only_as_the_last_part(
        parts in proptest::collection::vec(proptest::sample::select(POOL), 0..4),
        ops in proptest::collection::vec(proptest::sample::select(OPERATORS), 5),
        after in proptest::sample::select(POOL),
    ) {
        let mut ending = parts.clone();
        ending.push(INIT_SCRIPT);
        let chain = join_chain(&ending, &ops);
        let any_blocked = parts.iter().any(|p| verdict(p) == Verdict::Block);
        let expected = if any_blocked { Verdict::Block } else { Verdict::Allow };
        prop_assert_eq!(verdict(&chain), expected, "chain: {:?}", chain);

        ending.push(after);
        let continued = join_chain(&ending, &ops);
        prop_assert_eq!(verdict(&continued), Verdict::Block, "chain: {:?}", continued);
    }
}

#[test]
fn pool_has_both_verdicts() {
    let allowed = POOL.iter().filter(|p| verdict(p) == Verdict::Allow).count();
    assert!(allowed > 0 && allowed < POOL.len());
}
