#![forbid(unsafe_code)]
//! agent-shell-gate (asg): pre-execution hook for agent shell commands.
//!
//! Runs before every shell command the agent issues and blocks anything that
//! is not explicitly permitted.
//!
//! Exit behavior:
//!   - Exit 0 with `{"decision": "block", "reason": "..."}` on stdout = block
//!   - Exit 0 with no output = allow
//!
//! Unreadable, oversized or malformed hook input is blocked, never passed.

use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use agent_shell_gate::cli::{self, Cli};
use agent_shell_gate::config::Config;
use agent_shell_gate::evaluator::evaluate_command;
use agent_shell_gate::hook::{self, HookRequest};
use agent_shell_gate::logging::{self, DecisionLogger};
use agent_shell_gate::policy::Policy;

// Build metadata from vergen (set by build.rs)
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");
const RUSTC_SEMVER: Option<&str> = option_env!("VERGEN_RUSTC_SEMVER");
const CARGO_TARGET: Option<&str> = option_env!("VERGEN_CARGO_TARGET_TRIPLE");

/// Rule label for failures before any command is seen.
const HOOK_INPUT_RULE: &str = "hook-input";

fn print_version() {
    println!("{} {}", "asg".bold(), PKG_VERSION.cyan());
    if let Some(ts) = BUILD_TIMESTAMP {
        // Extract just the date part for cleaner display
        let date = ts.split('T').next().unwrap_or(ts);
        println!("  {} {date}", "built: ".bright_black());
    }
    if let Some(rustc) = RUSTC_SEMVER {
        println!("  {} {rustc}", "rustc: ".bright_black());
    }
    if let Some(target) = CARGO_TARGET {
        println!("  {} {target}", "target:".bright_black());
    }
}

fn main() -> ExitCode {
    // Parse CLI arguments. On failure print the clap error instead of falling
    // into hook mode and blocking on stdin.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = Config::load();
    logging::init_diagnostics(config.general.verbose);
    hook::configure_colors(&config.general.color);

    if cli.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    if let Some(command) = cli.command {
        return match cli::run_command(command) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{} {e}", "Error:".red().bold());
                ExitCode::from(2)
            }
        };
    }

    run_hook(&config);
    ExitCode::SUCCESS
}

/// Hook mode: one record from stdin, at most one block response on stdout.
fn run_hook(config: &Config) {
    let policy = Policy::from_config(config);

    let input = match hook::read_hook_input(config.general.max_hook_input_bytes()) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(error = %e, "blocking unreadable hook input");
            hook::output_block("<hook input>", &e.to_string(), Some(HOOK_INPUT_RULE));
            return;
        }
    };

    let command = match hook::classify_request(&input, &config.general) {
        HookRequest::Skip => {
            tracing::debug!(tool = input.tool_name.as_deref().unwrap_or("-"), "not a shell tool");
            return;
        }
        HookRequest::Malformed(why) => {
            tracing::warn!(why, "blocking malformed hook input");
            hook::output_block(
                "<hook input>",
                &format!("malformed hook input: {why}"),
                Some(HOOK_INPUT_RULE),
            );
            return;
        }
        HookRequest::Command(command) => command,
    };

    let result = evaluate_command(&command, &policy);

    if let Some(logger) = DecisionLogger::new(&config.logging) {
        logger.log(&result, &command);
    }

    if let Some(reason) = &result.reason {
        hook::output_block(&command, &reason.to_string(), Some(reason.rule()));
    }
}
