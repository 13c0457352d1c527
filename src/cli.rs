//! CLI argument parsing and command handling.
//!
//! With no subcommand the binary runs in hook mode (handled in `main.rs`).
//! The subcommands here are for people: trying a command against the policy,
//! writing a starter config, and inspecting what is in effect.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;
use std::path::Path;
use std::process::ExitCode;

use crate::config::Config;
use crate::evaluator::{BlockReason, CommandKind, EvaluationResult, Verdict, evaluate_command};
use crate::policy::{Policy, SHELL_INTERPRETERS};

/// Pre-execution gate for shell commands issued by AI coding agents.
///
/// Reads one hook record on stdin and blocks the command unless every
/// sub-command is on the allowlist or passes its special-case rule.
#[derive(Parser, Debug)]
#[command(name = "asg")]
#[command(about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print version and build information
    #[arg(short = 'V', long)]
    pub version: bool,

    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a command against the effective policy
    ///
    /// Exits 0 when the command would be allowed and 1 when it would be
    /// blocked.
    #[command(name = "test")]
    Test {
        /// Command to evaluate
        command: String,

        /// Output format
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Generate a sample configuration file
    #[command(name = "init")]
    Init {
        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective merged configuration
    #[command(name = "config")]
    ShowConfig,

    /// List allowed commands and process-management tables
    #[command(name = "policy")]
    ShowPolicy,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Pretty,
    /// Structured JSON output
    Json,
}

/// Run a subcommand.
///
/// # Errors
///
/// Returns I/O and serialization errors from the subcommand.
pub fn run_command(command: Command) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load();

    match command {
        Command::Test { command, format } => {
            let policy = Policy::from_config(&config);
            let result = evaluate_command(&command, &policy);
            match format {
                OutputFormat::Pretty => print_result_pretty(&command, &result),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&result_to_json(&command, &result))?
                ),
            }
            return Ok(if result.is_allowed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            });
        }
        Command::Init { output, force } => init_config(output.as_deref(), force)?,
        Command::ShowConfig => show_config(&config)?,
        Command::ShowPolicy => show_policy(&Policy::from_config(&config)),
    }

    Ok(ExitCode::SUCCESS)
}

/// Stable JSON shape for `asg test --format json`.
#[must_use]
pub fn result_to_json(command: &str, result: &EvaluationResult) -> serde_json::Value {
    let segments: Vec<serde_json::Value> = result
        .segments
        .iter()
        .map(|s| {
            json!({
                "segment": s.segment,
                "executable": s.executable,
                "kind": s.kind,
                "decision": s.verdict(),
                "rule": s.block.as_ref().map(BlockReason::rule),
                "reason": s.block.as_ref().map(ToString::to_string),
            })
        })
        .collect();

    json!({
        "command": command,
        "decision": result.verdict,
        "rule": result.reason.as_ref().map(BlockReason::rule),
        "reason": result.reason_text(),
        "segments": segments,
    })
}

fn print_result_pretty(command: &str, result: &EvaluationResult) {
    println!("{} {command}", "Command:".bright_black());
    println!();

    match result.verdict {
        Verdict::Allow => println!("Result: {}", "ALLOWED".green().bold()),
        Verdict::Block => {
            println!("Result: {}", "BLOCKED".red().bold());
            if let Some(reason) = &result.reason {
                println!("Rule: {}", reason.rule().yellow());
                println!("Reason: {reason}");
            }
        }
    }

    if result.segments.is_empty() {
        return;
    }

    println!();
    println!("Segments:");
    for segment in &result.segments {
        let tag = match segment.verdict() {
            Verdict::Allow => "allow".green(),
            Verdict::Block => "block".red(),
        };
        let kind = segment.kind.map_or("-", CommandKind::label);
        print!("  [{tag}] {} ({kind})", segment.segment);
        if let Some(reason) = &segment.block {
            print!(" -- {reason}");
        }
        println!();
    }
}

/// Generate a sample configuration file
fn init_config(output: Option<&str>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sample = Config::generate_sample_config();

    match output {
        Some(path) => {
            let path = Path::new(path);
            if path.exists() && !force {
                return Err(
                    format!("File exists: {}. Use --force to overwrite.", path.display()).into(),
                );
            }

            // Create parent directories if needed
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            std::fs::write(path, sample)?;
            println!("Configuration written to: {}", path.display());
        }
        None => {
            println!("{sample}");
        }
    }

    Ok(())
}

/// Show the effective configuration
fn show_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Config sources (lowest → highest priority):");
    if let Some(explicit) = std::env::var_os("ASG_CONFIG") {
        println!("  - ASG_CONFIG: {}", Path::new(&explicit).display());
    } else {
        for path in Config::trusted_layer_paths() {
            if path.exists() {
                println!("  - {}", path.display());
            }
        }
        if let Some(path) = Config::project_layer_path() {
            println!("  - {} (project, restrictions only)", path.display());
        }
    }
    println!();
    println!("{}", config.to_toml()?);

    let policy = Policy::from_config(config);
    if !policy.invalid_patterns().is_empty() {
        println!("{}", "Invalid block overrides (skipped):".yellow().bold());
        for invalid in policy.invalid_patterns() {
            println!("  - {}: {}", invalid.pattern, invalid.error);
        }
    }

    Ok(())
}

fn show_policy(policy: &Policy) {
    let list = |items: Vec<&str>| items.join(" ");

    println!("{}", "Allowed commands:".bold());
    println!("  {}", list(policy.allowed_commands().collect()));
    println!();
    println!("{}", "Special-case rules:".bold());
    println!("  chmod      only [ugoa]*+x on at least one file, never recursive");
    println!("  init.sh    only by path (./init.sh), never through an interpreter");
    println!(
        "  processes  {} may target: {}",
        list(policy.process_managers().collect()),
        list(policy.dev_processes().collect())
    );
    println!(
        "  inline     {} -c scripts are evaluated, up to {} levels deep",
        SHELL_INTERPRETERS.join("/"),
        policy.max_shell_depth()
    );
    if !policy.block_patterns().is_empty() {
        println!();
        println!("{}", "Block overrides:".bold());
        for pattern in policy.block_patterns() {
            println!("  {} -- {}", pattern.regex.as_str(), pattern.reason);
        }
    }
}
