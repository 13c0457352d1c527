#![cfg_attr(not(test), forbid(unsafe_code))]
//! agent-shell-gate (asg) library.
//!
//! A fail-closed gate for shell commands proposed by an AI coding agent. A
//! command runs only if every sub-command in it is on the allowlist or passes
//! its special-case rule (`chmod`, `init.sh`, `pkill`).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Configuration                            │
//! │  (env vars → project config → user config → system → defaults)  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │  Policy::from_config
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Evaluator (decision aggregator)                 │
//! │   size limit → block overrides → extract → classify → verdict   │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                                 │
//!                 ▼                                 ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────────┐
//! │           Extractor           │ │          Validators           │
//! │  split on ; && || | & \n      │ │  chmod · init.sh · process    │
//! │  suspicious / unparseable     │ │  targets · plain allowlist    │
//! └───────────────────────────────┘ └───────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use agent_shell_gate::evaluator::evaluate_command;
//! use agent_shell_gate::policy::Policy;
//!
//! let policy = Policy::default();
//! let result = evaluate_command("npm install && npm run build", &policy);
//! assert!(result.is_allowed());
//!
//! let result = evaluate_command("pkill chrome", &policy);
//! assert!(result.is_blocked());
//! println!("Blocked: {}", result.reason_text().unwrap_or_default());
//! ```

pub mod cli;
pub mod config;
pub mod evaluator;
pub mod extract;
pub mod hook;
pub mod logging;
pub mod normalize;
pub mod policy;
pub mod validators;

pub use config::Config;
pub use evaluator::{BlockReason, CommandKind, EvaluationResult, Verdict, evaluate_command};
pub use extract::{Extracted, ResolvedCommand, extract_commands};
pub use policy::Policy;
