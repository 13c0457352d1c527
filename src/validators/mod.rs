//! Special-case validators for commands a plain allowlist cannot judge.
//!
//! Each validator takes a [`ResolvedCommand`](crate::extract::ResolvedCommand)
//! and returns `Ok(())` or a typed violation whose `Display` is the
//! user-visible block reason.

pub mod chmod;
pub mod init_script;
pub mod process;

pub use chmod::{ChmodViolation, is_add_execute_mode, validate_chmod};
pub use init_script::{InitScriptViolation, references_init_script, validate_init_script};
pub use process::{ProcessViolation, validate_process_targets};
