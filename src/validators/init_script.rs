//! Bootstrap script rule.
//!
//! `init.sh` is the one script the agent may run directly, and only by path:
//! `./init.sh`, `../dir/init.sh`, `/abs/path/init.sh`, with any trailing
//! arguments. Running it through an interpreter, running any other `*.sh`
//! file by path, or smuggling a separator into the segment is blocked. The
//! aggregator additionally rejects a chain that continues after `init.sh`
//! ([`InitScriptViolation::FollowedByCommand`]).

use crate::extract::ResolvedCommand;
use crate::normalize::{canonical_name, is_path_invocation};
use crate::policy::{INIT_SCRIPT_NAME, Policy};

/// Characters that would let a second command ride along inside the segment.
const INJECTION_MARKERS: &[&str] = &[";", "&", "|", "\n", "`", "$("];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitScriptViolation {
    #[error("init.sh must be executed directly (./init.sh), not via '{0}'")]
    Interpreter(String),
    #[error("only ./init.sh may be executed as a script, not '{0}'")]
    WrongScript(String),
    #[error("init.sh must be invoked by path (./init.sh), not looked up on PATH")]
    NotAPath,
    #[error("init.sh invocation contains disallowed character '{}'", .0.escape_debug())]
    Injection(&'static str),
    #[error("init.sh must be the last command in a chain")]
    FollowedByCommand,
}

/// Validate a segment routed here by the dispatcher.
///
/// # Errors
///
/// Returns the first [`InitScriptViolation`] found.
pub fn validate_init_script(
    command: &ResolvedCommand<'_>,
    policy: &Policy,
) -> Result<(), InitScriptViolation> {
    if let Some(marker) = INJECTION_MARKERS
        .iter()
        .find(|m| command.raw_segment.contains(**m))
    {
        return Err(InitScriptViolation::Injection(marker));
    }

    if policy.is_shell_interpreter(&command.executable) {
        return Err(InitScriptViolation::Interpreter(command.executable.clone()));
    }

    if command.executable != INIT_SCRIPT_NAME {
        return Err(InitScriptViolation::WrongScript(
            command.command_word().to_string(),
        ));
    }

    if !is_path_invocation(command.command_word()) {
        return Err(InitScriptViolation::NotAPath);
    }

    Ok(())
}

/// Whether a resolved command should be judged by [`validate_init_script`].
///
/// True for:
/// - a command word whose final component is `init.sh`;
/// - direct path execution of any `*.sh` file (`./setup.sh`);
/// - a shell interpreter with any operand or input redirection naming
///   `init.sh` (`bash init.sh`, `bash -o errexit init.sh`, `sh < ./init.sh`).
#[must_use]
pub fn references_init_script(command: &ResolvedCommand<'_>, policy: &Policy) -> bool {
    if command.executable == INIT_SCRIPT_NAME {
        return true;
    }
    if is_path_invocation(command.command_word())
        && std::path::Path::new(&command.executable)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sh"))
    {
        return true;
    }
    policy.is_shell_interpreter(&command.executable)
        && command
            .args()
            .iter()
            .any(|arg| canonical_name(input_redirect_target(arg)) == INIT_SCRIPT_NAME)
}

/// `<init.sh` and `0<init.sh` read from `init.sh`; other words pass through.
fn input_redirect_target(arg: &str) -> &str {
    arg.trim_start_matches(|c: char| c.is_ascii_digit())
        .strip_prefix('<')
        .unwrap_or(arg)
}
