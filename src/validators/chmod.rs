//! `chmod` rule: the only permitted change is "make these files executable".
//!
//! Allowed: `chmod [ugoa]*+x FILE...`. Everything else is a block: numeric
//! modes, removals, other permission letters, comma lists, recursive flags,
//! and any further mode given where an option would go (`chmod +x -w f`).
//! Only a bare `--` may precede the file names.

use crate::extract::ResolvedCommand;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChmodViolation {
    #[error("chmod missing required argument ({0})")]
    MissingArgument(&'static str),
    #[error("chmod recursive flag '{0}' is not allowed")]
    Recursive(String),
    #[error("chmod mode '{0}' is not allowed; only +x forms such as +x, u+x, a+x are permitted")]
    DisallowedMode(String),
}

/// Validate the arguments of a resolved `chmod` invocation.
///
/// # Errors
///
/// Returns the first [`ChmodViolation`] found.
pub fn validate_chmod(command: &ResolvedCommand<'_>) -> Result<(), ChmodViolation> {
    let args = command.args();

    if let Some(flag) = args.iter().find(|a| is_recursive_flag(a)) {
        return Err(ChmodViolation::Recursive(flag.clone()));
    }

    let mut operands = Vec::with_capacity(args.len());
    let mut options_ended = false;
    for arg in args {
        if options_ended || !arg.starts_with('-') {
            operands.push(arg);
        } else if arg == "--" {
            options_ended = true;
        } else {
            // chmod reads `-w`, `-rwx` as modes, so each one is a mode change.
            return Err(ChmodViolation::DisallowedMode(arg.clone()));
        }
    }

    let Some((mode, targets)) = operands.split_first() else {
        return Err(ChmodViolation::MissingArgument("mode"));
    };

    if !is_add_execute_mode(mode) {
        return Err(ChmodViolation::DisallowedMode((*mode).clone()));
    }

    if targets.is_empty() {
        return Err(ChmodViolation::MissingArgument("target file"));
    }

    Ok(())
}

/// `-R`, `-r`, `--recursive`, or a short-flag cluster containing `R`
/// (`-vR`, `-Rf`).
fn is_recursive_flag(arg: &str) -> bool {
    if arg == "--recursive" || arg == "-r" {
        return true;
    }
    arg.strip_prefix('-')
        .is_some_and(|rest| !rest.starts_with('-') && rest.contains('R'))
}

/// `[ugoa]*+x`, nothing more.
#[must_use]
pub fn is_add_execute_mode(mode: &str) -> bool {
    mode.strip_suffix("+x")
        .is_some_and(|who| who.bytes().all(|b| matches!(b, b'u' | b'g' | b'o' | b'a')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extracted, extract_commands};

    fn check(cmd: &str) -> Result<(), ChmodViolation> {
        let extracted = extract_commands(cmd);
        let [Extracted::Command(resolved)] = extracted.as_slice() else {
            panic!("expected a single command for {cmd:?}");
        };
        validate_chmod(resolved)
    }

    #[test]
    fn allows_add_execute_forms() {
        for cmd in [
            "chmod +x init.sh",
            "chmod +x script.sh",
            "chmod u+x init.sh",
            "chmod a+x init.sh",
            "chmod ug+x init.sh",
            "chmod gu+x init.sh",
            "chmod +x file1.sh file2.sh",
            "/bin/chmod +x init.sh",
            "chmod +x -- -odd-name.sh",
        ] {
            assert_eq!(check(cmd), Ok(()), "{cmd} should be allowed");
        }
    }

    #[test]
    fn blocks_other_modes() {
        for (cmd, mode) in [
            ("chmod 777 init.sh", "777"),
            ("chmod 755 init.sh", "755"),
            ("chmod +w init.sh", "+w"),
            ("chmod +r init.sh", "+r"),
            ("chmod -x init.sh", "-x"),
            ("chmod u+s init.sh", "u+s"),
            ("chmod +t init.sh", "+t"),
            ("chmod +xw init.sh", "+xw"),
            ("chmod u+x,o+w init.sh", "u+x,o+w"),
            ("chmod u=x init.sh", "u=x"),
            ("chmod +x -rwx init.sh", "-rwx"),
            ("chmod +x -w init.sh", "-w"),
            ("chmod +x init.sh -x", "-x"),
            ("chmod -v +x init.sh", "-v"),
            ("chmod -- -x init.sh", "-x"),
        ] {
            assert_eq!(
                check(cmd),
                Err(ChmodViolation::DisallowedMode(mode.to_string())),
                "{cmd}"
            );
        }
    }

    #[test]
    fn blocks_recursive_in_any_position() {
        for cmd in [
            "chmod -R +x dir/",
            "chmod --recursive +x dir/",
            "chmod +x -R dir/",
            "chmod -vR +x dir/",
        ] {
            assert!(
                matches!(check(cmd), Err(ChmodViolation::Recursive(_))),
                "{cmd} should be blocked as recursive"
            );
        }
        assert!(matches!(
            check("chmod -r init.sh"),
            Err(ChmodViolation::Recursive(_))
        ));
    }

    #[test]
    fn blocks_missing_arguments() {
        assert_eq!(
            check("chmod +x"),
            Err(ChmodViolation::MissingArgument("target file"))
        );
        assert_eq!(check("chmod"), Err(ChmodViolation::MissingArgument("mode")));
    }

    #[test]
    fn mode_grammar() {
        assert!(is_add_execute_mode("+x"));
        assert!(is_add_execute_mode("ugoa+x"));
        assert!(!is_add_execute_mode("x"));
        assert!(!is_add_execute_mode("+X"));
        assert!(!is_add_execute_mode("u+x+x"));
        assert!(!is_add_execute_mode(""));
    }
}
