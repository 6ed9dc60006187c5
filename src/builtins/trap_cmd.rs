//! trap
//!
//! `trap 'cmd' SIGNAL...` installs, `trap - SIGNAL...` removes, bare
//! `trap` (or `trap -p`) lists. KILL and STOP are silently rejected by
//! the trap table itself.

use crate::builtins::BuiltinResult;
use crate::builtins::source_eval::quote_word;
use crate::errors::{report, ShellError};
use crate::shell::Shell;
use crate::traps::{signal_name_to_number, signal_number_to_name};

pub fn trap_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let args = &argv[1..];
    if args.is_empty() || args[0] == "-p" {
        for (sig, command) in shell.traps.list() {
            println!(
                "trap -- {} {}",
                quote_word(&command),
                signal_number_to_name(sig)
            );
        }
        return Ok(0);
    }

    let (command, signals) = if args[0] == "-" || args[0].is_empty() {
        (String::new(), &args[1..])
    } else if args.len() == 1 {
        // `trap SIGNAL` also removes, matching historical shells
        (String::new(), &args[0..])
    } else {
        (args[0].clone(), &args[1..])
    };

    if signals.is_empty() {
        return Ok(report(&ShellError::invalid_argument(
            "trap",
            "signal name required",
        )));
    }

    let mut status = 0;
    for spec in signals {
        match signal_name_to_number(spec) {
            Some(sig) => shell.traps.set_trap(sig, &command),
            None => {
                status = report(&ShellError::invalid_argument(
                    "trap",
                    format!("{}: invalid signal specification", spec),
                ));
            }
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};
    use crate::traps::TRAP_EXIT;

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_install_and_remove() {
        let mut sh = shell();
        trap_cmd(&mut sh, &args(&["trap", "echo bye", "EXIT"])).unwrap();
        assert_eq!(sh.traps.get_trap(TRAP_EXIT), Some("echo bye"));
        trap_cmd(&mut sh, &args(&["trap", "-", "EXIT"])).unwrap();
        assert!(!sh.traps.has_trap(TRAP_EXIT));
    }

    #[test]
    fn test_numeric_signal() {
        let mut sh = shell();
        trap_cmd(&mut sh, &args(&["trap", "handler", "15"])).unwrap();
        assert_eq!(sh.traps.get_trap(15), Some("handler"));
    }

    #[test]
    fn test_invalid_signal() {
        let mut sh = shell();
        assert_ne!(
            trap_cmd(&mut sh, &args(&["trap", "cmd", "NOSUCHSIG"])).unwrap(),
            0
        );
    }

    #[test]
    fn test_kill_silently_ignored() {
        let mut sh = shell();
        assert_eq!(
            trap_cmd(&mut sh, &args(&["trap", "cmd", "KILL"])).unwrap(),
            0
        );
        assert!(!sh.traps.has_trap(libc::SIGKILL));
    }
}
