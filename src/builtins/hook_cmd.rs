//! hook
//!
//! `hook add|remove|list|clear [TYPE] [FUNCTION]` manages the precmd,
//! preexec, and chpwd function lists.

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::hooks::HookType;
use crate::shell::Shell;

pub fn hook_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let usage = || {
        report(&ShellError::invalid_argument(
            "hook",
            "usage: hook add|remove|list|clear [hook_type] [function_name]",
        ))
    };

    let Some(subcommand) = argv.get(1) else {
        return Ok(usage());
    };

    match subcommand.as_str() {
        "list" => {
            let kinds: Vec<HookType> = match argv.get(2) {
                Some(name) => match HookType::parse(name) {
                    Some(kind) => vec![kind],
                    None => return Ok(bad_type(name)),
                },
                None => HookType::all().to_vec(),
            };
            for kind in kinds {
                for function in shell.hooks.list(kind) {
                    println!("{}: {}", kind.as_str(), function);
                }
            }
            Ok(0)
        }
        "clear" => {
            let Some(kind) = argv.get(2).and_then(|n| HookType::parse(n)) else {
                return Ok(usage());
            };
            shell.hooks.clear(kind);
            Ok(0)
        }
        "add" | "remove" => {
            let (Some(type_name), Some(function)) = (argv.get(2), argv.get(3)) else {
                return Ok(usage());
            };
            let Some(kind) = HookType::parse(type_name) else {
                return Ok(bad_type(type_name));
            };
            if subcommand == "add" {
                if shell.get_function(function).is_none() {
                    return Ok(report(&ShellError::invalid_argument(
                        "hook",
                        format!("{}: no such function", function),
                    )));
                }
                shell.hooks.add(kind, function);
                Ok(0)
            } else if shell.hooks.remove(kind, function) {
                Ok(0)
            } else {
                Ok(report(&ShellError::invalid_argument(
                    "hook",
                    format!("{}: not registered for {}", function, kind.as_str()),
                )))
            }
        }
        _ => Ok(usage()),
    }
}

fn bad_type(name: &str) -> i32 {
    report(&ShellError::invalid_argument(
        "hook",
        format!("{}: invalid hook type (precmd, preexec, chpwd)", name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        let mut sh = Shell::new(ShellOptions::default());
        sh.register_function("myhook", "BRACEGROUP{:}");
        sh
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_list_remove() {
        let mut sh = shell();
        assert_eq!(
            hook_cmd(&mut sh, &args(&["hook", "add", "precmd", "myhook"])).unwrap(),
            0
        );
        assert_eq!(sh.hooks.list(HookType::Precmd), &["myhook"]);
        assert_eq!(
            hook_cmd(&mut sh, &args(&["hook", "remove", "precmd", "myhook"])).unwrap(),
            0
        );
        assert!(sh.hooks.list(HookType::Precmd).is_empty());
    }

    #[test]
    fn test_add_unknown_function_fails() {
        let mut sh = shell();
        assert_ne!(
            hook_cmd(&mut sh, &args(&["hook", "add", "precmd", "ghost"])).unwrap(),
            0
        );
    }

    #[test]
    fn test_bad_hook_type() {
        let mut sh = shell();
        assert_ne!(
            hook_cmd(&mut sh, &args(&["hook", "add", "postcmd", "myhook"])).unwrap(),
            0
        );
    }

    #[test]
    fn test_clear() {
        let mut sh = shell();
        hook_cmd(&mut sh, &args(&["hook", "add", "chpwd", "myhook"])).unwrap();
        hook_cmd(&mut sh, &args(&["hook", "clear", "chpwd"])).unwrap();
        assert!(sh.hooks.list(HookType::Chpwd).is_empty());
    }
}
