//! alias / unalias

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::parser::types::parse_assignment;
use crate::shell::Shell;

pub fn alias_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if argv.len() == 1 {
        let mut names: Vec<&String> = shell.aliases.keys().collect();
        names.sort();
        for name in names {
            println!("alias {}='{}'", name, shell.aliases[name]);
        }
        return Ok(0);
    }

    let mut status = 0;
    for arg in &argv[1..] {
        match parse_assignment(arg) {
            Some((name, value, _)) => {
                shell.aliases.insert(name, value);
            }
            None => match shell.aliases.get(arg) {
                Some(value) => println!("alias {}='{}'", arg, value),
                None => {
                    status = report(&ShellError::invalid_argument(
                        "alias",
                        format!("{}: not found", arg),
                    ));
                }
            },
        }
    }
    Ok(status)
}

pub fn unalias_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if argv.get(1).map(|a| a == "-a").unwrap_or(false) {
        shell.aliases.clear();
        return Ok(0);
    }
    if argv.len() == 1 {
        return Ok(report(&ShellError::invalid_argument(
            "unalias",
            "usage: unalias [-a] name ...",
        )));
    }
    let mut status = 0;
    for name in &argv[1..] {
        if shell.aliases.remove(name).is_none() {
            status = report(&ShellError::invalid_argument(
                "unalias",
                format!("{}: not found", name),
            ));
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_alias_define_and_remove() {
        let mut sh = shell();
        alias_cmd(&mut sh, &args(&["alias", "ll=ls -l"])).unwrap();
        assert_eq!(sh.aliases.get("ll").map(|s| s.as_str()), Some("ls -l"));
        unalias_cmd(&mut sh, &args(&["unalias", "ll"])).unwrap();
        assert!(sh.aliases.is_empty());
    }

    #[test]
    fn test_unalias_all() {
        let mut sh = shell();
        alias_cmd(&mut sh, &args(&["alias", "a=1", "b=2"])).unwrap();
        unalias_cmd(&mut sh, &args(&["unalias", "-a"])).unwrap();
        assert!(sh.aliases.is_empty());
    }

    #[test]
    fn test_unknown_alias_fails() {
        let mut sh = shell();
        assert_ne!(alias_cmd(&mut sh, &args(&["alias", "nope"])).unwrap(), 0);
        assert_ne!(unalias_cmd(&mut sh, &args(&["unalias", "nope"])).unwrap(), 0);
    }
}
