//! type / command / builtin
//!
//! Dispatch-order introspection and overrides. Normal lookup is
//! functions, then builtins, then `PATH`; `command` skips functions,
//! `builtin` runs only builtins, `type -p` reports externals only.

use crate::builtins::{self, BuiltinResult};
use crate::errors::{report, ShellError};
use crate::exec::resolve_command_path;
use crate::parser::types::is_reserved_word;
use crate::shell::Shell;

pub fn type_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let mut path_only = false;
    let mut names = &argv[1..];
    if names.first().map(|a| a == "-p").unwrap_or(false) {
        path_only = true;
        names = &names[1..];
    }
    if names.is_empty() {
        return Ok(report(&ShellError::invalid_argument(
            "type",
            "usage: type [-p] name ...",
        )));
    }

    let mut status = 0;
    for name in names {
        if path_only {
            match resolve_command_path(shell, name) {
                Ok(path) => println!("{}", path.display()),
                Err(_) => status = 1,
            }
            continue;
        }
        if shell.aliases.contains_key(name) {
            println!("{} is aliased to `{}'", name, shell.aliases[name]);
        } else if is_reserved_word(name) {
            println!("{} is a shell keyword", name);
        } else if shell.get_function(name).is_some() {
            println!("{} is a function", name);
        } else if builtins::lookup(name).is_some() {
            println!("{} is a shell builtin", name);
        } else {
            match resolve_command_path(shell, name) {
                Ok(path) => println!("{} is {}", name, path.display()),
                Err(err) => {
                    status = report(&err);
                }
            }
        }
    }
    Ok(status)
}

pub fn command_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let mut rest = &argv[1..];
    let mut verify = false;
    if rest.first().map(|a| a == "-v").unwrap_or(false) {
        verify = true;
        rest = &rest[1..];
    }
    let Some(name) = rest.first() else {
        return Ok(report(&ShellError::invalid_argument(
            "command",
            "usage: command [-v] command [arg ...]",
        )));
    };

    if verify {
        if builtins::lookup(name).is_some() {
            println!("{}", name);
            return Ok(0);
        }
        return match resolve_command_path(shell, name) {
            Ok(path) => {
                println!("{}", path.display());
                Ok(0)
            }
            Err(_) => Ok(1),
        };
    }

    // functions are bypassed: builtins, then PATH
    if builtins::lookup(name).is_some() {
        return builtins::run(shell, rest);
    }
    run_external(shell, rest)
}

pub fn builtin_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let Some(name) = argv.get(1) else {
        return Ok(0);
    };
    if builtins::lookup(name).is_none() {
        return Ok(report(&ShellError::invalid_argument(
            "builtin",
            format!("{}: not a shell builtin", name),
        )));
    }
    builtins::run(shell, &argv[1..])
}

/// Run an external command through the usual pipeline machinery.
fn run_external(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    // validate early for the 127/126 contract
    if let Err(err) = resolve_command_path(shell, &argv[0]) {
        return Ok(report(&err));
    }
    let text = argv
        .iter()
        .map(|a| crate::builtins::source_eval::quote_word(a))
        .collect::<Vec<_>>()
        .join(" ");
    let pipeline = match crate::parser::parser::parse_pipeline(&text, &Default::default()) {
        Ok(p) => p,
        Err(err) => return Ok(report(&err)),
    };
    crate::exec::run_pipeline(shell, &pipeline, false)
}
