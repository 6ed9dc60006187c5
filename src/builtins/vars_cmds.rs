//! Variable Builtins
//!
//! `export`, `unset`, `readonly`, `local`, `set`, `shift`, `getopts`.
//! Readonly violations surface as a distinct error kind with a non-zero
//! status and leave the binding untouched.

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::parser::types::parse_assignment;
use crate::shell::Shell;
use crate::vars::is_valid_identifier;

pub fn export_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let mut status = 0;
    let mut unexport = false;
    let mut args = &argv[1..];
    if args.first().map(|a| a == "-n").unwrap_or(false) {
        unexport = true;
        args = &args[1..];
    }

    if args.is_empty() {
        for name in shell.vars.visible_names() {
            if shell.vars.is_exported(&name) {
                println!("export {}=\"{}\"", name, shell.vars.get(&name).unwrap_or(""));
            }
        }
        return Ok(0);
    }

    for arg in args {
        let (name, value) = match parse_assignment(arg) {
            Some((name, value, _)) => (name, Some(value)),
            None => (arg.clone(), None),
        };
        if !is_valid_identifier(&name) {
            status = report(&ShellError::invalid_argument(
                "export",
                format!("`{}' is not a valid identifier", name),
            ));
            continue;
        }
        if let Some(value) = value {
            if let Err(err) = shell.vars.set(&name, value) {
                status = report(&err);
                continue;
            }
        }
        let result = if unexport {
            shell.vars.unexport(&name)
        } else {
            shell.vars.export(&name)
        };
        if let Err(err) = result {
            status = report(&err);
        }
    }
    Ok(status)
}

pub fn unset_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let mut status = 0;
    for name in &argv[1..] {
        if name == "-f" {
            continue;
        }
        if shell.functions.remove(name).is_some() {
            continue;
        }
        if let Err(err) = shell.vars.unset(name) {
            status = report(&err);
        }
    }
    Ok(status)
}

pub fn readonly_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if argv.len() == 1 {
        for name in shell.vars.readonly_names() {
            println!(
                "readonly {}=\"{}\"",
                name,
                shell.vars.get(&name).unwrap_or("")
            );
        }
        return Ok(0);
    }
    let mut status = 0;
    for arg in &argv[1..] {
        let (name, value) = match parse_assignment(arg) {
            Some((name, value, _)) => (name, Some(value)),
            None => (arg.clone(), None),
        };
        if !is_valid_identifier(&name) {
            status = report(&ShellError::invalid_argument(
                "readonly",
                format!("`{}' is not a valid identifier", name),
            ));
            continue;
        }
        if let Some(value) = value {
            if let Err(err) = shell.vars.set(&name, value) {
                status = report(&err);
                continue;
            }
        }
        shell.vars.mark_readonly(&name);
    }
    Ok(status)
}

pub fn local_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if shell.function_depth == 0 {
        return Ok(report(&ShellError::invalid_argument(
            "local",
            "can only be used in a function",
        )));
    }
    let mut status = 0;
    for arg in &argv[1..] {
        let (name, value) = match parse_assignment(arg) {
            Some((name, value, _)) => (name, value),
            None => (arg.clone(), String::new()),
        };
        if !is_valid_identifier(&name) {
            status = report(&ShellError::invalid_argument(
                "local",
                format!("`{}' is not a valid identifier", name),
            ));
            continue;
        }
        if let Err(err) = shell.vars.declare_local(&name, value) {
            status = report(&err);
        }
    }
    Ok(status)
}

pub fn set_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if argv.len() == 1 {
        for name in shell.vars.visible_names() {
            println!("{}='{}'", name, shell.vars.get(&name).unwrap_or(""));
        }
        return Ok(0);
    }

    let mut i = 1;
    while i < argv.len() {
        let arg = argv[i].as_str();
        match arg {
            "--" => {
                shell.vars.positional_set(argv[i + 1..].to_vec());
                return Ok(0);
            }
            "-o" | "+o" => {
                let enable = arg == "-o";
                let Some(option) = argv.get(i + 1) else {
                    print_option_settings(shell);
                    i += 1;
                    continue;
                };
                if let Err(err) = set_long_option(shell, option, enable) {
                    return Ok(report(&err));
                }
                i += 2;
            }
            _ if arg.starts_with('-') || arg.starts_with('+') => {
                let enable = arg.starts_with('-');
                for flag in arg[1..].chars() {
                    match flag {
                        'e' => shell.opts.errexit = enable,
                        'u' => shell.opts.nounset = enable,
                        'x' => shell.opts.xtrace = enable,
                        'f' => shell.opts.noglob = enable,
                        'C' => shell.opts.noclobber = enable,
                        'n' => shell.opts.noexec = enable,
                        _ => {
                            return Ok(report(&ShellError::invalid_argument(
                                "set",
                                format!("-{}: invalid option", flag),
                            )))
                        }
                    }
                }
                i += 1;
            }
            _ => {
                // remaining words become the positional parameters
                shell.vars.positional_set(argv[i..].to_vec());
                return Ok(0);
            }
        }
    }
    Ok(0)
}

fn set_long_option(shell: &mut Shell, option: &str, enable: bool) -> Result<(), ShellError> {
    match option {
        "errexit" => shell.opts.errexit = enable,
        "nounset" => shell.opts.nounset = enable,
        "xtrace" => shell.opts.xtrace = enable,
        "noglob" => shell.opts.noglob = enable,
        "noclobber" => shell.opts.noclobber = enable,
        "noexec" => shell.opts.noexec = enable,
        "posix" => shell.opts.posix = enable,
        _ => {
            return Err(ShellError::invalid_argument(
                "set",
                format!("{}: invalid option name", option),
            ))
        }
    }
    Ok(())
}

fn print_option_settings(shell: &Shell) {
    let opts = [
        ("errexit", shell.opts.errexit),
        ("nounset", shell.opts.nounset),
        ("xtrace", shell.opts.xtrace),
        ("noglob", shell.opts.noglob),
        ("noclobber", shell.opts.noclobber),
        ("noexec", shell.opts.noexec),
        ("posix", shell.opts.posix),
    ];
    for (name, on) in opts {
        println!("{:<12}{}", name, if on { "on" } else { "off" });
    }
}

pub fn shift_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let count = match argv.get(1) {
        None => 1,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                return Ok(report(&ShellError::invalid_argument(
                    "shift",
                    format!("{}: numeric argument required", arg),
                )))
            }
        },
    };
    match shell.vars.positional_shift(count) {
        Ok(()) => Ok(0),
        Err(err) => Ok(report(&err)),
    }
}

/// POSIX `getopts OPTSTRING NAME [ARGS...]`. State lives in OPTIND/OPTARG
/// through the variable store plus a private character cursor.
pub fn getopts_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let (optstring, name) = match (argv.get(1), argv.get(2)) {
        (Some(o), Some(n)) => (o.clone(), n.clone()),
        _ => {
            return Ok(report(&ShellError::invalid_argument(
                "getopts",
                "usage: getopts optstring name [arg ...]",
            )))
        }
    };
    let silent = optstring.starts_with(':');
    let optstring = optstring.trim_start_matches(':');

    let args: Vec<String> = if argv.len() > 3 {
        argv[3..].to_vec()
    } else {
        shell.vars.positional().to_vec()
    };

    let mut optind: usize = shell
        .vars
        .get("OPTIND")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    if optind < 1 {
        optind = 1;
    }

    let finish = |shell: &mut Shell, name: &str, optind: usize| -> BuiltinResult {
        let _ = shell.vars.set(name, "?");
        let _ = shell.vars.set("OPTIND", optind.to_string());
        shell.getopts_char_index = 0;
        Ok(1)
    };

    let Some(current) = args.get(optind - 1) else {
        return finish(shell, &name, optind);
    };
    if !current.starts_with('-') || current == "-" {
        return finish(shell, &name, optind);
    }
    if current == "--" {
        return finish(shell, &name, optind + 1);
    }

    let opt_chars: Vec<char> = current[1..].chars().collect();
    let mut cursor = shell.getopts_char_index;
    if cursor >= opt_chars.len() {
        cursor = 0;
    }
    let opt = opt_chars[cursor];
    cursor += 1;

    let spec_pos = optstring.find(opt);
    let wants_arg = spec_pos
        .map(|p| optstring[p + 1..].starts_with(':'))
        .unwrap_or(false);

    if spec_pos.is_none() || opt == ':' {
        if !silent {
            eprintln!("cjsh: getopts: illegal option -- {}", opt);
        }
        let _ = shell.vars.set(&name, "?");
        let _ = shell.vars.set("OPTARG", opt.to_string());
        if cursor >= opt_chars.len() {
            shell.getopts_char_index = 0;
            let _ = shell.vars.set("OPTIND", (optind + 1).to_string());
        } else {
            shell.getopts_char_index = cursor;
        }
        return Ok(0);
    }

    if wants_arg {
        let (optarg, next_index) = if cursor < opt_chars.len() {
            // the rest of this word is the argument
            (opt_chars[cursor..].iter().collect::<String>(), optind + 1)
        } else if let Some(next) = args.get(optind) {
            (next.clone(), optind + 2)
        } else {
            if !silent {
                eprintln!("cjsh: getopts: option requires an argument -- {}", opt);
            }
            let _ = shell.vars.set(&name, if silent { ":" } else { "?" });
            let _ = shell.vars.set("OPTARG", opt.to_string());
            let _ = shell.vars.set("OPTIND", (optind + 1).to_string());
            shell.getopts_char_index = 0;
            return Ok(0);
        };
        let _ = shell.vars.set(&name, opt.to_string());
        let _ = shell.vars.set("OPTARG", optarg);
        let _ = shell.vars.set("OPTIND", next_index.to_string());
        shell.getopts_char_index = 0;
        return Ok(0);
    }

    let _ = shell.vars.set(&name, opt.to_string());
    let _ = shell.vars.unset("OPTARG");
    if cursor >= opt_chars.len() {
        shell.getopts_char_index = 0;
        let _ = shell.vars.set("OPTIND", (optind + 1).to_string());
    } else {
        shell.getopts_char_index = cursor;
        let _ = shell.vars.set("OPTIND", optind.to_string());
    }
    Ok(0)
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
    fn test_export_marks_binding() {
        let mut sh = shell();
        export_cmd(&mut sh, &args(&["export", "X=v"])).unwrap();
        assert!(sh.vars.is_exported("X"));
        assert_eq!(sh.vars.get("X"), Some("v"));
    }

    #[test]
    fn test_export_invalid_name() {
        let mut sh = shell();
        assert_ne!(export_cmd(&mut sh, &args(&["export", "1bad=x"])).unwrap(), 0);
    }

    #[test]
    fn test_readonly_blocks_reassignment() {
        let mut sh = shell();
        readonly_cmd(&mut sh, &args(&["readonly", "R=1"])).unwrap();
        assert!(sh.vars.set("R", "2").is_err());
        assert_eq!(sh.vars.get("R"), Some("1"));
    }

    #[test]
    fn test_unset_removes() {
        let mut sh = shell();
        sh.vars.set("gone", "x").unwrap();
        unset_cmd(&mut sh, &args(&["unset", "gone"])).unwrap();
        assert_eq!(sh.vars.get("gone"), None);
    }

    #[test]
    fn test_unset_readonly_fails() {
        let mut sh = shell();
        sh.vars.set("R", "1").unwrap();
        sh.vars.mark_readonly("R");
        assert_ne!(unset_cmd(&mut sh, &args(&["unset", "R"])).unwrap(), 0);
        assert_eq!(sh.vars.get("R"), Some("1"));
    }

    #[test]
    fn test_set_flags() {
        let mut sh = shell();
        set_cmd(&mut sh, &args(&["set", "-e"])).unwrap();
        assert!(sh.opts.errexit);
        set_cmd(&mut sh, &args(&["set", "+e"])).unwrap();
        assert!(!sh.opts.errexit);
        set_cmd(&mut sh, &args(&["set", "-o", "nounset"])).unwrap();
        assert!(sh.opts.nounset);
    }

    #[test]
    fn test_set_positionals() {
        let mut sh = shell();
        set_cmd(&mut sh, &args(&["set", "--", "a", "b"])).unwrap();
        assert_eq!(sh.vars.positional(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_shift() {
        let mut sh = shell();
        sh.vars.positional_set(args(&["a", "b", "c"]));
        shift_cmd(&mut sh, &args(&["shift"])).unwrap();
        assert_eq!(sh.vars.positional_count(), 2);
        shift_cmd(&mut sh, &args(&["shift", "2"])).unwrap();
        assert_eq!(sh.vars.positional_count(), 0);
        assert_ne!(shift_cmd(&mut sh, &args(&["shift", "5"])).unwrap(), 0);
    }

    #[test]
    fn test_getopts_basic() {
        let mut sh = shell();
        sh.vars.positional_set(args(&["-a", "-b", "val", "rest"]));
        assert_eq!(
            getopts_cmd(&mut sh, &args(&["getopts", "ab:", "opt"])).unwrap(),
            0
        );
        assert_eq!(sh.vars.get("opt"), Some("a"));
        assert_eq!(
            getopts_cmd(&mut sh, &args(&["getopts", "ab:", "opt"])).unwrap(),
            0
        );
        assert_eq!(sh.vars.get("opt"), Some("b"));
        assert_eq!(sh.vars.get("OPTARG"), Some("val"));
        // past the options now
        assert_eq!(
            getopts_cmd(&mut sh, &args(&["getopts", "ab:", "opt"])).unwrap(),
            1
        );
        assert_eq!(sh.vars.get("OPTIND"), Some("4"));
    }

    #[test]
    fn test_getopts_clustered() {
        let mut sh = shell();
        sh.vars.positional_set(args(&["-ab"]));
        getopts_cmd(&mut sh, &args(&["getopts", "ab", "opt"])).unwrap();
        assert_eq!(sh.vars.get("opt"), Some("a"));
        getopts_cmd(&mut sh, &args(&["getopts", "ab", "opt"])).unwrap();
        assert_eq!(sh.vars.get("opt"), Some("b"));
        assert_eq!(
            getopts_cmd(&mut sh, &args(&["getopts", "ab", "opt"])).unwrap(),
            1
        );
    }

    #[test]
    fn test_local_outside_function() {
        let mut sh = shell();
        assert_ne!(local_cmd(&mut sh, &args(&["local", "x=1"])).unwrap(), 0);
    }
}
