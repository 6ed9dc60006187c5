//! cd / pwd
//!
//! `cd` updates the process working directory plus `PWD`/`OLDPWD`, runs
//! the `chpwd` hooks, and suggests nearby directory names on failure.

use std::path::{Path, PathBuf};

use crate::builtins::BuiltinResult;
use crate::errors::{closest_matches, print_error, report, ShellError};
use crate::hooks::HookType;
use crate::shell::Shell;

pub fn cd_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let target = match argv.get(1).map(|s| s.as_str()) {
        None | Some("--") => shell
            .vars
            .get("HOME")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "/".to_string()),
        Some("-") => match shell.vars.get("OLDPWD") {
            Some(old) => {
                let old = old.to_string();
                println!("{}", old);
                old
            }
            None => {
                return Ok(report(&ShellError::invalid_argument("cd", "OLDPWD not set")));
            }
        },
        Some(dir) => dir.to_string(),
    };

    let old_pwd = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Err(err) = std::env::set_current_dir(&target) {
        let error = ShellError::runtime(format!("cd: {}", target), err.to_string());
        print_error(&error);
        if let Some(suggestions) = directory_suggestions(&target) {
            if !suggestions.is_empty() {
                eprintln!("    Suggestions:");
                for s in suggestions {
                    eprintln!("      {}", s);
                }
            }
        }
        return Ok(1);
    }

    let new_pwd = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| target.clone());
    let _ = shell.vars.set("OLDPWD", old_pwd);
    let _ = shell.vars.export("OLDPWD");
    let _ = shell.vars.set("PWD", new_pwd);
    let _ = shell.vars.export("PWD");

    crate::interpreter::run_hooks(shell, HookType::Chpwd);
    Ok(0)
}

/// Nearby directory names in the parent of the failed target.
fn directory_suggestions(target: &str) -> Option<Vec<String>> {
    let path = PathBuf::from(target);
    let parent: &Path = path.parent().filter(|p| !p.as_os_str().is_empty())?;
    let wanted = path.file_name()?.to_string_lossy().into_owned();
    let entries = std::fs::read_dir(parent).ok()?;
    let candidates = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok());
    Some(closest_matches(&wanted, candidates))
}

pub fn pwd_cmd(_shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    // -L and -P agree here: the process cwd is already resolved
    let physical = argv.iter().skip(1).any(|a| a == "-P");
    let _ = physical;
    match std::env::current_dir() {
        Ok(path) => {
            println!("{}", path.display());
            Ok(0)
        }
        Err(err) => Ok(report(&ShellError::runtime("pwd", err.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    #[test]
    fn test_cd_updates_pwd_and_oldpwd() {
        let mut sh = shell();
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().to_string_lossy().to_string();
        assert_eq!(cd_cmd(&mut sh, &["cd".into(), target]).unwrap(), 0);
        assert_eq!(
            sh.vars.get("OLDPWD"),
            Some(before.to_string_lossy().as_ref())
        );
        assert!(sh.vars.get("PWD").is_some());
        let _ = std::env::set_current_dir(before);
    }

    #[test]
    fn test_cd_missing_directory_fails() {
        let mut sh = shell();
        assert_eq!(
            cd_cmd(&mut sh, &["cd".into(), "/zz/no/such/dir".into()]).unwrap(),
            1
        );
    }

    #[test]
    fn test_cd_dash_requires_oldpwd() {
        let mut sh = shell();
        let _ = sh.vars.unset("OLDPWD");
        assert_ne!(cd_cmd(&mut sh, &["cd".into(), "-".into()]).unwrap(), 0);
    }
}
