//! Execution Engine
//!
//! Turns parsed pipelines into processes. Expansion for every stage runs
//! in the parent before any child is forked; a pipeline whose expansion
//! fails does not fork at all. A single builtin or function command with
//! redirections runs in-process behind an fd snapshot guard. Everything
//! else forks one child per stage into a fresh process group (pgid = first
//! child's pid), wires pipes, applies redirections in declaration order,
//! and hands the terminal to foreground jobs.

pub mod redirect;

use std::ffi::CString;
use std::path::{Path, PathBuf};

use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{close, dup2, execve, fork, getpid, setpgid, ForkResult, Pid};

use crate::builtins;
use crate::errors::{closest_matches, report, ShellError};
use crate::expansion;
use crate::interpreter::control_flow::{ControlFlow, ExecResult};
use crate::interpreter::execute_text;
use crate::parser::parser::{Pipeline, Redirection, Stage};
use crate::parser::types::parse_assignment;
use crate::shell::Shell;

/// One pipeline stage with expansions resolved (argv stages) or the group
/// body to interpret.
#[derive(Debug, Clone)]
enum PreparedStage {
    Argv {
        argv: Vec<String>,
        assignments: Vec<(String, String, bool)>,
        redirections: Vec<Redirection>,
    },
    Group {
        body: String,
        redirections: Vec<Redirection>,
    },
}

/// Execute a pipeline. Foreground pipelines return the last stage's exit
/// status; background pipelines return 0 immediately.
pub fn run_pipeline(shell: &mut Shell, pipeline: &Pipeline, background: bool) -> ExecResult {
    // expansion happens before any fork; a failed stage stops the pipeline
    let mut prepared = Vec::with_capacity(pipeline.stages.len());
    for stage in &pipeline.stages {
        match prepare_stage(shell, &stage.stage) {
            Ok(p) => prepared.push((p, stage.pipe_stderr)),
            Err(err) => return Ok(shell.set_last_status(report(&err))),
        }
    }

    let status = if prepared.len() == 1 && !background {
        match &prepared[0].0 {
            PreparedStage::Argv { argv, assignments, redirections } => {
                match run_single_command(shell, argv, assignments, redirections)? {
                    Some(status) => status,
                    // externals go through the pipeline machinery
                    None => run_forked_pipeline(shell, &prepared, &pipeline.text, false)?,
                }
            }
            PreparedStage::Group { body, redirections } => {
                if is_brace_group(&pipeline.stages[0].stage) {
                    run_brace_group(shell, body, redirections)?
                } else {
                    run_subshell_foreground(shell, body, redirections)?
                }
            }
        }
    } else {
        run_forked_pipeline(shell, &prepared, &pipeline.text, background)?
    };

    let status = if pipeline.negate {
        i32::from(status == 0)
    } else {
        status
    };
    Ok(shell.set_last_status(status))
}

fn is_brace_group(stage: &Stage) -> bool {
    matches!(stage, Stage::BraceGroup { .. })
}

/// Expand one stage in the parent.
fn prepare_stage(shell: &mut Shell, stage: &Stage) -> Result<PreparedStage, ShellError> {
    match stage {
        Stage::Simple(cmd) => {
            let mut assignments = Vec::new();
            for token in &cmd.assignments {
                let (name, raw_value, append) =
                    parse_assignment(&token.text).ok_or_else(|| {
                        ShellError::syntax("assignment", token.text.clone())
                    })?;
                let value = expansion::expand_assignment_value(shell, &raw_value)?;
                assignments.push((name, value, append));
            }
            // [[ arguments are not split or globbed; quoted glob characters
            // stay protected for the pattern matcher
            let argv = if cmd.args.first().map(|t| t.text == "[[").unwrap_or(false) {
                let mut argv = Vec::with_capacity(cmd.args.len());
                for token in &cmd.args {
                    if token.text == "[[" || token.text == "]]" {
                        argv.push(token.text.clone());
                    } else {
                        argv.push(expansion::expand_as_pattern(shell, &token.text)?);
                    }
                }
                argv
            } else {
                expansion::expand_words(shell, &cmd.args)?
            };
            if shell.opts.xtrace && !argv.is_empty() {
                eprintln!("+ {}", argv.join(" "));
            }
            Ok(PreparedStage::Argv {
                argv,
                assignments,
                redirections: cmd.redirections.clone(),
            })
        }
        Stage::Subshell { body, redirections } | Stage::BraceGroup { body, redirections } => {
            Ok(PreparedStage::Group {
                body: body.clone(),
                redirections: redirections.clone(),
            })
        }
    }
}

/// In-process path for a lone command: assignments, functions, builtins.
/// Returns None when the command is external and needs a child.
fn run_single_command(
    shell: &mut Shell,
    argv: &[String],
    assignments: &[(String, String, bool)],
    redirections: &[Redirection],
) -> Result<Option<i32>, ControlFlow> {
    if argv.is_empty() {
        // pure assignments mutate the shell itself
        let mut status = 0;
        for (name, value, append) in assignments {
            let result = if *append {
                shell.vars.append(name, value)
            } else {
                shell.vars.set(name, value.clone())
            };
            if let Err(err) = result {
                status = report(&err);
            }
        }
        if !redirections.is_empty() {
            match redirect::apply_redirections(shell, redirections) {
                Ok(guard) => drop(guard),
                Err(err) => status = report(&err),
            }
        }
        return Ok(Some(status));
    }

    shell.last_arg = argv.last().cloned().unwrap_or_default();
    let name = argv[0].as_str();

    if shell.get_function(name).is_some() {
        let guard = match redirect::apply_redirections(shell, redirections) {
            Ok(g) => g,
            Err(err) => return Ok(Some(report(&err))),
        };
        let saved = apply_temp_assignments(shell, assignments);
        let result =
            crate::interpreter::functions::invoke_function(shell, name, &argv[1..]);
        restore_temp_assignments(shell, saved);
        drop(guard);
        return result.map(Some);
    }

    if builtins::lookup(name).is_some() {
        let guard = match redirect::apply_redirections(shell, redirections) {
            Ok(g) => g,
            Err(err) => return Ok(Some(report(&err))),
        };
        let saved = apply_temp_assignments(shell, assignments);
        let result = builtins::run(shell, argv);
        restore_temp_assignments(shell, saved);
        drop(guard);
        return result.map(Some);
    }

    Ok(None)
}

/// Command-prefix assignments are visible to the command only.
fn apply_temp_assignments(
    shell: &mut Shell,
    assignments: &[(String, String, bool)],
) -> Vec<(String, Option<String>)> {
    let mut saved = Vec::new();
    for (name, value, append) in assignments {
        saved.push((name.clone(), shell.vars.get(name).map(|s| s.to_string())));
        let _ = if *append {
            shell.vars.append(name, value)
        } else {
            shell.vars.set(name, value.clone())
        };
    }
    saved
}

fn restore_temp_assignments(shell: &mut Shell, saved: Vec<(String, Option<String>)>) {
    for (name, old) in saved.into_iter().rev() {
        match old {
            Some(value) => {
                let _ = shell.vars.set(&name, value);
            }
            None => {
                let _ = shell.vars.unset(&name);
            }
        }
    }
}

/// `{ ...; }` as the whole pipeline: runs in the current shell, so
/// variable changes and break/continue/return pass through.
fn run_brace_group(
    shell: &mut Shell,
    body: &str,
    redirections: &[Redirection],
) -> ExecResult {
    let guard = match redirect::apply_redirections(shell, redirections) {
        Ok(g) => g,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };
    let result = execute_text(shell, body);
    drop(guard);
    result
}

/// Fork one child per stage, wire pipes, collect the job.
fn run_forked_pipeline(
    shell: &mut Shell,
    prepared: &[(PreparedStage, bool)],
    text: &str,
    background: bool,
) -> ExecResult {
    let stage_count = prepared.len();
    let mut pipes: Vec<(i32, i32)> = Vec::new();
    for _ in 0..stage_count.saturating_sub(1) {
        let mut fds = [0i32; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            let err = std::io::Error::last_os_error();
            for (rd, wr) in &pipes {
                let _ = close(*rd);
                let _ = close(*wr);
            }
            return Ok(shell
                .set_last_status(report(&ShellError::runtime("pipe", err.to_string()))));
        }
        pipes.push((fds[0], fds[1]));
    }

    let mut pids: Vec<Pid> = Vec::new();
    let mut pgid: Option<Pid> = None;

    for (index, (stage, pipe_stderr)) in prepared.iter().enumerate() {
        let child_pgid = pgid;
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                setup_child(shell, child_pgid);
                // wire this stage into the pipeline
                if index > 0 {
                    let _ = dup2(pipes[index - 1].0, libc::STDIN_FILENO);
                }
                if index < stage_count - 1 {
                    let _ = dup2(pipes[index].1, libc::STDOUT_FILENO);
                    if *pipe_stderr {
                        let _ = dup2(pipes[index].1, libc::STDERR_FILENO);
                    }
                }
                for (rd, wr) in &pipes {
                    let _ = close(*rd);
                    let _ = close(*wr);
                }
                exec_stage_in_child(shell, stage);
            }
            Ok(ForkResult::Parent { child }) => {
                let group = pgid.unwrap_or(child);
                let _ = setpgid(child, group);
                pgid = Some(group);
                pids.push(child);
            }
            Err(err) => {
                for (rd, wr) in &pipes {
                    let _ = close(*rd);
                    let _ = close(*wr);
                }
                for pid in &pids {
                    let _ = nix::sys::signal::kill(*pid, Signal::SIGKILL);
                }
                return Ok(shell
                    .set_last_status(report(&ShellError::runtime("fork", err.to_string()))));
            }
        }
    }

    for (rd, wr) in &pipes {
        let _ = close(*rd);
        let _ = close(*wr);
    }

    let pgid = match pgid {
        Some(p) => p,
        None => return Ok(0),
    };
    let job_id = shell
        .jobs
        .add_job(pgid, pids.clone(), text.to_string(), background);

    if background {
        let last_pid = pids.last().map(|p| p.as_raw()).unwrap_or(0);
        shell.last_bg_pid = Some(last_pid);
        println!("[{}] {}", job_id, last_pid);
        return Ok(0);
    }

    shell.jobs.give_terminal_to(pgid);
    let status = shell.jobs.wait_for_job(job_id);
    shell.jobs.reclaim_terminal();
    Ok(status)
}

/// Post-fork child setup: own process group, default signal dispositions.
/// Both child and parent call setpgid so the group exists whichever side
/// runs first.
fn setup_child(_shell: &Shell, pgid: Option<Pid>) {
    let pid = getpid();
    let _ = setpgid(pid, pgid.unwrap_or(pid));
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal(Signal::SIGQUIT, SigHandler::SigDfl);
        let _ = signal(Signal::SIGTSTP, SigHandler::SigDfl);
        let _ = signal(Signal::SIGTTIN, SigHandler::SigDfl);
        let _ = signal(Signal::SIGTTOU, SigHandler::SigDfl);
        let _ = signal(Signal::SIGCHLD, SigHandler::SigDfl);
    }
}

/// Run one stage in a forked child and `_exit` with its status.
fn exec_stage_in_child(shell: &mut Shell, stage: &PreparedStage) -> ! {
    match stage {
        PreparedStage::Group { body, redirections } => {
            match redirect::apply_redirections(shell, redirections) {
                Ok(guard) => std::mem::forget(guard),
                Err(err) => child_exit(report(&err)),
            }
            let status = match execute_text(shell, body) {
                Ok(status) => status,
                Err(ControlFlow::Exit(code)) | Err(ControlFlow::Return(code)) => code,
                Err(_) => 0,
            };
            child_exit(status);
        }
        PreparedStage::Argv { argv, assignments, redirections } => {
            match redirect::apply_redirections(shell, redirections) {
                Ok(guard) => std::mem::forget(guard),
                Err(err) => child_exit(report(&err)),
            }
            if argv.is_empty() {
                child_exit(0);
            }
            let name = argv[0].as_str();
            if shell.get_function(name).is_some() {
                let _ = apply_temp_assignments(shell, assignments);
                let status = match crate::interpreter::functions::invoke_function(
                    shell,
                    name,
                    &argv[1..],
                ) {
                    Ok(status) => status,
                    Err(ControlFlow::Exit(code)) | Err(ControlFlow::Return(code)) => code,
                    Err(_) => 0,
                };
                child_exit(status);
            }
            if builtins::lookup(name).is_some() {
                let _ = apply_temp_assignments(shell, assignments);
                let status = match builtins::run(shell, argv) {
                    Ok(status) => status,
                    Err(ControlFlow::Exit(code)) | Err(ControlFlow::Return(code)) => code,
                    Err(_) => 0,
                };
                child_exit(status);
            }
            exec_external(shell, argv, assignments);
        }
    }
}

fn child_exit(status: i32) -> ! {
    let _ = std::io::Write::flush(&mut std::io::stdout());
    let _ = std::io::Write::flush(&mut std::io::stderr());
    unsafe { libc::_exit(status) }
}

/// Replace the child image with the external command.
fn exec_external(shell: &mut Shell, argv: &[String], assignments: &[(String, String, bool)]) -> ! {
    let path = match resolve_command_path(shell, &argv[0]) {
        Ok(path) => path,
        Err(err) => child_exit(report(&err)),
    };

    let mut env = shell.child_env();
    for (name, value, _) in assignments {
        match env.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.clone(),
            None => env.push((name.clone(), value.clone())),
        }
    }

    let c_path = match CString::new(path.as_os_str().as_encoded_bytes()) {
        Ok(c) => c,
        Err(_) => child_exit(127),
    };
    let c_argv: Vec<CString> = argv
        .iter()
        .filter_map(|a| CString::new(a.as_bytes()).ok())
        .collect();
    let c_env: Vec<CString> = env
        .iter()
        .filter_map(|(k, v)| CString::new(format!("{}={}", k, v)).ok())
        .collect();

    match execve(&c_path, &c_argv, &c_env) {
        Err(nix::errno::Errno::EACCES) => {
            child_exit(report(&ShellError::PermissionDenied {
                path: argv[0].clone(),
            }));
        }
        Err(nix::errno::Errno::ENOEXEC) => {
            child_exit(report(&ShellError::NotExecutable {
                path: argv[0].clone(),
            }));
        }
        Err(err) => {
            child_exit(report(&ShellError::runtime(argv[0].clone(), err.to_string())));
        }
        Ok(_) => unreachable!(),
    }
}

/// Resolve a command name to an executable path: explicit paths directly,
/// everything else through `PATH`. Not-found errors carry suggestions
/// drawn from nearby path entries.
pub fn resolve_command_path(shell: &Shell, name: &str) -> Result<PathBuf, ShellError> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        if !path.exists() {
            return Err(ShellError::CommandNotFound {
                name: name.to_string(),
                suggestions: vec![],
            });
        }
        if !is_executable(&path) {
            return Err(ShellError::PermissionDenied {
                path: name.to_string(),
            });
        }
        return Ok(path);
    }

    let path_var = shell.vars.get("PATH").unwrap_or("/usr/bin:/bin").to_string();
    let mut found_non_executable = false;
    for dir in path_var.split(':').filter(|d| !d.is_empty()) {
        let candidate = Path::new(dir).join(name);
        if candidate.is_file() {
            if is_executable(&candidate) {
                return Ok(candidate);
            }
            found_non_executable = true;
        }
    }
    if found_non_executable {
        return Err(ShellError::PermissionDenied {
            path: name.to_string(),
        });
    }
    Err(ShellError::CommandNotFound {
        name: name.to_string(),
        suggestions: path_suggestions(shell, name),
    })
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// "Did you mean" candidates: builtins, functions, and PATH entries.
fn path_suggestions(shell: &Shell, name: &str) -> Vec<String> {
    let mut candidates: Vec<String> = builtins::names().map(|s| s.to_string()).collect();
    candidates.extend(shell.functions.keys().cloned());
    let path_var = shell.vars.get("PATH").unwrap_or("").to_string();
    for dir in path_var.split(':').filter(|d| !d.is_empty()).take(16) {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten().take(512) {
                if let Ok(file_name) = entry.file_name().into_string() {
                    candidates.push(file_name);
                }
            }
        }
    }
    closest_matches(name, candidates.into_iter())
}

/// Run arbitrary text as a background job in a forked child.
pub fn run_text_in_background(shell: &mut Shell, text: &str) -> ExecResult {
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            setup_child(shell, None);
            let pid = getpid();
            let _ = setpgid(pid, pid);
            let status = match execute_text(shell, text) {
                Ok(status) => status,
                Err(ControlFlow::Exit(code)) | Err(ControlFlow::Return(code)) => code,
                Err(_) => 0,
            };
            child_exit(status);
        }
        Ok(ForkResult::Parent { child }) => {
            let _ = setpgid(child, child);
            let job_id = shell
                .jobs
                .add_job(child, vec![child], format!("{} &", text.trim()), true);
            shell.last_bg_pid = Some(child.as_raw());
            println!("[{}] {}", job_id, child.as_raw());
            Ok(0)
        }
        Err(err) => Ok(shell.set_last_status(report(&ShellError::runtime(
            "fork",
            err.to_string(),
        )))),
    }
}

/// Fork a subshell running `body` and wait for it in the foreground.
pub fn run_subshell_foreground(
    shell: &mut Shell,
    body: &str,
    redirections: &[Redirection],
) -> ExecResult {
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            setup_child(shell, None);
            match redirect::apply_redirections(shell, redirections) {
                Ok(guard) => std::mem::forget(guard),
                Err(err) => child_exit(report(&err)),
            }
            let status = match execute_text(shell, body) {
                Ok(status) => status,
                Err(ControlFlow::Exit(code)) | Err(ControlFlow::Return(code)) => code,
                Err(_) => 0,
            };
            child_exit(status);
        }
        Ok(ForkResult::Parent { child }) => {
            let _ = setpgid(child, child);
            let job_id = shell
                .jobs
                .add_job(child, vec![child], body.to_string(), false);
            shell.jobs.give_terminal_to(child);
            let status = shell.jobs.wait_for_job(job_id);
            shell.jobs.reclaim_terminal();
            Ok(shell.set_last_status(status))
        }
        Err(err) => Ok(shell.set_last_status(report(&ShellError::runtime(
            "fork",
            err.to_string(),
        )))),
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
    fn test_resolve_explicit_path() {
        let sh = shell();
        assert!(resolve_command_path(&sh, "/bin/sh").is_ok());
        assert!(matches!(
            resolve_command_path(&sh, "/zz/no/such/bin"),
            Err(ShellError::CommandNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_via_path() {
        let mut sh = shell();
        sh.vars.set("PATH", "/usr/bin:/bin").unwrap();
        assert!(resolve_command_path(&sh, "sh").is_ok());
    }

    #[test]
    fn test_unknown_command_gets_suggestions() {
        let mut sh = shell();
        sh.vars.set("PATH", "/usr/bin:/bin").unwrap();
        match resolve_command_path(&sh, "ecoh") {
            Err(ShellError::CommandNotFound { suggestions, .. }) => {
                assert!(suggestions.contains(&"echo".to_string()));
            }
            other => panic!("expected CommandNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_non_executable_is_permission_denied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        let sh = shell();
        assert!(matches!(
            resolve_command_path(&sh, &path.to_string_lossy()),
            Err(ShellError::PermissionDenied { .. })
        ));
    }
}
