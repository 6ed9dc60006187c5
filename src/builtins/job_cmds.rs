//! Job-Control Builtins
//!
//! `jobs`, `fg`, `bg`, `wait`, `disown`. All of them go through the job
//! manager, which owns the job table and the terminal.

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::jobs::JobState;
use crate::shell::Shell;

pub fn jobs_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let mut long = false;
    let mut pids_only = false;
    for arg in &argv[1..] {
        match arg.as_str() {
            "-l" => long = true,
            "-p" => pids_only = true,
            "-lp" | "-pl" => {
                long = true;
                pids_only = true;
            }
            other => {
                return Ok(report(&ShellError::invalid_argument(
                    "jobs",
                    format!("{}: invalid option", other),
                )))
            }
        }
    }
    shell.jobs.reap_pending();
    print!("{}", shell.jobs.listing(long, pids_only));
    Ok(0)
}

pub fn fg_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    shell.jobs.reap_pending();
    let id = match resolve(shell, argv.get(1)) {
        Ok(id) => id,
        Err(err) => return Ok(report(&err)),
    };
    let (text, stopped) = match shell.jobs.find(id) {
        Some(job) => (job.text.clone(), job.state == JobState::Stopped),
        None => return Ok(report(&ShellError::job_control("fg", "no such job"))),
    };
    println!("{}", text);
    match shell.jobs.put_in_foreground(id, stopped) {
        Ok(status) => Ok(status),
        Err(err) => Ok(report(&err)),
    }
}

pub fn bg_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    shell.jobs.reap_pending();
    let id = match resolve(shell, argv.get(1)) {
        Ok(id) => id,
        Err(err) => return Ok(report(&err)),
    };
    match shell.jobs.put_in_background(id) {
        Ok(()) => {
            if let Some(job) = shell.jobs.find(id) {
                println!("[{}]{} {} &", job.id, shell.jobs.marker(id), job.text);
            }
            Ok(0)
        }
        Err(err) => Ok(report(&err)),
    }
}

pub fn wait_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    shell.jobs.reap_pending();
    if argv.len() == 1 {
        return Ok(shell.jobs.wait_for_all(&[]));
    }
    let mut ids = Vec::new();
    for spec in &argv[1..] {
        if spec.starts_with('%') {
            match shell.jobs.resolve_spec(spec) {
                Ok(id) => ids.push(id),
                Err(err) => return Ok(report(&err)),
            }
        } else if let Ok(pid) = spec.parse::<i32>() {
            // find the job owning this pid
            match shell
                .jobs
                .jobs()
                .iter()
                .find(|j| j.pids.iter().any(|p| p.as_raw() == pid))
            {
                Some(job) => ids.push(job.id),
                None => {
                    return Ok(report(&ShellError::job_control(
                        spec.clone(),
                        "not a child of this shell",
                    )))
                }
            }
        } else {
            return Ok(report(&ShellError::invalid_argument(
                "wait",
                format!("{}: not a pid or valid job spec", spec),
            )));
        }
    }
    Ok(shell.jobs.wait_for_all(&ids))
}

pub fn disown_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if argv.get(1).map(|a| a == "-a").unwrap_or(false) {
        let _ = shell.jobs.disown(&[], true);
        return Ok(0);
    }
    let mut ids = Vec::new();
    if argv.len() == 1 {
        match shell.jobs.resolve_spec("%%") {
            Ok(id) => ids.push(id),
            Err(err) => return Ok(report(&err)),
        }
    }
    for spec in &argv[1..] {
        match shell.jobs.resolve_spec(spec) {
            Ok(id) => ids.push(id),
            Err(err) => return Ok(report(&err)),
        }
    }
    match shell.jobs.disown(&ids, false) {
        Ok(()) => Ok(0),
        Err(err) => Ok(report(&err)),
    }
}

/// Default job spec: the current job.
fn resolve(shell: &Shell, spec: Option<&String>) -> Result<usize, ShellError> {
    match spec {
        Some(spec) => shell.jobs.resolve_spec(spec),
        None => shell.jobs.resolve_spec("%%"),
    }
}
