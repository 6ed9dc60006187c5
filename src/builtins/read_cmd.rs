//! read
//!
//! `read [-r] [-p PROMPT] [-t SECONDS] [NAME...]`. Reads one line from
//! fd 0 (whatever redirection put there), splits it on IFS, and assigns
//! fields to the named variables; the last name takes the remainder.
//! `-t` bounds the wait with a poll deadline, the shell's only timed
//! primitive.

use std::io::Write;

use nix::unistd::read as fd_read;

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::shell::Shell;
use crate::vars::is_valid_identifier;

pub fn read_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let mut raw = false;
    let mut prompt: Option<String> = None;
    let mut timeout: Option<f64> = None;
    let mut names: Vec<String> = Vec::new();

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "-r" => raw = true,
            "-p" => {
                i += 1;
                prompt = argv.get(i).cloned();
            }
            "-t" => {
                i += 1;
                match argv.get(i).and_then(|a| a.parse::<f64>().ok()) {
                    Some(secs) if secs >= 0.0 => timeout = Some(secs),
                    _ => {
                        return Ok(report(&ShellError::invalid_argument(
                            "read",
                            "-t: timeout must be a non-negative number",
                        )))
                    }
                }
            }
            name => names.push(name.to_string()),
        }
        i += 1;
    }
    if names.is_empty() {
        names.push("REPLY".to_string());
    }
    for name in &names {
        if !is_valid_identifier(name) {
            return Ok(report(&ShellError::invalid_argument(
                "read",
                format!("`{}' is not a valid identifier", name),
            )));
        }
    }

    if let Some(prompt) = &prompt {
        eprint!("{}", prompt);
        let _ = std::io::stderr().flush();
    }

    let line = match read_line(raw, timeout) {
        Ok(Some(line)) => line,
        // timeout or EOF with no data
        Ok(None) => {
            for name in &names {
                let _ = shell.vars.set(name, "");
            }
            return Ok(1);
        }
        Err(err) => return Ok(report(&err)),
    };

    assign_fields(shell, &names, &line);
    Ok(0)
}

/// Read one line from fd 0, honoring an optional deadline.
fn read_line(raw: bool, timeout: Option<f64>) -> Result<Option<String>, ShellError> {
    let deadline = timeout.map(|secs| std::time::Instant::now() + std::time::Duration::from_secs_f64(secs));
    let mut line = String::new();
    let mut buf = [0u8; 1];
    let mut pending_escape = false;

    loop {
        if let Some(deadline) = deadline {
            let now = std::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let remaining_ms = deadline.duration_since(now).as_millis().min(i32::MAX as u128) as i32;
            let mut pollfd = libc::pollfd {
                fd: libc::STDIN_FILENO,
                events: libc::POLLIN,
                revents: 0,
            };
            let ready = unsafe { libc::poll(&mut pollfd, 1, remaining_ms) };
            if ready == 0 {
                return Ok(None);
            }
            if ready < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ShellError::runtime("read", err.to_string()));
            }
        }

        match fd_read(libc::STDIN_FILENO, &mut buf) {
            Ok(0) => {
                if line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(line));
            }
            Ok(_) => {
                let c = buf[0] as char;
                if pending_escape {
                    pending_escape = false;
                    if c == '\n' {
                        // escaped newline joins lines
                        continue;
                    }
                    line.push(c);
                    continue;
                }
                if !raw && c == '\\' {
                    pending_escape = true;
                    continue;
                }
                if c == '\n' {
                    return Ok(Some(line));
                }
                line.push(c);
            }
            Err(nix::errno::Errno::EINTR) => continue,
            Err(err) => return Err(ShellError::runtime("read", err.to_string())),
        }
    }
}

/// IFS-split `line` into the names; the last name takes the remainder.
fn assign_fields(shell: &mut Shell, names: &[String], line: &str) {
    let ifs = shell.vars.get("IFS").unwrap_or(" \t\n").to_string();
    let is_ifs = |c: char| ifs.contains(c);

    let mut rest = line.trim_start_matches(|c: char| is_ifs(c) && c.is_whitespace());
    for (i, name) in names.iter().enumerate() {
        if i == names.len() - 1 {
            let value = rest.trim_end_matches(|c: char| is_ifs(c) && c.is_whitespace());
            let _ = shell.vars.set(name, value);
            return;
        }
        match rest.find(is_ifs) {
            Some(pos) => {
                let _ = shell.vars.set(name, &rest[..pos]);
                rest = rest[pos + 1..].trim_start_matches(|c: char| is_ifs(c) && c.is_whitespace());
            }
            None => {
                let _ = shell.vars.set(name, rest);
                rest = "";
            }
        }
    }
}
