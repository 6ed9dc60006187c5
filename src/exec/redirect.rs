//! Redirections
//!
//! Applies a command's redirection list in declaration order. In-process
//! callers (builtins, brace groups) get an `FdGuard` that snapshots the
//! affected descriptors and restores them on drop; forked children apply
//! the same list and `mem::forget` the guard before exec.

use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::unistd::{close, dup, dup2};

use crate::errors::ShellError;
use crate::expansion;
use crate::parser::parser::{RedirKind, Redirection};
use crate::parser::preprocessor::is_heredoc_placeholder;
use crate::shell::Shell;

static HEREDOC_TMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Snapshot of file descriptors replaced by redirections.
/// Dropping restores every descriptor to its saved state.
#[derive(Debug, Default)]
pub struct FdGuard {
    saved: Vec<(i32, Option<i32>)>,
}

impl FdGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `fd` before it is overwritten (once per fd).
    fn save(&mut self, fd: i32) {
        if self.saved.iter().any(|(f, _)| *f == fd) {
            return;
        }
        match dup(fd) {
            Ok(copy) => self.saved.push((fd, Some(copy))),
            // EBADF: the fd was closed; restore means re-closing
            Err(_) => self.saved.push((fd, None)),
        }
    }
}

impl Drop for FdGuard {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(&mut std::io::stdout());
        let _ = std::io::Write::flush(&mut std::io::stderr());
        for (fd, saved) in self.saved.drain(..).rev() {
            match saved {
                Some(copy) => {
                    let _ = dup2(copy, fd);
                    let _ = close(copy);
                }
                None => {
                    let _ = close(fd);
                }
            }
        }
    }
}

/// Apply redirections in declaration order, returning the restore guard.
pub fn apply_redirections(
    shell: &mut Shell,
    redirections: &[Redirection],
) -> Result<FdGuard, ShellError> {
    // anything already buffered belongs to the old descriptors
    let _ = std::io::Write::flush(&mut std::io::stdout());
    let _ = std::io::Write::flush(&mut std::io::stderr());
    let mut guard = FdGuard::new();
    for redirection in redirections {
        apply_one(shell, redirection, &mut guard)?;
    }
    Ok(guard)
}

fn default_fd(kind: RedirKind) -> i32 {
    match kind {
        RedirKind::InFile | RedirKind::HereString | RedirKind::DupIn | RedirKind::ReadWrite => 0,
        _ => 1,
    }
}

fn apply_one(
    shell: &mut Shell,
    redirection: &Redirection,
    guard: &mut FdGuard,
) -> Result<(), ShellError> {
    let fd = redirection.fd.unwrap_or_else(|| default_fd(redirection.kind));

    match redirection.kind {
        RedirKind::DupIn | RedirKind::DupOut => {
            let target = redirection.target.trim();
            if target == "-" {
                guard.save(fd);
                let _ = close(fd);
                return Ok(());
            }
            let source: i32 = target.parse().map_err(|_| {
                ShellError::redirection(target.to_string(), "ambiguous redirect")
            })?;
            guard.save(fd);
            dup2(source, fd)
                .map_err(|e| ShellError::redirection(target.to_string(), e.to_string()))?;
            return Ok(());
        }
        _ => {}
    }

    // heredoc placeholders resolve through the preprocessor map
    if redirection.kind == RedirKind::InFile && is_heredoc_placeholder(&redirection.target) {
        let heredoc = shell
            .here_doc(&redirection.target)
            .cloned()
            .ok_or_else(|| {
                ShellError::redirection(redirection.target.clone(), "here-document lost")
            })?;
        let content = if heredoc.expand {
            expansion::expand_heredoc(shell, &heredoc.content)?
        } else {
            heredoc.content
        };
        return splice_string(fd, &content, guard);
    }

    if redirection.kind == RedirKind::HereString {
        let mut word = expansion::expand_word_no_split(shell, &redirection.target)?;
        word.push('\n');
        return splice_string(fd, &word, guard);
    }

    let target = expansion::expand_word_no_split(shell, &redirection.target)?;
    if target.is_empty() {
        return Err(ShellError::redirection(
            redirection.target.clone(),
            "ambiguous redirect",
        ));
    }

    let file = match redirection.kind {
        RedirKind::InFile => OpenOptions::new().read(true).open(&target),
        RedirKind::OutFile => {
            if shell.opts.noclobber && std::path::Path::new(&target).exists() {
                return Err(ShellError::redirection(
                    target,
                    "cannot overwrite existing file",
                ));
            }
            OpenOptions::new().write(true).create(true).truncate(true).open(&target)
        }
        RedirKind::Clobber => OpenOptions::new().write(true).create(true).truncate(true).open(&target),
        RedirKind::Append => OpenOptions::new().append(true).create(true).open(&target),
        RedirKind::ReadWrite => OpenOptions::new().read(true).write(true).create(true).open(&target),
        _ => unreachable!(),
    }
    .map_err(|e| ShellError::redirection(target.clone(), e.to_string()))?;

    let raw = file.into_raw_fd();
    guard.save(fd);
    let result = dup2(raw, fd);
    let _ = close(raw);
    result.map_err(|e| ShellError::redirection(target, e.to_string()))?;
    Ok(())
}

/// Feed a string to `fd` through a temp file (heredocs, here-strings).
fn splice_string(fd: i32, content: &str, guard: &mut FdGuard) -> Result<(), ShellError> {
    let path = std::env::temp_dir().join(format!(
        "cjsh_heredoc_{}_{}",
        std::process::id(),
        HEREDOC_TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&path, content)
        .map_err(|e| ShellError::redirection("here-document", e.to_string()))?;
    let file = std::fs::File::open(&path)
        .map_err(|e| ShellError::redirection("here-document", e.to_string()))?;
    let _ = std::fs::remove_file(&path);
    guard.save(fd);
    let raw = file.as_raw_fd();
    let result = dup2(raw, fd);
    drop(file);
    result.map_err(|e| ShellError::redirection("here-document", e.to_string()))?;
    Ok(())
}

/// Serializes tests that swap the process-wide stdout/stderr descriptors.
#[cfg(test)]
pub(crate) mod test_support {
    lazy_static::lazy_static! {
        pub static ref FD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    fn redir(kind: RedirKind, fd: Option<i32>, target: &str) -> Redirection {
        Redirection {
            fd,
            kind,
            target: target.to_string(),
        }
    }

    // `cargo test`'s default output capture intercepts `println!` via a
    // thread-local hook rather than the real fd, which defeats these tests'
    // fd-level redirection. Write directly to fd 1 to bypass that capture.
    fn write_stdout_raw(s: &str) {
        let _ = nix::unistd::write(1, s.as_bytes());
    }

    #[test]
    fn test_output_redirection_writes_file() {
        let _lock = test_support::FD_LOCK.lock().unwrap();
        let mut sh = shell();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let target = path.to_string_lossy().to_string();
        {
            let _guard =
                apply_redirections(&mut sh, &[redir(RedirKind::OutFile, None, &target)]).unwrap();
            write_stdout_raw("redirected line\n");
        }
        // guard dropped: stdout is back, file has the output
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "redirected line\n");
    }

    #[test]
    fn test_append_redirection() {
        let _lock = test_support::FD_LOCK.lock().unwrap();
        let mut sh = shell();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "first\n").unwrap();
        let target = path.to_string_lossy().to_string();
        {
            let _guard =
                apply_redirections(&mut sh, &[redir(RedirKind::Append, None, &target)]).unwrap();
            write_stdout_raw("second\n");
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_noclobber_refuses_overwrite() {
        let mut sh = shell();
        sh.opts.noclobber = true;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.txt");
        std::fs::write(&path, "keep").unwrap();
        let target = path.to_string_lossy().to_string();
        assert!(apply_redirections(&mut sh, &[redir(RedirKind::OutFile, None, &target)]).is_err());
        // >| forces the overwrite
        assert!(apply_redirections(&mut sh, &[redir(RedirKind::Clobber, None, &target)]).is_ok());
    }

    #[test]
    fn test_missing_input_file_fails() {
        let mut sh = shell();
        assert!(apply_redirections(
            &mut sh,
            &[redir(RedirKind::InFile, None, "/zz/definitely/missing")]
        )
        .is_err());
    }

    #[test]
    fn test_ambiguous_dup_target_fails() {
        let mut sh = shell();
        assert!(
            apply_redirections(&mut sh, &[redir(RedirKind::DupOut, Some(2), "notanum")]).is_err()
        );
    }
}
