//! Tilde Expansion
//!
//! `~` at the start of a word becomes `$HOME`; `~user` becomes that user's
//! home directory from the password database. Applies only when the tilde
//! prefix is unquoted; unknown users stay literal.

use std::ffi::CString;

use crate::shell::Shell;

/// Expand a leading unquoted tilde. Anything else passes through.
pub fn expand_tilde(shell: &Shell, word: &str) -> String {
    if !word.starts_with('~') {
        return word.to_string();
    }
    let prefix_end = word.find('/').unwrap_or(word.len());
    let prefix = &word[1..prefix_end];
    let rest = &word[prefix_end..];

    // a quoted or expanded prefix disables tilde expansion
    if prefix.contains(['\'', '"', '\\', '$', '`']) {
        return word.to_string();
    }

    if prefix.is_empty() {
        let home = shell.vars.get("HOME").unwrap_or("/").to_string();
        return format!("{}{}", home, rest);
    }

    match user_home(prefix) {
        Some(home) => format!("{}{}", home, rest),
        None => word.to_string(),
    }
}

/// Look up a user's home directory via getpwnam.
fn user_home(user: &str) -> Option<String> {
    let cname = CString::new(user).ok()?;
    // getpwnam reads the passwd database; the returned struct is static
    unsafe {
        let pw = libc::getpwnam(cname.as_ptr());
        if pw.is_null() {
            return None;
        }
        let dir = (*pw).pw_dir;
        if dir.is_null() {
            return None;
        }
        Some(
            std::ffi::CStr::from_ptr(dir)
                .to_string_lossy()
                .into_owned(),
        )
    }
}
