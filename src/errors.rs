//! Shell Error Taxonomy
//!
//! Every failure the core can report is one of these kinds. Diagnostics
//! print in the uniform format:
//!
//!   cjsh: <kind>: <context>: <message>
//!       Suggestions:
//!         <suggestion>
//!
//! The diagnostic text is not a stable interface; only the `cjsh: <kind>:`
//! prefix is expected to survive.

use thiserror::Error;

/// Unified error type for parsing, expansion, and execution failures.
///
/// Control flow (break/continue/return/exit) is NOT an error; see
/// `interpreter::control_flow`.
#[derive(Debug, Clone, Error)]
pub enum ShellError {
    #[error("syntax error: {context}: {message}")]
    Syntax { context: String, message: String },

    #[error("command not found: {name}")]
    CommandNotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("not executable: {path}")]
    NotExecutable { path: String },

    #[error("invalid argument: {context}: {message}")]
    InvalidArgument { context: String, message: String },

    #[error("runtime error: {context}: {message}")]
    Runtime { context: String, message: String },

    #[error("arithmetic error: {context}: {message}")]
    Arithmetic { context: String, message: String },

    #[error("redirection error: {context}: {message}")]
    Redirection { context: String, message: String },

    #[error("job control error: {context}: {message}")]
    JobControl { context: String, message: String },

    #[error("readonly variable: {name}")]
    ReadonlyViolation { name: String },

    #[error("unbound variable: {name}")]
    Unbound { name: String },

    #[error("{context}: {message}")]
    Expansion { context: String, message: String },
}

impl ShellError {
    pub fn syntax(context: impl Into<String>, message: impl Into<String>) -> Self {
        ShellError::Syntax {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(context: impl Into<String>, message: impl Into<String>) -> Self {
        ShellError::InvalidArgument {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn runtime(context: impl Into<String>, message: impl Into<String>) -> Self {
        ShellError::Runtime {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn arithmetic(context: impl Into<String>, message: impl Into<String>) -> Self {
        ShellError::Arithmetic {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn redirection(context: impl Into<String>, message: impl Into<String>) -> Self {
        ShellError::Redirection {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn job_control(context: impl Into<String>, message: impl Into<String>) -> Self {
        ShellError::JobControl {
            context: context.into(),
            message: message.into(),
        }
    }

    /// The exit status a command reporting this error produces.
    pub fn exit_status(&self) -> i32 {
        match self {
            ShellError::Syntax { .. } => 2,
            ShellError::CommandNotFound { .. } => 127,
            ShellError::PermissionDenied { .. } | ShellError::NotExecutable { .. } => 126,
            ShellError::InvalidArgument { .. } => 2,
            ShellError::ReadonlyViolation { .. } => 1,
            ShellError::Unbound { .. } => 1,
            ShellError::Arithmetic { .. } => 1,
            _ => 1,
        }
    }

    fn suggestions(&self) -> &[String] {
        match self {
            ShellError::CommandNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

/// Print the uniform single-line diagnostic (plus suggestions) to stderr.
pub fn print_error(err: &ShellError) {
    eprintln!("cjsh: {}", err);
    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        eprintln!("    Suggestions:");
        for s in suggestions {
            eprintln!("      {}", s);
        }
    }
}

/// Report an error and return the status it maps to.
/// The usual tail call of a failed command path.
pub fn report(err: &ShellError) -> i32 {
    print_error(err);
    err.exit_status()
}

/// Levenshtein distance, used to rank "did you mean" suggestions for
/// unknown commands and missing cd targets.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Pick the closest candidates to `target`, nearest first.
/// Candidates further than 3 edits away are not worth suggesting.
pub fn closest_matches(target: &str, candidates: impl Iterator<Item = String>) -> Vec<String> {
    let mut scored: Vec<(usize, String)> = candidates
        .map(|c| (edit_distance(target, &c), c))
        .filter(|(d, _)| *d <= 3)
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(3).map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(
            ShellError::CommandNotFound {
                name: "x".into(),
                suggestions: vec![]
            }
            .exit_status(),
            127
        );
        assert_eq!(
            ShellError::PermissionDenied { path: "/a".into() }.exit_status(),
            126
        );
        assert_eq!(ShellError::syntax("if", "missing fi").exit_status(), 2);
        assert_eq!(
            ShellError::ReadonlyViolation { name: "R".into() }.exit_status(),
            1
        );
    }

    #[test]
    fn test_display_format() {
        let e = ShellError::syntax("line 3", "unexpected token");
        assert_eq!(e.to_string(), "syntax error: line 3: unexpected token");
        let e = ShellError::CommandNotFound {
            name: "grpe".into(),
            suggestions: vec!["grep".into()],
        };
        assert_eq!(e.to_string(), "command not found: grpe");
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("grep", "grpe"), 2);
        assert_eq!(edit_distance("ls", "ls"), 0);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_closest_matches_ranked() {
        let candidates = vec!["grep".to_string(), "egrep".to_string(), "cat".to_string()];
        let m = closest_matches("grpe", candidates.into_iter());
        assert_eq!(m[0], "grep");
        assert!(!m.contains(&"cat".to_string()));
    }
}
