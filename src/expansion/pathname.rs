//! Pathname Expansion
//!
//! Filesystem globbing over split fields. A field is a pattern only when
//! it contains glob metacharacters that were not quoted; quoted
//! metacharacters are bracket-escaped so the matcher treats them
//! literally. Directories get a trailing `/` appended. A pattern with no
//! matches stays literal, and `noglob` disables the stage entirely.

use glob::{glob_with, MatchOptions, Pattern};

use crate::expansion::FlaggedChar;

/// Expand one field into argv entries.
pub fn expand_field(field: &[FlaggedChar], noglob: bool) -> Vec<String> {
    let literal: String = field.iter().map(|fc| fc.c).collect();
    let has_unquoted_glob = field
        .iter()
        .any(|fc| !fc.quoted && matches!(fc.c, '*' | '?' | '['));
    if noglob || !has_unquoted_glob {
        return vec![literal];
    }

    let mut pattern = String::new();
    for fc in field {
        if fc.quoted {
            pattern.push_str(&Pattern::escape(&fc.c.to_string()));
        } else {
            pattern.push(fc.c);
        }
    }

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let entries = match glob_with(&pattern, options) {
        Ok(paths) => paths,
        Err(_) => return vec![literal],
    };

    let mut matches: Vec<String> = Vec::new();
    for entry in entries.flatten() {
        let mut text = entry.to_string_lossy().into_owned();
        if entry.is_dir() && !text.ends_with('/') {
            text.push('/');
        }
        matches.push(text);
    }
    if matches.is_empty() {
        // no match: the word stays literal
        vec![literal]
    } else {
        matches.sort();
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unquoted(s: &str) -> Vec<FlaggedChar> {
        s.chars()
            .map(|c| FlaggedChar {
                c,
                quoted: false,
                splittable: false,
            })
            .collect()
    }

    fn quoted(s: &str) -> Vec<FlaggedChar> {
        s.chars()
            .map(|c| FlaggedChar {
                c,
                quoted: true,
                splittable: false,
            })
            .collect()
    }

    #[test]
    fn test_plain_word_passthrough() {
        assert_eq!(expand_field(&unquoted("plain"), false), vec!["plain"]);
    }

    #[test]
    fn test_quoted_star_not_a_pattern() {
        assert_eq!(expand_field(&quoted("*"), false), vec!["*"]);
    }

    #[test]
    fn test_noglob_disables() {
        assert_eq!(
            expand_field(&unquoted("*zz_no_match*"), true),
            vec!["*zz_no_match*"]
        );
    }

    #[test]
    fn test_no_match_stays_literal() {
        assert_eq!(
            expand_field(&unquoted("/zz_definitely_missing_*"), false),
            vec!["/zz_definitely_missing_*"]
        );
    }

    #[test]
    fn test_glob_matches_real_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("c.log"), "").unwrap();
        let pattern = format!("{}/*.txt", dir.path().display());
        let result = expand_field(&unquoted(&pattern), false);
        assert_eq!(result.len(), 2);
        assert!(result[0].ends_with("a.txt"));
        assert!(result[1].ends_with("b.txt"));
    }

    #[test]
    fn test_directories_get_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let pattern = format!("{}/s*", dir.path().display());
        let result = expand_field(&unquoted(&pattern), false);
        assert_eq!(result.len(), 1);
        assert!(result[0].ends_with("sub/"));
    }

    #[test]
    fn test_hidden_files_need_literal_dot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        std::fs::write(dir.path().join("shown"), "").unwrap();
        let pattern = format!("{}/*", dir.path().display());
        let result = expand_field(&unquoted(&pattern), false);
        assert_eq!(result.len(), 1);
        assert!(result[0].ends_with("shown"));
    }
}
