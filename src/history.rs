//! Command History
//!
//! In-memory history list plus the on-disk sink: a newline-separated UTF-8
//! file, one entry per line. Comment lines beginning with `#` are skipped
//! on read. Entries are appended before `precmd` hooks run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HISTORY_FILE_NAME: &str = ".cjsh_history";

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    path: Option<PathBuf>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load history from the file under `home`, skipping comments and
    /// blank lines.
    pub fn load(home: &Path) -> Self {
        let path = home.join(HISTORY_FILE_NAME);
        let mut entries = Vec::new();
        if let Ok(content) = std::fs::read_to_string(&path) {
            for line in content.lines() {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                entries.push(line.to_string());
            }
        }
        History {
            entries,
            path: Some(path),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one command. Blank input and immediate duplicates are not
    /// recorded.
    pub fn add(&mut self, entry: &str) {
        let entry = entry.trim();
        if entry.is_empty() {
            return;
        }
        if self.entries.last().map(|e| e.as_str()) == Some(entry) {
            return;
        }
        self.entries.push(entry.to_string());
        if let Some(path) = &self.path {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{}", entry);
            }
        }
    }

    /// Numbered listing for the `history` builtin.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            out.push_str(&format!("{:5}  {}\n", i + 1, entry));
        }
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_skips_blank_and_duplicates() {
        let mut h = History::new();
        h.add("echo a");
        h.add("");
        h.add("echo a");
        h.add("echo b");
        assert_eq!(h.entries(), &["echo a", "echo b"]);
    }

    #[test]
    fn test_listing_numbered() {
        let mut h = History::new();
        h.add("ls");
        h.add("pwd");
        let listing = h.listing();
        assert!(listing.contains("1  ls"));
        assert!(listing.contains("2  pwd"));
    }

    #[test]
    fn test_load_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(HISTORY_FILE_NAME),
            "# comment\necho hi\n\necho bye\n",
        )
        .unwrap();
        let h = History::load(dir.path());
        assert_eq!(h.entries(), &["echo hi", "echo bye"]);
    }

    #[test]
    fn test_roundtrip_count_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = History::load(dir.path());
        h.add("one");
        h.add("two");
        let content =
            std::fs::read_to_string(dir.path().join(HISTORY_FILE_NAME)).unwrap();
        let non_comment = content
            .lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .count();
        assert_eq!(non_comment, h.len());
    }
}
