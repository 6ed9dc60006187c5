//! Word Splitting
//!
//! IFS-based field splitting over scanner output. Only characters flagged
//! splittable (unquoted expansion results) can delimit fields; literal and
//! quoted characters always join their neighbors. IFS whitespace runs
//! coalesce into one delimiter and never produce empty fields; IFS
//! non-whitespace characters delimit exactly once each.

use crate::expansion::{FlaggedChar, Piece};

/// Split scanner pieces into fields. An empty field survives only when it
/// was anchored by quoting (`""`, `"$empty"`) or a `"$@"` boundary.
pub fn split_fields(pieces: &[Piece], ifs: &str) -> Vec<Vec<FlaggedChar>> {
    let mut fields: Vec<Vec<FlaggedChar>> = Vec::new();
    let mut current: Vec<FlaggedChar> = Vec::new();
    let mut anchored = false;

    let is_ifs_ws = |c: char| (c == ' ' || c == '\t' || c == '\n') && ifs.contains(c);
    let is_ifs_other = |c: char| ifs.contains(c) && !(c == ' ' || c == '\t' || c == '\n');

    for piece in pieces {
        match piece {
            Piece::Anchor => anchored = true,
            Piece::HardBreak => {
                // `"$@"` boundary: both sides are real fields
                fields.push(std::mem::take(&mut current));
                anchored = true;
            }
            Piece::Chars(chars) => {
                for fc in chars {
                    if fc.splittable && !fc.quoted && is_ifs_ws(fc.c) {
                        if !current.is_empty() || anchored {
                            fields.push(std::mem::take(&mut current));
                            anchored = false;
                        }
                    } else if fc.splittable && !fc.quoted && is_ifs_other(fc.c) {
                        fields.push(std::mem::take(&mut current));
                        anchored = false;
                    } else {
                        current.push(*fc);
                    }
                }
            }
        }
    }
    if !current.is_empty() || anchored {
        fields.push(current);
    }
    fields
}
