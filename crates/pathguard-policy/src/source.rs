//! Line-oriented policy source format.
//!
//! Policies are written one per line in the casbin CSV convention:
//!
//! ```text
//! # permission rules: p, subject, resource, action
//! p, user, project.id, query
//! p, admin, project.name, query
//!
//! # role inheritance: g, member, role
//! g, alice, admin
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Lines are read with
//! the `csv` crate, so fields containing separators can be quoted.

use crate::error::{PolicyError, PolicyResult};
use crate::types::{PolicyRule, RoleGrouping};

/// Rules and groupings parsed from a policy source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PolicySource {
    /// Permission rules, in source order.
    pub rules: Vec<PolicyRule>,
    /// Role groupings, in source order.
    pub groupings: Vec<RoleGrouping>,
}

impl PolicySource {
    /// Parses a policy source.
    ///
    /// Fields may be quoted (`p, user, "a,b", query`) as in casbin policy
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] with the offending 1-based line number if
    /// a line is malformed CSV, has an unknown type, the wrong number of
    /// fields, or an empty field.
    pub fn parse(text: &str) -> PolicyResult<Self> {
        let normalized = strip_field_indent(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(normalized.as_bytes());

        let mut source = Self::default();

        for result in reader.records() {
            let record = result.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line() as usize);
                PolicyError::parse(line, e.to_string())
            })?;
            let line_no = record.position().map_or(0, |p| p.line() as usize);

            let fields: Vec<&str> = record.iter().collect();
            if fields.iter().any(|f| f.is_empty()) {
                return Err(PolicyError::parse(line_no, "empty field"));
            }

            match fields.as_slice() {
                ["p", subject, resource, action] => {
                    source
                        .rules
                        .push(PolicyRule::new(*subject, *resource, *action));
                }
                ["g", member, role] => {
                    source.groupings.push(RoleGrouping::new(*member, *role));
                }
                ["p", ..] => {
                    return Err(PolicyError::parse(
                        line_no,
                        format!("expected 3 fields after 'p', found {}", fields.len() - 1),
                    ));
                }
                ["g", ..] => {
                    return Err(PolicyError::parse(
                        line_no,
                        format!("expected 2 fields after 'g', found {}", fields.len() - 1),
                    ));
                }
                [other, ..] => {
                    return Err(PolicyError::parse(
                        line_no,
                        format!("unknown policy type '{other}'"),
                    ));
                }
                [] => {}
            }
        }

        Ok(source)
    }
}

/// Drops whitespace at the start of every unquoted field.
///
/// The CSV reader only recognizes a quoted field when the quote is its first
/// byte, while policy files put a space after each separator. Whitespace-only
/// lines become empty and are skipped by the reader; indented `#` lines become
/// comments. Line breaks are kept so record positions match the input.
fn strip_field_indent(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;
    let mut field_start = true;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                field_start = false;
            }
            ',' | '\n' if !in_quotes => {
                field_start = true;
            }
            ' ' | '\t' | '\r' if field_start && !in_quotes => continue,
            _ => field_start = false,
        }
        out.push(c);
    }

    out
}
