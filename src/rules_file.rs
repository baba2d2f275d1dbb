//! Plain-text rule files.
//!
//! ```text
//! #portrait
//! 1girl, solo,
//! upper body
//!
//! #landscape
//! scenery, no humans
//! ```
//!
//! A `#` line starts a record and holds the target filename. The non-empty
//! lines that follow, up to the next `#` line, are joined with single spaces
//! (internal whitespace runs collapsed) to form the keyword. Blank lines and
//! lines before the first `#` are ignored. A UTF-8 byte-order mark is
//! tolerated on input and always written on output.
//!
//! Keywords can never start with `#` (the rule set rejects them), so exported
//! text always reads back as the same records.
//!
//! Import never fails on content: records with an empty keyword or a name that
//! sanitizes to nothing are counted as invalid, and keywords already present
//! (in the rule set or earlier in the same file) are silently skipped.

use crate::rules::{Rule, RuleError, RuleId, RuleSet};
use std::path::Path;
use thiserror::Error;

pub const BOM: char = '\u{feff}';

#[derive(Error, Debug)]
pub enum RulesFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One `#name` + keyword block as written in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    pub new_file_name: String,
    pub keyword: String,
}

/// Outcome of importing a rule file into a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<RuleId>,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Split rule-file text into records. Records may have empty keywords.
pub fn parse_records(text: &str) -> Vec<RuleRecord> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut records = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix('#') {
            if let Some((name, lines)) = current.take() {
                records.push(finish_record(name, &lines));
            }
            current = Some((name.trim().to_string(), Vec::new()));
        } else if !line.is_empty() {
            if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }
    }
    if let Some((name, lines)) = current {
        records.push(finish_record(name, &lines));
    }
    records
}

fn finish_record(new_file_name: String, lines: &[&str]) -> RuleRecord {
    let keyword = lines
        .iter()
        .flat_map(|l| l.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    RuleRecord {
        new_file_name,
        keyword,
    }
}

/// Import rule-file text into `set`, appending in file order.
pub fn import_rules(set: &mut RuleSet, text: &str) -> ImportReport {
    let mut report = ImportReport::default();
    for record in parse_records(text) {
        if record.keyword.is_empty() {
            report.invalid += 1;
            continue;
        }
        match set.add(&record.keyword, &record.new_file_name) {
            Ok(id) => report.added.push(id),
            Err(RuleError::DuplicateKeyword(_)) => report.duplicates += 1,
            Err(e) => {
                log::warn!("skipping rule #{}: {e}", record.new_file_name);
                report.invalid += 1;
            }
        }
    }
    report
}

/// Serialize rules to the text format, BOM first.
pub fn export_rules(rules: &[Rule]) -> String {
    let mut out = String::new();
    out.push(BOM);
    for rule in rules {
        out.push('#');
        out.push_str(&rule.new_file_name);
        out.push('\n');
        out.push_str(&rule.keyword);
        out.push_str("\n\n");
    }
    out
}

/// Read a rule file from disk into a fresh set.
pub fn load_rules_file(path: &Path) -> Result<(RuleSet, ImportReport), RulesFileError> {
    let text = std::fs::read_to_string(path)?;
    let mut set = RuleSet::new();
    let report = import_rules(&mut set, &text);
    log::info!(
        "loaded {} rules from {} ({} duplicates, {} invalid)",
        report.added.len(),
        path.display(),
        report.duplicates,
        report.invalid
    );
    Ok((set, report))
}
