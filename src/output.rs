//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Every image is shown by its positional index and original filename, with
//! details (matched field, rule, candidates) on indented context lines. The
//! same header shape is used by scan and plan output so the two can be read
//! side by side.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Images
//! 001 00001.png (4 fields)
//!     PNG:parameters: 1girl, standing, full body, outdoors, blue sky...
//! 002 00002.jpg (no metadata)
//!
//! Rejected
//!     huge.png: file exceeds 10485760 bytes
//!
//! Scanned 2 images, 1 rejected
//! ```
//!
//! ## Plan
//!
//! ```text
//! 001 00001.png → portrait.png
//!     Rule: portrait (exact, PNG:parameters)
//! 002 00002.png → indoor.png
//!     Rule: indoor (partial 0.75, PNG:parameters)
//!     Candidates:
//!         [0] indoor 0.75 (3/4 tokens, PNG:parameters)
//!         [1] night 0.50 (2/4 tokens, PNG:parameters)
//! 003 00003.png (no match)
//!
//! Matched 2 of 3 images (1 partial)
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::export::{ExportPlan, ExportSummary};
use crate::rules::Rule;
use crate::rules_file::ImportReport;
use crate::scan::Manifest;
use crate::types::ImageRecord;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Metadata values often span lines; show them on one.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn image_header(index: usize, image: &ImageRecord) -> String {
    format!("{} {}", format_index(index), image.file_name)
}

const PREVIEW_CHARS: usize = 60;

// ============================================================================
// Scan output
// ============================================================================

/// Format scan output: every image with its field count and the first field.
pub fn format_scan_output(manifest: &Manifest) -> Vec<String> {
    let mut lines = Vec::new();

    if !manifest.images.is_empty() {
        lines.push("Images".to_string());
    }
    for (i, image) in manifest.images.iter().enumerate() {
        let header = image_header(i + 1, image);
        match image.metadata.len() {
            0 => lines.push(format!("{header} (no metadata)")),
            1 => lines.push(format!("{header} (1 field)")),
            n => lines.push(format!("{header} ({n} fields)")),
        }
        if let Some((key, value)) = image.metadata.iter().next() {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                key,
                truncate_desc(&one_line(value), PREVIEW_CHARS)
            ));
        }
    }

    if !manifest.rejected.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Rejected".to_string());
        for rejection in &manifest.rejected {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                rejection.path,
                rejection.reason
            ));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let mut summary = format!("Scanned {} images", manifest.images.len());
    if !manifest.rejected.is_empty() {
        summary.push_str(&format!(", {} rejected", manifest.rejected.len()));
    }
    if manifest.truncated {
        summary.push_str(" (truncated by limits)");
    }
    if manifest.cancelled {
        summary.push_str(" (cancelled)");
    }
    lines.push(summary);
    lines
}

pub fn print_scan_output(manifest: &Manifest) {
    for line in format_scan_output(manifest) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan output
// ============================================================================

/// Format the rename plan: one entry per image with its match and candidates.
pub fn format_plan_output(images: &[ImageRecord]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut matched = 0;
    let mut partial = 0;

    for (i, image) in images.iter().enumerate() {
        let header = image_header(i + 1, image);
        let Some(m) = &image.matched else {
            lines.push(format!("{header} (no match)"));
            continue;
        };
        matched += 1;
        lines.push(format!("{header} → {}", m.new_file_name));

        let kind = if m.is_partial_match {
            partial += 1;
            format!("partial {:.2}", m.match_score)
        } else {
            "exact".to_string()
        };
        lines.push(format!(
            "{}Rule: {} ({}, {})",
            indent(1),
            m.rule.new_file_name,
            kind,
            m.matched_field
        ));

        if !m.candidates.is_empty() {
            lines.push(format!("{}Candidates:", indent(1)));
            for (n, c) in m.candidates.iter().enumerate() {
                lines.push(format!(
                    "{}[{}] {} {:.2} ({}/{} tokens, {})",
                    indent(2),
                    n,
                    c.rule.new_file_name,
                    c.match_score,
                    c.matched_tokens.len(),
                    c.total_tokens,
                    c.matched_field
                ));
            }
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let mut summary = format!("Matched {} of {} images", matched, images.len());
    if partial > 0 {
        summary.push_str(&format!(" ({} partial)", partial));
    }
    lines.push(summary);
    lines
}

pub fn print_plan_output(images: &[ImageRecord]) {
    for line in format_plan_output(images) {
        println!("{}", line);
    }
}

// ============================================================================
// Export output
// ============================================================================

/// Format the export result: each batch with its source → destination pairs.
pub fn format_export_output(plan: &ExportPlan, summary: &ExportSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for batch in &plan.batches {
        let depth = match plan.batch_dir(batch) {
            Some(dir) => {
                lines.push(format!("{}/ ({} files)", dir, batch.entries.len()));
                1
            }
            None => 0,
        };
        for entry in &batch.entries {
            lines.push(format!(
                "{}{} → {}",
                indent(depth),
                entry.source_path,
                entry.file_name
            ));
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Exported {} files in {} {} to {}",
        summary.files_written,
        summary.batches,
        if summary.batches == 1 { "batch" } else { "batches" },
        summary.output_dir.display()
    ));
    if summary.skipped_unmatched > 0 {
        lines.push(format!(
            "Skipped {} unmatched images",
            summary.skipped_unmatched
        ));
    }
    lines
}

pub fn print_export_output(plan: &ExportPlan, summary: &ExportSummary) {
    for line in format_export_output(plan, summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Rules output
// ============================================================================

/// Format the loaded rule set in priority order, followed by the import tally.
pub fn format_rules_output(rules: &[Rule], report: &ImportReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, rule) in rules.iter().enumerate() {
        let mut flags = Vec::new();
        if !rule.enabled {
            flags.push("disabled");
        }
        if rule.partial_match_enabled {
            flags.push("partial");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        lines.push(format!(
            "{} {}{}",
            format_index(i + 1),
            rule.new_file_name,
            flags
        ));
        lines.push(format!(
            "{}Keyword: {}",
            indent(1),
            truncate_desc(&rule.keyword, PREVIEW_CHARS)
        ));
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    let mut summary = format!("Loaded {} rules", report.added.len());
    if report.duplicates > 0 {
        summary.push_str(&format!(", {} duplicates skipped", report.duplicates));
    }
    if report.invalid > 0 {
        summary.push_str(&format!(", {} invalid", report.invalid));
    }
    lines.push(summary);
    lines
}

pub fn print_rules_output(rules: &[Rule], report: &ImportReport) {
    for line in format_rules_output(rules, report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
