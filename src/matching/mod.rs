//! The matching engine: rules × metadata → one rename decision per image.
//!
//! # Algorithm
//!
//! For each image with non-empty metadata, enabled rules are evaluated in two
//! passes:
//!
//! 1. **Exact.** Rules in rule-set order, fields in metadata insertion order.
//!    The first field whose value contains the whole keyword wins with score
//!    1.0. All exact matches score the same, so first-found is the tie-break;
//!    the pass stops at the first hit.
//! 2. **Partial.** Only when pass 1 found nothing, and only for rules where
//!    partial matching is on (globally, or on the rule itself). Every
//!    rule × field pair is scored with [`tokens::score_tokens`]; pairs with
//!    `min_match_ratio <= score < 1.0` become [`MatchCandidate`]s. Candidates
//!    are stable-sorted by descending score, so equal scores stay in rule
//!    order. The top candidate wins. The sorted list is kept on the result only
//!    when there is more than one candidate to choose from.
//!
//! A token score of exactly 1.0 in pass 2 means every token occurs but the
//! keyword as a whole does not; such pairs are not candidates.
//!
//! # Purity
//!
//! [`apply_rules`] never mutates its inputs. It returns a fresh image
//! collection where every match has been recomputed from scratch; previous
//! results (including manual overrides) are discarded. The caller swaps the
//! new collection in (see [`crate::session::Session`]).

pub mod tokens;

use crate::metadata::FieldMap;
use crate::naming;
use crate::rules::Rule;
use crate::types::ImageRecord;
use serde::{Deserialize, Serialize};

pub use tokens::{TokenScore, score_tokens, tokenize};

pub const DEFAULT_MIN_MATCH_RATIO: f64 = 0.7;
pub const MIN_MATCH_RATIO_RANGE: (f64, f64) = (0.10, 0.99);

/// Settings governing pass 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialMatchSettings {
    /// Run partial matching for every rule, not only rules that opt in.
    pub enabled: bool,
    /// Inclusive lower bound on the token score, within [0.10, 0.99].
    pub min_match_ratio: f64,
    pub token_separator: String,
}

impl Default for PartialMatchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_match_ratio: DEFAULT_MIN_MATCH_RATIO,
            token_separator: ",".to_string(),
        }
    }
}

/// One scored rule × field pairing from the partial pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub rule: Rule,
    pub matched_field: String,
    pub match_score: f64,
    pub matched_tokens: Vec<String>,
    pub total_tokens: usize,
}

/// The rule applied to an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule: Rule,
    pub matched_field: String,
    pub new_file_name: String,
    pub match_score: f64,
    pub is_partial_match: bool,
    /// Ranked alternatives, best first. Empty unless the partial pass
    /// produced more than one candidate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<MatchCandidate>,
}

/// Find the rule to apply to one image.
pub fn match_metadata(
    metadata: &FieldMap,
    original_name: &str,
    rules: &[Rule],
    settings: &PartialMatchSettings,
) -> Option<RuleMatch> {
    if metadata.is_empty() {
        return None;
    }
    let enabled = || rules.iter().filter(|r| r.enabled && !r.keyword.is_empty());

    for rule in enabled() {
        for (field, value) in metadata.iter() {
            if value.contains(rule.keyword.as_str()) {
                return Some(RuleMatch {
                    rule: rule.clone(),
                    matched_field: field.to_string(),
                    new_file_name: naming::derive_file_name(&rule.new_file_name, original_name),
                    match_score: 1.0,
                    is_partial_match: false,
                    candidates: Vec::new(),
                });
            }
        }
    }

    let mut candidates = Vec::new();
    for rule in enabled().filter(|r| settings.enabled || r.partial_match_enabled) {
        for (field, value) in metadata.iter() {
            let scored = score_tokens(&rule.keyword, value, &settings.token_separator);
            if scored.score >= settings.min_match_ratio && scored.score < 1.0 {
                candidates.push(MatchCandidate {
                    rule: rule.clone(),
                    matched_field: field.to_string(),
                    match_score: scored.score,
                    matched_tokens: scored.matched_tokens,
                    total_tokens: scored.total_tokens,
                });
            }
        }
    }
    // stable: equal scores keep rule order
    candidates.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));

    let best = candidates.first()?.clone();
    if candidates.len() == 1 {
        candidates.clear();
    }
    Some(RuleMatch {
        new_file_name: naming::derive_file_name(&best.rule.new_file_name, original_name),
        rule: best.rule,
        matched_field: best.matched_field,
        match_score: best.match_score,
        is_partial_match: true,
        candidates,
    })
}

/// Recompute the match of every image against `rules`.
pub fn apply_rules(
    images: &[ImageRecord],
    rules: &[Rule],
    settings: &PartialMatchSettings,
) -> Vec<ImageRecord> {
    let updated: Vec<ImageRecord> = images
        .iter()
        .map(|image| ImageRecord {
            matched: match_metadata(&image.metadata, &image.file_name, rules, settings),
            ..image.clone()
        })
        .collect();
    log::debug!(
        "applied {} rules to {} images, {} matched",
        rules.len(),
        updated.len(),
        updated.iter().filter(|i| i.matched.is_some()).count()
    );
    updated
}

/// Replace an image's match with a specific candidate.
///
/// The retained candidate list is kept as-is. Selecting the same candidate
/// again yields the same result.
pub fn select_match(image: &ImageRecord, candidate: &MatchCandidate) -> RuleMatch {
    let candidates = image
        .matched
        .as_ref()
        .map(|m| m.candidates.clone())
        .unwrap_or_default();
    RuleMatch {
        rule: candidate.rule.clone(),
        matched_field: candidate.matched_field.clone(),
        new_file_name: naming::derive_file_name(&candidate.rule.new_file_name, &image.file_name),
        match_score: candidate.match_score,
        is_partial_match: candidate.match_score < 1.0,
        candidates,
    }
}
