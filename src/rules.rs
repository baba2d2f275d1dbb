//! Rename rules and the ordered rule set.
//!
//! A rule pairs a keyword with a target base filename. The set is ordered:
//! rule order is the tie-break of the matching engine (first rule wins among
//! equal exact matches, and among equal partial scores), so insertion order
//! and [`RuleSet::move_rule`] are part of the public behavior.
//!
//! ## Invariants
//!
//! - Keywords are trimmed and non-empty, and do not start with `#` (that line
//!   would read back as a record header in a rule file).
//! - Keywords are unique across the set (exact, case-sensitive comparison,
//!   matching the case-sensitive engine). A duplicate is rejected and the set
//!   is left unchanged.
//! - Target names are stored sanitized (see [`naming::sanitize_file_name`])
//!   and must keep a non-empty base once a trailing `.ext` is stripped, so
//!   `"???"`, `"."` and `".png"` are all rejected.

use crate::naming;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Rule keyword must not be empty")]
    EmptyKeyword,
    #[error("Rule keyword must not start with '#': {0:?}")]
    KeywordStartsWithHash(String),
    #[error("Rule file name is empty after sanitization: {0:?}")]
    EmptyFileName(String),
    #[error("A rule with keyword {0:?} already exists")]
    DuplicateKeyword(String),
    #[error("No rule with id {0}")]
    NotFound(RuleId),
}

/// Opaque rule identifier, unique within one [`RuleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    /// Full text compared against metadata values.
    pub keyword: String,
    /// Sanitized base name, no extension.
    pub new_file_name: String,
    pub enabled: bool,
    /// Opt this rule into token-partial matching even when it is globally off.
    pub partial_match_enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    next_id: u64,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn contains_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim();
        self.rules.iter().any(|r| r.keyword == keyword)
    }

    /// Append an enabled rule with partial matching off.
    pub fn add(&mut self, keyword: &str, new_file_name: &str) -> Result<RuleId, RuleError> {
        self.add_with(keyword, new_file_name, false)
    }

    /// Append an enabled rule.
    pub fn add_with(
        &mut self,
        keyword: &str,
        new_file_name: &str,
        partial_match_enabled: bool,
    ) -> Result<RuleId, RuleError> {
        let (keyword, new_file_name) = validate(keyword, new_file_name)?;
        if self.contains_keyword(&keyword) {
            return Err(RuleError::DuplicateKeyword(keyword));
        }
        let id = RuleId(self.next_id);
        self.next_id += 1;
        self.rules.push(Rule {
            id,
            keyword,
            new_file_name,
            enabled: true,
            partial_match_enabled,
        });
        Ok(id)
    }

    /// Edit a rule's keyword and target name. Uniqueness is checked against the other rules.
    pub fn update(
        &mut self,
        id: RuleId,
        keyword: &str,
        new_file_name: &str,
    ) -> Result<(), RuleError> {
        let (keyword, new_file_name) = validate(keyword, new_file_name)?;
        if self.rules.iter().any(|r| r.id != id && r.keyword == keyword) {
            return Err(RuleError::DuplicateKeyword(keyword));
        }
        let rule = self.get_mut(id)?;
        rule.keyword = keyword;
        rule.new_file_name = new_file_name;
        Ok(())
    }

    pub fn remove(&mut self, id: RuleId) -> Result<Rule, RuleError> {
        let pos = self.position(id)?;
        Ok(self.rules.remove(pos))
    }

    pub fn set_enabled(&mut self, id: RuleId, enabled: bool) -> Result<(), RuleError> {
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_partial_match(&mut self, id: RuleId, enabled: bool) -> Result<(), RuleError> {
        self.get_mut(id)?.partial_match_enabled = enabled;
        Ok(())
    }

    /// Move a rule to `index` (clamped to the end), changing its priority.
    pub fn move_rule(&mut self, id: RuleId, index: usize) -> Result<(), RuleError> {
        let pos = self.position(id)?;
        let rule = self.rules.remove(pos);
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    fn position(&self, id: RuleId) -> Result<usize, RuleError> {
        self.rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(RuleError::NotFound(id))
    }

    fn get_mut(&mut self, id: RuleId) -> Result<&mut Rule, RuleError> {
        self.rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RuleError::NotFound(id))
    }
}

fn validate(keyword: &str, new_file_name: &str) -> Result<(String, String), RuleError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(RuleError::EmptyKeyword);
    }
    if keyword.starts_with('#') {
        return Err(RuleError::KeywordStartsWithHash(keyword.to_string()));
    }
    let name = naming::sanitize_file_name(new_file_name);
    if naming::strip_extension(&name).is_empty() {
        return Err(RuleError::EmptyFileName(new_file_name.to_string()));
    }
    Ok((keyword.to_string(), name))
}
