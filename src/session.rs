//! Session coordinator: rules, settings, and the image collection.
//!
//! The session is the single owner of mutable state. Every change to the rule
//! set or the partial-match settings re-runs [`apply_rules`] over the whole
//! collection and swaps the result in as one step, so readers only ever see a
//! collection that is consistent with the current rules:
//!
//! ```text
//! mutate rules ──► apply_rules(images, rules, settings) ──► images'
//!                                                             │
//!                        session.images ◄──── swap ───────────┘
//! ```
//!
//! Manual candidate selections live on the current collection only. The next
//! rule change recomputes every match and discards them.

use crate::matching::{
    MatchCandidate, PartialMatchSettings, RuleMatch, apply_rules, select_match,
};
use crate::rules::{RuleError, RuleId, RuleSet};
use crate::rules_file::{self, ImportReport};
use crate::types::{ImageId, ImageRecord};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("No image with id {0}")]
    ImageNotFound(usize),
    #[error("Image {image} has no candidate at index {index}")]
    NoCandidate { image: usize, index: usize },
}

#[derive(Debug, Clone)]
pub struct Session {
    rules: RuleSet,
    settings: PartialMatchSettings,
    images: Vec<ImageRecord>,
}

impl Session {
    /// Build a session and run the first matching pass.
    pub fn new(images: Vec<ImageRecord>, rules: RuleSet, settings: PartialMatchSettings) -> Self {
        let mut session = Self {
            rules,
            settings,
            images,
        };
        session.reapply();
        session
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn into_images(self) -> Vec<ImageRecord> {
        self.images
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageRecord> {
        self.images.iter().find(|i| i.id == id)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn settings(&self) -> &PartialMatchSettings {
        &self.settings
    }

    pub fn matched_count(&self) -> usize {
        self.images.iter().filter(|i| i.matched.is_some()).count()
    }

    // =========================================================================
    // Mutations (each one recomputes every match)
    // =========================================================================

    pub fn set_settings(&mut self, settings: PartialMatchSettings) {
        self.settings = settings;
        self.reapply();
    }

    /// Replace the image collection, e.g. after a rescan.
    pub fn replace_images(&mut self, images: Vec<ImageRecord>) {
        self.images = images;
        self.reapply();
    }

    pub fn add_rule(
        &mut self,
        keyword: &str,
        new_file_name: &str,
        partial_match_enabled: bool,
    ) -> Result<RuleId, SessionError> {
        let id = self
            .rules
            .add_with(keyword, new_file_name, partial_match_enabled)?;
        self.reapply();
        Ok(id)
    }

    pub fn update_rule(
        &mut self,
        id: RuleId,
        keyword: &str,
        new_file_name: &str,
    ) -> Result<(), SessionError> {
        self.rules.update(id, keyword, new_file_name)?;
        self.reapply();
        Ok(())
    }

    pub fn remove_rule(&mut self, id: RuleId) -> Result<(), SessionError> {
        self.rules.remove(id)?;
        self.reapply();
        Ok(())
    }

    pub fn set_rule_enabled(&mut self, id: RuleId, enabled: bool) -> Result<(), SessionError> {
        self.rules.set_enabled(id, enabled)?;
        self.reapply();
        Ok(())
    }

    pub fn set_rule_partial_match(
        &mut self,
        id: RuleId,
        enabled: bool,
    ) -> Result<(), SessionError> {
        self.rules.set_partial_match(id, enabled)?;
        self.reapply();
        Ok(())
    }

    pub fn move_rule(&mut self, id: RuleId, index: usize) -> Result<(), SessionError> {
        self.rules.move_rule(id, index)?;
        self.reapply();
        Ok(())
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
        self.reapply();
    }

    /// Import rule-file text, appending to the current rules.
    pub fn import_rules(&mut self, text: &str) -> ImportReport {
        let report = rules_file::import_rules(&mut self.rules, text);
        if !report.added.is_empty() {
            self.reapply();
        }
        report
    }

    pub fn export_rules(&self) -> String {
        rules_file::export_rules(self.rules.as_slice())
    }

    // =========================================================================
    // Candidate override
    // =========================================================================

    /// Apply `candidate` to an image, replacing its current match.
    pub fn select_match(
        &mut self,
        id: ImageId,
        candidate: &MatchCandidate,
    ) -> Result<&RuleMatch, SessionError> {
        let image = self
            .images
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(SessionError::ImageNotFound(id.0))?;
        let selected = select_match(image, candidate);
        log::debug!(
            "{}: selected rule {} ({:.2})",
            image.file_name,
            selected.rule.id,
            selected.match_score
        );
        Ok(image.matched.insert(selected))
    }

    /// Apply the image's retained candidate at `index` (0 = best).
    pub fn select_candidate(
        &mut self,
        id: ImageId,
        index: usize,
    ) -> Result<&RuleMatch, SessionError> {
        let candidate = self
            .image(id)
            .ok_or(SessionError::ImageNotFound(id.0))?
            .matched
            .as_ref()
            .and_then(|m| m.candidates.get(index))
            .cloned()
            .ok_or(SessionError::NoCandidate {
                image: id.0,
                index,
            })?;
        self.select_match(id, &candidate)
    }

    fn reapply(&mut self) {
        self.images = apply_rules(&self.images, self.rules.as_slice(), &self.settings);
    }
}
