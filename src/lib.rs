//! # metaname
//!
//! Batch image renamer driven by embedded metadata. Image generators write their
//! prompts into PNG text chunks, cameras and editors write EXIF tags; metaname
//! matches those fields against user rules and gives each matched image the
//! rule's filename.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Scan     source/   →  manifest.json   (files → metadata per image)
//! 2. Match    manifest  →  rename plan     (rules × metadata → RuleMatch)
//! 3. Export   plan      →  output/         (batched copies under new names)
//! ```
//!
//! Matching is a pure function of the image collection, the rule set, and the
//! partial-match settings. It is recomputed in full whenever rules or settings
//! change ([`session::Session`]), so there is no incremental state to go stale.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: walks the source directory, applies ingestion limits, extracts metadata in parallel |
//! | [`extract`] | PNG text-chunk decoder and EXIF adapter |
//! | [`metadata`] | Insertion-ordered field map, typed EXIF values, source merging |
//! | [`matching`] | Stage 2: exact and token-partial matching, candidate ranking and selection |
//! | [`rules`] | Rule and ordered rule set with validation |
//! | [`rules_file`] | Plain-text rule import and export |
//! | [`session`] | Owns rules, settings and images; rematches on every change |
//! | [`naming`] | Filename sanitization, extension carry-over, collision suffixes |
//! | [`export`] | Stage 3: batching and copying |
//! | [`config`] | `metaname.toml` loading, merging and validation |
//! | [`types`] | Shared image record serialized in the manifest |
//! | [`output`] | CLI output formatting |
//!
//! # Determinism
//!
//! Given the same files, rules, and settings, the plan is identical on every
//! run. Ties are broken only by rule order and by metadata field order, which
//! is fixed: PNG text chunks in file order, then EXIF tags in IFD order.

pub mod config;
pub mod export;
pub mod extract;
pub mod matching;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod rules;
pub mod rules_file;
pub mod scan;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
