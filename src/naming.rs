//! Output filename rules: sanitization, derivation, and batch collision handling.
//!
//! Every renamed file is built from two parts: the base name stored on the
//! winning rule, and the extension of the image's original filename.
//!
//! ```text
//! rule "portrait"     + "00042.png"  → "portrait.png"
//! rule "portrait.v2"  + "00042.png"  → "portrait.png"   (stored suffix stripped)
//! rule "portrait"     + "README"     → "portrait.jpg"   (no extension → jpg)
//! ```
//!
//! ## Sanitization
//!
//! Rule names are sanitized once, when the rule is created or edited, so the
//! stored name is always safe to write to disk on any platform:
//! - whitespace runs become a single `_`
//! - `< > : " / \ | ? *` become `_`
//! - repeated `_` collapse to one, leading/trailing `_` are dropped
//!
//! ## Collisions
//!
//! Collisions are resolved per export batch, not at match time. Two images
//! that map to `cat.jpg` both keep the planned name `cat.jpg` until export,
//! where the second becomes `cat_1.jpg`.

use std::collections::{HashMap, HashSet};

/// Extension used when the original filename has none.
pub const DEFAULT_EXTENSION: &str = "jpg";

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitize a rule's target name for use as a filename base.
///
/// - `"blue  sky"` → `"blue_sky"`
/// - `"a/b:c"` → `"a_b_c"`
/// - `"__cat__"` → `"cat"`
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;
    for c in name.chars() {
        let mapped = if c.is_whitespace() || ILLEGAL_CHARS.contains(&c) {
            '_'
        } else {
            c
        };
        if mapped == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(mapped);
            prev_underscore = false;
        }
    }
    out.trim_matches('_').to_string()
}

/// Remove a trailing `.segment` from a stored base name.
pub fn strip_extension(base: &str) -> &str {
    match base.rfind('.') {
        Some(pos) => &base[..pos],
        None => base,
    }
}

/// Extension of `file_name` (text after the last `.`), or `None` if absent or empty.
pub fn extension_of(file_name: &str) -> Option<&str> {
    file_name
        .rfind('.')
        .map(|pos| &file_name[pos + 1..])
        .filter(|ext| !ext.is_empty())
}

/// Build the new filename for an image matched by a rule.
pub fn derive_file_name(rule_base: &str, original_name: &str) -> String {
    let base = strip_extension(rule_base);
    let ext = extension_of(original_name).unwrap_or(DEFAULT_EXTENSION);
    format!("{base}.{ext}")
}

/// Resolve duplicate filenames within one export batch.
///
/// Comparison is case-insensitive. The first occurrence of a name keeps it;
/// each later occurrence gets `_N` inserted before the extension, where `N`
/// counts up from 1 per name. A suffixed name that is already taken in the
/// batch (another rule targets `cat_1`, say) is skipped and the counter keeps
/// going. Output order matches input order and every output name is unique.
pub fn resolve_collisions<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut counters: HashMap<String, u32> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let counter = counters.entry(name.to_lowercase()).or_insert(0);
            let mut resolved = if *counter == 0 {
                name.to_string()
            } else {
                with_suffix(name, *counter)
            };
            while taken.contains(&resolved.to_lowercase()) {
                *counter += 1;
                resolved = with_suffix(name, *counter);
            }
            *counter += 1;
            taken.insert(resolved.to_lowercase());
            resolved
        })
        .collect()
}

fn with_suffix(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(pos) => format!("{}_{}{}", &name[..pos], n, &name[pos..]),
        None => format!("{name}_{n}"),
    }
}
