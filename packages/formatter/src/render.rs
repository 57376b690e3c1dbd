//! Rendering and post-render cleanup.
//!
//! After the layout is rendered, the record's `postformat_replace` rules
//! run over the whole text, followed by a fixed list of whitespace and
//! punctuation fixups that clean up after empty fields. Finally repeated
//! tokens within a line and repeated lines are removed.

use address_formatter_models::{AddressComponents, ReplaceRule};

use crate::mustache::Template;
use crate::pattern_cache::{self, expand_replacement};

/// Generic fixups, applied in this order.
const GENERIC_CLEANUP: &[(&str, &str)] = &[
    (r"[},\s]+$", ""),
    (r"^[,\s]+", ""),
    (r"^- ", ""),
    (r",\s*,", ", "),
    (r"[ \t]+,[ \t]+", ", "),
    (r"[ \t][ \t]+", " "),
    (r"[ \t]\n", "\n"),
    (r"\n,", "\n"),
    (r",+", ","),
    (r",\n", "\n"),
    (r"\n[ \t]+", "\n"),
    (r"\n+", "\n"),
];

/// Renders `template` and runs every post-render step.
///
/// The result is trimmed and ends with exactly one newline.
#[must_use]
pub fn render_address(
    template: &Template,
    components: &AddressComponents,
    postformat: &[ReplaceRule],
) -> String {
    let rendered = template.render(components);
    log::trace!("Raw render: {rendered:?}");

    let rendered = apply_postformat(&rendered, postformat);
    let rendered = generic_cleanup(&rendered);
    let deduped = dedupe(&rendered);

    format!("{}\n", deduped.trim())
}

/// Applies `postformat_replace` rules in order.
#[must_use]
pub fn apply_postformat(rendered: &str, rules: &[ReplaceRule]) -> String {
    let mut out = rendered.to_string();
    for (pattern, replacement) in rules {
        match pattern_cache::shared().get(pattern) {
            Ok(re) => {
                out = re
                    .replace_all(&out, expand_replacement(replacement).as_str())
                    .into_owned();
            }
            Err(e) => log::warn!("Skipping invalid postformat pattern {pattern:?}: {e}"),
        }
    }
    out
}

/// Applies the generic whitespace and punctuation fixups.
#[must_use]
pub fn generic_cleanup(rendered: &str) -> String {
    let mut out = rendered.to_string();
    for (pattern, replacement) in GENERIC_CLEANUP {
        match pattern_cache::shared().get(pattern) {
            Ok(re) => out = re.replace_all(&out, *replacement).into_owned(),
            Err(e) => log::warn!("Invalid cleanup pattern {pattern:?}: {e}"),
        }
    }
    out
}

/// Removes repeated `", "`-separated tokens within each line, then
/// repeated lines. First occurrences are kept in place.
#[must_use]
pub fn dedupe(rendered: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in rendered.split('\n') {
        let mut tokens: Vec<&str> = Vec::new();
        for token in line.split(", ").map(str::trim) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        let line = tokens.join(", ");
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    lines.join("\n")
}
