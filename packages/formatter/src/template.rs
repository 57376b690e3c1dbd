//! Template record and layout selection.
//!
//! A country's record is looked up by `country_code`, falling back to the
//! `default` record. The layout text stored on a record may either be
//! literal template text or the name of another worldwide entry; the name
//! is followed exactly once and never recursively.

use address_formatter_models::{AddressComponents, TemplateRecord, WorldwideEntry};

use crate::reference::ReferenceData;

/// Components whose joint absence switches to the fallback layout.
const REQUIRED_FOR_PRIMARY: [&str; 2] = ["road", "postcode"];

/// Which layout field of a record to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// `address_template`
    Address,
    /// `fallback_template`
    Fallback,
}

impl TemplateKind {
    /// Name of the record field this kind reads.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Address => "address_template",
            Self::Fallback => "fallback_template",
        }
    }

    fn field(self, record: &TemplateRecord) -> Option<&str> {
        match self {
            Self::Address => record.address_template.as_deref(),
            Self::Fallback => record.fallback_template.as_deref(),
        }
    }
}

/// Returns the record for the resolved `country_code`, or `default`.
#[must_use]
pub fn find_record<'a>(data: &'a ReferenceData, components: &AddressComponents) -> &'a TemplateRecord {
    components
        .get("country_code")
        .and_then(|code| data.record(code))
        .unwrap_or_else(|| data.default_record())
}

/// Picks the layout kind: fallback only when both `road` and `postcode`
/// are missing.
#[must_use]
pub fn choose_kind(components: &AddressComponents) -> TemplateKind {
    let missing = REQUIRED_FOR_PRIMARY
        .iter()
        .filter(|key| !components.contains_key(**key))
        .count();

    if missing == REQUIRED_FOR_PRIMARY.len() {
        TemplateKind::Fallback
    } else {
        TemplateKind::Address
    }
}

/// Resolves the layout text of `kind` on `record`.
///
/// If the field names another worldwide entry, that entry's text is used:
/// a named template directly, or the referenced record's same field taken
/// literally. Otherwise the field value is the template text. A record
/// without the field resolves `default`'s field the same way.
///
/// Returns `None` only when the reference data has no usable text.
#[must_use]
pub fn resolve_template_text<'a>(
    data: &'a ReferenceData,
    record: &'a TemplateRecord,
    kind: TemplateKind,
) -> Option<&'a str> {
    let value = kind
        .field(record)
        .or_else(|| kind.field(data.default_record()))?;

    match data.entry(value) {
        Some(WorldwideEntry::Template(text)) => Some(text),
        Some(WorldwideEntry::Record(referenced)) => kind.field(referenced),
        None => Some(value),
    }
}
