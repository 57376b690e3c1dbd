#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the address formatter.
//!
//! This crate contains only data types, configuration structs, and the
//! serde shapes of the reference tables. It has no heavyweight
//! dependencies (no regex, no I/O).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Address components keyed by canonical (or alias) field name.
///
/// Every pipeline stage consumes one of these by value and returns the
/// next version.
pub type AddressComponents = BTreeMap<String, String>;

/// Sentinel key of the worldwide template table entry used when a
/// country has no record of its own.
pub const DEFAULT_TEMPLATE_KEY: &str = "default";

/// Options controlling optional pipeline behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterOptions {
    /// Apply per-language abbreviation tables (e.g. "Street" → "St").
    pub abbreviate: bool,
    /// Inject the country display name when the input carries none.
    /// When disabled any `country` value is removed before rendering.
    #[serde(alias = "appendCountry")]
    pub append_country: bool,
    /// Collect unrecognized components into `attention`.
    #[serde(alias = "appendUnknown")]
    pub append_unknown: bool,
    /// Directory holding reference tables to use instead of the embedded
    /// ones.
    #[serde(alias = "dataDir")]
    pub data_dir: Option<String>,
}

/// A `(pattern, replacement)` rewrite rule from the template table.
pub type ReplaceRule = (String, String);

/// Per-country formatting configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Template text, or the name of another worldwide entry.
    #[serde(default)]
    pub address_template: Option<String>,
    /// Template used when both `road` and `postcode` are missing.
    #[serde(default)]
    pub fallback_template: Option<String>,
    /// Component rewrites applied before rendering.
    #[serde(default)]
    pub replace: Vec<ReplaceRule>,
    /// Rewrites applied to the rendered string.
    #[serde(default)]
    pub postformat_replace: Vec<ReplaceRule>,
    /// Country code whose template this country borrows.
    #[serde(default)]
    pub use_country: Option<String>,
    /// Country display value to store when redirecting. May contain a
    /// single `$component` placeholder.
    #[serde(default)]
    pub change_country: Option<String>,
    /// Extra `key=value` component added when redirecting.
    #[serde(default)]
    pub add_component: Option<String>,
}

/// One entry of the worldwide template table.
///
/// Country keys map to full records; shared layouts (`generic1`,
/// `fallback1`, ...) are bare template strings that records reference by
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorldwideEntry {
    /// A named, shared template.
    Template(String),
    /// A per-country record.
    Record(TemplateRecord),
}

impl WorldwideEntry {
    /// Returns the record if this entry is one.
    #[must_use]
    pub const fn as_record(&self) -> Option<&TemplateRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Template(_) => None,
        }
    }
}

/// A canonical component and the alternate spellings that map to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Canonical component name (e.g. `road`).
    pub name: String,
    /// Alternate names geocoders use for the same field.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A flattened `(alias, canonical name)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    /// The alternate spelling.
    pub alias: String,
    /// The canonical component name.
    pub name: String,
}

/// A single whole-word substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abbreviation {
    /// Word to replace.
    pub src: String,
    /// Replacement word.
    pub dest: String,
}

/// Abbreviations for one component in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbbreviationRule {
    /// Component the replacements apply to (e.g. `road`).
    pub component: String,
    /// Substitutions, applied in order.
    #[serde(default)]
    pub replacements: Vec<Abbreviation>,
}

/// Region name in a state or county code table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionName {
    /// A single literal name.
    Name(String),
    /// Localized names; only `default` takes part in lookups.
    Localized {
        /// The name used for matching.
        #[serde(default)]
        default: Option<String>,
    },
}

impl RegionName {
    /// The name this entry matches against, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Localized { default } => default.as_deref(),
        }
    }
}

/// Region code → region name, for one country.
pub type RegionCodes = BTreeMap<String, RegionName>;
