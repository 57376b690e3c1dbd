//! Reference tables driving the formatter.
//!
//! Every table is a TOML file under `data/`. The registry embeds them at
//! compile time and parses them once per process via [`init`] /
//! [`embedded`]. The same file layout can be loaded from disk with
//! [`TableSources::from_dir`] to run against a different data release.
//!
//! The embedded tables cover a subset of countries; codes without a
//! record fail with `InvalidCountryCode`. Point `data_dir` (the CLI's
//! `--data-dir`) at a fuller release of the same files for wider
//! coverage.
//!
//! Tables are validated at load: the `default` record must exist and must
//! not redirect, every redirect target must be a record, and every layout
//! a record can select must resolve and parse.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use address_formatter_models::{
    AbbreviationRule, AliasEntry, ComponentDefinition, DEFAULT_TEMPLATE_KEY, RegionCodes,
    TemplateRecord, WorldwideEntry,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::mustache::{Template, TemplateError};
use crate::template::{TemplateKind, resolve_template_text};

/// Errors from loading or validating reference tables.
#[derive(Debug, Error)]
pub enum ReferenceDataError {
    /// A table failed to parse.
    #[error("Failed to parse {table}: {message}")]
    Parse {
        /// Table file name.
        table: String,
        /// Parser message.
        message: String,
    },

    /// A table could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File or directory path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The worldwide table has no `default` record.
    #[error("Worldwide table has no 'default' record")]
    MissingDefault,

    /// The `default` record itself redirects.
    #[error("The 'default' record must not set use_country")]
    DefaultRedirects,

    /// A record redirects to a code with no record.
    #[error("{code} redirects to {target}, which has no record")]
    UnknownRedirectTarget {
        /// Redirecting country.
        code: String,
        /// Missing target.
        target: String,
    },

    /// A record's layout cannot be resolved to any text.
    #[error("{key} has no resolvable {field}")]
    UnresolvedTemplate {
        /// Record key.
        key: String,
        /// Layout field name.
        field: &'static str,
    },

    /// A layout failed to parse.
    #[error("Invalid {field} for {key}: {source}")]
    Template {
        /// Record key.
        key: String,
        /// Layout field name.
        field: &'static str,
        /// Parse failure.
        source: TemplateError,
    },
}

/// Raw TOML text of every table.
#[derive(Debug, Clone, Default)]
pub struct TableSources {
    /// `worldwide.toml`
    pub worldwide: String,
    /// `components.toml`
    pub components: String,
    /// `(language, abbreviations/<language>.toml)` pairs.
    pub abbreviations: Vec<(String, String)>,
    /// `country2lang.toml`
    pub country_languages: String,
    /// `state_codes.toml`
    pub state_codes: String,
    /// `county_codes.toml`
    pub county_codes: String,
    /// `country_names.toml`
    pub country_names: String,
}

// ── Compile-time embedded tables ────────────────────────────────────

const WORLDWIDE_TOML: &str = include_str!("../data/worldwide.toml");
const COMPONENTS_TOML: &str = include_str!("../data/components.toml");
const COUNTRY_LANGUAGES_TOML: &str = include_str!("../data/country2lang.toml");
const STATE_CODES_TOML: &str = include_str!("../data/state_codes.toml");
const COUNTY_CODES_TOML: &str = include_str!("../data/county_codes.toml");
const COUNTRY_NAMES_TOML: &str = include_str!("../data/country_names.toml");

const ABBREVIATION_TOMLS: &[(&str, &str)] = &[
    ("de", include_str!("../data/abbreviations/de.toml")),
    ("en", include_str!("../data/abbreviations/en.toml")),
    ("es", include_str!("../data/abbreviations/es.toml")),
    ("fr", include_str!("../data/abbreviations/fr.toml")),
    ("nl", include_str!("../data/abbreviations/nl.toml")),
];

impl TableSources {
    /// The tables compiled into the binary.
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            worldwide: WORLDWIDE_TOML.to_string(),
            components: COMPONENTS_TOML.to_string(),
            abbreviations: ABBREVIATION_TOMLS
                .iter()
                .map(|(lang, toml)| ((*lang).to_string(), (*toml).to_string()))
                .collect(),
            country_languages: COUNTRY_LANGUAGES_TOML.to_string(),
            state_codes: STATE_CODES_TOML.to_string(),
            county_codes: COUNTY_CODES_TOML.to_string(),
            country_names: COUNTRY_NAMES_TOML.to_string(),
        }
    }

    /// Reads the tables from `dir`, which must mirror the embedded
    /// `data/` layout. Every `*.toml` file in `dir/abbreviations` is one
    /// language, named by its file stem.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceDataError::Io`] if a file cannot be read.
    pub fn from_dir(dir: &Path) -> Result<Self, ReferenceDataError> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| ReferenceDataError::Io {
                path: path.display().to_string(),
                source,
            })
        };

        let abbreviations_dir = dir.join("abbreviations");
        let mut abbreviations = Vec::new();
        if abbreviations_dir.is_dir() {
            let io_err = |source| ReferenceDataError::Io {
                path: abbreviations_dir.display().to_string(),
                source,
            };
            for entry in std::fs::read_dir(&abbreviations_dir).map_err(io_err)? {
                let path = entry.map_err(io_err)?.path();
                if path.extension().is_none_or(|ext| ext != "toml") {
                    continue;
                }
                let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let toml = std::fs::read_to_string(&path).map_err(|source| {
                    ReferenceDataError::Io {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                abbreviations.push((lang.to_string(), toml));
            }
            abbreviations.sort();
        }

        Ok(Self {
            worldwide: read("worldwide.toml")?,
            components: read("components.toml")?,
            abbreviations,
            country_languages: read("country2lang.toml")?,
            state_codes: read("state_codes.toml")?,
            county_codes: read("county_codes.toml")?,
            country_names: read("country_names.toml")?,
        })
    }
}

#[derive(Deserialize)]
struct ComponentsFile {
    #[serde(default)]
    component: Vec<ComponentDefinition>,
}

#[derive(Deserialize)]
struct AbbreviationsFile {
    #[serde(default)]
    rule: Vec<AbbreviationRule>,
}

fn parse_table<T: DeserializeOwned>(table: &str, source: &str) -> Result<T, ReferenceDataError> {
    toml::de::from_str(source).map_err(|e| ReferenceDataError::Parse {
        table: table.to_string(),
        message: e.to_string(),
    })
}

/// The parsed, validated reference tables.
#[derive(Debug)]
pub struct ReferenceData {
    worldwide: BTreeMap<String, WorldwideEntry>,
    default_record: TemplateRecord,
    aliases: Vec<AliasEntry>,
    known_components: BTreeSet<String>,
    abbreviations: BTreeMap<String, Vec<AbbreviationRule>>,
    country_languages: BTreeMap<String, Vec<String>>,
    state_codes: BTreeMap<String, RegionCodes>,
    county_codes: BTreeMap<String, RegionCodes>,
    country_names: BTreeMap<String, String>,
    templates: BTreeMap<String, Template>,
}

impl ReferenceData {
    /// Parses and validates `sources`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReferenceDataError`] if any table is malformed or the
    /// worldwide table violates its invariants.
    pub fn load(sources: &TableSources) -> Result<Self, ReferenceDataError> {
        let worldwide: BTreeMap<String, WorldwideEntry> =
            parse_table("worldwide.toml", &sources.worldwide)?;
        let components: ComponentsFile = parse_table("components.toml", &sources.components)?;

        let mut abbreviations = BTreeMap::new();
        for (lang, toml) in &sources.abbreviations {
            let file: AbbreviationsFile =
                parse_table(&format!("abbreviations/{lang}.toml"), toml)?;
            abbreviations.insert(lang.clone(), file.rule);
        }

        let default_record = worldwide
            .get(DEFAULT_TEMPLATE_KEY)
            .and_then(WorldwideEntry::as_record)
            .cloned()
            .ok_or(ReferenceDataError::MissingDefault)?;

        let mut aliases = Vec::new();
        let mut known_components = BTreeSet::new();
        for definition in components.component {
            for alias in &definition.aliases {
                known_components.insert(alias.clone());
                aliases.push(AliasEntry {
                    alias: alias.clone(),
                    name: definition.name.clone(),
                });
            }
            known_components.insert(definition.name);
        }

        let mut data = Self {
            worldwide,
            default_record,
            aliases,
            known_components,
            abbreviations,
            country_languages: parse_table("country2lang.toml", &sources.country_languages)?,
            state_codes: parse_table("state_codes.toml", &sources.state_codes)?,
            county_codes: parse_table("county_codes.toml", &sources.county_codes)?,
            country_names: parse_table("country_names.toml", &sources.country_names)?,
            templates: BTreeMap::new(),
        };
        data.templates = data.validate()?;

        log::debug!(
            "Loaded reference data: {} worldwide entries, {} aliases, {} abbreviation languages",
            data.worldwide.len(),
            data.aliases.len(),
            data.abbreviations.len(),
        );

        Ok(data)
    }

    /// Checks the worldwide invariants and compiles every reachable layout.
    fn validate(&self) -> Result<BTreeMap<String, Template>, ReferenceDataError> {
        if self.default_record.use_country.is_some() {
            return Err(ReferenceDataError::DefaultRedirects);
        }

        let mut templates = BTreeMap::new();
        for (key, record) in self.records() {
            if let Some(target) = &record.use_country
                && self.record(&target.to_uppercase()).is_none()
            {
                return Err(ReferenceDataError::UnknownRedirectTarget {
                    code: key.to_string(),
                    target: target.clone(),
                });
            }

            for kind in [TemplateKind::Address, TemplateKind::Fallback] {
                let text = resolve_template_text(self, record, kind).ok_or_else(|| {
                    ReferenceDataError::UnresolvedTemplate {
                        key: key.to_string(),
                        field: kind.field_name(),
                    }
                })?;
                if templates.contains_key(text) {
                    continue;
                }
                let template =
                    Template::parse(text).map_err(|source| ReferenceDataError::Template {
                        key: key.to_string(),
                        field: kind.field_name(),
                        source,
                    })?;
                templates.insert(text.to_string(), template);
            }
        }

        Ok(templates)
    }

    fn records(&self) -> impl Iterator<Item = (&str, &TemplateRecord)> {
        self.worldwide
            .iter()
            .filter_map(|(key, entry)| entry.as_record().map(|r| (key.as_str(), r)))
    }

    /// The raw worldwide entry named `key`.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&WorldwideEntry> {
        self.worldwide.get(key)
    }

    /// The template record for an uppercase country code.
    #[must_use]
    pub fn record(&self, code: &str) -> Option<&TemplateRecord> {
        self.entry(code).and_then(WorldwideEntry::as_record)
    }

    /// The `default` record.
    #[must_use]
    pub const fn default_record(&self) -> &TemplateRecord {
        &self.default_record
    }

    /// Two-letter codes that have a record of their own, in order.
    pub fn country_codes(&self) -> impl Iterator<Item = &str> {
        self.records()
            .map(|(key, _)| key)
            .filter(|key| key.len() == 2)
    }

    /// The compiled form of a layout returned by
    /// [`resolve_template_text`].
    #[must_use]
    pub fn template(&self, text: &str) -> Option<&Template> {
        self.templates.get(text)
    }

    /// `(alias, canonical)` pairs in table order.
    #[must_use]
    pub fn aliases(&self) -> &[AliasEntry] {
        &self.aliases
    }

    /// Whether `key` is a canonical component name or one of its aliases.
    #[must_use]
    pub fn is_known_component(&self, key: &str) -> bool {
        self.known_components.contains(key)
    }

    /// Languages spoken in `country_code`, in preference order.
    #[must_use]
    pub fn languages(&self, country_code: &str) -> Option<&[String]> {
        self.country_languages.get(country_code).map(Vec::as_slice)
    }

    /// Abbreviation rules for `lang`.
    #[must_use]
    pub fn abbreviations(&self, lang: &str) -> Option<&[AbbreviationRule]> {
        self.abbreviations.get(lang).map(Vec::as_slice)
    }

    /// State code table for `country_code`.
    #[must_use]
    pub fn state_codes(&self, country_code: &str) -> Option<&RegionCodes> {
        self.state_codes.get(country_code)
    }

    /// County code table for `country_code`.
    #[must_use]
    pub fn county_codes(&self, country_code: &str) -> Option<&RegionCodes> {
        self.county_codes.get(country_code)
    }

    /// Display name of `country_code`.
    #[must_use]
    pub fn country_name(&self, country_code: &str) -> Option<&str> {
        self.country_names.get(country_code).map(String::as_str)
    }
}

static EMBEDDED: OnceLock<Arc<ReferenceData>> = OnceLock::new();

/// Loads the embedded tables once for the whole process.
///
/// Later calls return the same instance.
///
/// # Errors
///
/// Returns a [`ReferenceDataError`] if the embedded tables are invalid.
pub fn init() -> Result<Arc<ReferenceData>, ReferenceDataError> {
    if let Some(data) = EMBEDDED.get() {
        return Ok(Arc::clone(data));
    }

    let data = Arc::new(ReferenceData::load(&TableSources::embedded())?);
    Ok(Arc::clone(EMBEDDED.get_or_init(|| data)))
}

/// Returns the process-wide embedded tables.
///
/// # Panics
///
/// Panics if the embedded tables are invalid (they are fixed at compile
/// time and covered by tests).
#[must_use]
pub fn embedded() -> Arc<ReferenceData> {
    init().unwrap_or_else(|e| panic!("Embedded reference data is invalid: {e}"))
}

#[cfg(test)]
pub(crate) fn test_data() -> ReferenceData {
    let sources = TableSources {
        worldwide: r#"
generic1 = "{{{road}}} {{{house_number}}}\n{{{city}}}"
fallback1 = "{{{city}}}\n{{{country}}}"

[default]
address_template = "generic1"
fallback_template = "fallback1"

[AA]
address_template = "generic1"

[BB]
address_template = "{{{house_number}}} {{{road}}}\n{{{city}}}"

[CC]
address_template = "BB"

[DD]
address_template = "CC"
"#
        .to_string(),
        components: r#"
[[component]]
name = "road"
aliases = ["street"]

[[component]]
name = "city"
aliases = ["town"]
"#
        .to_string(),
        ..TableSources::default()
    };

    ReferenceData::load(&sources).unwrap()
}
