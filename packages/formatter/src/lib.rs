#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Country-aware postal address formatting.
//!
//! Turns the loosely structured components a reverse geocoder returns
//! into a single address string laid out the way the destination country
//! expects. Formatting runs as a fixed pipeline:
//!
//! 1. [`normalize`]: fold keys to lower snake case
//! 2. [`country`]: resolve, validate, and redirect the country code
//! 3. country name injection or removal
//! 4. [`aliases`]: copy aliased fields to their canonical names
//! 5. [`template`]: pick the country's record and layout
//! 6. [`cleanup`]: rule-driven rewrites of the components
//! 7. [`render`]: execute the layout and tidy the text
//!
//! All layouts and rewrite rules come from the TOML tables in
//! [`reference`]; compiled regexes are shared through [`pattern_cache`].

pub mod aliases;
pub mod cleanup;
pub mod country;
pub mod mustache;
pub mod normalize;
pub mod pattern_cache;
pub mod reference;
pub mod render;
pub mod template;

use std::path::Path;
use std::sync::Arc;

use address_formatter_models::{AddressComponents, DEFAULT_TEMPLATE_KEY, FormatterOptions};
use thiserror::Error;

use crate::mustache::Template;
use crate::reference::{ReferenceData, ReferenceDataError, TableSources};

/// Errors from formatting a single address.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The input is not a mapping of component names to scalar values.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Neither the input nor the caller supplied a country code.
    #[error("No country code in the input and no fallback given")]
    MissingCountryCode,

    /// The country code is not two letters or has no template record.
    #[error("Invalid country code: {0}")]
    InvalidCountryCode(String),

    /// The reference tables cannot produce a layout.
    #[error("Reference data error: {0}")]
    ReferenceData(#[from] ReferenceDataError),
}

/// Formats address components using a set of reference tables.
///
/// Cheap to clone; the tables are shared.
#[derive(Debug, Clone)]
pub struct AddressFormatter {
    options: FormatterOptions,
    data: Arc<ReferenceData>,
}

impl AddressFormatter {
    /// Creates a formatter. Tables come from `options.data_dir` when set,
    /// otherwise from the process-wide embedded copy.
    ///
    /// # Errors
    ///
    /// Returns a [`ReferenceDataError`] if the tables cannot be read or
    /// fail validation.
    pub fn new(options: FormatterOptions) -> Result<Self, ReferenceDataError> {
        let data = match options.data_dir.as_deref() {
            Some(dir) => {
                log::info!("Loading reference data from {dir}");
                Arc::new(ReferenceData::load(&TableSources::from_dir(Path::new(dir))?)?)
            }
            None => reference::init()?,
        };

        Ok(Self::with_reference_data(options, data))
    }

    /// Creates a formatter over already loaded tables.
    #[must_use]
    pub const fn with_reference_data(options: FormatterOptions, data: Arc<ReferenceData>) -> Self {
        Self { options, data }
    }

    #[must_use]
    pub const fn options(&self) -> &FormatterOptions {
        &self.options
    }

    #[must_use]
    pub fn reference_data(&self) -> &ReferenceData {
        &self.data
    }

    /// Formats a YAML or JSON mapping of components.
    ///
    /// # Errors
    ///
    /// * [`FormatError::MalformedInput`] if `input` is not a mapping of
    ///   scalar values
    /// * any error from [`Self::format`]
    pub fn format_str(
        &self,
        input: &str,
        fallback_country_code: Option<&str>,
    ) -> Result<String, FormatError> {
        let pairs = normalize::parse_components(input)?;
        self.format(pairs, fallback_country_code)
    }

    /// Formats components given as `(name, value)` pairs in input order.
    ///
    /// `fallback_country_code` is used only when the components carry no
    /// `country_code`. The result always ends with a single newline.
    ///
    /// # Errors
    ///
    /// * [`FormatError::MissingCountryCode`] if no country code is known
    /// * [`FormatError::InvalidCountryCode`] if the code has no record
    /// * [`FormatError::ReferenceData`] if the selected layout is missing
    pub fn format<I, K, V>(
        &self,
        components: I,
        fallback_country_code: Option<&str>,
    ) -> Result<String, FormatError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let data = self.data.as_ref();

        let components = normalize::normalize_fields(components);
        let components = country::resolve_country(components, fallback_country_code, data)?;
        let components = self.apply_country_name(components);
        let components = aliases::apply_aliases(components, data);

        let record = template::find_record(data, &components);
        let components = cleanup::cleanup_components(components, record, data, &self.options);

        let kind = template::choose_kind(&components);
        let key = components
            .get("country_code")
            .map_or(DEFAULT_TEMPLATE_KEY, String::as_str);
        log::debug!("Using {} for {key}", kind.field_name());

        let text = template::resolve_template_text(data, record, kind).ok_or_else(|| {
            ReferenceDataError::UnresolvedTemplate {
                key: key.to_string(),
                field: kind.field_name(),
            }
        })?;

        let compiled;
        let layout = if let Some(layout) = data.template(text) {
            layout
        } else {
            compiled = Template::parse(text).map_err(|source| ReferenceDataError::Template {
                key: key.to_string(),
                field: kind.field_name(),
                source,
            })?;
            &compiled
        };

        Ok(render::render_address(
            layout,
            &components,
            &record.postformat_replace,
        ))
    }

    /// Adds the display name of the resolved country when enabled and no
    /// `country` is present, or removes `country` when disabled.
    fn apply_country_name(&self, mut components: AddressComponents) -> AddressComponents {
        if !self.options.append_country {
            components.remove("country");
            return components;
        }

        if !components.contains_key("country")
            && let Some(name) = components
                .get("country_code")
                .and_then(|code| self.data.country_name(code))
        {
            let name = name.to_string();
            components.insert("country".to_string(), name);
        }
        components
    }
}
