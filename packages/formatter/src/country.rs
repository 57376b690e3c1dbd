//! Country code resolution.
//!
//! Picks the effective ISO 3166-1 alpha-2 code, validates it against the
//! worldwide table, follows `use_country` redirects (e.g. Puerto Rico is
//! formatted as the US), and applies the dependent-territory corrections
//! for Dutch Caribbean islands reported as Dutch provinces.

use address_formatter_models::AddressComponents;

use crate::FormatError;
use crate::pattern_cache;
use crate::reference::ReferenceData;

/// Placeholder syntax inside `change_country` values.
const PLACEHOLDER_RE: &str = r"\$(\w+)";

/// How a Dutch `state` value is matched.
#[derive(Debug, Clone, Copy)]
enum StateMatch {
    /// Whole value, ignoring case.
    Exact,
    /// Anywhere in the value, ignoring case.
    Contains,
}

/// A territory geocoders report as a province of `NL`.
struct TerritoryOverride {
    pattern: &'static str,
    matching: StateMatch,
    code: &'static str,
    country: &'static str,
}

/// Checked in order; the first match wins.
const NL_TERRITORIES: &[TerritoryOverride] = &[
    TerritoryOverride {
        pattern: "Curaçao",
        matching: StateMatch::Exact,
        code: "CW",
        country: "Curaçao",
    },
    TerritoryOverride {
        pattern: "sint maarten",
        matching: StateMatch::Contains,
        code: "SX",
        country: "Sint Maarten",
    },
    TerritoryOverride {
        pattern: "aruba",
        matching: StateMatch::Contains,
        code: "AW",
        country: "Aruba",
    },
];

impl TerritoryOverride {
    fn matches(&self, state: &str) -> bool {
        match self.matching {
            StateMatch::Exact => state.to_lowercase() == self.pattern.to_lowercase(),
            StateMatch::Contains => state.to_lowercase().contains(self.pattern),
        }
    }
}

/// Resolves `country_code` on `components`.
///
/// The component value wins over `fallback_country_code`. The code is
/// uppercased and `UK` is read as `GB` before validation.
///
/// # Errors
///
/// * [`FormatError::MissingCountryCode`] if neither source provides a code
/// * [`FormatError::InvalidCountryCode`] if the code is not two characters
///   or has no record in the worldwide table
pub fn resolve_country(
    mut components: AddressComponents,
    fallback_country_code: Option<&str>,
    data: &ReferenceData,
) -> Result<AddressComponents, FormatError> {
    let raw = components
        .get("country_code")
        .map(String::as_str)
        .or(fallback_country_code)
        .ok_or(FormatError::MissingCountryCode)?;

    let mut code = raw.to_uppercase();
    if code == "UK" {
        code = "GB".to_string();
    }

    if code.chars().count() != 2 {
        return Err(FormatError::InvalidCountryCode(raw.to_string()));
    }
    let record = data
        .record(&code)
        .ok_or_else(|| FormatError::InvalidCountryCode(raw.to_string()))?;

    if let Some(target) = &record.use_country {
        let original = code;
        code = target.to_uppercase();
        log::debug!("Redirecting {original} to {code}");

        if let Some(template) = &record.change_country {
            let country = substitute_placeholder(template, &components);
            components.insert("country".to_string(), country);
        }

        if let Some((key, value)) = record
            .add_component
            .as_deref()
            .and_then(|pair| pair.split_once('='))
            && key == "state"
        {
            components.insert("state".to_string(), value.to_string());
        }
    }

    if code == "NL"
        && let Some(state) = components.get("state")
        && let Some(territory) = NL_TERRITORIES.iter().find(|t| t.matches(state))
    {
        log::debug!("State {state:?} is the territory {}", territory.code);
        code = territory.code.to_string();
        components.insert("country".to_string(), territory.country.to_string());
    }

    components.insert("country_code".to_string(), code);
    Ok(components)
}

/// Replaces the `$name` placeholder in `template` with the current value
/// of component `name`, or with nothing if it is absent.
fn substitute_placeholder(template: &str, components: &AddressComponents) -> String {
    let re = match pattern_cache::shared().get(PLACEHOLDER_RE) {
        Ok(re) => re,
        Err(e) => {
            log::warn!("Invalid placeholder pattern: {e}");
            return template.to_string();
        }
    };

    let Some(captures) = re.captures(template) else {
        return template.to_string();
    };
    let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
        return template.to_string();
    };
    let value = components.get(name.as_str()).map_or("", String::as_str);

    let mut out = String::with_capacity(template.len() + value.len());
    out.push_str(&template[..whole.start()]);
    out.push_str(value);
    out.push_str(&template[whole.end()..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::embedded;

    fn components(pairs: &[(&str, &str)]) -> AddressComponents {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn missing_code_fails() {
        let data = embedded();
        assert!(matches!(
            resolve_country(components(&[("road", "x")]), None, &data),
            Err(FormatError::MissingCountryCode)
        ));
    }

    #[test]
    fn component_code_wins_over_fallback() {
        let data = embedded();
        let out = resolve_country(components(&[("country_code", "de")]), Some("fr"), &data).unwrap();
        assert_eq!(out["country_code"], "DE");
    }

    #[test]
    fn fallback_used_when_component_missing() {
        let data = embedded();
        let out = resolve_country(components(&[]), Some("fr"), &data).unwrap();
        assert_eq!(out["country_code"], "FR");
    }

    #[test]
    fn uk_is_gb() {
        let data = embedded();
        for input in ["UK", "uk", "gb"] {
            let out = resolve_country(components(&[("country_code", input)]), None, &data).unwrap();
            assert_eq!(out["country_code"], "GB", "{input}");
        }
    }

    #[test]
    fn rejects_invalid_codes() {
        let data = embedded();
        for input in ["DEU", "D", "ZZ", "default"] {
            assert!(
                matches!(
                    resolve_country(components(&[("country_code", input)]), None, &data),
                    Err(FormatError::InvalidCountryCode(code)) if code == input
                ),
                "{input}"
            );
        }
    }

    #[test]
    fn redirect_sets_country_and_state() {
        let data = embedded();
        let out = resolve_country(components(&[("country_code", "pr")]), None, &data).unwrap();
        assert_eq!(out["country_code"], "US");
        assert_eq!(out["country"], "Puerto Rico, United States of America");
        assert_eq!(out["state"], "Puerto Rico");
    }

    #[test]
    fn redirect_substitutes_placeholder() {
        let data = embedded();
        let out = resolve_country(
            components(&[("country_code", "bq"), ("state", "Bonaire")]),
            None,
            &data,
        )
        .unwrap();
        assert_eq!(out["country_code"], "NL");
        assert_eq!(out["country"], "Bonaire, Caribbean Netherlands");

        let out = resolve_country(components(&[("country_code", "bq")]), None, &data).unwrap();
        assert_eq!(out["country"], ", Caribbean Netherlands");
    }

    #[test]
    fn aruba_reported_as_dutch_state() {
        let data = embedded();
        let out = resolve_country(
            components(&[("country_code", "NL"), ("state", "Aruba")]),
            None,
            &data,
        )
        .unwrap();
        assert_eq!(out["country_code"], "AW");
        assert_eq!(out["country"], "Aruba");
    }

    #[test]
    fn curacao_and_sint_maarten() {
        let data = embedded();
        let out = resolve_country(
            components(&[("country_code", "nl"), ("state", "curaçao")]),
            None,
            &data,
        )
        .unwrap();
        assert_eq!(out["country_code"], "CW");
        assert_eq!(out["country"], "Curaçao");

        let out = resolve_country(
            components(&[("country_code", "NL"), ("state", "Sint Maarten (Dutch part)")]),
            None,
            &data,
        )
        .unwrap();
        assert_eq!(out["country_code"], "SX");
        assert_eq!(out["country"], "Sint Maarten");
    }

    #[test]
    fn dutch_provinces_stay_dutch() {
        let data = embedded();
        let out = resolve_country(
            components(&[("country_code", "NL"), ("state", "Noord-Holland")]),
            None,
            &data,
        )
        .unwrap();
        assert_eq!(out["country_code"], "NL");
        assert!(!out.contains_key("country"));
    }

    #[test]
    fn placeholder_without_marker_is_kept() {
        assert_eq!(
            substitute_placeholder("Åland, Finland", &components(&[])),
            "Åland, Finland"
        );
    }
}
