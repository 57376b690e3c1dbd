//! Input parsing and field-name normalization.
//!
//! Geocoders spell component keys in several styles: `house_number`,
//! `houseNumber`, `HouseNumber`. Keys are folded to lower snake case
//! before anything else looks at them:
//! - `countryCode` → `country_code`
//! - `ISO` → `iso`
//! - `postcode` → `postcode`

use std::sync::LazyLock;

use address_formatter_models::AddressComponents;
use regex::Regex;
use serde_yaml::Value;

use crate::FormatError;

/// Regex for a lowercase letter directly followed by an uppercase one.
static CAMEL_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));

/// Folds a single key to lower snake case.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    CAMEL_BOUNDARY_RE
        .replace_all(key, "${1}_${2}")
        .to_lowercase()
}

/// Normalizes every key of `raw`, in input order.
///
/// When two keys fold to the same name the first one wins and later ones
/// are dropped.
#[must_use]
pub fn normalize_fields<I, K, V>(raw: I) -> AddressComponents
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut components = AddressComponents::new();
    for (key, value) in raw {
        let key = normalize_key(key.as_ref());
        if components.contains_key(&key) {
            log::debug!("Dropping duplicate component {key:?}");
            continue;
        }
        components.insert(key, value.into());
    }
    components
}

/// Parses a YAML or JSON mapping of components, keeping document order.
///
/// JSON input is read as YAML flow syntax. Strings are taken as-is,
/// numbers and booleans are converted to text, and `null` values are
/// skipped.
///
/// # Errors
///
/// Returns [`FormatError::MalformedInput`] if `input` is not a mapping, a
/// key is not a scalar, or a value is a sequence, mapping, or tagged value.
pub fn parse_components(input: &str) -> Result<Vec<(String, String)>, FormatError> {
    let value: Value =
        serde_yaml::from_str(input).map_err(|e| FormatError::MalformedInput(e.to_string()))?;

    let Value::Mapping(mapping) = value else {
        return Err(FormatError::MalformedInput(
            "expected a mapping of address components".to_string(),
        ));
    };

    let mut pairs = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let Some(key) = scalar_text(&key) else {
            return Err(FormatError::MalformedInput(format!(
                "component key {key:?} is not a scalar"
            )));
        };
        let text = match value {
            Value::Null => continue,
            Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
                return Err(FormatError::MalformedInput(format!(
                    "component {key:?} is not a scalar"
                )));
            }
            scalar => scalar_text(&scalar).unwrap_or_default(),
        };
        pairs.push((key, text));
    }

    Ok(pairs)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_camel_case() {
        assert_eq!(normalize_key("houseNumber"), "house_number");
        assert_eq!(normalize_key("countryCode"), "country_code");
        assert_eq!(normalize_key("stateDistrict"), "state_district");
    }

    #[test]
    fn lowercases_without_boundaries() {
        assert_eq!(normalize_key("ISO"), "iso");
        assert_eq!(normalize_key("Road"), "road");
        assert_eq!(normalize_key("postcode"), "postcode");
    }

    #[test]
    fn first_duplicate_wins() {
        let components = normalize_fields([("countryCode", "de"), ("country_code", "fr")]);
        assert_eq!(components.len(), 1);
        assert_eq!(components["country_code"], "de");
    }

    #[test]
    fn normalizing_canonical_keys_is_a_no_op() {
        let canonical = normalize_fields([
            ("road", "Karlsplatz"),
            ("house_number", "1"),
            ("country_code", "de"),
        ]);
        let again = normalize_fields(canonical.clone());
        assert_eq!(again, canonical);
    }

    #[test]
    fn parses_objects_in_document_order() {
        let pairs = parse_components(r#"{"zeta": "z", "alpha": "a", "postcode": 80335}"#).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("zeta".to_string(), "z".to_string()),
                ("alpha".to_string(), "a".to_string()),
                ("postcode".to_string(), "80335".to_string()),
            ]
        );
    }

    #[test]
    fn skips_nulls_and_coerces_booleans() {
        let pairs = parse_components(r#"{"road": null, "flag": true}"#).unwrap();
        assert_eq!(pairs, vec![("flag".to_string(), "true".to_string())]);
    }

    #[test]
    fn parses_yaml_mappings() {
        let pairs = parse_components(
            "road: Karlsplatz\nhouseNumber: 1\npostcode: \"80335\"\ncity: Munich\ncountryCode: de\n",
        )
        .unwrap();
        assert_eq!(
            pairs,
            vec![
                ("road".to_string(), "Karlsplatz".to_string()),
                ("houseNumber".to_string(), "1".to_string()),
                ("postcode".to_string(), "80335".to_string()),
                ("city".to_string(), "Munich".to_string()),
                ("countryCode".to_string(), "de".to_string()),
            ]
        );
    }

    #[test]
    fn yaml_nulls_are_skipped() {
        let pairs = parse_components("road: ~\ncity: Munich\n").unwrap();
        assert_eq!(pairs, vec![("city".to_string(), "Munich".to_string())]);
    }

    #[test]
    fn rejects_nested_yaml_values() {
        assert!(matches!(
            parse_components("road:\n  name: Karlsplatz\n"),
            Err(FormatError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_components("road:\n  - a\n  - b\n"),
            Err(FormatError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_components("- road\n- city\n"),
            Err(FormatError::MalformedInput(_))
        ));
    }

    #[test]
    fn rejects_non_objects_and_nested_values() {
        assert!(matches!(
            parse_components("[1, 2]"),
            Err(FormatError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_components(r#"{"road": {"name": "x"}}"#),
            Err(FormatError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_components("{not json"),
            Err(FormatError::MalformedInput(_))
        ));
    }
}
