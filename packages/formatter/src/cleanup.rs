//! Component cleanup applied between template selection and rendering.
//!
//! The steps run in a fixed order and each one consumes the previous
//! mapping:
//!
//! 1. Recover a state/country swap (numeric `country`)
//! 2. Apply the record's `replace` rules
//! 3. Derive `state_code` (with the Washington, D.C. override)
//! 4. Derive `county_code`
//! 5. Gather unknown components into `attention`
//! 6. Sanitize `postcode`
//! 7. Abbreviate (optional)
//! 8. Drop values that are only a link scheme
//!
//! None of the steps fail. Missing components skip the step, and a rule
//! whose pattern does not compile is logged and skipped.

use address_formatter_models::{
    AddressComponents, FormatterOptions, RegionCodes, ReplaceRule, TemplateRecord,
};
use regex::NoExpand;

use crate::pattern_cache::{self, expand_replacement};
use crate::reference::ReferenceData;

/// Postcodes longer than this (in characters) are discarded.
const MAX_POSTCODE_CHARS: usize = 20;

/// Two postcodes separated by a semicolon.
const AMBIGUOUS_POSTCODE_RE: &str = r"^\d+;\d+$";

/// Two US ZIP codes separated by a comma.
const DOUBLE_ZIP_RE: &str = r"^(\d{5}),\d{5}$";

/// Washington, D.C. reported as a state (matched case-insensitively).
const WASHINGTON_DC_RE: &str = r"^washington,? d\.?c\.?";

/// A bare link scheme with nothing after it.
const URL_RE: &str = r"^https?://$";

/// Runs the whole cleanup pipeline.
#[must_use]
pub fn cleanup_components(
    components: AddressComponents,
    record: &TemplateRecord,
    data: &ReferenceData,
    options: &FormatterOptions,
) -> AddressComponents {
    let components = recover_swapped_country(components);
    let components = apply_replace_rules(components, &record.replace);
    let components = derive_state_code(components, data);
    let components = derive_county_code(components, data);
    let components = collect_unknown(components, data, options.append_unknown);
    let components = clean_postcode(components);
    let components = if options.abbreviate {
        abbreviate(components, data)
    } else {
        components
    };
    drop_urls(components)
}

/// Some geocoders put the state in `country` and a number in `state`'s
/// place. An integer `country` is replaced by the `state` value.
#[must_use]
pub fn recover_swapped_country(mut components: AddressComponents) -> AddressComponents {
    let numeric_country = components
        .get("country")
        .is_some_and(|c| c.parse::<i64>().is_ok());

    if numeric_country && let Some(state) = components.remove("state") {
        log::debug!("Numeric country; using state {state:?} as country");
        components.insert("country".to_string(), state);
    }
    components
}

/// Applies `replace` rules in list order to every component.
///
/// A rule whose pattern starts with `<key>=` replaces the whole value of
/// component `<key>` when the value equals the rest of the pattern
/// exactly. Any other rule is a regex substituted everywhere in every
/// component, including a `<key>=` rule seen from a different key.
#[must_use]
pub fn apply_replace_rules(
    mut components: AddressComponents,
    rules: &[ReplaceRule],
) -> AddressComponents {
    if rules.is_empty() {
        return components;
    }

    for (pattern, replacement) in rules {
        for (key, value) in &mut components {
            if let Some(expected) = pattern
                .strip_prefix(key.as_str())
                .and_then(|rest| rest.strip_prefix('='))
            {
                if value.as_str() == expected {
                    log::debug!("Replacing {key} {value:?} with {replacement:?}");
                    value.clone_from(replacement);
                }
                continue;
            }

            let re = match pattern_cache::shared().get(pattern) {
                Ok(re) => re,
                Err(e) => {
                    log::warn!("Skipping invalid replace pattern {pattern:?}: {e}");
                    break;
                }
            };
            if re.is_match(value) {
                *value = re
                    .replace_all(value, expand_replacement(replacement).as_str())
                    .into_owned();
            }
        }
    }
    components
}

/// Finds the code whose region name equals `name`, ignoring case.
fn find_region_code(codes: &RegionCodes, name: &str) -> Option<String> {
    let wanted = name.to_lowercase();
    codes
        .iter()
        .find(|(_, region)| region.primary().is_some_and(|p| p.to_lowercase() == wanted))
        .map(|(code, _)| code.clone())
}

/// Fills `state_code` from the state table when it is missing.
///
/// "Washington, D.C." style states are always rewritten to the District of
/// Columbia with `city` set to Washington.
#[must_use]
pub fn derive_state_code(mut components: AddressComponents, data: &ReferenceData) -> AddressComponents {
    if components.contains_key("state_code") {
        return components;
    }
    let Some(state) = components.get("state") else {
        return components;
    };

    let code = components
        .get("country_code")
        .and_then(|cc| data.state_codes(cc))
        .and_then(|codes| find_region_code(codes, state));

    let is_dc = match pattern_cache::shared().get_case_insensitive(WASHINGTON_DC_RE) {
        Ok(re) => re.is_match(state),
        Err(e) => {
            log::warn!("Invalid Washington, D.C. pattern: {e}");
            false
        }
    };

    if is_dc {
        components.insert("state_code".to_string(), "DC".to_string());
        components.insert("state".to_string(), "District of Columbia".to_string());
        components.insert("city".to_string(), "Washington".to_string());
    } else if let Some(code) = code {
        components.insert("state_code".to_string(), code);
    }
    components
}

/// Fills `county_code` from the county table when it is missing.
#[must_use]
pub fn derive_county_code(mut components: AddressComponents, data: &ReferenceData) -> AddressComponents {
    if components.contains_key("county_code") {
        return components;
    }

    let code = components.get("county").and_then(|county| {
        components
            .get("country_code")
            .and_then(|cc| data.county_codes(cc))
            .and_then(|codes| find_region_code(codes, county))
    });

    if let Some(code) = code {
        components.insert("county_code".to_string(), code);
    }
    components
}

/// Joins the values of unrecognized components into `attention` when
/// `enabled` and at least one exists.
#[must_use]
pub fn collect_unknown(
    mut components: AddressComponents,
    data: &ReferenceData,
    enabled: bool,
) -> AddressComponents {
    if !enabled {
        return components;
    }

    let unknown: Vec<&str> = components
        .iter()
        .filter(|(key, _)| !data.is_known_component(key))
        .map(|(_, value)| value.as_str())
        .collect();

    if !unknown.is_empty() {
        let attention = unknown.join(", ");
        log::debug!("Unknown components collected as attention: {attention:?}");
        components.insert("attention".to_string(), attention);
    }
    components
}

/// Drops overlong or ambiguous postcodes and trims doubled US ZIP codes to
/// the first one.
#[must_use]
pub fn clean_postcode(mut components: AddressComponents) -> AddressComponents {
    let Some(postcode) = components.get("postcode") else {
        return components;
    };

    if postcode.chars().count() > MAX_POSTCODE_CHARS {
        log::debug!("Dropping overlong postcode {postcode:?}");
        components.remove("postcode");
        return components;
    }

    let cache = pattern_cache::shared();
    if cache
        .get(AMBIGUOUS_POSTCODE_RE)
        .is_ok_and(|re| re.is_match(postcode))
    {
        log::debug!("Dropping ambiguous postcode {postcode:?}");
        components.remove("postcode");
        return components;
    }

    let first_zip = cache
        .get(DOUBLE_ZIP_RE)
        .ok()
        .and_then(|re| re.captures(postcode).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()));
    if let Some(zip) = first_zip {
        components.insert("postcode".to_string(), zip);
    }
    components
}

/// Applies the abbreviation tables of every language spoken in the
/// resolved country. Rules run cumulatively in table order.
#[must_use]
pub fn abbreviate(mut components: AddressComponents, data: &ReferenceData) -> AddressComponents {
    let Some(languages) = components
        .get("country_code")
        .and_then(|cc| data.languages(cc))
    else {
        return components;
    };

    for rules in languages.iter().filter_map(|lang| data.abbreviations(lang)) {
        for rule in rules {
            let Some(value) = components.get_mut(&rule.component) else {
                continue;
            };
            for replacement in &rule.replacements {
                let source = format!(r"\b{}\b", regex::escape(&replacement.src));
                match pattern_cache::shared().get(&source) {
                    Ok(re) => {
                        if re.is_match(value) {
                            *value = re
                                .replace_all(value, NoExpand(&replacement.dest))
                                .into_owned();
                        }
                    }
                    Err(e) => log::warn!("Skipping abbreviation {:?}: {e}", replacement.src),
                }
            }
        }
    }
    components
}

/// Removes components whose entire value is `http://` or `https://`.
/// Values that merely start with a scheme are kept.
#[must_use]
pub fn drop_urls(mut components: AddressComponents) -> AddressComponents {
    match pattern_cache::shared().get(URL_RE) {
        Ok(re) => components.retain(|key, value| {
            let keep = !re.is_match(value);
            if !keep {
                log::debug!("Dropping URL component {key}");
            }
            keep
        }),
        Err(e) => log::warn!("Invalid URL pattern: {e}"),
    }
    components
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

    fn rule(pattern: &str, replacement: &str) -> ReplaceRule {
        (pattern.to_string(), replacement.to_string())
    }

    #[test]
    fn swaps_numeric_country_with_state() {
        let out = recover_swapped_country(components(&[("country", "12"), ("state", "Texas")]));
        assert_eq!(out["country"], "Texas");
        assert!(!out.contains_key("state"));

        let untouched = components(&[("country", "Germany"), ("state", "Bayern")]);
        assert_eq!(recover_swapped_country(untouched.clone()), untouched);
    }

    #[test]
    fn keyed_rule_replaces_exact_value_only() {
        let rules = [rule("city=Wien", "Vienna")];
        let out = apply_replace_rules(components(&[("city", "Wien")]), &rules);
        assert_eq!(out["city"], "Vienna");

        let out = apply_replace_rules(components(&[("city", "Wiener Neustadt")]), &rules);
        assert_eq!(out["city"], "Wiener Neustadt");
    }

    #[test]
    fn keyed_rule_is_a_regex_for_other_keys() {
        let rules = [rule("city=Wien", "Vienna")];
        let out = apply_replace_rules(
            components(&[("city", "Graz"), ("road", "city=Wien 5")]),
            &rules,
        );
        assert_eq!(out["city"], "Graz");
        assert_eq!(out["road"], "Vienna 5");
    }

    #[test]
    fn general_rule_substitutes_everywhere() {
        let rules = [rule("^Stadtteil ", ""), rule(r"(\d+)\. Bezirk", "Bezirk $1")];
        let out = apply_replace_rules(
            components(&[("suburb", "Stadtteil Mitte"), ("city_district", "3. Bezirk")]),
            &rules,
        );
        assert_eq!(out["suburb"], "Mitte");
        assert_eq!(out["city_district"], "Bezirk 3");
    }

    #[test]
    fn rules_apply_in_order() {
        let rules = [rule("a", "b"), rule("b", "c")];
        let out = apply_replace_rules(components(&[("road", "a")]), &rules);
        assert_eq!(out["road"], "c");
    }

    #[test]
    fn invalid_rule_is_skipped() {
        let rules = [rule("(", "x"), rule("Str$", "Straße")];
        let out = apply_replace_rules(components(&[("road", "Hauptstr")]), &rules);
        assert_eq!(out["road"], "Hauptstr");

        let out = apply_replace_rules(components(&[("road", "HauptStr")]), &rules);
        assert_eq!(out["road"], "HauptStraße");
    }

    #[test]
    fn derives_state_code_ignoring_case() {
        let data = embedded();
        let out = derive_state_code(
            components(&[("state", "new york"), ("country_code", "US")]),
            &data,
        );
        assert_eq!(out["state_code"], "NY");
    }

    #[test]
    fn derives_state_code_from_localized_entry() {
        let data = embedded();
        let out = derive_state_code(
            components(&[("state", "Bayern"), ("country_code", "DE")]),
            &data,
        );
        assert_eq!(out["state_code"], "BY");
    }

    #[test]
    fn unknown_state_leaves_code_unset() {
        let data = embedded();
        let out = derive_state_code(
            components(&[("state", "Atlantis"), ("country_code", "US")]),
            &data,
        );
        assert!(!out.contains_key("state_code"));
    }

    #[test]
    fn existing_state_code_is_kept() {
        let data = embedded();
        let out = derive_state_code(
            components(&[("state", "New York"), ("state_code", "XX"), ("country_code", "US")]),
            &data,
        );
        assert_eq!(out["state_code"], "XX");
    }

    #[test]
    fn washington_dc_override() {
        let data = embedded();
        for state in ["Washington, D.C.", "washington dc", "Washington DC"] {
            let out = derive_state_code(
                components(&[("state", state), ("country_code", "US"), ("city", "x")]),
                &data,
            );
            assert_eq!(out["state_code"], "DC", "{state}");
            assert_eq!(out["state"], "District of Columbia");
            assert_eq!(out["city"], "Washington");
        }

        let out = derive_state_code(
            components(&[("state", "Washington"), ("country_code", "US")]),
            &data,
        );
        assert_eq!(out["state_code"], "WA");
        assert_eq!(out["state"], "Washington");
    }

    #[test]
    fn derives_county_code() {
        let data = embedded();
        let out = derive_county_code(
            components(&[("county", "Pisa"), ("country_code", "IT")]),
            &data,
        );
        assert_eq!(out["county_code"], "PI");

        let out = derive_county_code(
            components(&[("county", "Nowhere"), ("country_code", "IT")]),
            &data,
        );
        assert!(!out.contains_key("county_code"));
    }

    #[test]
    fn unknown_components_become_attention() {
        let data = embedded();
        let input = components(&[("foo", "bar"), ("road", "Main St"), ("zzz", "qux")]);

        let out = collect_unknown(input.clone(), &data, true);
        assert_eq!(out["attention"], "bar, qux");

        let out = collect_unknown(input, &data, false);
        assert!(!out.contains_key("attention"));
    }

    #[test]
    fn no_unknown_components_no_attention() {
        let data = embedded();
        let out = collect_unknown(components(&[("road", "Main St")]), &data, true);
        assert!(!out.contains_key("attention"));
    }

    #[test]
    fn postcode_heuristics() {
        let out = clean_postcode(components(&[("postcode", "12345,67890")]));
        assert_eq!(out["postcode"], "12345");

        let out = clean_postcode(components(&[("postcode", "1;2")]));
        assert!(!out.contains_key("postcode"));

        let out = clean_postcode(components(&[("postcode", "1234567890123456789012345")]));
        assert!(!out.contains_key("postcode"));

        let out = clean_postcode(components(&[("postcode", "75000")]));
        assert_eq!(out["postcode"], "75000");

        let out = clean_postcode(components(&[("postcode", "12345,67890,11111")]));
        assert_eq!(out["postcode"], "12345,67890,11111");
    }

    #[test]
    fn abbreviates_whole_words() {
        let data = embedded();
        let out = abbreviate(
            components(&[
                ("road", "North Main Street"),
                ("country_code", "US"),
                ("city", "Streetsboro"),
            ]),
            &data,
        );
        assert_eq!(out["road"], "N Main St");
        assert_eq!(out["city"], "Streetsboro");
    }

    #[test]
    fn abbreviation_needs_language_table() {
        let data = embedded();
        let input = components(&[("road", "Main Street"), ("country_code", "JP")]);
        assert_eq!(abbreviate(input.clone(), &data), input);
    }

    #[test]
    fn drops_only_bare_schemes() {
        let out = drop_urls(components(&[
            ("website", "https://example.org/x"),
            ("city", "https://"),
            ("other", "http://"),
            ("road", "Main St"),
        ]));
        assert_eq!(
            out,
            components(&[("website", "https://example.org/x"), ("road", "Main St")])
        );
    }

    #[test]
    fn full_pipeline_respects_options() {
        let data = embedded();
        let record = data.record("US").unwrap();
        let input = components(&[
            ("road", "Main Street"),
            ("postcode", "12345,67890"),
            ("state", "California"),
            ("country_code", "US"),
            ("foo", "bar"),
        ]);

        let plain = cleanup_components(input.clone(), record, &data, &FormatterOptions::default());
        assert_eq!(plain["road"], "Main Street");
        assert_eq!(plain["postcode"], "12345");
        assert_eq!(plain["state_code"], "CA");
        assert!(!plain.contains_key("attention"));

        let options = FormatterOptions {
            abbreviate: true,
            append_unknown: true,
            ..FormatterOptions::default()
        };
        let out = cleanup_components(input, record, &data, &options);
        assert_eq!(out["road"], "Main St");
        assert_eq!(out["attention"], "bar");
    }
}
