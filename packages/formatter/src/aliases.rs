//! Alias resolution.
//!
//! Geocoders report the same field under different names (`street` vs.
//! `road`, `town` vs. `city`). Layouts only reference canonical names, so
//! every alias value is copied to its canonical name when that name is not
//! already set. The alias key itself stays in place.

use address_formatter_models::AddressComponents;

use crate::reference::ReferenceData;

/// Adds canonical names for aliased components, in alias-table order.
#[must_use]
pub fn apply_aliases(mut components: AddressComponents, data: &ReferenceData) -> AddressComponents {
    for entry in data.aliases() {
        if components.contains_key(&entry.name) {
            continue;
        }
        if let Some(value) = components.get(&entry.alias) {
            log::trace!("Aliasing {} as {}", entry.alias, entry.name);
            let value = value.clone();
            components.insert(entry.name.clone(), value);
        }
    }
    components
}
