// Version ordering
//
// Install order is ascending by a weighted numeric key, with `current` always last.
// The key is Σ component[i] * 100^i over the REVERSED dot-split components, so `1.2.10` weighs
// 1*100^2 + 2*100 + 10. Components >= 100 bleed into the next component's weight (1.100 sorts
// equal to 2.0); this boundary is kept on purpose because existing projects rely on it.

use crate::models::project::DatabaseVersion;
use log::warn;
use std::cmp::Ordering;

const COMPONENT_BASE: u128 = 100;

/// Numeric ordering key of a dotted version name.
pub fn version_weight(name: &str) -> u128 {
    name.split('.')
        .rev()
        .enumerate()
        .fold(0u128, |acc, (i, component)| {
            let value = match component.trim().parse::<u128>() {
                Ok(v) => v,
                Err(_) => {
                    warn!(
                        "[PHASE: plan] [STEP: order_versions] Non-numeric component '{}' in version '{}' weighs 0",
                        component, name
                    );
                    0
                }
            };
            let scale = COMPONENT_BASE.saturating_pow(i as u32);
            acc.saturating_add(value.saturating_mul(scale))
        })
}

fn compare(a: &DatabaseVersion, b: &DatabaseVersion) -> Ordering {
    match (a.is_current(), b.is_current()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => version_weight(&a.name).cmp(&version_weight(&b.name)),
    }
}

/// Install-ordered copy of `versions` (stable for equal keys).
pub fn order_versions(mut versions: Vec<DatabaseVersion>) -> Vec<DatabaseVersion> {
    versions.sort_by(compare);
    versions
}
