//! Hour-bucket organization.
//!
//! Regroups the flat per-instrument slot maps under their "HH:00" hour so
//! the selector can look at the current hour in one step.

use crate::services::clock::parse_slot;
use crate::types::{Catalog, HourBuckets};

/// File every cataloged slot under its hour bucket. Statistics are moved
/// as-is; nothing is recomputed.
pub fn organize(catalog: &Catalog) -> HourBuckets {
    let mut buckets = HourBuckets::new();
    for (instrument, slots) in catalog {
        for (slot, stat) in slots {
            if let Ok((hour, _)) = parse_slot(slot) {
                buckets.insert(
                    &format!("{:02}:00", hour),
                    instrument,
                    slot.clone(),
                    stat.clone(),
                );
            }
        }
    }
    buckets
}
