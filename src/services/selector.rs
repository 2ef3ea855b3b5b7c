//! Signal selection.
//!
//! Two passes over the organized statistics: a threshold filter over the
//! current hour's bucket, then temporal despacing so kept entries never
//! crowd each other.

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::debug;

use crate::config::CycleSettings;
use crate::services::clock::{hour_label, slot_on};
use crate::types::{CandidateSignal, HourBuckets};

/// Minimum spacing between kept signals, in timeframe steps.
const SPACING_STEPS: i64 = 4;

/// Threshold pass: keep current-hour slots at or after `now` whose
/// statistics clear the base threshold and every configured martingale
/// threshold. A slot with an unavailable required level never passes.
pub fn select(
    buckets: &HourBuckets,
    now: &DateTime<Tz>,
    settings: &CycleSettings,
) -> Vec<CandidateSignal> {
    let hour = hour_label(now);
    let mut candidates = Vec::new();

    let group = match buckets.for_hour(&hour) {
        Some(group) => group,
        None => return candidates,
    };

    for (instrument, slots) in group {
        for (slot, stat) in slots {
            let slot_time = match slot_on(now, slot) {
                Ok(time) => time,
                Err(_) => continue,
            };
            if slot_time < *now {
                continue;
            }

            let direction = match stat.direction {
                Some(direction) => direction,
                None => continue,
            };
            if stat.bias_percent < settings.threshold(0) {
                continue;
            }
            if !(1..=settings.martingale_levels)
                .all(|level| stat.chained(level).meets(settings.threshold(level)))
            {
                continue;
            }

            candidates.push(CandidateSignal {
                instrument: instrument.clone(),
                slot: slot.clone(),
                direction,
                stat: stat.clone(),
            });
        }
    }

    debug!(
        "Threshold pass kept {} candidates in the {} bucket",
        candidates.len(),
        hour
    );
    candidates
}

/// Despacing pass: sort by slot time and greedily drop entries closer than
/// four timeframe steps to the last kept one. Spacing is global across
/// instruments, so two different pairs still cannot crowd each other.
pub fn despace(
    candidates: Vec<CandidateSignal>,
    now: &DateTime<Tz>,
    interval_minutes: u32,
) -> Vec<CandidateSignal> {
    let spacing = chrono::Duration::minutes(SPACING_STEPS * interval_minutes as i64);

    let mut timed: Vec<(DateTime<Tz>, CandidateSignal)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            slot_on(now, &candidate.slot)
                .ok()
                .map(|time| (time, candidate))
        })
        .collect();
    timed.sort_by_key(|(time, _)| *time);

    let mut kept = Vec::new();
    let mut last_kept: Option<DateTime<Tz>> = None;
    for (time, candidate) in timed {
        let keep = match last_kept {
            None => true,
            Some(previous) => time - previous >= spacing,
        };
        if keep {
            last_kept = Some(time);
            kept.push(candidate);
        }
    }
    kept
}
