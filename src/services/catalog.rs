//! Slot catalogation.
//!
//! Walks candle history backward until enough distinct calendar dates are
//! covered, counts each candle into its market-local "HH:MM" slot, assigns
//! the majority direction, and chains the martingale statistics on top.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::config::CycleSettings;
use crate::error::Result;
use crate::services::Clock;
use crate::sources::MarketFeed;
use crate::types::{Candle, Catalog, Chained, ChainedStat, Direction, SlotMap};

/// Candles requested per backward page.
const PAGE_SIZE: u32 = 1000;

/// Builds per-slot directional statistics from candle history.
pub struct Cataloger {
    market: Arc<dyn MarketFeed>,
    clock: Arc<dyn Clock>,
}

impl Cataloger {
    pub fn new(market: Arc<dyn MarketFeed>, clock: Arc<dyn Clock>) -> Self {
        Self { market, clock }
    }

    /// Catalog every currently open digital instrument. Instruments whose
    /// history cannot be fetched are logged and skipped; a failed schedule
    /// lookup aborts the whole pass.
    pub async fn catalog_open_instruments(&self, settings: &CycleSettings) -> Result<Catalog> {
        let schedule = self.market.open_instruments().await?;
        let open: Vec<String> = schedule
            .into_iter()
            .filter(|(_, state)| state.open)
            .map(|(name, _)| name)
            .collect();
        info!(
            "Cataloguing {} open instruments (M{}, {} days)",
            open.len(),
            settings.interval_minutes,
            settings.lookback_days
        );

        let mut catalog = Catalog::new();
        for instrument in open {
            match self.catalog_instrument(&instrument, settings).await {
                Ok(slots) => {
                    catalog.insert(instrument, slots);
                }
                Err(e) => warn!("Skipping {}: {}", instrument, e),
            }
        }
        Ok(catalog)
    }

    /// Catalog a single instrument over the configured lookback window.
    pub async fn catalog_instrument(
        &self,
        instrument: &str,
        settings: &CycleSettings,
    ) -> Result<SlotMap> {
        let window = self.pull_window(instrument, settings).await?;
        debug!(
            "{}: aggregated {} candles over {} days",
            instrument,
            window.len(),
            settings.lookback_days
        );
        let tz = self.clock.now().timezone();
        Ok(aggregate(&window, &tz, settings))
    }

    /// Page candles backward from now until the window spans more distinct
    /// local calendar dates than requested, or the feed runs dry.
    async fn pull_window(
        &self,
        instrument: &str,
        settings: &CycleSettings,
    ) -> Result<Vec<Candle>> {
        let interval = settings.interval_secs();
        let tz = self.clock.now().timezone();
        let mut end_ts = self.clock.now().timestamp();
        let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut window: Vec<Candle> = Vec::new();

        'paging: loop {
            let batch = self
                .market
                .candles(instrument, interval, PAGE_SIZE, end_ts)
                .await?;
            if batch.is_empty() {
                debug!(
                    "{}: feed exhausted after {} candles",
                    instrument,
                    window.len()
                );
                break;
            }

            // Newest first, so the lookback cap cuts at the old edge
            for candle in batch.iter().rev() {
                dates.insert(local_time(candle.start_time, &tz).date_naive());
                if dates.len() > settings.lookback_days as usize {
                    break 'paging;
                }
                window.push(*candle);
            }

            // Next page ends just before the oldest candle seen so far
            match batch.first() {
                Some(oldest) => end_ts = oldest.start_time - 1,
                None => break,
            }
        }

        Ok(window)
    }
}

/// Aggregate a candle window into per-slot statistics: color counts, bias
/// direction, and chained martingale levels.
pub fn aggregate(candles: &[Candle], tz: &Tz, settings: &CycleSettings) -> SlotMap {
    let mut slots = SlotMap::new();
    for candle in candles {
        let label = local_time(candle.start_time, tz).format("%H:%M").to_string();
        slots.entry(label).or_default().record(candle.color());
    }
    assign_bias(&mut slots);
    chain_martingales(&mut slots, settings);
    slots
}

/// Assign the majority direction and its percentage to each slot. A slot
/// splitting exactly 50/50 keeps no direction.
fn assign_bias(slots: &mut SlotMap) {
    for stat in slots.values_mut() {
        let total = stat.total();
        if total == 0 {
            continue;
        }
        let raw = (100.0 * stat.up as f64 / total as f64).round() as u8;
        if raw > 50 {
            stat.bias_percent = raw;
            stat.direction = Some(Direction::Call);
        } else if raw < 50 {
            stat.bias_percent = 100 - raw;
            stat.direction = Some(Direction::Put);
        } else {
            stat.bias_percent = raw;
        }
    }
}

/// Compute the chained martingale levels for every directed slot.
///
/// Counts carry forward: level N measures the base slot plus all forward
/// slots up to N intervals ahead, as a single pooled sample. The first
/// missing forward slot ends the chain; that level and everything past it
/// stay unavailable.
fn chain_martingales(slots: &mut SlotMap, settings: &CycleSettings) {
    let levels = settings.martingale_levels;
    if levels == 0 {
        return;
    }

    let counts: BTreeMap<String, (u32, u32, u32)> = slots
        .iter()
        .map(|(label, stat)| (label.clone(), (stat.up, stat.down, stat.neutral)))
        .collect();

    for (label, stat) in slots.iter_mut() {
        let direction = match stat.direction {
            Some(direction) => direction,
            None => continue,
        };

        let (mut sum_up, mut sum_down, mut sum_neutral) = (stat.up, stat.down, stat.neutral);
        let mut chained = Vec::with_capacity(levels as usize);
        let mut cursor = label.clone();

        for _ in 1..=levels {
            let next = match advance_slot(&cursor, settings.interval_minutes) {
                Some(next) => next,
                None => break,
            };
            match counts.get(&next) {
                Some(&(up, down, neutral)) => {
                    sum_up += up;
                    sum_down += down;
                    sum_neutral += neutral;
                    let total = sum_up + sum_down + sum_neutral;
                    let favored = match direction {
                        Direction::Call => sum_up,
                        Direction::Put => sum_down,
                    };
                    let percent = (100.0 * favored as f64 / total as f64).round() as u8;
                    chained.push(Chained::Available(ChainedStat {
                        up: sum_up,
                        down: sum_down,
                        neutral: sum_neutral,
                        percent,
                    }));
                    cursor = next;
                }
                None => break,
            }
        }

        while chained.len() < levels as usize {
            chained.push(Chained::Unavailable);
        }
        stat.martingale = chained;
    }
}

/// The slot label one timeframe step ahead, wrapping across midnight.
fn advance_slot(slot: &str, interval_minutes: u32) -> Option<String> {
    let (hour, minute) = crate::services::clock::parse_slot(slot).ok()?;
    let total = (hour * 60 + minute + interval_minutes) % (24 * 60);
    Some(format!("{:02}:{:02}", total / 60, total % 60))
}

fn local_time(ts: i64, tz: &Tz) -> DateTime<Tz> {
    DateTime::from_timestamp(ts, 0)
        .unwrap_or_default()
        .with_timezone(tz)
}
