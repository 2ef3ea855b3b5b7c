use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::candle::CandleColor;

/// Operation direction implied by a slot's historical majority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    /// Whether a candle of the given color wins an operation in this direction.
    pub fn wins_with(&self, color: CandleColor) -> bool {
        matches!(
            (self, color),
            (Direction::Call, CandleColor::Up) | (Direction::Put, CandleColor::Down)
        )
    }

    /// Colored square used in list messages.
    pub fn emoji(&self) -> &'static str {
        match self {
            Direction::Call => "\u{1F7E9}",
            Direction::Put => "\u{1F7E5}",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Call => write!(f, "CALL"),
            Direction::Put => write!(f, "PUT"),
        }
    }
}

/// Directional counts and measured percentage for one martingale level.
///
/// Counts are cumulative: level N sums the base slot plus every forward slot
/// up to and including N steps ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedStat {
    pub up: u32,
    pub down: u32,
    pub neutral: u32,
    /// Percentage of the cumulative counts favoring the base slot's direction.
    pub percent: u8,
}

/// A chained statistic that may be missing when the forward slot was never
/// observed in the aggregated window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chained {
    Available(ChainedStat),
    Unavailable,
}

impl Chained {
    /// Percentage when the level is available.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Chained::Available(stat) => Some(stat.percent),
            Chained::Unavailable => None,
        }
    }

    /// Whether the level is available and meets the threshold. An
    /// unavailable level never passes.
    pub fn meets(&self, threshold: u8) -> bool {
        self.percent().map(|p| p >= threshold).unwrap_or(false)
    }
}

/// Aggregated behavior of a single "HH:MM" slot across the lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStat {
    /// Candles that closed above their open.
    pub up: u32,
    /// Candles that closed below their open.
    pub down: u32,
    /// Doji candles.
    pub neutral: u32,
    /// Majority percentage after direction assignment (always >= 50 once a
    /// direction is set).
    pub bias_percent: u8,
    /// Majority direction; `None` for a dead-even slot.
    pub direction: Option<Direction>,
    /// Chained statistics, index 0 = first martingale level.
    pub martingale: Vec<Chained>,
}

impl SlotStat {
    pub fn new() -> Self {
        Self {
            up: 0,
            down: 0,
            neutral: 0,
            bias_percent: 0,
            direction: None,
            martingale: Vec::new(),
        }
    }

    /// Count one historical candle into the slot.
    pub fn record(&mut self, color: CandleColor) {
        match color {
            CandleColor::Up => self.up += 1,
            CandleColor::Down => self.down += 1,
            CandleColor::Neutral => self.neutral += 1,
        }
    }

    /// Total candles observed for this slot.
    pub fn total(&self) -> u32 {
        self.up + self.down + self.neutral
    }

    /// Chained statistic for a 1-based martingale level.
    pub fn chained(&self, level: u8) -> Chained {
        if level == 0 {
            return Chained::Unavailable;
        }
        self.martingale
            .get(level as usize - 1)
            .copied()
            .unwrap_or(Chained::Unavailable)
    }
}

impl Default for SlotStat {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instrument slot statistics keyed by "HH:MM" label.
pub type SlotMap = BTreeMap<String, SlotStat>;

/// Full catalogation output keyed by instrument.
pub type Catalog = BTreeMap<String, SlotMap>;

/// Slot statistics regrouped under their "HH:00" hour label.
///
/// All 24 hour buckets exist regardless of content, so lookups for a quiet
/// hour yield an empty group rather than a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourBuckets {
    buckets: BTreeMap<String, BTreeMap<String, SlotMap>>,
}

impl HourBuckets {
    /// Create the 24 empty hour buckets.
    pub fn new() -> Self {
        let mut buckets = BTreeMap::new();
        for hour in 0..24 {
            buckets.insert(format!("{:02}:00", hour), BTreeMap::new());
        }
        Self { buckets }
    }

    /// File one slot statistic under its hour bucket.
    pub fn insert(&mut self, hour: &str, instrument: &str, slot: String, stat: SlotStat) {
        self.buckets
            .entry(hour.to_string())
            .or_default()
            .entry(instrument.to_string())
            .or_default()
            .insert(slot, stat);
    }

    /// Instrument groups filed under the given hour label.
    pub fn for_hour(&self, hour: &str) -> Option<&BTreeMap<String, SlotMap>> {
        self.buckets.get(hour)
    }

    /// Number of hour buckets (always 24 after `new`).
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total slot entries across every bucket.
    pub fn total_slots(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|instruments| instruments.values())
            .map(|slots| slots.len())
            .sum()
    }
}

impl Default for HourBuckets {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Direction Tests
    // =========================================================================

    #[test]
    fn test_direction_wins_with_matching_color() {
        assert!(Direction::Call.wins_with(CandleColor::Up));
        assert!(Direction::Put.wins_with(CandleColor::Down));
    }

    #[test]
    fn test_direction_loses_against_opposite_color() {
        assert!(!Direction::Call.wins_with(CandleColor::Down));
        assert!(!Direction::Put.wins_with(CandleColor::Up));
    }

    #[test]
    fn test_direction_never_wins_on_neutral() {
        assert!(!Direction::Call.wins_with(CandleColor::Neutral));
        assert!(!Direction::Put.wins_with(CandleColor::Neutral));
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Call.to_string(), "CALL");
        assert_eq!(Direction::Put.to_string(), "PUT");
    }

    // =========================================================================
    // Chained Tests
    // =========================================================================

    #[test]
    fn test_chained_available_meets_threshold() {
        let chained = Chained::Available(ChainedStat {
            up: 13,
            down: 7,
            neutral: 0,
            percent: 65,
        });

        assert!(chained.meets(60));
        assert!(chained.meets(65));
        assert!(!chained.meets(66));
    }

    #[test]
    fn test_chained_unavailable_never_meets() {
        assert!(!Chained::Unavailable.meets(0));
        assert_eq!(Chained::Unavailable.percent(), None);
    }

    // =========================================================================
    // SlotStat Tests
    // =========================================================================

    #[test]
    fn test_slot_stat_record_counts() {
        let mut stat = SlotStat::new();
        stat.record(CandleColor::Up);
        stat.record(CandleColor::Up);
        stat.record(CandleColor::Down);
        stat.record(CandleColor::Neutral);

        assert_eq!(stat.up, 2);
        assert_eq!(stat.down, 1);
        assert_eq!(stat.neutral, 1);
        assert_eq!(stat.total(), 4);
    }

    #[test]
    fn test_slot_stat_chained_lookup() {
        let mut stat = SlotStat::new();
        stat.martingale = vec![
            Chained::Available(ChainedStat {
                up: 10,
                down: 5,
                neutral: 0,
                percent: 67,
            }),
            Chained::Unavailable,
        ];

        assert_eq!(stat.chained(1).percent(), Some(67));
        assert_eq!(stat.chained(2), Chained::Unavailable);
        // Level 0 is the base entry, not a chained level
        assert_eq!(stat.chained(0), Chained::Unavailable);
        // Beyond the configured depth
        assert_eq!(stat.chained(3), Chained::Unavailable);
    }

    // =========================================================================
    // HourBuckets Tests
    // =========================================================================

    #[test]
    fn test_hour_buckets_has_all_24_hours() {
        let buckets = HourBuckets::new();
        assert_eq!(buckets.len(), 24);
        assert!(buckets.for_hour("00:00").is_some());
        assert!(buckets.for_hour("23:00").is_some());
        assert!(buckets.for_hour("24:00").is_none());
    }

    #[test]
    fn test_hour_buckets_insert_and_lookup() {
        let mut buckets = HourBuckets::new();
        buckets.insert("10:00", "EURUSD", "10:15".to_string(), SlotStat::new());

        let hour = buckets.for_hour("10:00").unwrap();
        assert!(hour.contains_key("EURUSD"));
        assert!(hour["EURUSD"].contains_key("10:15"));
        assert_eq!(buckets.total_slots(), 1);
    }

    #[test]
    fn test_hour_buckets_empty_hour_is_present_but_empty() {
        let buckets = HourBuckets::new();
        let hour = buckets.for_hour("03:00").unwrap();
        assert!(hour.is_empty());
        assert_eq!(buckets.total_slots(), 0);
    }
}
