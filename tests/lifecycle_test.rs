//! Integration tests for the signal lifecycle
//!
//! Tests cover:
//! - Terminal outcomes across scripted candle sequences
//! - Suspension timing across attempt levels
//! - A full cycle from aggregated history to the final scoreboard
//! - Rejected and neutral signals staying out of the score

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

use augury::config::{CycleSettings, StickerConfig};
use augury::error::{AppError, Result};
use augury::services::{
    aggregate, despace, organize, select, slot_on, ChartRenderer, Clock, Messages, Schedule,
    SignalLifecycle, SignalTracker,
};
use augury::sources::{InstrumentState, MarketFeed, Notifier};
use augury::types::*;

// =============================================================================
// Test doubles
// =============================================================================

struct SimClock {
    now: Mutex<DateTime<Tz>>,
}

impl SimClock {
    fn at(hour: u32, minute: u32) -> Self {
        Self {
            now: Mutex::new(utc(hour, minute)),
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Tz> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let mut now = self.now.lock().unwrap();
        *now = *now + chrono::Duration::from_std(duration).unwrap();
        Box::pin(async {})
    }
}

/// Feed that pops one scripted batch per `candles` call.
struct ScriptedFeed {
    batches: Mutex<VecDeque<Vec<Candle>>>,
    open: bool,
}

impl ScriptedFeed {
    fn new(open: bool) -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            open,
        }
    }

    /// Queue one evaluation attempt: the entry candle, then the chart window.
    fn push_level(&self, color: CandleColor) {
        let candle = candle_at(1_700_000_000, color);
        let mut batches = self.batches.lock().unwrap();
        batches.push_back(vec![candle]);
        batches.push_back(vec![candle; 15]);
    }
}

impl MarketFeed for ScriptedFeed {
    fn candles<'a>(
        &'a self,
        _instrument: &'a str,
        _interval_secs: i64,
        _count: u32,
        _to_ts: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Candle>>> + Send + 'a>> {
        Box::pin(async move {
            match self.batches.lock().unwrap().pop_front() {
                Some(batch) => Ok(batch),
                None => Err(AppError::DataFetch("feed script exhausted".to_string())),
            }
        })
    }

    fn open_instruments<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BTreeMap<String, InstrumentState>>> + Send + 'a>> {
        Box::pin(async move {
            let mut book = BTreeMap::new();
            book.insert("EURUSD-op".to_string(), InstrumentState { open: self.open });
            Ok(book)
        })
    }
}

struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn send_text<'a>(
        &'a self,
        _html: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn send_image<'a>(
        &'a self,
        _path: &'a Path,
        _caption: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn send_sticker<'a>(
        &'a self,
        _sticker: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

struct NullCharts;

impl ChartRenderer for NullCharts {
    fn render(&self, _candles: &[Candle], _title: &str, _subtitle: &str) -> Result<PathBuf> {
        Ok(PathBuf::from("/tmp/augury-null-chart.png"))
    }

    fn discard(&self, _path: &Path) {}
}

// =============================================================================
// Helpers
// =============================================================================

fn utc(hour: u32, minute: u32) -> DateTime<Tz> {
    chrono_tz::UTC
        .with_ymd_and_hms(2024, 3, 14, hour, minute, 0)
        .unwrap()
}

fn ts(day: u32, hour: u32, minute: u32) -> i64 {
    chrono::Utc
        .with_ymd_and_hms(2024, 3, day, hour, minute, 0)
        .unwrap()
        .timestamp()
}

fn candle_at(start_time: i64, color: CandleColor) -> Candle {
    let (open, close) = match color {
        CandleColor::Up => (1.0, 1.1),
        CandleColor::Down => (1.1, 1.0),
        CandleColor::Neutral => (1.0, 1.0),
    };
    Candle {
        start_time,
        open,
        close,
        high: 1.2,
        low: 0.9,
        volume: 10.0,
    }
}

fn candidate(instrument: &str, slot: &str, direction: Direction) -> CandidateSignal {
    CandidateSignal {
        instrument: instrument.to_string(),
        slot: slot.to_string(),
        direction,
        stat: SlotStat::new(),
    }
}

struct Harness {
    feed: Arc<ScriptedFeed>,
    schedule: Schedule,
    messages: Messages,
    tracker: SignalTracker,
}

fn harness(open: bool, hour: u32, minute: u32) -> Harness {
    let feed = Arc::new(ScriptedFeed::new(open));
    let schedule = Schedule::new(Arc::new(SimClock::at(hour, minute)));
    let messages = Messages::new("AUGURY SIGNALS");
    let tracker = SignalTracker::new(
        feed.clone(),
        Arc::new(SilentNotifier),
        Arc::new(NullCharts),
        schedule.clone(),
        messages.clone(),
        StickerConfig::default(),
    );
    Harness {
        feed,
        schedule,
        messages,
        tracker,
    }
}

// =============================================================================
// Terminal outcomes
// =============================================================================

#[tokio::test]
async fn test_every_sequence_ends_terminal_with_consistent_level() {
    use CandleColor::{Down, Neutral, Up};

    let table: Vec<(Vec<CandleColor>, TrackOutcome, ResultStatus, u8)> = vec![
        (vec![Up], TrackOutcome::Win { level: 0 }, ResultStatus::Win, 0),
        (vec![Down, Up], TrackOutcome::Win { level: 1 }, ResultStatus::Win, 1),
        (vec![Neutral, Up], TrackOutcome::Win { level: 1 }, ResultStatus::Win, 1),
        (vec![Down, Down, Up], TrackOutcome::Win { level: 2 }, ResultStatus::Win, 2),
        (vec![Down, Down, Down], TrackOutcome::LossFinal, ResultStatus::Loss, 2),
        (vec![Down, Neutral, Down], TrackOutcome::LossFinal, ResultStatus::Loss, 2),
        (vec![Neutral, Neutral, Neutral], TrackOutcome::DojiFinal, ResultStatus::Doji, 2),
    ];

    for (sequence, expected_outcome, expected_status, expected_level) in table {
        let h = harness(true, 10, 0);
        for color in &sequence {
            h.feed.push_level(*color);
        }
        let settings = CycleSettings::default();
        let mut signal = TrackedSignal::from(candidate("EURUSD-op", "10:01", Direction::Call));

        let outcome = SignalLifecycle::new(&h.tracker, &settings, &mut signal)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, expected_outcome, "sequence {:?}", sequence);
        let result = signal
            .result
            .unwrap_or_else(|| panic!("no result recorded for {:?}", sequence));
        assert_eq!(result.status, expected_status, "sequence {:?}", sequence);
        assert_eq!(
            result.martingale_level, expected_level,
            "sequence {:?}",
            sequence
        );
    }
}

// =============================================================================
// Suspension timing
// =============================================================================

#[tokio::test]
async fn test_base_win_suspends_for_exactly_one_interval() {
    let h = harness(true, 10, 0);
    h.feed.push_level(CandleColor::Up);
    let settings = CycleSettings::default();
    let mut signal = TrackedSignal::from(candidate("EURUSD-op", "10:01", Direction::Call));

    SignalLifecycle::new(&h.tracker, &settings, &mut signal)
        .run()
        .await
        .unwrap();

    // Wait until the 10:01 window, then one closed candle
    assert_eq!(h.schedule.now(), utc(10, 2));
}

#[tokio::test]
async fn test_exhausted_chain_suspends_once_per_level_plus_doji_pauses() {
    let h = harness(true, 10, 0);
    for _ in 0..3 {
        h.feed.push_level(CandleColor::Neutral);
    }
    let settings = CycleSettings::default();
    let mut signal = TrackedSignal::from(candidate("EURUSD-op", "10:01", Direction::Call));

    SignalLifecycle::new(&h.tracker, &settings, &mut signal)
        .run()
        .await
        .unwrap();

    // Wait until 10:01, then three one-minute candles and three
    // ten-second doji cooldowns
    let expected = utc(10, 4) + chrono::Duration::seconds(30);
    assert_eq!(h.schedule.now(), expected);
}

// =============================================================================
// Full cycle
// =============================================================================

#[tokio::test]
async fn test_full_cycle_from_history_to_scoreboard() {
    // Ten days of history with four qualifying minute slots in the ten
    // o'clock hour; despacing then thins them to three entries.
    let profile = CycleSettings {
        interval_minutes: 1,
        lookback_days: 10,
        martingale_levels: 0,
        min_percent: [80, 70, 70],
    };

    let mut history = Vec::new();
    for day in 1..=10u32 {
        for minute in [1, 2, 5, 9] {
            let color = if day <= 8 {
                CandleColor::Up
            } else {
                CandleColor::Down
            };
            history.push(candle_at(ts(day, 10, minute), color));
        }
    }

    let mut catalog = Catalog::new();
    catalog.insert(
        "EURUSD-op".to_string(),
        aggregate(&history, &chrono_tz::UTC, &profile),
    );

    let cycle_start = utc(10, 0);
    let candidates = select(&organize(&catalog), &cycle_start, &profile);
    assert_eq!(candidates.len(), 4);

    let list = despace(candidates, &cycle_start, profile.interval_minutes);
    let slots: Vec<&str> = list.iter().map(|c| c.slot.as_str()).collect();
    assert_eq!(slots, vec!["10:01", "10:05", "10:09"]);
    for pair in list.windows(2) {
        let a = slot_on(&cycle_start, &pair[0].slot).unwrap();
        let b = slot_on(&cycle_start, &pair[1].slot).unwrap();
        assert!(b - a >= chrono::Duration::minutes(4));
    }

    let h = harness(true, 10, 0);
    let announce = h
        .messages
        .signal_list(&cycle_start, profile.interval_minutes, &list);
    assert!(announce.contains("EURUSD 10:01 M1 CALL \u{1F7E9}\n"));
    assert!(announce.contains("EURUSD 10:09 M1 CALL \u{1F7E9}\n"));

    // Scripted results: base win, first-gale win, full loss
    h.feed.push_level(CandleColor::Up);
    h.feed.push_level(CandleColor::Down);
    h.feed.push_level(CandleColor::Up);
    h.feed.push_level(CandleColor::Down);
    h.feed.push_level(CandleColor::Down);
    h.feed.push_level(CandleColor::Down);

    let tracked = h.tracker.track_all(&profile, list).await.unwrap();
    assert_eq!(
        tracked[0].result,
        Some(SignalResult {
            status: ResultStatus::Win,
            martingale_level: 0,
            message: "<b>Win +$ (No Martingale)</b>".to_string(),
        })
    );
    assert_eq!(
        tracked[1].result,
        Some(SignalResult {
            status: ResultStatus::Win,
            martingale_level: 1,
            message: "<b>Win +$ (1st Martingale)</b>".to_string(),
        })
    );
    assert_eq!(
        tracked[2].result,
        Some(SignalResult {
            status: ResultStatus::Loss,
            martingale_level: 2,
            message: "<b>Loss -$ (2nd Martingale)</b>".to_string(),
        })
    );

    let board = h.messages.scoreboard(
        &h.schedule.now(),
        &cycle_start,
        profile.interval_minutes,
        &tracked,
    );
    assert!(board.contains("Signals from <b>10:00</b> to <b>11:00</b>"));
    assert!(board.contains("\u{2705}(g1)"));
    assert!(board.contains("\u{274C}"));
    assert!(board.ends_with("\nScore: 2x1"));
}

// =============================================================================
// Unscored entries
// =============================================================================

#[tokio::test]
async fn test_rejected_signals_stay_pending_on_the_scoreboard() {
    let h = harness(false, 10, 0);
    let settings = CycleSettings::default();
    let candidates = vec![candidate("EURUSD-op", "10:05", Direction::Call)];

    let tracked = h.tracker.track_all(&settings, candidates).await.unwrap();
    assert!(tracked[0].result.is_none());

    let now = h.schedule.now();
    let board = h
        .messages
        .scoreboard(&now, &now, settings.interval_minutes, &tracked);
    assert!(board.contains("\u{25AB}\u{FE0F}"));
    assert!(board.ends_with("\nScore: 0x0"));
}

#[tokio::test]
async fn test_doji_outcome_is_not_counted_in_the_score() {
    let h = harness(true, 10, 0);
    for _ in 0..3 {
        h.feed.push_level(CandleColor::Neutral);
    }
    let settings = CycleSettings::default();
    let candidates = vec![candidate("EURUSD-op", "10:01", Direction::Call)];

    let tracked = h.tracker.track_all(&settings, candidates).await.unwrap();
    assert_eq!(tracked[0].result.as_ref().unwrap().status, ResultStatus::Doji);

    let now = h.schedule.now();
    let board = h
        .messages
        .scoreboard(&now, &now, settings.interval_minutes, &tracked);
    assert!(board.contains("\u{25AB}\u{FE0F}"));
    assert!(board.ends_with("\nScore: 0x0"));
}
