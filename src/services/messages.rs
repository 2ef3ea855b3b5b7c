//! HTML message builders for every Telegram notification the engine sends.
//!
//! All builders return ready-to-send strings with `parse_mode: HTML`
//! markup. Timestamps render in the configured market timezone.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::types::{CandidateSignal, Direction, ResultStatus, SignalResult, TrackedSignal};

/// Instrument name as shown to subscribers. OTC pairs come from the
/// feed with an `-op` suffix that means nothing to a reader.
pub fn display_name(instrument: &str) -> &str {
    instrument.strip_suffix("-op").unwrap_or(instrument)
}

/// Human label for a martingale level, clamped to the deepest level.
pub fn martingale_label(level: u8) -> &'static str {
    match level {
        0 => "No Martingale",
        1 => "1st Martingale",
        _ => "2nd Martingale",
    }
}

/// Verdict line for a winning attempt, also used as the chart subtitle.
pub fn win_label(level: u8) -> String {
    format!("Win +$ ({})", martingale_label(level))
}

/// Verdict line for a losing attempt, also used as the chart subtitle.
pub fn loss_label(level: u8) -> String {
    format!("Loss -$ ({})", martingale_label(level))
}

/// Chart subtitle for a neutral candle at the given attempt.
pub fn doji_label(level: u8) -> String {
    format!("Doji detected ({})", martingale_label(level))
}

/// Builds the outbound message catalog for one branded channel.
#[derive(Clone)]
pub struct Messages {
    brand: String,
}

impl Messages {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
        }
    }

    /// Branded header stamped with the current market-local time.
    fn header(&self, now: &DateTime<Tz>) -> String {
        format!(
            "\u{1F680} | <b>{}</b>\n| <i>{}</i>",
            self.brand,
            now.format("%d/%m/%Y %H:%M:%S, %A")
        )
    }

    fn hour_span(now: &DateTime<Tz>) -> String {
        use chrono::Timelike;
        format!(
            "Signals from <b>{:02}:00</b> to <b>{:02}:00</b>\n\n",
            now.hour(),
            (now.hour() + 1) % 24
        )
    }

    fn directed(direction: Direction) -> String {
        format!("{} {}", direction, direction.emoji())
    }

    /// The hourly announcement listing every selected signal.
    pub fn signal_list(
        &self,
        now: &DateTime<Tz>,
        interval_minutes: u32,
        signals: &[CandidateSignal],
    ) -> String {
        let mut message = format!("{}\n\n", self.header(now));
        message.push_str(&Self::hour_span(now));
        for signal in signals {
            message.push_str(&format!(
                "{} {} M{} {}\n",
                display_name(&signal.instrument),
                signal.slot,
                interval_minutes,
                Self::directed(signal.direction)
            ));
        }
        message
    }

    /// Cancellation notice for an instrument whose market is closed.
    pub fn market_closed(
        &self,
        now: &DateTime<Tz>,
        signal: &TrackedSignal,
        interval_minutes: u32,
    ) -> String {
        let pair = display_name(&signal.instrument);
        format!(
            "{}\n\n\n| <i>{} {} M{} {}</i>\n\u{1F512} Instrument {} is closed right now",
            self.header(now),
            pair,
            signal.slot,
            interval_minutes,
            signal.direction,
            pair
        )
    }

    /// Cancellation notice for a signal whose entry time already passed.
    pub fn signal_expired(
        &self,
        now: &DateTime<Tz>,
        signal: &TrackedSignal,
        interval_minutes: u32,
    ) -> String {
        format!(
            "{}\n\n\n| <i>{} {} M{} {}</i>\n\u{23F0} The <i>{}</i> operation window has expired",
            self.header(now),
            display_name(&signal.instrument),
            signal.slot,
            interval_minutes,
            signal.direction,
            signal.slot
        )
    }

    /// Heads-up sent while waiting for the entry window to open.
    pub fn awaiting_operation(
        &self,
        now: &DateTime<Tz>,
        signal: &TrackedSignal,
        interval_minutes: u32,
    ) -> String {
        format!(
            "{}\n\n| <b>Awaiting Operation</b>\n{} {} M{} {}",
            self.header(now),
            display_name(&signal.instrument),
            signal.slot,
            interval_minutes,
            Self::directed(signal.direction)
        )
    }

    /// Confirmation that the entry window opened and the trade is live.
    pub fn operation_placed(&self, now: &DateTime<Tz>, instrument: &str) -> String {
        format!(
            "{}\n\n\u{23F0} Operation placed on {}, awaiting result...",
            self.header(now),
            display_name(instrument)
        )
    }

    /// Caption attached to every evaluation chart. `verdict` is one of
    /// the `win_label`/`loss_label` lines wrapped in `<b>`, or the doji
    /// notice. `awaiting_level` of 1 or 2 appends the retry footer; the
    /// tracker passes the exhausted level 3 here too, which renders
    /// nothing.
    pub fn result_caption(
        &self,
        now: &DateTime<Tz>,
        signal: &TrackedSignal,
        interval_minutes: u32,
        verdict: &str,
        awaiting_level: u8,
    ) -> String {
        let pair = display_name(&signal.instrument);
        let mut caption = format!(
            "{}\n\n\n| {} {} M{} {}\n{}",
            self.header(now),
            pair,
            signal.slot,
            interval_minutes,
            signal.direction,
            verdict
        );
        if matches!(awaiting_level, 1 | 2) {
            caption.push_str(&format!(
                "\n\n\n\u{1F504} Operation placed ({}) on {}, awaiting result...",
                martingale_label(awaiting_level),
                pair
            ));
        }
        caption
    }

    /// Doji verdict line for the evaluation chart caption.
    pub fn doji_notice(&self, instrument: &str) -> String {
        format!(
            "\u{1F50D} Doji detected on <i>{}</i>",
            display_name(instrument)
        )
    }

    /// End-of-hour scoreboard. The header shows the send time while the
    /// hour span names the cycle the signals came from, since tracking
    /// regularly runs past the hour boundary. Wins count at any level,
    /// losses only at the final level; dojis and cancelled signals show
    /// a neutral mark and stay out of the score.
    pub fn scoreboard(
        &self,
        now: &DateTime<Tz>,
        cycle_start: &DateTime<Tz>,
        interval_minutes: u32,
        signals: &[TrackedSignal],
    ) -> String {
        let mut message = format!("{}\n\n", self.header(now));
        message.push_str(&Self::hour_span(cycle_start));

        let mut wins = 0u32;
        let mut losses = 0u32;
        for signal in signals {
            let mark = match signal.result {
                Some(SignalResult {
                    status: ResultStatus::Win,
                    martingale_level,
                    ..
                }) => {
                    wins += 1;
                    if martingale_level > 0 {
                        format!("\u{2705}(g{})", martingale_level)
                    } else {
                        "\u{2705}".to_string()
                    }
                }
                Some(SignalResult {
                    status: ResultStatus::Loss,
                    ..
                }) => {
                    losses += 1;
                    "\u{274C}".to_string()
                }
                Some(SignalResult {
                    status: ResultStatus::Doji,
                    ..
                })
                | None => "\u{25AB}\u{FE0F}".to_string(),
            };
            message.push_str(&format!(
                "{} {} M{} {} {}\n",
                display_name(&signal.instrument),
                signal.slot,
                interval_minutes,
                signal.direction,
                mark
            ));
        }

        message.push_str(&format!("\nScore: {}x{}", wins, losses));
        message
    }
}
