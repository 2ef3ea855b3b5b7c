//! Signal lifecycle tracking.
//!
//! Every announced signal runs through an explicit state machine:
//! expiry check, market-open check, waiting for the entry window, then
//! up to three attempts (base entry plus two martingale re-entries)
//! evaluated one candle interval apart. Notification and chart failures
//! are logged and swallowed; market-data failures abort the cycle.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{CycleSettings, StickerConfig};
use crate::error::{AppError, Result};
use crate::services::chart::ChartRenderer;
use crate::services::clock::Schedule;
use crate::services::messages::{self, Messages};
use crate::sources::{MarketFeed, Notifier};
use crate::types::{
    Candle, CandleColor, CandidateSignal, ResultStatus, TrackOutcome, TrackedSignal,
};

/// Deepest attempt level evaluated for any signal (base entry = 0).
const FINAL_LEVEL: u8 = 2;
/// Candles drawn on each evaluation chart.
const WINDOW_CANDLES: u32 = 15;
/// Cooldown after a doji before moving on.
const DOJI_PAUSE_SECS: u64 = 10;

/// Lifecycle position of one tracked signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Not yet examined.
    Scheduled,
    /// Expiry passed; checking the instrument's trading schedule.
    MarketOpenCheck,
    /// Announced; waiting for the entry window to arrive.
    AwaitingWindow,
    /// Window open; waiting out attempt `level`'s candle.
    InProgress { level: u8 },
    /// Attempt `level`'s candle has closed; classifying it.
    Evaluating { level: u8 },
    /// Terminal.
    Finished(TrackOutcome),
}

/// Shared collaborators for tracking a cycle's worth of signals.
pub struct SignalTracker {
    feed: Arc<dyn MarketFeed>,
    notifier: Arc<dyn Notifier>,
    charts: Arc<dyn ChartRenderer>,
    schedule: Schedule,
    messages: Messages,
    stickers: StickerConfig,
}

impl SignalTracker {
    pub fn new(
        feed: Arc<dyn MarketFeed>,
        notifier: Arc<dyn Notifier>,
        charts: Arc<dyn ChartRenderer>,
        schedule: Schedule,
        messages: Messages,
        stickers: StickerConfig,
    ) -> Self {
        Self {
            feed,
            notifier,
            charts,
            schedule,
            messages,
            stickers,
        }
    }

    /// Track every candidate strictly in list order, one at a time. A
    /// candidate scheduled earlier than a predecessor's resolution simply
    /// expires when its turn comes. Market-data errors propagate and
    /// abandon the rest of the list.
    pub async fn track_all(
        &self,
        settings: &CycleSettings,
        candidates: Vec<CandidateSignal>,
    ) -> Result<Vec<TrackedSignal>> {
        let mut tracked: Vec<TrackedSignal> =
            candidates.into_iter().map(TrackedSignal::from).collect();

        for signal in tracked.iter_mut() {
            let outcome = SignalLifecycle::new(self, settings, signal).run().await?;
            info!(
                "Signal {} {} resolved: {:?}",
                signal.instrument, signal.slot, outcome
            );
        }

        Ok(tracked)
    }

    async fn notify_text(&self, html: &str) {
        if let Err(err) = self.notifier.send_text(html).await {
            warn!("Notification failed: {}", err);
        }
    }

    async fn send_sticker(&self, sticker: Option<&str>) {
        if let Some(file_id) = sticker {
            if let Err(err) = self.notifier.send_sticker(file_id).await {
                warn!("Sticker delivery failed: {}", err);
            }
        }
    }

    /// Open/closed state of one instrument. A failed lookup counts as
    /// closed rather than risking an untradable entry.
    async fn instrument_open(&self, instrument: &str) -> bool {
        match self.feed.open_instruments().await {
            Ok(book) => book.get(instrument).map(|state| state.open).unwrap_or(false),
            Err(err) => {
                warn!(
                    "Open-instrument lookup failed, treating {} as closed: {}",
                    instrument, err
                );
                false
            }
        }
    }
}

/// State machine driving one signal from `Scheduled` to `Finished`.
pub struct SignalLifecycle<'a> {
    tracker: &'a SignalTracker,
    settings: &'a CycleSettings,
    signal: &'a mut TrackedSignal,
    state: TrackState,
}

impl<'a> SignalLifecycle<'a> {
    pub fn new(
        tracker: &'a SignalTracker,
        settings: &'a CycleSettings,
        signal: &'a mut TrackedSignal,
    ) -> Self {
        Self {
            tracker,
            settings,
            signal,
            state: TrackState::Scheduled,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Advance by one transition. Stepping a finished machine is a no-op.
    pub async fn step(&mut self) -> Result<TrackState> {
        let next = match self.state {
            TrackState::Scheduled => self.check_expiry().await?,
            TrackState::MarketOpenCheck => self.check_market_open().await,
            TrackState::AwaitingWindow => self.await_window().await?,
            TrackState::InProgress { level } => self.wait_out_candle(level).await,
            TrackState::Evaluating { level } => self.evaluate(level).await?,
            TrackState::Finished(outcome) => TrackState::Finished(outcome),
        };
        self.state = next;
        Ok(next)
    }

    /// Run to a terminal outcome.
    pub async fn run(&mut self) -> Result<TrackOutcome> {
        loop {
            if let TrackState::Finished(outcome) = self.step().await? {
                return Ok(outcome);
            }
        }
    }

    /// Wall-clock time has moved since selection, so the slot is checked
    /// again here. A slot that is not strictly in the future is gone.
    async fn check_expiry(&mut self) -> Result<TrackState> {
        if self.tracker.schedule.is_future(&self.signal.slot)? {
            return Ok(TrackState::MarketOpenCheck);
        }

        let text = self.tracker.messages.signal_expired(
            &self.tracker.schedule.now(),
            self.signal,
            self.settings.interval_minutes,
        );
        self.tracker.notify_text(&text).await;
        info!(
            "Signal {} {} expired before its window",
            self.signal.instrument, self.signal.slot
        );
        Ok(TrackState::Finished(TrackOutcome::RejectedExpired))
    }

    async fn check_market_open(&mut self) -> TrackState {
        if self.tracker.instrument_open(&self.signal.instrument).await {
            return TrackState::AwaitingWindow;
        }

        let text = self.tracker.messages.market_closed(
            &self.tracker.schedule.now(),
            self.signal,
            self.settings.interval_minutes,
        );
        self.tracker.notify_text(&text).await;
        info!(
            "Instrument {} closed, cancelling {} signal",
            self.signal.instrument, self.signal.slot
        );
        TrackState::Finished(TrackOutcome::RejectedClosed)
    }

    async fn await_window(&mut self) -> Result<TrackState> {
        let tracker = self.tracker;
        let awaiting = tracker.messages.awaiting_operation(
            &tracker.schedule.now(),
            self.signal,
            self.settings.interval_minutes,
        );
        tracker.notify_text(&awaiting).await;

        tracker.schedule.wait_for_slot(&self.signal.slot).await?;

        let placed = tracker
            .messages
            .operation_placed(&tracker.schedule.now(), &self.signal.instrument);
        tracker.notify_text(&placed).await;
        Ok(TrackState::InProgress { level: 0 })
    }

    /// Suspend for one full interval so attempt `level`'s candle closes.
    async fn wait_out_candle(&mut self, level: u8) -> TrackState {
        self.tracker
            .schedule
            .pause(self.settings.interval_secs() as u64)
            .await;
        TrackState::Evaluating { level }
    }

    /// Fetch the attempt's closed candle, classify its color, branch.
    async fn evaluate(&mut self, level: u8) -> Result<TrackState> {
        let tracker = self.tracker;
        let interval_secs = self.settings.interval_secs();

        let entry_ts = tracker
            .schedule
            .slot_timestamp(&self.signal.slot, level as i64 * interval_secs)?;
        let batch = tracker
            .feed
            .candles(&self.signal.instrument, interval_secs, 1, entry_ts)
            .await?;
        let candle = match batch.first() {
            Some(candle) => *candle,
            None => {
                return Err(AppError::DataFetch(format!(
                    "no candle for {} at {}",
                    self.signal.instrument, entry_ts
                )))
            }
        };
        let window = tracker
            .feed
            .candles(
                &self.signal.instrument,
                interval_secs,
                WINDOW_CANDLES,
                entry_ts,
            )
            .await?;

        let next = match candle.color() {
            CandleColor::Neutral => self.handle_doji(level, &window).await,
            color if self.signal.direction.wins_with(color) => {
                self.handle_win(level, &window).await
            }
            _ => self.handle_loss(level, &window).await,
        };
        Ok(next)
    }

    async fn handle_win(&mut self, level: u8, window: &[Candle]) -> TrackState {
        let label = messages::win_label(level);
        let verdict = format!("<b>{}</b>", label);
        self.send_chart(window, &label, &verdict, 0).await;

        let sticker = if level == 0 {
            self.tracker.stickers.win.clone()
        } else {
            self.tracker.stickers.win_gale.clone()
        };
        self.tracker.send_sticker(sticker.as_deref()).await;

        self.signal.resolve(ResultStatus::Win, level, verdict);
        info!(
            "Signal {} {} won ({})",
            self.signal.instrument,
            self.signal.slot,
            messages::martingale_label(level)
        );
        TrackState::Finished(TrackOutcome::Win { level })
    }

    /// An intermediate loss only announces the next re-entry; the
    /// outcome is recorded when the final level also loses.
    async fn handle_loss(&mut self, level: u8, window: &[Candle]) -> TrackState {
        let label = messages::loss_label(level);
        let verdict = format!("<b>{}</b>", label);
        self.send_chart(window, &label, &verdict, level + 1).await;

        if level >= FINAL_LEVEL {
            self.tracker
                .send_sticker(self.tracker.stickers.loss.as_deref())
                .await;
            self.signal.resolve(ResultStatus::Loss, FINAL_LEVEL, verdict);
            info!(
                "Signal {} {} lost every attempt",
                self.signal.instrument, self.signal.slot
            );
            return TrackState::Finished(TrackOutcome::LossFinal);
        }
        TrackState::InProgress { level: level + 1 }
    }

    /// A doji continues the chain without consuming a win or a loss,
    /// except at the final level where it becomes the terminal outcome.
    async fn handle_doji(&mut self, level: u8, window: &[Candle]) -> TrackState {
        let subtitle = messages::doji_label(level);
        let notice = self.tracker.messages.doji_notice(&self.signal.instrument);
        let final_attempt = level >= FINAL_LEVEL;
        let awaiting = if final_attempt { 0 } else { level + 1 };

        self.send_chart(window, &subtitle, &notice, awaiting).await;
        self.tracker
            .send_sticker(self.tracker.stickers.doji.as_deref())
            .await;

        if final_attempt {
            self.signal
                .resolve(ResultStatus::Doji, FINAL_LEVEL, format!("<b>{}</b>", subtitle));
            info!(
                "Signal {} {} ended on a doji",
                self.signal.instrument, self.signal.slot
            );
        }
        self.tracker.schedule.pause(DOJI_PAUSE_SECS).await;

        if final_attempt {
            TrackState::Finished(TrackOutcome::DojiFinal)
        } else {
            TrackState::InProgress { level: level + 1 }
        }
    }

    /// Render and deliver one evaluation chart, then remove the file.
    /// Falls back to a plain text message when rendering fails.
    async fn send_chart(&self, window: &[Candle], subtitle: &str, verdict: &str, awaiting: u8) {
        let tracker = self.tracker;
        let caption = tracker.messages.result_caption(
            &tracker.schedule.now(),
            self.signal,
            self.settings.interval_minutes,
            verdict,
            awaiting,
        );

        match tracker.charts.render(
            window,
            messages::display_name(&self.signal.instrument),
            subtitle,
        ) {
            Ok(path) => {
                if let Err(err) = tracker.notifier.send_image(&path, &caption).await {
                    warn!("Chart delivery failed: {}", err);
                }
                tracker.charts.discard(&path);
            }
            Err(err) => {
                warn!("Chart rendering failed: {}", err);
                tracker.notify_text(&caption).await;
            }
        }
    }
}
