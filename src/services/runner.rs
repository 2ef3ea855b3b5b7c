//! Hourly signal cycle orchestration.
//!
//! One cycle: roll (or reuse) a catalogation profile, catalog every open
//! instrument, organize and select the current hour's signals, announce
//! the list, track each signal to its outcome, post the scoreboard and
//! wait for the next top of the hour. Any cycle fault is logged and the
//! loop starts over from a fresh catalogation.

use std::sync::Arc;

use chrono::Timelike;
use tracing::{debug, error, info};

use crate::config::{Config, CycleSettings};
use crate::error::Result;
use crate::services::catalog::Cataloger;
use crate::services::clock::{hour_label, Schedule};
use crate::services::messages::Messages;
use crate::services::organizer::organize;
use crate::services::selector::{despace, select};
use crate::services::tracker::SignalTracker;
use crate::sources::Notifier;

/// Minute of the hour after which a thin cycle waits instead of retrying
/// immediately.
const RETRY_WAIT_MINUTE: u32 = 50;

/// Drives catalogation cycles indefinitely.
pub struct SignalRunner {
    cataloger: Cataloger,
    tracker: SignalTracker,
    notifier: Arc<dyn Notifier>,
    schedule: Schedule,
    messages: Messages,
    config: Config,
}

impl SignalRunner {
    pub fn new(
        cataloger: Cataloger,
        tracker: SignalTracker,
        notifier: Arc<dyn Notifier>,
        schedule: Schedule,
        messages: Messages,
        config: Config,
    ) -> Self {
        Self {
            cataloger,
            tracker,
            notifier,
            schedule,
            messages,
            config,
        }
    }

    /// Run cycles forever. Faults never escape: they are logged and the
    /// next cycle starts from scratch.
    pub async fn run(&self) {
        loop {
            if let Err(err) = self.cycle().await {
                error!("Cycle failed, restarting: {}", err);
            }
        }
    }

    /// One full catalogation-to-scoreboard pass.
    pub async fn cycle(&self) -> Result<()> {
        let settings = self.cycle_settings();
        info!(
            "Starting catalogation cycle: M{} timeframe, {} day lookback, thresholds {:?}",
            settings.interval_minutes, settings.lookback_days, settings.min_percent
        );

        let catalog = self.cataloger.catalog_open_instruments(&settings).await?;
        let buckets = organize(&catalog);

        let cycle_start = self.schedule.now();
        let candidates = select(&buckets, &cycle_start, &settings);
        let list = despace(candidates, &cycle_start, settings.interval_minutes);
        info!(
            "Selected {} operations for the {} bucket",
            list.len(),
            hour_label(&cycle_start)
        );

        if list.len() < self.config.min_signals {
            self.wait_before_retry().await;
            return Ok(());
        }

        let announcement =
            self.messages
                .signal_list(&cycle_start, settings.interval_minutes, &list);
        self.notify_text(&announcement).await;

        let next_hour = self.schedule.next_hour();
        let tracked = self.tracker.track_all(&settings, list).await?;

        let board = self.messages.scoreboard(
            &self.schedule.now(),
            &cycle_start,
            settings.interval_minutes,
            &tracked,
        );
        self.notify_text(&board).await;

        if self.schedule.now() < next_hour {
            info!(
                "{} operations finished, waiting for {} to catalog again",
                tracked.len(),
                next_hour.format("%H:%M")
            );
            self.schedule.wait_until(next_hour).await;
        } else {
            info!(
                "{} operations finished, cataloguing immediately",
                tracked.len()
            );
        }
        Ok(())
    }

    /// Profile for the next cycle: a fresh random roll, or the fixed one
    /// from the environment.
    fn cycle_settings(&self) -> CycleSettings {
        if self.config.randomize_cycle {
            let settings = CycleSettings::randomized(&mut rand::thread_rng());
            debug!(
                "Rolled cycle profile: M{}, {} days, thresholds {:?}",
                settings.interval_minutes, settings.lookback_days, settings.min_percent
            );
            settings
        } else {
            self.config.cycle.clone()
        }
    }

    /// A thin hour late in the clock is not worth hammering: from minute
    /// 50 on, sit out the rest of the hour before recataloguing.
    async fn wait_before_retry(&self) {
        let now = self.schedule.now();
        if now.minute() >= RETRY_WAIT_MINUTE {
            let next = self.schedule.next_hour();
            info!(
                "Too few operations at {}, waiting for {} to retry",
                now.format("%H:%M:%S"),
                next.format("%H:%M")
            );
            self.schedule.wait_until(next).await;
        }
    }

    async fn notify_text(&self, html: &str) {
        if let Err(err) = self.notifier.send_text(html).await {
            error!("List delivery failed: {}", err);
        }
    }
}
