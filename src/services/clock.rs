//! Wall-clock access and slot scheduling.
//!
//! Everything time-sensitive goes through the `Clock` trait so the signal
//! lifecycle can be driven by a simulated clock in tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::error::{AppError, Result};

/// Seconds between polls while waiting for a slot to arrive.
const POLL_SECS: u64 = 1;

/// Source of market-local time and suspension.
pub trait Clock: Send + Sync {
    /// Current time in the market timezone.
    fn now(&self) -> DateTime<Tz>;

    /// Suspend the caller for the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Clock backed by the system time and tokio timers.
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        chrono::Utc::now().with_timezone(&self.tz)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Parse an "HH:MM" slot label.
pub fn parse_slot(slot: &str) -> Result<(u32, u32)> {
    let (hour, minute) = slot
        .split_once(':')
        .ok_or_else(|| AppError::InvalidTime(format!("malformed slot label: {slot}")))?;
    let hour: u32 = hour
        .parse()
        .map_err(|_| AppError::InvalidTime(format!("malformed slot label: {slot}")))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| AppError::InvalidTime(format!("malformed slot label: {slot}")))?;

    if hour >= 24 || minute >= 60 {
        return Err(AppError::InvalidTime(format!(
            "slot out of range: {slot}"
        )));
    }
    Ok((hour, minute))
}

/// Resolve a slot label onto the calendar date of `reference`.
pub fn slot_on(reference: &DateTime<Tz>, slot: &str) -> Result<DateTime<Tz>> {
    let (hour, minute) = parse_slot(slot)?;
    reference
        .timezone()
        .from_local_datetime(
            &reference
                .date_naive()
                .and_hms_opt(hour, minute, 0)
                .ok_or_else(|| AppError::InvalidTime(format!("slot out of range: {slot}")))?,
        )
        .earliest()
        .ok_or_else(|| AppError::InvalidTime(format!("slot unrepresentable today: {slot}")))
}

/// The "HH:00" bucket label for a point in time.
pub fn hour_label(time: &DateTime<Tz>) -> String {
    format!("{:02}:00", time.hour())
}

/// Slot scheduling layered over a `Clock`.
#[derive(Clone)]
pub struct Schedule {
    clock: Arc<dyn Clock>,
}

impl Schedule {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now()
    }

    /// The slot resolved onto today's date.
    pub fn slot_today(&self, slot: &str) -> Result<DateTime<Tz>> {
        slot_on(&self.clock.now(), slot)
    }

    /// Unix timestamp of today's slot shifted by `offset_secs`.
    pub fn slot_timestamp(&self, slot: &str, offset_secs: i64) -> Result<i64> {
        Ok(self.slot_today(slot)?.timestamp() + offset_secs)
    }

    /// Whether today's slot is strictly in the future.
    pub fn is_future(&self, slot: &str) -> Result<bool> {
        Ok(self.slot_today(slot)? > self.clock.now())
    }

    /// Block until today's slot arrives, polling once per second. Returns
    /// immediately when the slot has already passed.
    pub async fn wait_for_slot(&self, slot: &str) -> Result<()> {
        let target = self.slot_today(slot)?;
        self.wait_until(target).await;
        Ok(())
    }

    /// Block until `target`, polling once per second.
    pub async fn wait_until(&self, target: DateTime<Tz>) {
        while self.clock.now() < target {
            self.clock.sleep(Duration::from_secs(POLL_SECS)).await;
        }
    }

    /// The next top of the hour after now.
    pub fn next_hour(&self) -> DateTime<Tz> {
        let now = self.clock.now();
        now.duration_trunc(chrono::Duration::hours(1))
            .unwrap_or(now)
            + chrono::Duration::hours(1)
    }

    /// Suspend for a fixed number of seconds.
    pub async fn pause(&self, secs: u64) {
        self.clock.sleep(Duration::from_secs(secs)).await;
    }
}
