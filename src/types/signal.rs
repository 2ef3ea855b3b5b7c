use serde::{Deserialize, Serialize};

use super::stats::{Direction, SlotStat};

/// A slot that passed selection and is ready to be announced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSignal {
    /// Gateway instrument name (e.g. "EURUSD-op").
    pub instrument: String,
    /// Entry slot label "HH:MM".
    pub slot: String,
    /// Direction the slot's majority points at.
    pub direction: Direction,
    /// The statistics that justified selection.
    pub stat: SlotStat,
}

/// Final status of one tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Win,
    Loss,
    Doji,
}

/// Outcome recorded once tracking resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResult {
    pub status: ResultStatus,
    /// Martingale level the outcome landed on (0 = base entry).
    pub martingale_level: u8,
    /// Verdict line exactly as it went out to the channel.
    pub message: String,
}

/// A signal moving through its evaluation window. `result` stays `None`
/// until the tracker records a final outcome; rejected signals keep it
/// `None` for good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedSignal {
    pub instrument: String,
    pub slot: String,
    pub direction: Direction,
    pub stat: SlotStat,
    pub result: Option<SignalResult>,
}

impl From<CandidateSignal> for TrackedSignal {
    fn from(candidate: CandidateSignal) -> Self {
        Self {
            instrument: candidate.instrument,
            slot: candidate.slot,
            direction: candidate.direction,
            stat: candidate.stat,
            result: None,
        }
    }
}

impl TrackedSignal {
    /// Record the final outcome together with the verdict line sent out.
    pub fn resolve(&mut self, status: ResultStatus, martingale_level: u8, message: String) {
        self.result = Some(SignalResult {
            status,
            martingale_level,
            message,
        });
    }
}

/// Terminal state of the tracking state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackOutcome {
    /// Entry (or a re-entry) closed in the signal's favor.
    Win { level: u8 },
    /// Every attempt level lost.
    LossFinal,
    /// The last attempt level closed neutral.
    DojiFinal,
    /// Instrument was not open for trading.
    RejectedClosed,
    /// Slot time had already passed when tracking began.
    RejectedExpired,
}
