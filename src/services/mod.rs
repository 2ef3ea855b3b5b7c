pub mod catalog;
pub mod chart;
pub mod clock;
pub mod messages;
pub mod organizer;
pub mod runner;
pub mod selector;
pub mod tracker;

pub use catalog::{aggregate, Cataloger};
pub use chart::{CandleChart, ChartRenderer, ChartStyle};
pub use clock::{hour_label, parse_slot, slot_on, Clock, Schedule, SystemClock};
pub use messages::Messages;
pub use organizer::organize;
pub use runner::SignalRunner;
pub use selector::{despace, select};
pub use tracker::{SignalLifecycle, SignalTracker, TrackState};
