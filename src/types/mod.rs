pub mod candle;
pub mod signal;
pub mod stats;

pub use candle::*;
pub use signal::*;
pub use stats::*;
