use serde::{Deserialize, Serialize};

/// A single OHLC candle as returned by the market gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    /// Candle open time (unix seconds).
    pub start_time: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

/// Body color of a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleColor {
    /// Close above open.
    Up,
    /// Close below open.
    Down,
    /// Close equal to open (doji).
    Neutral,
}

impl Candle {
    /// Classify the candle body.
    pub fn color(&self) -> CandleColor {
        if self.open < self.close {
            CandleColor::Up
        } else if self.open > self.close {
            CandleColor::Down
        } else {
            CandleColor::Neutral
        }
    }

    /// Absolute body size.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-to-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.color() == CandleColor::Up
    }

    pub fn is_bearish(&self) -> bool {
        self.color() == CandleColor::Down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, close: f64) -> Candle {
        Candle {
            start_time: 1_700_000_000,
            open,
            close,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            volume: 100.0,
        }
    }

    #[test]
    fn test_candle_color_up() {
        assert_eq!(candle(1.0, 2.0).color(), CandleColor::Up);
        assert!(candle(1.0, 2.0).is_bullish());
    }

    #[test]
    fn test_candle_color_down() {
        assert_eq!(candle(2.0, 1.0).color(), CandleColor::Down);
        assert!(candle(2.0, 1.0).is_bearish());
    }

    #[test]
    fn test_candle_color_neutral_on_equal_open_close() {
        let c = candle(1.5, 1.5);
        assert_eq!(c.color(), CandleColor::Neutral);
        assert!(!c.is_bullish());
        assert!(!c.is_bearish());
    }

    #[test]
    fn test_candle_body_and_range() {
        let c = Candle {
            start_time: 0,
            open: 1.0,
            close: 1.4,
            high: 1.6,
            low: 0.9,
            volume: 0.0,
        };

        assert!((c.body() - 0.4).abs() < 1e-9);
        assert!((c.range() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_candle_serde_camel_case() {
        let c = candle(1.0, 2.0);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("startTime"));

        let back: Candle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
