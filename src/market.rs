//! Simulated gold market snapshot
//!
//! A random walk around a fixed base price. Not real market data.

use chrono::{DateTime, Local, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const BASE_PRICE: f64 = 2000.0;
pub const MAX_DAILY_MOVE: f64 = 50.0;

/// Local hour at which the market is reported closed.
const MARKET_CLOSE_HOUR: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Trend::Bullish
        } else if change < -10.0 {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
}

impl MarketStatus {
    pub fn at_hour(hour: u32) -> Self {
        if hour < MARKET_CLOSE_HOUR {
            MarketStatus::Open
        } else {
            MarketStatus::Closed
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub current_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub currency: String,
    pub unit: String,
    pub last_updated: String,
    pub market_status: MarketStatus,
    pub trend: Trend,
}

impl MarketSnapshot {
    /// Snapshot for a given move away from the base price
    pub fn from_price_change(change: f64, now: DateTime<Local>) -> Self {
        Self {
            current_price: round2(BASE_PRICE + change),
            price_change: round2(change),
            price_change_percent: round2(change / BASE_PRICE * 100.0),
            currency: "USD".to_string(),
            unit: "per ounce".to_string(),
            last_updated: now.with_timezone(&Utc).to_rfc3339(),
            market_status: MarketStatus::at_hour(now.hour()),
            trend: Trend::from_change(change),
        }
    }

    pub fn simulate() -> Self {
        let change = rand::thread_rng().gen_range(-MAX_DAILY_MOVE..=MAX_DAILY_MOVE);
        Self::from_price_change(change, Local::now())
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 14, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_price_fields() {
        let snap = MarketSnapshot::from_price_change(12.3456, at(10));
        assert_eq!(snap.current_price, 2012.35);
        assert_eq!(snap.price_change, 12.35);
        assert_eq!(snap.price_change_percent, round2(12.3456 / 2000.0 * 100.0));
        assert_eq!(snap.price_change_percent, 0.62);
        assert_eq!(snap.currency, "USD");
        assert_eq!(snap.unit, "per ounce");
    }

    #[test]
    fn test_trend_thresholds() {
        assert_eq!(Trend::from_change(0.01), Trend::Bullish);
        assert_eq!(Trend::from_change(0.0), Trend::Neutral);
        assert_eq!(Trend::from_change(-10.0), Trend::Neutral);
        assert_eq!(Trend::from_change(-10.01), Trend::Bearish);
    }

    #[test]
    fn test_market_status_by_hour() {
        assert_eq!(MarketSnapshot::from_price_change(0.0, at(15)).market_status, MarketStatus::Open);
        assert_eq!(MarketSnapshot::from_price_change(0.0, at(16)).market_status, MarketStatus::Closed);
    }

    #[test]
    fn test_simulated_snapshot_stays_in_range() {
        for _ in 0..50 {
            let snap = MarketSnapshot::simulate();
            assert!(snap.price_change.abs() <= MAX_DAILY_MOVE);
            assert!((snap.current_price - BASE_PRICE - snap.price_change).abs() < 0.011);
        }
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(MarketSnapshot::from_price_change(-20.0, at(9))).unwrap();
        assert_eq!(json["trend"], "bearish");
        assert_eq!(json["market_status"], "open");
        assert_eq!(json["current_price"], 1980.0);
    }
}
