//! Binance Kline Decoding
//!
//! Turns exchange kline payloads into closed [`Bar`]s. Two shapes arrive on
//! the websocket:
//!
//! - combined stream: `{"stream": "ethusdt@kline_1m", "data": {"e": "kline", "s": ..., "k": {...}}}`
//! - raw stream: `{"e": "kline", "s": ..., "k": {...}}`
//!
//! REST `/api/v3/klines` rows are positional arrays. Unclosed klines and
//! rows with inconsistent OHLC decode to `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::domain::bar::Bar;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KlinePayload {
    Combined {
        #[allow(dead_code)]
        stream: Option<String>,
        data: KlineEvent,
    },
    Raw(KlineEvent),
}

#[derive(Debug, Deserialize)]
struct KlineEvent {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "k")]
    kline: RawKline,
}

#[derive(Debug, Deserialize)]
struct RawKline {
    #[serde(rename = "t")]
    open_ms: i64,
    #[serde(rename = "T")]
    close_ms: i64,
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "o", deserialize_with = "number_or_string")]
    open: f64,
    #[serde(rename = "h", deserialize_with = "number_or_string")]
    high: f64,
    #[serde(rename = "l", deserialize_with = "number_or_string")]
    low: f64,
    #[serde(rename = "c", deserialize_with = "number_or_string")]
    close: f64,
    #[serde(rename = "x", default)]
    is_closed: bool,
}

/// Binance quotes prices as strings; accept either form
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn ms_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// low <= min(open, close) <= max(open, close) <= high
fn consistent_ohlc(open: f64, high: f64, low: f64, close: f64) -> bool {
    low <= open.min(close) && open.max(close) <= high
}

impl Bar {
    /// Decode a websocket kline payload (combined or raw stream).
    ///
    /// Returns `None` for unclosed klines, missing fields and inconsistent OHLC.
    pub fn from_binance_kline(payload: &Value) -> Option<Bar> {
        let event = match KlinePayload::deserialize(payload).ok()? {
            KlinePayload::Combined { data, .. } => data,
            KlinePayload::Raw(event) => event,
        };
        let k = event.kline;
        if !k.is_closed {
            return None;
        }

        let symbol = k.symbol.or(event.symbol).filter(|s| !s.trim().is_empty())?;
        if !consistent_ohlc(k.open, k.high, k.low, k.close) {
            return None;
        }

        Some(Bar::new(
            symbol,
            ms_to_utc(k.open_ms)?,
            ms_to_utc(k.close_ms)?,
            k.close,
        ))
    }

    /// Decode a REST kline row:
    /// `[openTime, open, high, low, close, volume, closeTime, ...]`
    pub fn from_binance_rest_row(row: &[Value], symbol: &str) -> Option<Bar> {
        if row.len() < 7 || symbol.trim().is_empty() {
            return None;
        }
        let open_ms = value_i64(&row[0])?;
        let open = value_f64(&row[1])?;
        let high = value_f64(&row[2])?;
        let low = value_f64(&row[3])?;
        let close = value_f64(&row[4])?;
        let close_ms = value_i64(&row[6])?;

        if !consistent_ohlc(open, high, low, close) {
            return None;
        }

        Some(Bar::new(symbol, ms_to_utc(open_ms)?, ms_to_utc(close_ms)?, close))
    }
}

/// Decode one line of a replay file: a kline payload or a plain bar record.
pub fn decode_line(line: &str) -> Result<Option<Bar>, serde_json::Error> {
    let value: Value = serde_json::from_str(line)?;
    if value.get("k").is_some() || value.get("data").is_some() {
        return Ok(Bar::from_binance_kline(&value));
    }
    let bar: Bar = serde_json::from_value(value)?;
    Ok(Some(Bar::new(bar.symbol, bar.open_time, bar.close_time, bar.close_price)))
}
