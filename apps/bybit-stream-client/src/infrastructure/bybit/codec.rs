//! Stream Codec Module
//!
//! Turns raw text frames from the public stream into control signals or
//! normalized records. Decoding is total: every malformed branch degrades
//! to "no records" instead of an error.
//!
//! # Field Resolution
//!
//! | Field     | Trade (`publicTrade.*`) | Ticker (`tickers.*`)                  |
//! |-----------|-------------------------|---------------------------------------|
//! | symbol    | `symbol` / `s` / topic  | `symbol` / `s` / topic                |
//! | price     | `p`                     | `lastPrice`, then `lp`                |
//! | timestamp | event `T` (ms)          | root `ts` if positive, else event `ts`|

use serde_json::{Map, Value};

use super::messages::{Operation, SubscribeAck};
use crate::domain::streaming::{NormalizedRecord, StreamMode};

/// Why a frame produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not valid JSON.
    Unparseable,
    /// Valid JSON whose root is not an object.
    NotAnObject,
    /// No `data` member.
    NoData,
    /// `data` is neither an object nor an array.
    UnexpectedDataShape,
}

/// Result of decoding one text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// Bare `ping` text; answered with bare `pong`.
    TextPing,
    /// `{"op":"ping"}`; `ts` is the token to echo, if one was usable.
    Ping {
        /// Correlation token in milliseconds.
        ts: Option<i64>,
    },
    /// `{"op":"pong"}`.
    Pong,
    /// `{"op":"subscribe", ...}` acknowledgement.
    SubscribeAck(SubscribeAck),
    /// Data frame.
    Data {
        /// Topic the frame was published on, if present.
        topic: Option<String>,
        /// Valid records, in payload order.
        records: Vec<NormalizedRecord>,
        /// Candidate events that failed validation.
        rejected: usize,
    },
    /// Frame carried nothing usable.
    Ignored(IgnoreReason),
}

impl DecodedFrame {
    /// Records carried by the frame (empty for control frames).
    #[must_use]
    pub fn records(&self) -> &[NormalizedRecord] {
        match self {
            Self::Data { records, .. } => records,
            _ => &[],
        }
    }
}

/// Decoder for one stream mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder {
    mode: StreamMode,
}

impl FrameDecoder {
    /// Create a decoder for `mode`.
    #[must_use]
    pub const fn new(mode: StreamMode) -> Self {
        Self { mode }
    }

    /// Mode this decoder resolves fields for.
    #[must_use]
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Decode a text frame. Never fails.
    #[must_use]
    pub fn decode(&self, text: &str) -> DecodedFrame {
        let trimmed = text.trim();
        if trimmed == "ping" {
            return DecodedFrame::TextPing;
        }

        let Ok(root) = serde_json::from_str::<Value>(trimmed) else {
            return DecodedFrame::Ignored(IgnoreReason::Unparseable);
        };
        let Some(obj) = root.as_object() else {
            return DecodedFrame::Ignored(IgnoreReason::NotAnObject);
        };

        match obj.get("op").and_then(Value::as_str).and_then(Operation::parse) {
            Some(Operation::Ping) => {
                return DecodedFrame::Ping {
                    ts: obj.get("ts").and_then(coerce_token),
                };
            }
            Some(Operation::Pong) => return DecodedFrame::Pong,
            Some(Operation::Subscribe) => {
                return DecodedFrame::SubscribeAck(SubscribeAck::from_value(&root));
            }
            None => {}
        }

        self.decode_data(obj)
    }

    fn decode_data(&self, root: &Map<String, Value>) -> DecodedFrame {
        let topic = root.get("topic").and_then(Value::as_str);

        let events: Vec<&Map<String, Value>> = match root.get("data") {
            None | Some(Value::Null) => return DecodedFrame::Ignored(IgnoreReason::NoData),
            Some(Value::Object(event)) => vec![event],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(_) => return DecodedFrame::Ignored(IgnoreReason::UnexpectedDataShape),
        };

        let candidates = events.len();
        let records: Vec<NormalizedRecord> = events
            .into_iter()
            .filter_map(|event| self.normalize(root, event, topic))
            .collect();

        DecodedFrame::Data {
            topic: topic.map(str::to_string),
            rejected: candidates - records.len(),
            records,
        }
    }

    fn normalize(
        &self,
        root: &Map<String, Value>,
        event: &Map<String, Value>,
        topic: Option<&str>,
    ) -> Option<NormalizedRecord> {
        let symbol = resolve_symbol(event, topic)?;
        let (price, ts_ms) = match self.mode {
            StreamMode::Trade => (coerce_f64(event.get("p")), coerce_f64(event.get("T"))),
            StreamMode::Ticker => {
                let last = coerce_f64(event.get("lastPrice"));
                let price = if last > 0.0 {
                    last
                } else {
                    coerce_f64(event.get("lp"))
                };
                let root_ts = coerce_f64(root.get("ts"));
                let ts = if root_ts > 0.0 {
                    root_ts
                } else {
                    coerce_f64(event.get("ts"))
                };
                (price, ts)
            }
        };
        NormalizedRecord::new(symbol, price, ts_ms / 1000.0)
    }
}

/// Decode `text` and return only its records.
#[must_use]
pub fn decode_records(mode: StreamMode, text: &str) -> Vec<NormalizedRecord> {
    match FrameDecoder::new(mode).decode(text) {
        DecodedFrame::Data { records, .. } => records,
        _ => Vec::new(),
    }
}

/// Explicit `symbol`/`s` field, else the last segment of a dotted topic.
fn resolve_symbol(event: &Map<String, Value>, topic: Option<&str>) -> Option<String> {
    let explicit = ["symbol", "s"]
        .iter()
        .filter_map(|key| event.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty());
    if let Some(symbol) = explicit {
        return Some(symbol.to_string());
    }

    let (_, last) = topic?.rsplit_once('.')?;
    (!last.is_empty()).then(|| last.to_string())
}

/// Numbers and numeric strings to `f64`; everything else to `0.0`.
fn coerce_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Ping correlation token as integer milliseconds.
#[allow(clippy::cast_possible_truncation)]
fn coerce_token(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    fn trade() -> FrameDecoder {
        FrameDecoder::new(StreamMode::Trade)
    }

    fn ticker() -> FrameDecoder {
        FrameDecoder::new(StreamMode::Ticker)
    }

    #[test]
    fn trade_string_price_and_ms_time() {
        let frame = r#"{"topic":"publicTrade.BTCUSDT","type":"snapshot","ts":1700000000050,
            "data":[{"T":1700000000000,"s":"BTCUSDT","S":"Buy","v":"0.001","p":"123.45","i":"1"}]}"#;
        let records = decode_records(StreamMode::Trade, frame);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "BTCUSDT");
        assert!((records[0].price - 123.45).abs() < 1e-9);
        assert!((records[0].timestamp - 1_700_000_000.0).abs() < 1e-9);
    }

    #[test]
    fn trade_list_yields_one_record_per_event() {
        let frame = r#"{"topic":"publicTrade.ETHUSDT","data":[
            {"T":1700000000000,"s":"ETHUSDT","p":"2000.5"},
            {"T":1700000000001,"s":"ETHUSDT","p":2001},
            {"T":1700000000002,"s":"ETHUSDT","p":"0"}]}"#;
        let decoded = trade().decode(frame);
        assert_eq!(decoded.records().len(), 2);
        assert!(matches!(decoded, DecodedFrame::Data { rejected: 1, .. }));
    }

    #[test]
    fn ticker_root_ts_wins_when_positive() {
        let frame = r#"{"topic":"tickers.BTCUSDT","ts":1700000000000,"type":"snapshot",
            "data":{"symbol":"BTCUSDT","lastPrice":"37000.1"}}"#;
        let records = decode_records(StreamMode::Ticker, frame);
        assert_eq!(records.len(), 1);
        assert!((records[0].timestamp - 1_700_000_000.0).abs() < 1e-9);
        assert!((records[0].price - 37_000.1).abs() < 1e-9);
    }

    #[test_case(r#""ts":0,"# ; "root ts zero")]
    #[test_case("" ; "root ts absent")]
    #[test_case(r#""ts":"oops","# ; "root ts not numeric")]
    fn ticker_falls_back_to_event_ts(root_ts: &str) {
        let frame = format!(
            r#"{{"topic":"tickers.ETHUSDT",{root_ts}"data":{{"symbol":"ETHUSDT","lastPrice":"2000","ts":1700000001000}}}}"#
        );
        let records = decode_records(StreamMode::Ticker, &frame);
        assert_eq!(records.len(), 1);
        assert!((records[0].timestamp - 1_700_000_001.0).abs() < 1e-9);
    }

    #[test]
    fn ticker_price_falls_back_to_lp() {
        let frame = r#"{"topic":"tickers.XRPUSDT","ts":1700000000000,
            "data":{"symbol":"XRPUSDT","lp":"0.61"}}"#;
        let records = decode_records(StreamMode::Ticker, frame);
        assert!((records[0].price - 0.61).abs() < 1e-9);
    }

    #[test]
    fn symbol_falls_back_to_topic_suffix() {
        let frame = r#"{"topic":"tickers.SOLUSDT","ts":1700000000000,"data":{"lastPrice":"60"}}"#;
        let records = decode_records(StreamMode::Ticker, frame);
        assert_eq!(records[0].symbol, "SOLUSDT");
    }

    #[test]
    fn empty_symbol_field_falls_back_to_topic() {
        let frame = r#"{"topic":"tickers.SOLUSDT","ts":1700000000000,
            "data":{"symbol":"","lastPrice":"60"}}"#;
        assert_eq!(decode_records(StreamMode::Ticker, frame)[0].symbol, "SOLUSDT");
    }

    #[test]
    fn undotted_topic_gives_no_symbol() {
        let frame = r#"{"topic":"SOLUSDT","ts":1700000000000,"data":{"lastPrice":"60"}}"#;
        assert!(decode_records(StreamMode::Ticker, frame).is_empty());
    }

    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":{"s":"BTCUSDT","p":"-1","T":1700000000000}}"# ; "negative price")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":{"s":"BTCUSDT","p":"abc","T":1700000000000}}"# ; "non numeric price")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":{"s":"BTCUSDT","p":"1.5","T":0}}"# ; "zero time")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":{"s":"BTCUSDT","p":"1.5"}}"# ; "missing time")]
    #[test_case(r#"{"data":{"p":"1.5","T":1700000000000}}"# ; "no symbol anywhere")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":{"s":"BTCUSDT","p":"NaN","T":1700000000000}}"# ; "nan price")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":{"s":"BTCUSDT","p":true,"T":1700000000000}}"# ; "bool price")]
    fn invalid_events_are_dropped(frame: &str) {
        assert!(decode_records(StreamMode::Trade, frame).is_empty());
    }

    #[test_case("" ; "empty")]
    #[test_case("{" ; "truncated")]
    #[test_case("not json" ; "garbage")]
    #[test_case("[1,2,3]" ; "array root")]
    #[test_case("42" ; "number root")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT"}"# ; "no data")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":null}"# ; "null data")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":"x"}"# ; "string data")]
    #[test_case(r#"{"topic":"publicTrade.BTCUSDT","data":[1,"a",null]}"# ; "scalar list")]
    #[test_case(r#"{"topic":7,"data":{"p":"1","T":1700000000000}}"# ; "numeric topic")]
    fn malformed_frames_yield_nothing(frame: &str) {
        assert!(decode_records(StreamMode::Trade, frame).is_empty());
        assert!(decode_records(StreamMode::Ticker, frame).is_empty());
    }

    #[test]
    fn ping_with_token() {
        assert_eq!(
            ticker().decode(r#"{"op":"ping","ts":1700000000000}"#),
            DecodedFrame::Ping {
                ts: Some(1_700_000_000_000)
            }
        );
    }

    #[test]
    fn ping_with_string_token() {
        assert_eq!(
            ticker().decode(r#"{"op":"ping","ts":"1700000000000"}"#),
            DecodedFrame::Ping {
                ts: Some(1_700_000_000_000)
            }
        );
    }

    #[test]
    fn ping_without_token() {
        assert_eq!(
            ticker().decode(r#"{"op":"ping"}"#),
            DecodedFrame::Ping { ts: None }
        );
    }

    #[test]
    fn bare_text_ping() {
        assert_eq!(ticker().decode("ping"), DecodedFrame::TextPing);
    }

    #[test]
    fn pong_is_control() {
        assert_eq!(
            ticker().decode(r#"{"op":"pong","ts":1,"data":{"lastPrice":"1"}}"#),
            DecodedFrame::Pong
        );
    }

    #[test]
    fn subscribe_ack() {
        let decoded =
            ticker().decode(r#"{"success":false,"ret_msg":"bad","conn_id":"x","op":"subscribe"}"#);
        match decoded {
            DecodedFrame::SubscribeAck(ack) => {
                assert!(!ack.success);
                assert_eq!(ack.ret_msg, "bad");
            }
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn unknown_op_without_data_is_ignored() {
        assert_eq!(
            ticker().decode(r#"{"op":"auth","success":true}"#),
            DecodedFrame::Ignored(IgnoreReason::NoData)
        );
    }

    #[test]
    fn unparseable_reason() {
        assert_eq!(
            trade().decode("{oops"),
            DecodedFrame::Ignored(IgnoreReason::Unparseable)
        );
    }

    proptest! {
        #[test]
        fn decoder_never_panics_on_arbitrary_text(text in ".*") {
            let _ = trade().decode(&text);
            let _ = ticker().decode(&text);
        }

        #[test]
        fn emitted_records_are_always_valid(
            price in prop_oneof![any::<f64>().prop_map(|p| p.to_string()), ".*"],
            ts in any::<i64>(),
            symbol in "[A-Z]{0,6}",
        ) {
            let frame = serde_json::json!({
                "topic": "publicTrade.BTCUSDT",
                "data": [{"s": symbol, "p": price, "T": ts}],
            })
            .to_string();
            for record in decode_records(StreamMode::Trade, &frame) {
                prop_assert!(!record.symbol.is_empty());
                prop_assert!(record.price > 0.0 && record.price.is_finite());
                prop_assert!(record.timestamp > 0.0 && record.timestamp.is_finite());
            }
        }
    }
}
