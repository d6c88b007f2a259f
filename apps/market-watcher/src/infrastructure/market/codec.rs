//! Feed Frame Codec
//!
//! Decodes inbound feed frames into listing records.
//!
//! # Frame Format
//!
//! Every frame is a JSON object tagged by `type`. New-listing announcements
//! carry the item as a JSON document encoded *inside* a string, so the item
//! needs a second parse pass:
//!
//! ```json
//! {"type":"newitems_go","data":"{\"i_market_name\":\"AK-47\",\"ui_price\":\"12.50\"}"}
//! ```
//!
//! Anything that is not JSON is reported as [`CodecError::NotJson`]; JSON
//! frames with another `type` are [`DecodedFrame::Ignored`]. Neither ever
//! interrupts the session.

use serde_json::{Map, Value};

use crate::domain::listing::ItemRecord;
use crate::infrastructure::metrics::{self, DecodeErrorKind};

/// Log target for rendered item records.
pub const LISTING_TARGET: &str = "listing";

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame is not a JSON object.
    #[error("non-JSON message: {0}")]
    NotJson(String),

    /// Item payload could not be decoded.
    #[error("data parse error: {0}")]
    Payload(String),
}

/// Classification of one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    /// A new listing.
    Item(ItemRecord),
    /// A well-formed frame that is not a listing announcement.
    Ignored,
}

/// Decoder for the new-listing feed.
#[derive(Debug, Clone)]
pub struct ListingCodec {
    item_tag: String,
}

impl ListingCodec {
    /// Create a codec recognising frames whose `type` equals `item_tag`.
    #[must_use]
    pub fn new(item_tag: impl Into<String>) -> Self {
        Self {
            item_tag: item_tag.into(),
        }
    }

    /// Message `type` this codec treats as a listing.
    #[must_use]
    pub fn item_tag(&self) -> &str {
        &self.item_tag
    }

    /// Decode one raw frame.
    ///
    /// # Errors
    ///
    /// Returns `NotJson` when the frame is not a JSON object and `Payload`
    /// when a listing frame's `data` cannot be decoded.
    pub fn decode(&self, raw: &[u8]) -> Result<DecodedFrame, CodecError> {
        let Ok(envelope) = serde_json::from_slice::<Map<String, Value>>(raw) else {
            return Err(CodecError::NotJson(String::from_utf8_lossy(raw).into_owned()));
        };

        if envelope.get("type").and_then(Value::as_str) != Some(self.item_tag.as_str()) {
            return Ok(DecodedFrame::Ignored);
        }

        let payload = match envelope.get("data") {
            Some(Value::String(encoded)) => serde_json::from_str::<Map<String, Value>>(encoded)
                .map_err(|e| CodecError::Payload(e.to_string()))?,
            Some(Value::Object(payload)) => payload.clone(),
            Some(other) => {
                return Err(CodecError::Payload(format!(
                    "expected encoded item string, got {}",
                    json_kind(other)
                )));
            }
            None => return Err(CodecError::Payload("missing data field".to_string())),
        };

        Ok(DecodedFrame::Item(ItemRecord::from_payload(&payload)))
    }

    /// Decode a frame and write the outcome to the log.
    ///
    /// Items become a single multi-line entry on the [`LISTING_TARGET`]
    /// target. Decode failures are logged and dropped.
    pub fn handle(&self, raw: &[u8]) {
        match self.decode(raw) {
            Ok(DecodedFrame::Item(record)) => {
                tracing::info!(target: LISTING_TARGET, "\n{record}");
                metrics::record_item();
            }
            Ok(DecodedFrame::Ignored) => {
                metrics::record_ignored_frame();
            }
            Err(CodecError::NotJson(text)) => {
                tracing::info!(frame = %text, "Non-JSON message");
                metrics::record_decode_error(DecodeErrorKind::NotJson);
            }
            Err(e @ CodecError::Payload(_)) => {
                tracing::warn!(error = %e, "Dropping listing frame");
                metrics::record_decode_error(DecodeErrorKind::Payload);
            }
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn codec() -> ListingCodec {
        ListingCodec::new("newitems_go")
    }

    #[test]
    fn decode_minimal_item() {
        let raw = br#"{"type":"newitems_go","data":"{\"i_market_name\":\"AK-47\",\"ui_price\":\"12.50\",\"ui_currency\":\"USD\"}"}"#;

        let DecodedFrame::Item(record) = codec().decode(raw).unwrap() else {
            panic!("expected an item");
        };

        assert_eq!(record.market_name, "AK-47");
        assert_eq!(record.quality, "--");
        assert_eq!(record.price, "12.50");
        assert_eq!(record.currency, "USD");
        assert!(record.float.is_none());
        assert!(record.stickers.is_empty());
        assert!(record.inspect_url.is_none());

        let rendered = record.to_string();
        assert!(rendered.contains("Item: AK-47\n"));
        assert!(rendered.contains("Quality: --\n"));
        assert!(rendered.contains("Price: 12.50 USD\n"));
        assert!(!rendered.contains("Float:"));
        assert!(!rendered.contains("Stickers:"));
        assert!(!rendered.contains("Inspect:"));
    }

    #[test]
    fn decode_item_with_stickers_and_inspect_link() {
        let raw = br#"{"type":"newitems_go","data":"{\"i_market_name\":\"AWP | Asiimov\",\"ui_price\":51.2,\"ui_currency\":\"USD\",\"ui_float\":\"0.2871\",\"stickers\":[4411,4412],\"inspect_url\":\"steam:\\\\/\\\\/rungame\\\\/730\"}"}"#;

        let DecodedFrame::Item(record) = codec().decode(raw).unwrap() else {
            panic!("expected an item");
        };

        assert_eq!(record.price, "51.20");
        assert_eq!(record.float.as_deref(), Some("0.2871"));
        assert_eq!(record.stickers, vec!["4411", "4412"]);
        assert_eq!(record.inspect_url.as_deref(), Some("steam://rungame/730"));
    }

    #[test]
    fn decode_other_type_is_ignored() {
        let raw = br#"{"type":"history_go","data":"{}"}"#;
        assert_eq!(codec().decode(raw).unwrap(), DecodedFrame::Ignored);
    }

    #[test]
    fn decode_untagged_object_is_ignored() {
        assert_eq!(codec().decode(br#"{"ok":1}"#).unwrap(), DecodedFrame::Ignored);
    }

    #[test]
    fn decode_pong_is_not_json() {
        let err = codec().decode(b"pong").unwrap_err();
        assert!(matches!(err, CodecError::NotJson(text) if text == "pong"));
    }

    #[test]
    fn decode_json_array_is_not_json_object() {
        assert!(matches!(
            codec().decode(b"[1,2,3]").unwrap_err(),
            CodecError::NotJson(_)
        ));
    }

    #[test]
    fn decode_broken_inner_payload() {
        let raw = br#"{"type":"newitems_go","data":"{not json"}"#;
        assert!(matches!(
            codec().decode(raw).unwrap_err(),
            CodecError::Payload(_)
        ));
    }

    #[test]
    fn decode_missing_or_mistyped_data() {
        assert!(matches!(
            codec().decode(br#"{"type":"newitems_go"}"#).unwrap_err(),
            CodecError::Payload(_)
        ));
        assert!(matches!(
            codec().decode(br#"{"type":"newitems_go","data":42}"#).unwrap_err(),
            CodecError::Payload(msg) if msg.contains("number")
        ));
    }

    #[test]
    fn decode_accepts_inline_object_payload() {
        let raw = br#"{"type":"newitems_go","data":{"i_market_name":"Glock-18 | Fade"}}"#;
        let DecodedFrame::Item(record) = codec().decode(raw).unwrap() else {
            panic!("expected an item");
        };
        assert_eq!(record.market_name, "Glock-18 | Fade");
    }

    #[test]
    fn handle_never_panics_on_bad_input() {
        let codec = codec();
        codec.handle(b"");
        codec.handle(b"\xff\xfe");
        codec.handle(br#"{"type":"newitems_go","data":"["}"#);
        codec.handle(br#"{"type":"newitems_go","data":"{}"}"#);
    }

    #[test]
    fn custom_item_tag() {
        let codec = ListingCodec::new("newitems_dota");
        let raw = br#"{"type":"newitems_dota","data":"{}"}"#;
        assert!(matches!(codec.decode(raw).unwrap(), DecodedFrame::Item(_)));
        assert_eq!(codec.item_tag(), "newitems_dota");
    }

    proptest! {
        #[test]
        fn decoding_is_deterministic(
            name in "[ -~]{0,40}",
            price in 0.0f64..100_000.0,
            stickers in proptest::collection::vec(0u32..100_000, 0..5),
        ) {
            let inner = serde_json::json!({
                "i_market_name": name,
                "ui_price": price,
                "stickers": stickers,
            })
            .to_string();
            let frame = serde_json::json!({ "type": "newitems_go", "data": inner }).to_string();

            let codec = codec();
            let first = codec.decode(frame.as_bytes()).unwrap();
            let second = codec.decode(frame.as_bytes()).unwrap();
            prop_assert_eq!(&first, &second);

            let DecodedFrame::Item(record) = first else {
                return Err(TestCaseError::fail("expected an item"));
            };
            prop_assert_eq!(record.stickers.len(), stickers.len());
        }

        #[test]
        fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = codec().decode(&raw);
        }
    }
}
