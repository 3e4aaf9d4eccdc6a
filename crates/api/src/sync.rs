//! Sync-token codec and `?since=` / `?until=` parsing.
//!
//! A sync token is base64-encoded JSON `{"t": "<ISO-8601>"}` — opaque to
//! clients, a timestamp to us. Any decode failure yields `None`; callers
//! surface that as `INVALID_PARAM`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Encode a point in time into an opaque continuation token.
pub fn encode_sync_token(as_of_iso: &str) -> String {
    let payload = serde_json::json!({ "t": as_of_iso }).to_string();
    BASE64.encode(payload)
}

/// Decode a sync token back to a timestamp.
pub fn decode_sync_token(token: &str) -> Option<DateTime<Utc>> {
    let bytes = BASE64.decode(token).ok()?;
    let payload: Value = serde_json::from_slice(&bytes).ok()?;
    parse_datetime(payload.get("t")?.as_str()?)
}

/// Parse a `?since=` / `?until=` value: RFC 3339 first, sync token second.
pub fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    parse_datetime(raw).or_else(|| decode_sync_token(raw))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Zone-less timestamps and bare dates are read as UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let iso = "2026-02-20T00:00:00+00:00";
        let token = encode_sync_token(iso);
        assert!(!token.is_empty());

        let decoded = decode_sync_token(&token).unwrap();
        assert_eq!(decoded, DateTime::parse_from_rfc3339(iso).unwrap());
    }

    #[test]
    fn token_payload_carries_t_field() {
        let token = encode_sync_token("2026-02-20T00:00:00+00:00");
        let bytes = BASE64.decode(&token).unwrap();
        let payload: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload["t"], "2026-02-20T00:00:00+00:00");
    }

    #[test]
    fn parse_since_accepts_rfc3339() {
        assert!(parse_since("2026-02-20T00:00:00Z").is_some());
        assert!(parse_since("2026-02-20T00:00:00+02:00").is_some());
    }

    #[test]
    fn parse_since_accepts_tokens() {
        let token = encode_sync_token("2026-02-20T00:00:00+00:00");
        assert!(parse_since(&token).is_some());
    }

    #[test]
    fn parse_since_accepts_bare_dates() {
        let parsed = parse_since("2026-02-20").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-02-20T00:00:00+00:00");
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_since("not-a-date-or-token").is_none());
        assert!(decode_sync_token("!!!").is_none());
        // Valid base64 but not our payload shape.
        assert!(decode_sync_token(&BASE64.encode("[1,2,3]")).is_none());
    }
}
