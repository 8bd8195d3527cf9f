//! Turns raw `"Key: Value"` strings into a validated header map.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Result of parsing a list of raw header strings.
///
/// `rejected` holds every entry that was skipped, in input order. Each one
/// has already been reported once through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct ParsedHeaders {
    pub headers: HeaderMap,
    pub rejected: Vec<String>,
}

/// Parses `raw` entries, splitting each on its first colon.
///
/// Malformed entries (no colon, invalid name or value) are diagnosed and
/// skipped; they never fail the whole parse. Later duplicates overwrite
/// earlier ones. Names compare case-insensitively.
pub fn parse_headers<S: AsRef<str>>(raw: &[S]) -> ParsedHeaders {
    let mut parsed = ParsedHeaders::default();

    for entry in raw {
        let entry = entry.as_ref();
        match parse_entry(entry) {
            Some((name, value)) => {
                // insert() drops every previous value for the name
                parsed.headers.insert(name, value);
            }
            None => {
                warn!("Invalid header format: {}", entry);
                parsed.rejected.push(entry.to_string());
            }
        }
    }

    parsed
}

fn parse_entry(entry: &str) -> Option<(HeaderName, HeaderValue)> {
    let (key, value) = entry.split_once(':')?;
    let name = HeaderName::from_bytes(key.trim().as_bytes()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` under a subscriber that writes into a buffer and returns the log text.
    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        (result, logs)
    }

    fn value<'a>(parsed: &'a ParsedHeaders, name: &str) -> Option<&'a str> {
        parsed.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn parses_mixed_list_and_skips_garbage() {
        let parsed = parse_headers(&["Authorization: Bearer x", "garbage", "X-Test:  val  "]);

        assert_eq!(parsed.headers.len(), 2);
        assert_eq!(value(&parsed, "Authorization"), Some("Bearer x"));
        assert_eq!(value(&parsed, "X-Test"), Some("val"));
        assert_eq!(parsed.rejected, vec!["garbage".to_string()]);
    }

    #[test]
    fn one_warning_per_malformed_entry() {
        let (parsed, logs) =
            with_captured_logs(|| parse_headers(&["Authorization: Bearer x", "garbage", "X-Test:  val  "]));

        assert_eq!(parsed.headers.len(), 2);
        assert_eq!(logs.matches("Invalid header format").count(), 1);
        assert_eq!(logs.matches("Invalid header format: garbage").count(), 1);
        assert!(logs.contains("WARN"));
    }

    #[test]
    fn well_formed_entries_log_nothing() {
        let (_, logs) = with_captured_logs(|| parse_headers(&["A: 1", "B: 2"]));

        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn last_duplicate_wins() {
        let parsed = parse_headers(&["A: 1", "A: 2"]);

        assert_eq!(parsed.headers.len(), 1);
        assert_eq!(value(&parsed, "A"), Some("2"));
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn duplicate_names_differing_in_case_collapse() {
        let parsed = parse_headers(&["x-token: first", "X-Token: second"]);

        assert_eq!(parsed.headers.len(), 1);
        assert_eq!(value(&parsed, "x-token"), Some("second"));
    }

    #[test]
    fn splits_on_first_colon_only() {
        let parsed = parse_headers(&["Referer: https://example.com:8443/a"]);

        assert_eq!(value(&parsed, "Referer"), Some("https://example.com:8443/a"));
    }

    #[test]
    fn one_rejection_per_malformed_entry() {
        let (parsed, logs) =
            with_captured_logs(|| parse_headers(&["nocolon", "Good: yes", "also bad", ": empty-name", "Bad Name: x"]));

        assert_eq!(logs.matches("Invalid header format").count(), 4);
        assert_eq!(value(&parsed, "Good"), Some("yes"));
        assert_eq!(parsed.headers.len(), 1);
        assert_eq!(
            parsed.rejected,
            vec!["nocolon", "also bad", ": empty-name", "Bad Name: x"]
        );
    }

    #[test]
    fn empty_value_is_allowed() {
        let parsed = parse_headers(&["X-Empty:"]);

        assert_eq!(value(&parsed, "X-Empty"), Some(""));
    }

    #[test]
    fn empty_input_gives_empty_map() {
        let parsed = parse_headers::<&str>(&[]);

        assert!(parsed.headers.is_empty());
        assert!(parsed.rejected.is_empty());
    }
}
