//! Stored page wire format.
//!
//! A stored page is the rendered document with `<!--cached-at:<unix-ts>-->`
//! placed immediately before its closing body tag.

use bytes::{Bytes, BytesMut};

const CLOSING_BODY: &[u8] = b"</body>";
const CLOSING_HTML: &[u8] = b"</html>";
const MARKER_OPEN: &[u8] = b"<!--cached-at:";
const MARKER_CLOSE: &[u8] = b"-->";
const LABEL: &[u8] = b"<div class=\"admin-cache-label\">cached page</div>";

/// Case-insensitive position of the last occurrence of `needle`.
fn rfind_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Whether `body` is a complete document: it closes both body and html.
/// Fragments and truncated output are never cached.
pub fn is_complete_document(body: &[u8]) -> bool {
    rfind_ci(body, CLOSING_HTML).is_some() && rfind_ci(body, CLOSING_BODY).is_some()
}

/// Inserts the capture marker before the last closing body tag.
///
/// Returns None when there is no closing body tag.
pub fn embed_timestamp(body: &[u8], captured_at: i64) -> Option<Bytes> {
    let at = rfind_ci(body, CLOSING_BODY)?;
    let marker = format!("<!--cached-at:{captured_at}-->");
    let mut out = BytesMut::with_capacity(body.len() + marker.len());
    out.extend_from_slice(&body[..at]);
    out.extend_from_slice(marker.as_bytes());
    out.extend_from_slice(&body[at..]);
    Some(out.freeze())
}

/// Reads the capture timestamp back out of a stored page.
pub fn extract_timestamp(stored: &[u8]) -> Option<i64> {
    let start = find(stored, MARKER_OPEN)? + MARKER_OPEN.len();
    let len = find(&stored[start..], MARKER_CLOSE)?;
    std::str::from_utf8(&stored[start..start + len])
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Adds the visible "cached page" label before the closing body tag.
pub fn inject_label(stored: &Bytes) -> Bytes {
    let Some(at) = rfind_ci(stored, CLOSING_BODY) else {
        return stored.clone();
    };
    let mut out = BytesMut::with_capacity(stored.len() + LABEL.len());
    out.extend_from_slice(&stored[..at]);
    out.extend_from_slice(LABEL);
    out.extend_from_slice(&stored[at..]);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &[u8] = b"<html><body><h1>Dashboard</h1></body></html>";

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    #[test]
    fn complete_document_detection() {
        assert!(is_complete_document(PAGE));
        assert!(is_complete_document(b"<HTML><BODY></BODY></HTML>"));
        assert!(!is_complete_document(b"<div>fragment</div>"));
        assert!(!is_complete_document(b"<html><body>truncated"));
        assert!(!is_complete_document(b"<html></html>"));
    }

    #[test]
    fn marker_lands_once_before_closing_body() {
        let stored = embed_timestamp(PAGE, 1_700_000_000).unwrap();
        assert_eq!(
            &stored[..],
            &b"<html><body><h1>Dashboard</h1><!--cached-at:1700000000--></body></html>"[..]
        );
        assert_eq!(count(&stored, b"<!--cached-at:"), 1);
    }

    #[test]
    fn marker_uses_last_closing_body() {
        let page = b"<html><body><pre>&lt;/body&gt; </body> sample</pre></body></html>";
        let stored = embed_timestamp(page, 7).unwrap();
        assert!(stored.ends_with(b"<!--cached-at:7--></body></html>"));
    }

    #[test]
    fn no_closing_body_no_marker() {
        assert!(embed_timestamp(b"<div>fragment</div>", 1).is_none());
    }

    #[test]
    fn timestamp_round_trip() {
        let stored = embed_timestamp(PAGE, 1_234_567).unwrap();
        assert_eq!(extract_timestamp(&stored), Some(1_234_567));
        assert_eq!(extract_timestamp(PAGE), None);
        assert_eq!(extract_timestamp(b"<!--cached-at:abc-->"), None);
    }

    #[test]
    fn label_injection() {
        let stored = embed_timestamp(PAGE, 1).unwrap();
        let labelled = inject_label(&stored);
        assert_eq!(
            &labelled[..],
            &b"<html><body><h1>Dashboard</h1><!--cached-at:1--><div class=\"admin-cache-label\">cached page</div></body></html>"[..]
        );
        let fragment = Bytes::from_static(b"<p>x</p>");
        assert_eq!(inject_label(&fragment), fragment);
    }
}
