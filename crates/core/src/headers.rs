//! HTTP header lists and the signed-exchange header policy.

use serde::{Deserialize, Serialize};

use crate::error::SxgError;

/// Headers which tie a response to connection or client state. A signed
/// exchange must be cacheable and replayable by any intermediary, so these
/// may not appear in a signed payload.
const STATEFUL_HEADERS: &[&str] = &[
    "authentication-control",
    "authentication-info",
    "clear-site-data",
    "connection",
    "keep-alive",
    "optional-www-authenticate",
    "proxy-authenticate",
    "proxy-authentication-info",
    "proxy-connection",
    "public-key-pins",
    "sec-websocket-accept",
    "set-cookie",
    "set-cookie2",
    "setprofile",
    "strict-transport-security",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "www-authenticate",
];

const MAX_NAME_LEN: usize = 256;
const MAX_VALUE_LEN: usize = 16384;

/// An ordered list of HTTP header fields.
///
/// Order is preserved and semantically significant: it affects the canonical
/// encoding and therefore the signature input. Names are matched
/// case-insensitively but stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field to the list.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Returns the value of the first field matching `name`,
    /// case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}

/// Checks that every field may appear inside a signed exchange payload.
///
/// Fails on the first violation, naming the offending header. Validation is
/// all-or-nothing: nothing is mutated, and no encoding happens before this
/// check passes.
pub(crate) fn validate_payload_headers(headers: &Headers) -> Result<(), SxgError> {
    for (name, value) in headers.iter() {
        check_field_structure(name, value)?;
        let lower = name.to_ascii_lowercase();
        if STATEFUL_HEADERS.contains(&lower.as_str()) {
            return Err(SxgError::header_rejected(
                name,
                "stateful headers may not be signed",
            ));
        }
    }
    Ok(())
}

/// Normalizes caller-supplied fields into the canonical set to attach to an
/// outbound request: names are lowercased, optional whitespace is trimmed
/// from values. Unlike payload validation, no policy rejection applies; only
/// structurally malformed fields fail.
pub(crate) fn create_request_headers(headers: &Headers) -> Result<Headers, SxgError> {
    headers
        .iter()
        .map(|(name, value)| {
            check_field_structure(name, value)?;
            Ok((name.to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

fn check_field_structure(name: &str, value: &str) -> Result<(), SxgError> {
    if name.is_empty() {
        return Err(SxgError::header_rejected(name, "empty header name"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SxgError::header_rejected(name, "header name too long"));
    }
    if !name.bytes().all(is_token_char) {
        return Err(SxgError::header_rejected(
            name,
            "header name contains invalid characters",
        ));
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(SxgError::header_rejected(name, "header value too long"));
    }
    if value
        .bytes()
        .any(|b| b == 0x7f || (b < 0x20 && b != b'\t'))
    {
        return Err(SxgError::header_rejected(
            name,
            "header value contains control characters",
        ));
    }
    Ok(())
}

// RFC 7230 tchar.
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    use crate::error::SxgErrorKind;

    fn headers(fields: &[(&str, &str)]) -> Headers {
        fields.iter().copied().collect()
    }

    #[rstest]
    #[case::set_cookie("set-cookie")]
    #[case::mixed_case("Set-Cookie")]
    #[case::connection("connection")]
    #[case::keep_alive("keep-alive")]
    #[case::transfer_encoding("Transfer-Encoding")]
    #[case::www_authenticate("www-authenticate")]
    fn test_validate_rejects_stateful_header(#[case] name: &str) {
        let err = validate_payload_headers(&headers(&[
            ("content-type", "text/html"),
            (name, "value"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), SxgErrorKind::HeaderRejected);
        assert_eq!(err.header_name(), Some(name));
    }

    #[rstest]
    #[case::empty_name("", "value")]
    #[case::space_in_name("content type", "text/html")]
    #[case::control_in_name("x-a\u{1}b", "v")]
    #[case::control_in_value("x-meta", "a\u{0}b")]
    #[case::newline_in_value("x-meta", "a\r\nb")]
    fn test_validate_rejects_malformed_field(#[case] name: &str, #[case] value: &str) {
        let err = validate_payload_headers(&headers(&[(name, value)])).unwrap_err();
        assert_eq!(err.kind(), SxgErrorKind::HeaderRejected);
    }

    #[test]
    fn test_validate_rejects_oversized_field() {
        let long_value = "v".repeat(MAX_VALUE_LEN + 1);
        let err =
            validate_payload_headers(&headers(&[("x-large", long_value.as_str())])).unwrap_err();
        assert_eq!(err.header_name(), Some("x-large"));

        let long_name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(validate_payload_headers(&headers(&[(long_name.as_str(), "v")])).is_err());
    }

    #[test]
    fn test_validate_accepts_and_is_idempotent() {
        let fields = headers(&[
            ("content-type", "text/html;charset=utf-8"),
            ("cache-control", "public, max-age=600"),
            ("X-Custom", "value\twith\ttabs"),
        ]);
        validate_payload_headers(&fields).unwrap();
        validate_payload_headers(&fields).unwrap();
    }

    #[test]
    fn test_create_request_headers_normalizes() {
        let normalized = create_request_headers(&headers(&[
            ("Content-Type", "  application/ocsp-request "),
            ("ACCEPT", "application/ocsp-response"),
        ]))
        .unwrap();
        assert_eq!(
            normalized.iter().collect::<Vec<_>>(),
            vec![
                ("content-type", "application/ocsp-request"),
                ("accept", "application/ocsp-response"),
            ]
        );
    }

    #[test]
    fn test_create_request_headers_allows_stateful_names() {
        // The rejection policy applies to signed payloads only.
        let normalized = create_request_headers(&headers(&[("Connection", "close")])).unwrap();
        assert_eq!(normalized.get("connection"), Some("close"));
    }

    #[test]
    fn test_create_request_headers_rejects_malformed() {
        assert!(create_request_headers(&headers(&[("", "v")])).is_err());
    }

    #[test]
    fn test_get_is_case_insensitive_first_match() {
        let fields = headers(&[("X-A", "1"), ("x-a", "2")]);
        assert_eq!(fields.get("x-a"), Some("1"));
        assert_eq!(fields.get("X-A"), Some("1"));
        assert_eq!(fields.get("x-b"), None);
    }
}
