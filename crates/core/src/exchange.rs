//! Signed-exchange wire format (version b3).
//!
//! Body layout: magic, fallback URL with a 2-byte length, 3-byte lengths of
//! the signature and header block, the `signature` header value, the
//! canonical CBOR response-header map, and the framed payload. Encoding is
//! pure and separated from signing so the to-be-signed bytes can be tested
//! against the format on their own.

use crate::{cbor::DataItem, error::SxgError, headers::Headers};

pub(crate) const MAGIC: &[u8] = b"sxg1-b3\0";

/// Content type identifying a signed-exchange response body.
pub const SXG_CONTENT_TYPE: &str = "application/signed-exchange;v=b3";

// The engine owns these entries of the signed header map; caller-supplied
// copies are replaced.
const CONTROLLED_HEADERS: &[&str] = &[":status", "content-encoding", "digest"];

/// Encodes the response-header block covered by the signature: the validated
/// payload headers plus `:status` and the integrity framing headers, as a
/// canonical CBOR map from bytestring to bytestring.
pub(crate) fn signed_headers_bytes(
    status_code: u16,
    digest_base64: &str,
    payload_headers: &Headers,
) -> Vec<u8> {
    let mut entries: Vec<(String, String)> = Vec::with_capacity(payload_headers.len() + 3);
    for (name, value) in payload_headers.iter() {
        let lower = name.to_ascii_lowercase();
        if CONTROLLED_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        match entries.iter_mut().find(|(n, _)| *n == lower) {
            // The map requires unique keys; repeated fields fold into an
            // HTTP list value.
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => entries.push((lower, value.to_string())),
        }
    }
    entries.push((":status".into(), status_code.to_string()));
    entries.push(("content-encoding".into(), "mi-sha256-03".into()));
    entries.push(("digest".into(), format!("mi-sha256-03={digest_base64}")));

    DataItem::Map(
        entries
            .iter()
            .map(|(name, value)| {
                (
                    DataItem::ByteString(name.as_bytes()),
                    DataItem::ByteString(value.as_bytes()),
                )
            })
            .collect(),
    )
    .serialize()
}

/// Assembles the final exchange body.
pub(crate) fn assemble(
    fallback_url: &str,
    signature: &[u8],
    header_block: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>, SxgError> {
    let url = fallback_url.as_bytes();
    if url.len() > u16::MAX as usize {
        return Err(SxgError::encoding("fallback url exceeds 2^16 - 1 bytes"));
    }
    if signature.len() >= 1 << 24 {
        return Err(SxgError::encoding("signature exceeds 2^24 - 1 bytes"));
    }
    if header_block.len() >= 1 << 24 {
        return Err(SxgError::encoding("header block exceeds 2^24 - 1 bytes"));
    }

    let mut body = Vec::with_capacity(
        MAGIC.len() + 2 + url.len() + 6 + signature.len() + header_block.len() + payload.len(),
    );
    body.extend_from_slice(MAGIC);
    body.extend_from_slice(&(url.len() as u16).to_be_bytes());
    body.extend_from_slice(url);
    body.extend_from_slice(&u24(signature.len()));
    body.extend_from_slice(&u24(header_block.len()));
    body.extend_from_slice(signature);
    body.extend_from_slice(header_block);
    body.extend_from_slice(payload);
    Ok(body)
}

fn u24(len: usize) -> [u8; 3] {
    [(len >> 16) as u8, (len >> 8) as u8, len as u8]
}

/// A decoded exchange body.
#[cfg(any(test, feature = "fixtures"))]
#[derive(Debug)]
pub(crate) struct ParsedExchange<'a> {
    pub(crate) fallback_url: &'a str,
    pub(crate) signature: &'a str,
    pub(crate) header_block: &'a [u8],
    pub(crate) payload: &'a [u8],
}

/// Splits an exchange body back into its sections.
#[cfg(any(test, feature = "fixtures"))]
pub(crate) fn parse(body: &[u8]) -> Result<ParsedExchange<'_>, SxgError> {
    let truncated = || SxgError::encoding("truncated exchange body");

    let rest = body
        .strip_prefix(MAGIC)
        .ok_or_else(|| SxgError::encoding("bad magic"))?;
    let (url_len, rest) = rest.split_at_checked(2).ok_or_else(truncated)?;
    let url_len = u16::from_be_bytes([url_len[0], url_len[1]]) as usize;
    let (url, rest) = rest.split_at_checked(url_len).ok_or_else(truncated)?;
    let fallback_url = core::str::from_utf8(url)
        .map_err(|_| SxgError::encoding("fallback url is not utf-8"))?;

    let (lengths, rest) = rest.split_at_checked(6).ok_or_else(truncated)?;
    let sig_len = u32::from_be_bytes([0, lengths[0], lengths[1], lengths[2]]) as usize;
    let header_len = u32::from_be_bytes([0, lengths[3], lengths[4], lengths[5]]) as usize;

    let (signature, rest) = rest.split_at_checked(sig_len).ok_or_else(truncated)?;
    let signature = core::str::from_utf8(signature)
        .map_err(|_| SxgError::encoding("signature header is not utf-8"))?;
    let (header_block, payload) = rest.split_at_checked(header_len).ok_or_else(truncated)?;

    Ok(ParsedExchange {
        fallback_url,
        signature,
        header_block,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_parse_round_trip() {
        let body = assemble("https://example.org/", b"sig;...", b"\xa1", b"payload").unwrap();
        assert!(body.starts_with(MAGIC));

        let parsed = parse(&body).unwrap();
        assert_eq!(parsed.fallback_url, "https://example.org/");
        assert_eq!(parsed.signature, "sig;...");
        assert_eq!(parsed.header_block, b"\xa1");
        assert_eq!(parsed.payload, b"payload");
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let err = parse(b"sxg1-b2\0rest").unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_parse_rejects_truncation() {
        let body = assemble("https://example.org/", b"sig", b"hdrs", b"payload").unwrap();
        assert!(parse(&body[..body.len() - 8]).is_err());
        assert!(parse(&body[..10]).is_err());
    }

    #[test]
    fn test_signed_headers_block_contents() {
        let headers: Headers = [("Content-Type", "text/html")].into_iter().collect();
        let block = signed_headers_bytes(200, "AAAA", &headers);

        // Map of 4 entries with lowercased bytestring keys.
        assert_eq!(block[0], 0xa4);
        let block_str = String::from_utf8_lossy(&block);
        assert!(block_str.contains(":status"));
        assert!(block_str.contains("200"));
        assert!(block_str.contains("content-type"));
        assert!(block_str.contains("text/html"));
        assert!(block_str.contains("mi-sha256-03=AAAA"));
    }

    #[test]
    fn test_signed_headers_merges_duplicates_and_overrides_controlled() {
        let headers: Headers = [
            ("warning", "199 a"),
            ("Warning", "199 b"),
            ("Content-Encoding", "gzip"),
        ]
        .into_iter()
        .collect();
        let block = signed_headers_bytes(200, "AAAA", &headers);

        // warning (merged), :status, content-encoding, digest.
        assert_eq!(block[0], 0xa4);
        let block_str = String::from_utf8_lossy(&block);
        assert!(block_str.contains("199 a, 199 b"));
        assert!(!block_str.contains("gzip"));
    }

    #[test]
    fn test_assemble_bounds() {
        let url = "x".repeat(70_000);
        assert!(assemble(&url, b"s", b"h", b"p").is_err());
    }
}
