//! Preset demonstration content.
//!
//! A small fixed table of exchanges signed with a built-in identity, letting
//! a caller exercise end-to-end signed-exchange delivery without operating a
//! real signer or CA. The identity is self-contained: the demo exchange
//! names the certificate pair served on the preset cert-chain path, so a
//! verifier that fetches the referenced chain can validate the signature.
//! Only the OCSP response embedded into the cert-chain is supplied by the
//! caller.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use sha2::{Digest, Sha256};

use crate::{
    asn1,
    cbor::DataItem,
    config::SxgConfig,
    error::SxgError,
    exchange::{self, SXG_CONTENT_TYPE},
    headers::Headers,
    mice::{self, RECORD_SIZE},
    signature::{self, LocalSigner, SignatureParams, SIGNATURE_DURATION_SECONDS},
    SignedExchangeResponse,
};

/// Content type of the cert-chain CBOR.
pub const CERT_CHAIN_CONTENT_TYPE: &str = "application/cert-chain+cbor";

const DEMO_PATH: &str = "/.sxg/test.html";
const CERT_CHAIN_PATH: &str = "/.sxg/cert.cbor";

const DEMO_BODY: &[u8] =
    b"<!doctype html><title>SXG demo</title><p>This page was served as a signed exchange.</p>";

// P-256 secret scalars of the preset identity. Demonstration use only;
// never sign production content with them.
const PRESET_KEY: [u8; 32] = [
    0x3f, 0x8a, 0x5c, 0x21, 0xe0, 0x4b, 0x97, 0x6d, 0x12, 0xd3, 0x48, 0xa9, 0x7e, 0x55, 0xc0,
    0x1f, 0x86, 0x29, 0xb4, 0x0e, 0x63, 0xfa, 0x91, 0x37, 0x4d, 0xc8, 0x02, 0xb5, 0x6e, 0x19,
    0xa7, 0x50,
];

const PRESET_ISSUER_KEY: [u8; 32] = [
    0x9d, 0x14, 0x7b, 0xe2, 0x06, 0xc5, 0x58, 0x3a, 0xf1, 0x4e, 0x83, 0x27, 0xb9, 0x60, 0x0a,
    0xd4, 0x35, 0x7c, 0x92, 0x1b, 0xe8, 0x4f, 0x06, 0xa3, 0x71, 0xd9, 0x2e, 0x48, 0xbc, 0x15,
    0x5a, 0x67,
];

pub(crate) fn serve(
    config: &SxgConfig,
    url: &str,
    ocsp: &[u8],
) -> Result<SignedExchangeResponse, SxgError> {
    let demo_url = format!("https://{}{}", config.html_host, DEMO_PATH);
    let chain_url = format!("https://{}{}", config.html_host, CERT_CHAIN_PATH);
    if url == demo_url {
        demo_exchange(config, url, &chain_url)
    } else if url == chain_url {
        cert_chain(ocsp)
    } else {
        Err(SxgError::not_found(format!("no preset content for {url}")))
    }
}

/// Returns the preset signing key, for verification in tests.
#[cfg(any(test, feature = "fixtures"))]
pub(crate) fn preset_signer() -> LocalSigner {
    LocalSigner::new(&PRESET_KEY).expect("preset key is a valid scalar")
}

/// Builds the certificate pair of the preset identity, leaf first.
///
/// Deterministic: the leaf carries the public key of `PRESET_KEY`, so the
/// demo exchange verifies under the chain served on the cert-chain path.
fn preset_certificate_pair() -> Result<(Vec<u8>, Vec<u8>), SxgError> {
    let invalid_key = |_| SxgError::encoding("preset signing key is invalid");
    let leaf_point = LocalSigner::new(&PRESET_KEY)
        .map_err(invalid_key)?
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();
    let issuer_point = LocalSigner::new(&PRESET_ISSUER_KEY)
        .map_err(invalid_key)?
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();

    let leaf = asn1::certificate(&[0x02, 0x4c], "sxg demo ca", "sxg demo", &leaf_point);
    let issuer = asn1::certificate(&[0x02], "sxg demo root", "sxg demo ca", &issuer_point);
    Ok((leaf, issuer))
}

fn demo_exchange(
    config: &SxgConfig,
    url: &str,
    chain_url: &str,
) -> Result<SignedExchangeResponse, SxgError> {
    let signer = LocalSigner::new(&PRESET_KEY)
        .map_err(|_| SxgError::encoding("preset signing key is invalid"))?;
    let (leaf, _) = preset_certificate_pair()?;
    let cert_sha256 = Sha256::digest(leaf);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| SxgError::encoding("system clock is before the epoch"))?
        .as_secs();
    let expires = now
        .checked_add(SIGNATURE_DURATION_SECONDS)
        .ok_or_else(|| SxgError::encoding("system time overflows the validity window"))?;

    let payload_headers: Headers = [("content-type", "text/html;charset=utf-8")]
        .into_iter()
        .collect();
    let (digest, framed) = mice::calculate(DEMO_BODY, RECORD_SIZE);
    let header_block =
        exchange::signed_headers_bytes(200, &BASE64_STANDARD.encode(digest), &payload_headers);
    let params = SignatureParams {
        cert_url: chain_url,
        cert_sha256: &cert_sha256,
        validity_url: &config.validity_url,
        date: now,
        expires,
        request_url: url,
        header_block: &header_block,
    };
    let raw = signer.sign_raw(&params.to_be_signed());
    let asn1_signature = signature::signature_to_asn1(&raw)?;
    let signature_header = params.serialize_header(&asn1_signature);

    let body = exchange::assemble(url, signature_header.as_bytes(), &header_block, &framed)?;
    let mut headers = Headers::new();
    headers.push("content-type", SXG_CONTENT_TYPE);
    Ok(SignedExchangeResponse {
        body,
        headers,
        status: 200,
    })
}

// Cert-chain format from the same draft as the exchange encoding: an array
// opening with a magic text string, then one map per certificate from leaf
// to root. The caller-supplied OCSP response rides along on the leaf as the
// proof of non-revocation.
fn cert_chain(ocsp: &[u8]) -> Result<SignedExchangeResponse, SxgError> {
    let (leaf, issuer) = preset_certificate_pair()?;
    let body = DataItem::Array(vec![
        DataItem::TextString("\u{1f4dc}\u{26d3}"),
        DataItem::Map(vec![
            (DataItem::TextString("cert"), DataItem::ByteString(&leaf)),
            (DataItem::TextString("ocsp"), DataItem::ByteString(ocsp)),
        ]),
        DataItem::Map(vec![(
            DataItem::TextString("cert"),
            DataItem::ByteString(&issuer),
        )]),
    ])
    .serialize();

    let mut headers = Headers::new();
    headers.push("content-type", CERT_CHAIN_CONTENT_TYPE);
    Ok(SignedExchangeResponse {
        body,
        headers,
        status: 200,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use p256::ecdsa::{signature::Verifier as _, VerifyingKey};

    use crate::{error::SxgErrorKind, fixtures};

    #[test]
    fn test_demo_exchange_is_valid() {
        let engine = fixtures::engine();
        let url = "https://signed.test/.sxg/test.html";
        let response = engine.serve_preset_content(url, b"ocsp-bytes").unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("content-type"), Some(SXG_CONTENT_TYPE));
        assert!(response.body.starts_with(exchange::MAGIC));

        let parsed = exchange::parse(&response.body).unwrap();
        assert_eq!(parsed.fallback_url, url);

        let verified =
            fixtures::parse_and_verify(&response.body, &preset_signer().verifying_key()).unwrap();
        assert_eq!(verified.expires - verified.date, SIGNATURE_DURATION_SECONDS);
    }

    #[test]
    fn test_demo_exchange_verifies_under_referenced_chain() {
        let engine = fixtures::engine();
        let url = "https://signed.test/.sxg/test.html";
        let response = engine.serve_preset_content(url, b"ocsp").unwrap();
        let parsed = exchange::parse(&response.body).unwrap();

        // The signature names the certificate served on the cert-chain
        // path, both by hash and by URL.
        let (leaf, _) = preset_certificate_pair().unwrap();
        assert!(parsed.signature.contains(&format!(
            "cert-sha256=*{}*",
            BASE64_STANDARD.encode(Sha256::digest(&leaf))
        )));
        assert!(parsed
            .signature
            .contains("cert-url=\"https://signed.test/.sxg/cert.cbor\""));

        let chain = engine
            .serve_preset_content("https://signed.test/.sxg/cert.cbor", b"ocsp")
            .unwrap();
        assert!(chain.body.windows(leaf.len()).any(|w| w == leaf));

        // The signature verifies under that certificate's public key.
        let key = VerifyingKey::from_sec1_bytes(
            asn1::parse_certificate(&leaf).unwrap().public_key,
        )
        .unwrap();
        fixtures::parse_and_verify(&response.body, &key).unwrap();
    }

    #[test]
    fn test_cert_chain_embeds_ocsp() {
        let engine = fixtures::engine();
        let ocsp = b"\x30\x03\x0a\x01\x00";
        let response = engine
            .serve_preset_content("https://signed.test/.sxg/cert.cbor", ocsp)
            .unwrap();

        assert_eq!(
            response.headers.get("content-type"),
            Some(CERT_CHAIN_CONTENT_TYPE)
        );
        // Array header, then the magic text string.
        assert_eq!(response.body[0], 0x83);
        let magic = "\u{1f4dc}\u{26d3}";
        assert_eq!(&response.body[2..2 + magic.len()], magic.as_bytes());
        // The OCSP response is embedded verbatim.
        assert!(response.body.windows(ocsp.len()).any(|w| w == ocsp));
    }

    #[test]
    fn test_unknown_url_is_not_found() {
        let engine = fixtures::engine();
        let err = engine
            .serve_preset_content("https://unknown.example/", b"ocsp")
            .unwrap_err();
        assert_eq!(err.kind(), SxgErrorKind::NotFound);
    }

    #[test]
    fn test_preset_signer_key_is_usable() {
        let signer = preset_signer();
        let raw = signer.sign_raw(b"message");
        let der = signature::signature_to_asn1(&raw).unwrap();
        let sig = p256::ecdsa::Signature::from_der(&der).unwrap();
        signer.verifying_key().verify(b"message", &sig).unwrap();
    }
}
