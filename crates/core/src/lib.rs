//! Signed HTTP exchange (SXG) construction engine.
//!
//! A signed exchange bundles an HTTP response and a signature over its
//! metadata and content digest, so a third party can serve the bytes while
//! the client attributes them to the signing origin. This crate builds such
//! exchanges (version b3): it validates payload headers against the
//! signed-exchange header policy, constructs OCSP requests for the
//! configured certificate, encodes exchanges with an externally supplied
//! asynchronous [`Signer`], and serves a small preset content set for
//! demos and tests.
//!
//! The engine neither fetches nor serves anything itself: transporting the
//! OCSP request to a responder and delivering produced exchange bytes to
//! clients belong to the caller.

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod asn1;
mod cbor;
pub mod config;
mod error;
mod exchange;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod headers;
mod mice;
mod ocsp;
mod preset;
pub mod signature;

use std::sync::Mutex;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use http::Uri;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

pub use crate::{
    config::{SxgConfig, SxgConfigBuilder, SxgConfigBuilderError},
    error::{SxgError, SxgErrorKind},
    exchange::SXG_CONTENT_TYPE,
    headers::Headers,
    preset::CERT_CHAIN_CONTENT_TYPE,
    signature::{LocalSigner, Signer, SIGNATURE_DURATION_SECONDS},
};

use crate::signature::SignatureParams;

/// The inputs of a single exchange creation.
#[derive(Debug, Clone)]
pub struct ExchangeRequest<'a> {
    /// Absolute HTTPS URL a client falls back to if exchange validation
    /// fails.
    pub fallback_url: &'a str,
    /// HTTP status of the inner response.
    pub status_code: u16,
    /// Headers of the inner response; must pass payload-header validation.
    pub payload_headers: &'a Headers,
    /// Body of the inner response.
    pub payload_body: &'a [u8],
    /// Start of the signature validity window, in seconds since the epoch.
    pub signing_time: u64,
}

/// A complete, signed exchange ready for delivery.
///
/// Ownership transfers entirely to the caller; the engine keeps nothing.
#[derive(Debug, Clone)]
pub struct SignedExchangeResponse {
    /// The binary-encoded exchange.
    pub body: Vec<u8>,
    /// Transport headers for delivering the exchange.
    pub headers: Headers,
    /// Transport status code.
    pub status: u16,
}

/// The signed-exchange engine.
///
/// One engine instance carries one signing identity (configured at
/// construction) and a diagnostics slot holding the message of the most
/// recent failed operation on this instance.
#[derive(Debug)]
pub struct SxgEngine {
    config: SxgConfig,
    cert_sha256: Vec<u8>,
    last_error: Mutex<String>,
}

impl SxgEngine {
    /// Creates an engine from the given configuration.
    ///
    /// The configured certificates and URLs are checked eagerly; a
    /// malformed identity fails here with [`SxgErrorKind::Encoding`].
    pub fn new(config: SxgConfig) -> Result<Self, SxgError> {
        asn1::parse_certificate(&config.cert_der)
            .map_err(|err| SxgError::encoding(format!("malformed certificate: {err}")))?;
        asn1::parse_certificate(&config.issuer_der)
            .map_err(|err| SxgError::encoding(format!("malformed issuer certificate: {err}")))?;
        ensure_https_url(&config.cert_url, "cert_url")?;
        ensure_https_url(&config.validity_url, "validity_url")?;

        let cert_sha256 = Sha256::digest(&config.cert_der).to_vec();
        Ok(Self {
            config,
            cert_sha256,
            last_error: Mutex::new(String::new()),
        })
    }

    /// Checks that every header may appear inside a signed exchange
    /// payload.
    ///
    /// Fails with [`SxgErrorKind::HeaderRejected`] naming the first
    /// offending header. Nothing is mutated on failure.
    pub fn validate_payload_headers(&self, fields: &Headers) -> Result<(), SxgError> {
        self.record(headers::validate_payload_headers(fields))
    }

    /// Normalizes caller-supplied fields into the canonical set to attach
    /// to an outbound request, such as an OCSP fetch.
    pub fn create_request_headers(&self, fields: &Headers) -> Result<Headers, SxgError> {
        self.record(headers::create_request_headers(fields))
    }

    /// Builds a DER-encoded OCSP request for the configured certificate.
    ///
    /// The caller transmits the request to the issuer's OCSP responder; the
    /// raw response bytes can later be embedded via
    /// [`serve_preset_content`](Self::serve_preset_content) or served
    /// alongside the certificate chain.
    pub fn create_ocsp_request(&self) -> Result<Vec<u8>, SxgError> {
        self.record(ocsp::create_request(
            &self.config.cert_der,
            &self.config.issuer_der,
        ))
    }

    /// Builds a complete signed exchange.
    ///
    /// Suspends exactly once, while the supplied signer produces the
    /// signature over the canonical to-be-signed bytes. On any failure no
    /// exchange bytes are produced; a partially signed exchange is never
    /// returned.
    #[instrument(level = "debug", skip_all, fields(fallback_url = request.fallback_url))]
    pub async fn create_signed_exchange(
        &self,
        request: ExchangeRequest<'_>,
        signer: &dyn Signer,
    ) -> Result<SignedExchangeResponse, SxgError> {
        let result = self.build_exchange(request, signer).await;
        self.record(result)
    }

    async fn build_exchange(
        &self,
        request: ExchangeRequest<'_>,
        signer: &dyn Signer,
    ) -> Result<SignedExchangeResponse, SxgError> {
        headers::validate_payload_headers(request.payload_headers)?;
        ensure_https_url(request.fallback_url, "fallback url")?;
        if !(100..=599).contains(&request.status_code) {
            return Err(SxgError::encoding(format!(
                "status code {} out of range",
                request.status_code
            )));
        }

        let expires = request
            .signing_time
            .checked_add(SIGNATURE_DURATION_SECONDS)
            .ok_or_else(|| SxgError::encoding("signing time overflows the validity window"))?;

        let (digest, framed_payload) = mice::calculate(request.payload_body, mice::RECORD_SIZE);
        let header_block = exchange::signed_headers_bytes(
            request.status_code,
            &BASE64_STANDARD.encode(digest),
            request.payload_headers,
        );
        let params = SignatureParams {
            cert_url: &self.config.cert_url,
            cert_sha256: &self.cert_sha256,
            validity_url: &self.config.validity_url,
            date: request.signing_time,
            expires,
            request_url: request.fallback_url,
            header_block: &header_block,
        };

        let message = params.to_be_signed();
        debug!(message_len = message.len(), "invoking signer");
        let raw_signature = signer.sign(&message).await.map_err(SxgError::signing)?;

        // Everything below is pure splicing; a future dropped at the await
        // point above leaves no partial output anywhere.
        let asn1_signature = signature::signature_to_asn1(&raw_signature)?;
        let signature_header = params.serialize_header(&asn1_signature);
        let body = exchange::assemble(
            request.fallback_url,
            signature_header.as_bytes(),
            &header_block,
            &framed_payload,
        )?;
        debug!(body_len = body.len(), "exchange encoded");

        let mut headers = Headers::new();
        headers.push("content-type", SXG_CONTENT_TYPE);
        if self.config.respond_debug_info {
            headers.push("x-sxg-debug", request.fallback_url);
        }
        Ok(SignedExchangeResponse {
            body,
            headers,
            status: 200,
        })
    }

    /// Serves a fixed demonstration exchange for `url`, embedding the
    /// caller-supplied OCSP response into the preset cert-chain.
    ///
    /// Fails with [`SxgErrorKind::NotFound`] for URLs outside the preset
    /// table.
    pub fn serve_preset_content(
        &self,
        url: &str,
        ocsp: &[u8],
    ) -> Result<SignedExchangeResponse, SxgError> {
        self.record(preset::serve(&self.config, url, ocsp))
    }

    /// Returns the message of the most recent failed operation on this
    /// engine instance, or an empty string if the most recent operation
    /// succeeded (or none has run yet).
    pub fn last_error_message(&self) -> String {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns whether responses include auxiliary debug fields.
    pub fn should_respond_debug_info(&self) -> bool {
        self.config.respond_debug_info
    }

    // Mirrors the operation result into the diagnostics slot: failures
    // overwrite it, successes clear it.
    fn record<T>(&self, result: Result<T, SxgError>) -> Result<T, SxgError> {
        let mut slot = self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match &result {
            Ok(_) => slot.clear(),
            Err(err) => *slot = err.to_string(),
        }
        result
    }
}

fn ensure_https_url(url: &str, what: &str) -> Result<(), SxgError> {
    let uri: Uri = url
        .parse()
        .map_err(|err| SxgError::encoding(format!("{what} {url:?} is invalid: {err}")))?;
    if uri.scheme_str() != Some("https") || uri.authority().is_none() {
        return Err(SxgError::encoding(format!(
            "{what} {url:?} is not an absolute https url"
        )));
    }
    Ok(())
}
