//! Exchange signing.
//!
//! The signature of an exchange is computed over a canonical message built
//! from the exchange metadata, never over the final body: a verifier
//! reconstructs the same message independently, so the byte layout here is
//! load-bearing. Signing itself is delegated to a [`Signer`] capability so
//! the key may live anywhere (in-process, HSM, remote service).

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use p256::ecdsa::{
    signature::Signer as _, Signature as EcdsaSignature, SigningKey, VerifyingKey,
};

use crate::error::SxgError;

/// Validity window length of produced signatures, in seconds. Seven days,
/// the maximum a b3 verifier accepts.
pub const SIGNATURE_DURATION_SECONDS: u64 = 604_800;

const CONTEXT_STRING: &[u8] = b"HTTP Exchange 1 and later";

/// An external signing capability.
///
/// The engine holds the signer only for the duration of a single
/// exchange-creation call and suspends exactly once while it runs.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs `message` with ECDSA P-256 SHA-256, returning the raw 64-byte
    /// `r || s` signature. An ASN.1 DER signature is also accepted.
    async fn sign(
        &self,
        message: &[u8],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

/// An in-process P-256 signer.
///
/// Used by the preset-content path and by tests; production exchanges are
/// expected to inject a signer backed by real key storage.
pub struct LocalSigner {
    key: SigningKey,
}

impl LocalSigner {
    /// Creates a signer from a 32-byte P-256 secret scalar.
    pub fn new(secret: &[u8]) -> Result<Self, SxgError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|err| SxgError::encoding(format!("invalid signing key: {err}")))?;
        Ok(Self { key })
    }

    /// Returns the corresponding verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }

    pub(crate) fn sign_raw(&self, message: &[u8]) -> Vec<u8> {
        let signature: EcdsaSignature = self.key.sign(message);
        signature.to_bytes().to_vec()
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign(
        &self,
        message: &[u8],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.sign_raw(message))
    }
}

/// The parameters bound into an exchange signature.
pub(crate) struct SignatureParams<'a> {
    pub(crate) cert_url: &'a str,
    pub(crate) cert_sha256: &'a [u8],
    pub(crate) validity_url: &'a str,
    pub(crate) date: u64,
    pub(crate) expires: u64,
    pub(crate) request_url: &'a str,
    /// The canonically encoded response header block.
    pub(crate) header_block: &'a [u8],
}

impl SignatureParams<'_> {
    /// Builds the exact byte sequence the signature is computed over.
    pub(crate) fn to_be_signed(&self) -> Vec<u8> {
        let mut message = vec![0x20u8; 64];
        message.extend_from_slice(CONTEXT_STRING);
        message.push(0);
        append_length_prefixed(&mut message, self.cert_sha256);
        append_length_prefixed(&mut message, self.validity_url.as_bytes());
        message.extend_from_slice(&self.date.to_be_bytes());
        message.extend_from_slice(&self.expires.to_be_bytes());
        append_length_prefixed(&mut message, self.request_url.as_bytes());
        append_length_prefixed(&mut message, self.header_block);
        message
    }

    /// Serializes the `signature` header value with the given ASN.1
    /// signature bytes spliced in.
    pub(crate) fn serialize_header(&self, signature_asn1: &[u8]) -> String {
        format!(
            "sig;cert-sha256=*{}*;cert-url={};date={};expires={};integrity=\"digest/mi-sha256-03\";sig=*{}*;validity-url={}",
            BASE64_STANDARD.encode(self.cert_sha256),
            quote(self.cert_url),
            self.date,
            self.expires,
            BASE64_STANDARD.encode(signature_asn1),
            quote(self.validity_url),
        )
    }
}

fn append_length_prefixed(message: &mut Vec<u8>, value: &[u8]) {
    message.extend_from_slice(&(value.len() as u64).to_be_bytes());
    message.extend_from_slice(value);
}

// Structured-header string serialization.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Converts a signer's output into the ASN.1 form embedded in the exchange.
pub(crate) fn signature_to_asn1(signature: &[u8]) -> Result<Vec<u8>, SxgError> {
    if signature.len() == 64 {
        let signature = EcdsaSignature::from_slice(signature)
            .map_err(|err| SxgError::encoding(format!("invalid raw signature: {err}")))?;
        return Ok(signature.to_der().as_bytes().to_vec());
    }
    // Signers backed by ASN.1-native APIs return DER directly.
    EcdsaSignature::from_der(signature)
        .map(|_| signature.to_vec())
        .map_err(|err| SxgError::encoding(format!("invalid signature encoding: {err}")))
}
