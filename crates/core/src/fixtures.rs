//! Fixtures for testing the engine with synthetic identities.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use p256::ecdsa::{signature::Verifier as _, Signature as EcdsaSignature, VerifyingKey};

use crate::{
    asn1,
    config::SxgConfig,
    error::SxgError,
    exchange,
    signature::{LocalSigner, SignatureParams, Signer},
    SxgEngine,
};

const TEST_KEY: [u8; 32] = [
    0x1c, 0x77, 0x02, 0x9e, 0xb3, 0x4a, 0xd1, 0x65, 0xf8, 0x20, 0x9b, 0x3c, 0x54, 0xe1, 0x0d,
    0x72, 0x38, 0xcc, 0x61, 0x8f, 0x04, 0xde, 0x2a, 0x96, 0x5b, 0x13, 0xe4, 0x7f, 0xa0, 0x89,
    0x26, 0xd1,
];

const ISSUER_KEY: [u8; 32] = [
    0x62, 0x09, 0xe5, 0x3b, 0x18, 0xaf, 0x40, 0xc7, 0x2e, 0x94, 0x07, 0xd8, 0x6b, 0x31, 0xfa,
    0x4d, 0xb0, 0x5a, 0xc3, 0x26, 0x79, 0x0e, 0x88, 0x15, 0xf2, 0x4c, 0xa1, 0x3d, 0x97, 0x60,
    0x2b, 0x8e,
];

/// Returns a deterministic in-process signer matching the fixture
/// certificate.
pub fn local_signer() -> LocalSigner {
    LocalSigner::new(&TEST_KEY).expect("fixture key is a valid scalar")
}

/// Returns the verifying key of the preset content identity.
pub fn preset_verifying_key() -> VerifyingKey {
    crate::preset::preset_signer().verifying_key()
}

/// Builds a synthetic (end-entity, issuer) certificate pair.
///
/// The certificates carry real field structure (serial, names, P-256 keys)
/// but dummy outer signatures; the engine never verifies certificate
/// signatures.
pub fn certificate_pair() -> (Vec<u8>, Vec<u8>) {
    let leaf_point = local_signer()
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();
    let issuer_point = LocalSigner::new(&ISSUER_KEY)
        .expect("fixture key is a valid scalar")
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();

    let leaf = asn1::certificate(&[0x01, 0xb2, 0x9d], "sxg test ca", "signed.test", &leaf_point);
    let issuer = asn1::certificate(&[0x01], "sxg test root", "sxg test ca", &issuer_point);
    (leaf, issuer)
}

/// Returns an engine configuration using the fixture identity.
pub fn config() -> SxgConfig {
    let (cert_der, issuer_der) = certificate_pair();
    SxgConfig::builder()
        .cert_der(cert_der)
        .issuer_der(issuer_der)
        .cert_url("https://cdn.test/cert.cbor")
        .validity_url("https://signed.test/resource.validity")
        .html_host("signed.test")
        .build()
        .expect("all fields are set")
}

/// Returns an engine built from [`config`].
pub fn engine() -> SxgEngine {
    SxgEngine::new(config()).expect("fixture config is valid")
}

/// A signer that returns a fixed byte sequence.
pub struct FixedSigner(
    /// The bytes returned from every [`Signer::sign`] call.
    pub Vec<u8>,
);

#[async_trait::async_trait]
impl Signer for FixedSigner {
    async fn sign(
        &self,
        _message: &[u8],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0.clone())
    }
}

/// A signer that always fails.
pub struct FailingSigner;

#[async_trait::async_trait]
impl Signer for FailingSigner {
    async fn sign(
        &self,
        _message: &[u8],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Err("signing key unavailable".into())
    }
}

/// The fields recovered from a verified exchange body.
#[derive(Debug)]
pub struct VerifiedExchange {
    /// The fallback URL the exchange was produced for.
    pub fallback_url: String,
    /// Start of the validity window.
    pub date: u64,
    /// End of the validity window.
    pub expires: u64,
    /// The encoded response-header block covered by the signature.
    pub header_block: Vec<u8>,
    /// The framed payload.
    pub payload: Vec<u8>,
}

/// Parses an exchange body, reconstructs the canonical to-be-signed message
/// from its own fields, and checks the embedded signature against `key`.
///
/// This is an independent verification path: nothing from the encoding side
/// is reused except the message layout a real verifier would also have to
/// implement.
pub fn parse_and_verify(body: &[u8], key: &VerifyingKey) -> Result<VerifiedExchange, SxgError> {
    let parsed = exchange::parse(body)?;
    let header = parsed.signature;

    let cert_sha256 = BASE64_STANDARD
        .decode(byte_param(header, "cert-sha256")?)
        .map_err(|_| SxgError::encoding("cert-sha256 is not base64"))?;
    let signature = BASE64_STANDARD
        .decode(byte_param(header, "sig")?)
        .map_err(|_| SxgError::encoding("sig is not base64"))?;
    let cert_url = string_param(header, "cert-url")?;
    let validity_url = string_param(header, "validity-url")?;
    let params = SignatureParams {
        cert_url: &cert_url,
        cert_sha256: &cert_sha256,
        validity_url: &validity_url,
        date: integer_param(header, "date")?,
        expires: integer_param(header, "expires")?,
        request_url: parsed.fallback_url,
        header_block: parsed.header_block,
    };

    let signature = EcdsaSignature::from_der(&signature)
        .map_err(|_| SxgError::encoding("embedded signature is not ASN.1"))?;
    key.verify(&params.to_be_signed(), &signature)
        .map_err(|_| SxgError::encoding("signature verification failed"))?;

    Ok(VerifiedExchange {
        fallback_url: parsed.fallback_url.to_string(),
        date: params.date,
        expires: params.expires,
        header_block: parsed.header_block.to_vec(),
        payload: parsed.payload.to_vec(),
    })
}

fn byte_param<'a>(header: &'a str, name: &str) -> Result<&'a str, SxgError> {
    let missing = || SxgError::encoding(format!("missing signature parameter {name}"));
    let start = header.find(&format!("{name}=*")).ok_or_else(missing)? + name.len() + 2;
    let end = header[start..].find('*').ok_or_else(missing)?;
    Ok(&header[start..start + end])
}

fn string_param(header: &str, name: &str) -> Result<String, SxgError> {
    let missing = || SxgError::encoding(format!("missing signature parameter {name}"));
    let start = header.find(&format!("{name}=\"")).ok_or_else(missing)? + name.len() + 2;
    let end = header[start..].find('"').ok_or_else(missing)?;
    Ok(header[start..start + end].to_string())
}

fn integer_param(header: &str, name: &str) -> Result<u64, SxgError> {
    let missing = || SxgError::encoding(format!("missing signature parameter {name}"));
    let start = header.find(&format!("{name}=")).ok_or_else(missing)? + name.len() + 1;
    let end = header[start..]
        .find(';')
        .map(|i| start + i)
        .unwrap_or(header.len());
    header[start..end]
        .parse()
        .map_err(|_| SxgError::encoding(format!("signature parameter {name} is not an integer")))
}
