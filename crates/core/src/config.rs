//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an [`SxgEngine`](crate::SxgEngine).
///
/// The certificate identity and debug flag are supplied here, at
/// construction time, rather than being compiled into the engine; this keeps
/// the engine testable with synthetic identities.
#[derive(Debug, Clone, derive_builder::Builder, Serialize, Deserialize)]
#[builder(pattern = "owned", setter(into))]
pub struct SxgConfig {
    /// DER-encoded end-entity certificate the exchanges are signed under.
    pub cert_der: Vec<u8>,
    /// DER-encoded certificate of the issuer of `cert_der`.
    pub issuer_der: Vec<u8>,
    /// Absolute HTTPS URL where the cert-chain CBOR for this identity is
    /// served.
    pub cert_url: String,
    /// Absolute HTTPS URL of the signature validity data.
    pub validity_url: String,
    /// Host the preset demonstration content is keyed under.
    pub html_host: String,
    /// Whether responses include auxiliary debug fields.
    #[builder(default)]
    #[serde(default)]
    pub respond_debug_info: bool,
}

impl SxgConfig {
    /// Creates a new builder for `SxgConfig`.
    pub fn builder() -> SxgConfigBuilder {
        SxgConfigBuilder::default()
    }
}
