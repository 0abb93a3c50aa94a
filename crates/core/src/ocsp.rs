//! OCSP request construction (RFC 6960).
//!
//! A signed exchange must embed a fresh proof that its certificate is not
//! revoked, so the engine produces the request for the caller to relay to
//! the issuer's OCSP responder. The request is unsigned and carries no
//! nonce, making it deterministic for a given certificate pair.

use sha2::{Digest, Sha256};

use crate::{
    asn1::{self, TAG_INTEGER, TAG_NULL, TAG_OCTET_STRING, TAG_OID},
    error::SxgError,
};

/// Builds a DER-encoded `OCSPRequest` asking for the status of the
/// end-entity certificate, identified by its serial number and SHA-256
/// hashes of the issuer's name and public key.
pub(crate) fn create_request(cert_der: &[u8], issuer_der: &[u8]) -> Result<Vec<u8>, SxgError> {
    let cert = asn1::parse_certificate(cert_der)
        .map_err(|err| SxgError::encoding(format!("malformed certificate: {err}")))?;
    let issuer = asn1::parse_certificate(issuer_der)
        .map_err(|err| SxgError::encoding(format!("malformed issuer certificate: {err}")))?;

    let issuer_name_hash = Sha256::digest(issuer.subject_raw);
    let issuer_key_hash = Sha256::digest(issuer.public_key);

    let hash_algorithm = asn1::sequence(&[
        asn1::tlv(TAG_OID, asn1::OID_SHA256),
        asn1::tlv(TAG_NULL, &[]),
    ]);
    let cert_id = asn1::sequence(&[
        hash_algorithm,
        asn1::tlv(TAG_OCTET_STRING, &issuer_name_hash),
        asn1::tlv(TAG_OCTET_STRING, &issuer_key_hash),
        asn1::tlv(TAG_INTEGER, cert.serial),
    ]);
    let request = asn1::sequence(&[cert_id]);
    let request_list = asn1::sequence(&[request]);
    let tbs_request = asn1::sequence(&[request_list]);
    Ok(asn1::sequence(&[tbs_request]))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        asn1::{Reader, TAG_SEQUENCE},
        error::SxgErrorKind,
        fixtures,
    };

    #[test]
    fn test_request_is_deterministic_and_nonempty() {
        let (cert, issuer) = fixtures::certificate_pair();
        let first = create_request(&cert, &issuer).unwrap();
        let second = create_request(&cert, &issuer).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_request_structure() {
        let (cert, issuer) = fixtures::certificate_pair();
        let request = create_request(&cert, &issuer).unwrap();

        // OCSPRequest > TBSRequest > requestList > Request > CertID
        let mut reader = Reader::new(&request);
        let ocsp_request = reader.expect(TAG_SEQUENCE).unwrap();
        assert!(reader.is_empty());
        let mut tbs = Reader::new(ocsp_request.content);
        let tbs_request = tbs.expect(TAG_SEQUENCE).unwrap();
        let mut list = Reader::new(tbs_request.content);
        let request_list = list.expect(TAG_SEQUENCE).unwrap();
        let mut req = Reader::new(request_list.content);
        let single = req.expect(TAG_SEQUENCE).unwrap();
        let mut cert_id = Reader::new(single.content);
        let cert_id = cert_id.expect(TAG_SEQUENCE).unwrap();

        let mut fields = Reader::new(cert_id.content);
        let algorithm = fields.expect(TAG_SEQUENCE).unwrap();
        assert!(algorithm
            .content
            .windows(asn1::OID_SHA256.len())
            .any(|w| w == asn1::OID_SHA256));

        let name_hash = fields.expect(TAG_OCTET_STRING).unwrap();
        let expected = Sha256::digest(
            asn1::parse_certificate(&issuer).unwrap().subject_raw,
        );
        assert_eq!(name_hash.content, expected.as_slice());

        let key_hash = fields.expect(TAG_OCTET_STRING).unwrap();
        assert_eq!(key_hash.content.len(), 32);

        let serial = fields.expect(TAG_INTEGER).unwrap();
        assert_eq!(
            serial.content,
            asn1::parse_certificate(&cert).unwrap().serial
        );
        assert!(fields.is_empty());
    }

    #[test]
    fn test_malformed_identity_is_encoding_error() {
        let (cert, _) = fixtures::certificate_pair();
        let err = create_request(&cert, b"not a certificate").unwrap_err();
        assert_eq!(err.kind(), SxgErrorKind::Encoding);
    }
}
