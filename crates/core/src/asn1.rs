//! Minimal DER encoding and decoding.
//!
//! Only the small subset needed here: writing OCSP requests and synthetic
//! certificates, and walking an X.509 certificate far enough to extract the
//! serial number, subject name and public key.

pub(crate) const TAG_INTEGER: u8 = 0x02;
pub(crate) const TAG_BIT_STRING: u8 = 0x03;
pub(crate) const TAG_OCTET_STRING: u8 = 0x04;
pub(crate) const TAG_NULL: u8 = 0x05;
pub(crate) const TAG_OID: u8 = 0x06;
pub(crate) const TAG_SEQUENCE: u8 = 0x30;
pub(crate) const TAG_CONTEXT_0: u8 = 0xa0;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_SET: u8 = 0x31;

/// 2.16.840.1.101.3.4.2.1 (SHA-256)
pub(crate) const OID_SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
/// 1.2.840.10045.2.1 (id-ecPublicKey)
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
/// 1.2.840.10045.3.1.7 (prime256v1)
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
/// 1.2.840.10045.4.3.2 (ecdsa-with-SHA256)
const OID_ECDSA_WITH_SHA256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
/// 2.5.4.3 (commonName)
const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];

/// DER structure error.
#[derive(Debug, thiserror::Error)]
#[error("der error: {0}")]
pub(crate) struct DerError(&'static str);

/// Encodes a TLV with the given tag.
pub(crate) fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    append_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

/// Encodes a SEQUENCE of already-encoded children.
pub(crate) fn sequence(children: &[Vec<u8>]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &children.concat())
}

fn append_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

/// A parsed DER element.
pub(crate) struct Element<'a> {
    pub(crate) tag: u8,
    /// The complete TLV, including tag and length octets.
    pub(crate) raw: &'a [u8],
    pub(crate) content: &'a [u8],
}

/// Cursor over a run of DER elements.
pub(crate) struct Reader<'a> {
    input: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Reads the next element.
    pub(crate) fn read(&mut self) -> Result<Element<'a>, DerError> {
        let start = self.input;
        let (&tag, rest) = self.input.split_first().ok_or(DerError("unexpected end"))?;
        if tag & 0x1f == 0x1f {
            return Err(DerError("multi-byte tags are not supported"));
        }
        let (&first, rest) = rest.split_first().ok_or(DerError("unexpected end"))?;
        let (len, rest) = if first < 0x80 {
            (first as usize, rest)
        } else {
            let count = (first & 0x7f) as usize;
            if count == 0 || count > core::mem::size_of::<usize>() {
                return Err(DerError("unsupported length encoding"));
            }
            if rest.len() < count {
                return Err(DerError("unexpected end"));
            }
            let (len_bytes, rest) = rest.split_at(count);
            if len_bytes[0] == 0 {
                return Err(DerError("non-minimal length encoding"));
            }
            let mut len = 0usize;
            for &b in len_bytes {
                len = (len << 8) | b as usize;
            }
            if len < 0x80 {
                return Err(DerError("non-minimal length encoding"));
            }
            (len, rest)
        };
        if rest.len() < len {
            return Err(DerError("content exceeds input"));
        }
        let (content, remainder) = rest.split_at(len);
        let raw_len = start.len() - remainder.len();
        self.input = remainder;
        Ok(Element {
            tag,
            raw: &start[..raw_len],
            content,
        })
    }

    /// Reads the next element, requiring the given tag.
    pub(crate) fn expect(&mut self, tag: u8) -> Result<Element<'a>, DerError> {
        let element = self.read()?;
        if element.tag != tag {
            return Err(DerError("unexpected tag"));
        }
        Ok(element)
    }
}

/// The certificate fields the engine needs.
pub(crate) struct CertificateFields<'a> {
    /// Content octets of the serialNumber INTEGER.
    pub(crate) serial: &'a [u8],
    /// The subject Name, as its complete DER encoding.
    pub(crate) subject_raw: &'a [u8],
    /// The subjectPublicKey BIT STRING payload, without the unused-bits
    /// octet.
    pub(crate) public_key: &'a [u8],
}

/// Walks an X.509 certificate, extracting the fields used for OCSP CertID
/// construction. Signatures are not checked.
pub(crate) fn parse_certificate(der: &[u8]) -> Result<CertificateFields<'_>, DerError> {
    let mut outer = Reader::new(der);
    let certificate = outer.expect(TAG_SEQUENCE)?;
    if !outer.is_empty() {
        return Err(DerError("trailing data after certificate"));
    }

    let mut certificate = Reader::new(certificate.content);
    let tbs = certificate.expect(TAG_SEQUENCE)?;

    let mut tbs = Reader::new(tbs.content);
    let mut element = tbs.read()?;
    if element.tag == TAG_CONTEXT_0 {
        // version, present in v2/v3 certificates
        element = tbs.read()?;
    }
    if element.tag != TAG_INTEGER {
        return Err(DerError("missing serial number"));
    }
    let serial = element.content;

    tbs.expect(TAG_SEQUENCE)?; // signature algorithm
    tbs.expect(TAG_SEQUENCE)?; // issuer
    tbs.expect(TAG_SEQUENCE)?; // validity
    let subject = tbs.expect(TAG_SEQUENCE)?;
    let spki = tbs.expect(TAG_SEQUENCE)?;

    let mut spki = Reader::new(spki.content);
    spki.expect(TAG_SEQUENCE)?; // algorithm
    let key = spki.expect(TAG_BIT_STRING)?;
    let (&unused_bits, public_key) = key
        .content
        .split_first()
        .ok_or(DerError("empty public key"))?;
    if unused_bits != 0 {
        return Err(DerError("public key has unused bits"));
    }

    Ok(CertificateFields {
        serial,
        subject_raw: subject.raw,
        public_key,
    })
}

/// Builds a synthetic X.509 certificate carrying the given serial, names
/// and uncompressed P-256 public point.
///
/// Field structure is real so [`parse_certificate`] and OCSP CertID
/// construction work on it, but the outer signature is a placeholder; the
/// engine never verifies certificate signatures.
pub(crate) fn certificate(
    serial: &[u8],
    issuer_cn: &str,
    subject_cn: &str,
    public_point: &[u8],
) -> Vec<u8> {
    let version = tlv(TAG_CONTEXT_0, &tlv(TAG_INTEGER, &[0x02]));
    let signature_algorithm = sequence(&[tlv(TAG_OID, OID_ECDSA_WITH_SHA256)]);
    let validity = sequence(&[
        tlv(TAG_UTC_TIME, b"200101000000Z"),
        tlv(TAG_UTC_TIME, b"350101000000Z"),
    ]);
    let mut key_bits = vec![0u8];
    key_bits.extend_from_slice(public_point);
    let spki = sequence(&[
        sequence(&[tlv(TAG_OID, OID_EC_PUBLIC_KEY), tlv(TAG_OID, OID_PRIME256V1)]),
        tlv(TAG_BIT_STRING, &key_bits),
    ]);
    let tbs = sequence(&[
        version,
        tlv(TAG_INTEGER, serial),
        signature_algorithm.clone(),
        name(issuer_cn),
        validity,
        name(subject_cn),
        spki,
    ]);
    sequence(&[tbs, signature_algorithm, tlv(TAG_BIT_STRING, &[0x00])])
}

fn name(common_name: &str) -> Vec<u8> {
    sequence(&[tlv(
        TAG_SET,
        &sequence(&[
            tlv(TAG_OID, OID_COMMON_NAME),
            tlv(TAG_UTF8_STRING, common_name.as_bytes()),
        ]),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_lengths() {
        assert_eq!(tlv(TAG_OCTET_STRING, &[0xab]), vec![0x04, 0x01, 0xab]);

        let content = vec![0u8; 200];
        let encoded = tlv(TAG_OCTET_STRING, &content);
        assert_eq!(&encoded[..3], &[0x04, 0x81, 200]);
        assert_eq!(encoded.len(), 3 + 200);

        let content = vec![0u8; 300];
        let encoded = tlv(TAG_OCTET_STRING, &content);
        assert_eq!(&encoded[..4], &[0x04, 0x82, 0x01, 0x2c]);
    }

    #[test]
    fn test_reader_round_trip() {
        let encoded = sequence(&[
            tlv(TAG_INTEGER, &[0x05]),
            tlv(TAG_OCTET_STRING, &vec![0xcd; 130]),
        ]);
        let mut reader = Reader::new(&encoded);
        let seq = reader.expect(TAG_SEQUENCE).unwrap();
        assert!(reader.is_empty());

        let mut inner = Reader::new(seq.content);
        let int = inner.expect(TAG_INTEGER).unwrap();
        assert_eq!(int.content, &[0x05]);
        assert_eq!(int.raw, &[0x02, 0x01, 0x05]);
        let octets = inner.expect(TAG_OCTET_STRING).unwrap();
        assert_eq!(octets.content, &vec![0xcd; 130][..]);
        assert!(inner.is_empty());
    }

    #[test]
    fn test_reader_rejects_padded_long_form_length() {
        // 0x82 0x00 0xf0 encodes 240 in two bytes where one suffices.
        let mut encoded = vec![TAG_OCTET_STRING, 0x82, 0x00, 0xf0];
        encoded.extend_from_slice(&[0u8; 0xf0]);
        assert!(Reader::new(&encoded).read().is_err());

        let mut minimal = vec![TAG_OCTET_STRING, 0x81, 0xf0];
        minimal.extend_from_slice(&[0u8; 0xf0]);
        assert!(Reader::new(&minimal).read().is_ok());
    }

    #[test]
    fn test_reader_rejects_truncated_input() {
        let mut encoded = tlv(TAG_OCTET_STRING, &[1, 2, 3]);
        encoded.truncate(4);
        assert!(Reader::new(&encoded).read().is_err());
    }

    #[test]
    fn test_parse_certificate_fixture() {
        let (cert, _) = crate::fixtures::certificate_pair();
        let fields = parse_certificate(&cert).unwrap();
        assert!(!fields.serial.is_empty());
        assert_eq!(fields.subject_raw[0], TAG_SEQUENCE);
        // Uncompressed P-256 point.
        assert_eq!(fields.public_key.len(), 65);
        assert_eq!(fields.public_key[0], 0x04);
    }
}
