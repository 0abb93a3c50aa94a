//! Canonical CBOR encoding.
//!
//! The signed-exchange header block and the cert-chain format are CBOR, and
//! the header block is covered by the signature, so the encoding must be
//! byte-for-byte canonical: shortest-form argument encoding, and map entries
//! sorted by encoded key (length first, then bytewise).

/// A CBOR data item.
pub(crate) enum DataItem<'a> {
    ByteString(&'a [u8]),
    TextString(&'a str),
    Array(Vec<DataItem<'a>>),
    Map(Vec<(DataItem<'a>, DataItem<'a>)>),
}

impl DataItem<'_> {
    /// Serializes the item into its canonical form.
    pub(crate) fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.append_to(&mut out);
        out
    }

    fn append_to(&self, out: &mut Vec<u8>) {
        match self {
            DataItem::ByteString(bytes) => {
                append_header(2, bytes.len() as u64, out);
                out.extend_from_slice(bytes);
            }
            DataItem::TextString(text) => {
                append_header(3, text.len() as u64, out);
                out.extend_from_slice(text.as_bytes());
            }
            DataItem::Array(items) => {
                append_header(4, items.len() as u64, out);
                for item in items {
                    item.append_to(out);
                }
            }
            DataItem::Map(entries) => {
                append_header(5, entries.len() as u64, out);
                let mut encoded: Vec<(Vec<u8>, Vec<u8>)> = entries
                    .iter()
                    .map(|(key, value)| (key.serialize(), value.serialize()))
                    .collect();
                encoded.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
                for (key, value) in encoded {
                    out.extend_from_slice(&key);
                    out.extend_from_slice(&value);
                }
            }
        }
    }
}

// Shortest-form head: the argument is packed into the initial byte when it
// fits, otherwise into the smallest of 1, 2, 4 or 8 following bytes.
fn append_header(major_type: u8, value: u64, out: &mut Vec<u8>) {
    let major = major_type << 5;
    if value < 24 {
        out.push(major | value as u8);
    } else if value <= u8::MAX as u64 {
        out.push(major | 24);
        out.push(value as u8);
    } else if value <= u16::MAX as u64 {
        out.push(major | 25);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        out.push(major | 26);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(major | 27);
        out.extend_from_slice(&value.to_be_bytes());
    }
}
