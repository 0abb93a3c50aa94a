//! Merkle Integrity Content Encoding (`mi-sha256-03`).
//!
//! The payload of a signed exchange is framed into fixed-size records with a
//! chained SHA-256 proof interleaved between them, so a client can verify a
//! prefix of the body before the whole transfer completes. The integrity
//! digest embedded in the signature header is the proof of the first record.

use sha2::{Digest, Sha256};

/// Record size used for exchange payloads.
pub(crate) const RECORD_SIZE: u64 = 16384;

/// Frames `input` into the `mi-sha256-03` encoding.
///
/// Returns `(digest, encoded)` where `digest` is the top-level integrity
/// proof and `encoded` is the complete encoded payload, starting with the
/// 8-byte record size.
pub(crate) fn calculate(input: &[u8], record_size: u64) -> (Vec<u8>, Vec<u8>) {
    assert!(record_size > 0, "record size must be positive");

    let mut encoded = record_size.to_be_bytes().to_vec();
    if input.is_empty() {
        // A zero-length payload encodes as the bare record size and digests
        // a single zero octet.
        let digest = Sha256::digest([0u8]).to_vec();
        return (digest, encoded);
    }

    let records: Vec<&[u8]> = input.chunks(record_size as usize).collect();

    // Proofs chain from the final record back to the first.
    let mut proofs: Vec<Vec<u8>> = vec![Vec::new(); records.len()];
    for (i, record) in records.iter().enumerate().rev() {
        let mut hasher = Sha256::new();
        hasher.update(record);
        if i + 1 < records.len() {
            hasher.update(&proofs[i + 1]);
            hasher.update([1u8]);
        } else {
            hasher.update([0u8]);
        }
        proofs[i] = hasher.finalize().to_vec();
    }

    encoded.reserve(input.len() + 32 * (records.len() - 1));
    encoded.extend_from_slice(records[0]);
    for (record, proof) in records[1..].iter().zip(&proofs[1..]) {
        encoded.extend_from_slice(proof);
        encoded.extend_from_slice(record);
    }

    (proofs.swap_remove(0), encoded)
}
