//! Checksum utilities for artifact fingerprinting

use sha2::{Digest, Sha256};

/// SHA-256 of an in-memory buffer, hex encoded
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
