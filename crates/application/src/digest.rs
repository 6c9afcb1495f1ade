use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Returns the lowercase hex SHA-256 digest of `value`.
pub(crate) fn sha256_hex(value: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value);

    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}
