// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Agent pre-shared key hashing.
//
// Agents authenticate with a long-lived installation key.  Only the SHA-256
// digest of that key is ever stored or compared; the raw secret never
// touches the database.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of an agent key as a lowercase hex string.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a presented key against a stored digest.
pub fn verify_key(presented: &str, stored_hash: &str) -> bool {
    hash_key(presented) == stored_hash
}
