//! Password digests
//!
//! Passwords are stored as a hex SHA-256 digest of `username:password`,
//! so two drivers with the same password get different digests.

use sha2::{Digest, Sha256};

pub fn hash_password(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(username: &str, password: &str, stored_hash: &str) -> bool {
    hash_password(username, password) == stored_hash
}
