//! Template fingerprints.
//!
//! Every stack record in the mirror stores the SHA-256 of the template body
//! it was last deployed with, so `status` can show which template revision
//! is live and updates can log whether the template changed.

use sha2::{Digest, Sha256};

/// Hasher for template bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateHasher;

impl TemplateHasher {
    /// Creates a new template hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hex SHA-256 of a template body.
    ///
    /// Line endings are normalised so a checkout on Windows hashes the same.
    #[must_use]
    pub fn hash_template(&self, body: &str) -> String {
        let mut hasher = Sha256::new();
        for line in body.lines() {
            hasher.update(line.trim_end_matches('\r').as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Returns the short form of a hash for display.
    #[must_use]
    pub fn short_hash(hash: &str) -> &str {
        hash.get(..8).unwrap_or(hash)
    }
}
