//! Defines fundamental types used throughout the crate.

use sha2::{Digest, Sha256};

/// Token content.
pub type Token = Vec<u8>;

/// Token identifier.
pub type TokenId = u32;

/// State id.
pub type StateId = u32;

/// Stable content hash identifying a grammar or a vocabulary, used as a cache key part.
///
/// Rendered as a lowercase hex SHA-256 digest, identical across processes and platforms.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature(String);

impl Signature {
    /// Hashes a sequence of byte chunks. Every chunk is length-prefixed, so `["ab", "c"]`
    /// and `["a", "bc"]` produce different signatures.
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
