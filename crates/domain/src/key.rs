//! Key derivation.
//!
//! `derive_key(layer, fingerprint)` hashes a canonical serialization of the
//! fingerprint with SHA-256. Every field is written as:
//!
//! ```text
//! name  0x00  tag  len(8 bytes, big endian)  value
//! ```
//!
//! where `tag` is `t` (text), `n` (number) or `-` (absent). The layer name is
//! the first field. Length prefixes keep `("a|b", "c")` and `("a", "b|c")`
//! apart, and the absent tag keeps `None` apart from `Some("")`.

use crate::fingerprint::{FieldValue, Fingerprint};
use crate::layer::CacheLayer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex digits in the hash portion of every key.
pub const KEY_HASH_HEX_LEN: usize = 64;

/// A derived cache key, `"<layer>:<sha256 hex>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(Box<str>);

impl CacheKey {
    /// Full key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Layer the key belongs to.
    #[must_use]
    pub fn layer(&self) -> Option<CacheLayer> {
        CacheLayer::ALL
            .into_iter()
            .find(|layer| layer.owns_key(&self.0))
    }

    /// Hash portion, without the layer prefix.
    #[must_use]
    pub fn digest(&self) -> &str {
        self.0
            .split_once(':')
            .map_or(self.0.as_ref(), |(_, digest)| digest)
    }

    /// Shortened form for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self.0.find(':').map_or(0, |colon| colon + 1 + 12);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

fn write_field(hasher: &mut Sha256, name: &str, value: FieldValue<'_>) {
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    match value {
        FieldValue::Text(text) => {
            hasher.update(b"t");
            hasher.update((text.len() as u64).to_be_bytes());
            hasher.update(text.as_bytes());
        },
        FieldValue::Number(number) => {
            hasher.update(b"n");
            hasher.update(8u64.to_be_bytes());
            hasher.update(number.to_be_bytes());
        },
        FieldValue::Absent => {
            hasher.update(b"-");
            hasher.update(0u64.to_be_bytes());
        },
    }
}

/// Derive the key for `fingerprint` in `layer`.
///
/// Pure and deterministic. Identical fingerprints always map to the same key;
/// a change in any field, or in the layer, changes it.
pub fn derive_key(layer: CacheLayer, fingerprint: &impl Fingerprint) -> CacheKey {
    let mut hasher = Sha256::new();
    write_field(&mut hasher, "layer", FieldValue::Text(layer.as_str()));
    for (name, value) in fingerprint.canonical_fields() {
        write_field(&mut hasher, name, value);
    }
    let digest = hasher.finalize();

    let mut key = String::with_capacity(layer.key_prefix().len() + KEY_HASH_HEX_LEN);
    key.push_str(layer.key_prefix());
    for byte in digest.iter() {
        key.push_str(&format!("{byte:02x}"));
    }
    CacheKey(key.into_boxed_str())
}
