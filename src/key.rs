//! # Checkout Keys
//!
//! A [`CheckoutKey`] identifies one materialized working directory. It is the
//! SHA-256 digest of the repository, the revision, and the variant tags, and
//! doubles as the directory name under the pool's base directory.
//!
//! Keys are stable across process restarts and machines: the variant tags are
//! kept sorted, and every field is length-prefixed before hashing so that no
//! two distinct inputs share an encoding.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Domain separator mixed into every key.
const KEY_DOMAIN: &[u8] = b"checkout-pool/v1";

/// Variant tags that isolate otherwise identical checkouts.
///
/// Tags are stored sorted by name, so the order in which they are supplied
/// does not matter. Setting the same tag twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variant {
    tags: BTreeMap<String, String>,
}

impl Variant {
    /// An empty variant (the shared checkout of a revision).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style tag insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(name.into(), value.into());
    }

    /// Parses `key=value` strings as given on the command line.
    pub fn parse_tags<S: AsRef<str>>(tags: &[S]) -> Result<Self> {
        let mut variant = Self::new();
        for tag in tags {
            let tag = tag.as_ref();
            match tag.split_once('=') {
                Some((name, value)) if !name.is_empty() => variant.insert(name, value),
                _ => {
                    return Err(Error::InvalidVariant {
                        input: tag.to_string(),
                    })
                }
            }
        }
        Ok(variant)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variant {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut variant = Self::new();
        for (k, v) in iter {
            variant.insert(k, v);
        }
        variant
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Opaque, fixed-length identifier of a checkout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckoutKey([u8; 32]);

impl CheckoutKey {
    /// Derives the key for a (repository, revision, variant) triple.
    pub fn derive(repository: &str, revision: &str, variant: &Variant) -> Self {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, KEY_DOMAIN);
        update_field(&mut hasher, repository.as_bytes());
        update_field(&mut hasher, revision.as_bytes());
        hasher.update((variant.len() as u64).to_le_bytes());
        for (name, value) in variant.iter() {
            update_field(&mut hasher, name.as_bytes());
            update_field(&mut hasher, value.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The directory name used on disk.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl fmt::Display for CheckoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CheckoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CheckoutKey({})", self.short())
    }
}

impl FromStr for CheckoutKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::InvalidKey {
            input: s.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for CheckoutKey {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
