//! Deterministic text vectorization.
//!
//! Vectors produced here are a placeholder for real model embeddings: they are
//! derived from hashed tokens, so texts that share vocabulary point in similar
//! directions, but no semantic inference takes place.

use sha2::{Digest, Sha256};

use crate::config::DEFAULT_SALT;
use crate::error::{RassError, Result};

/// Converts text into fixed-dimension vectors.
///
/// Implementations must be pure: the same text always yields a bit-identical
/// vector of length [`dimensions`](Vectorizer::dimensions). Query-time and
/// embed-time vectorization must use the same implementation and dimension,
/// otherwise ranking is meaningless.
pub trait Vectorizer: Send + Sync {
    /// Generate the vector for a single text.
    fn vectorize(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of vectors produced by this vectorizer.
    fn dimensions(&self) -> usize;
}

/// A [`Vectorizer`] based on signed feature hashing of lower-cased tokens.
///
/// Each token is hashed with SHA-256 together with a salt. The first eight
/// bytes of the digest pick a bucket, the ninth byte picks a sign, and the
/// resulting counts are L2-normalized. Text without any alphanumeric token
/// maps to the zero vector.
///
/// # Example
///
/// ```rust
/// use rass_core::{HashVectorizer, Vectorizer};
///
/// let vectorizer = HashVectorizer::new(16).unwrap();
/// let a = vectorizer.vectorize("hello world").unwrap();
/// assert_eq!(a, vectorizer.vectorize("Hello, world!").unwrap());
/// assert_eq!(a.len(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct HashVectorizer {
    dimensions: usize,
    salt: String,
}

impl HashVectorizer {
    /// Create a vectorizer with the default salt.
    ///
    /// # Errors
    ///
    /// Returns [`RassError::Config`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        Self::with_salt(dimensions, DEFAULT_SALT)
    }

    /// Create a vectorizer with a custom salt.
    pub fn with_salt(dimensions: usize, salt: impl Into<String>) -> Result<Self> {
        if dimensions == 0 {
            return Err(RassError::Config("vector dimension must be greater than zero".into()));
        }
        Ok(Self { dimensions, salt: salt.into() })
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update([0u8]);
        hasher.update(token.as_bytes());
        let digest = hasher.finalize();

        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&digest[..8]);
        let index = (u64::from_be_bytes(index_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Vectorizer for HashVectorizer {
    fn vectorize(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let (index, sign) = self.bucket(&token);
            vector[index] += sign;
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Split text into lower-cased alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

/// L2-normalize in place. Zero vectors are left untouched.
fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
