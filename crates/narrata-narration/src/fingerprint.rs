//! Cache fingerprints.
//!
//! A fingerprint identifies "this text, narrated by this voice, at this
//! rate". It is the sole cache key: identical (text, voice, rate) triples
//! always collide onto the same entry, anything else never does. SHA-256
//! over the full tuple — a truncated or language-level hash invites
//! collisions between unrelated paragraphs sharing one cached sound.

use std::fmt;

use sha2::{Digest, Sha256};

/// Cache key derived from (text, voice, rate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint for a narration request.
    ///
    /// Fields are NUL-separated before hashing so that boundary-shifted
    /// inputs (`"ab" + "c"` vs `"a" + "bc"`) cannot produce the same digest.
    #[must_use]
    pub fn compute(text: &str, voice_id: &str, rate_percent: i32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
        hasher.update(voice_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(rate_percent.to_le_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    /// Short hex prefix — enough to correlate log lines, not the full digest.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
