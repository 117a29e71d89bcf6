//! Bounded speech cache.
//!
//! Maps a [`Fingerprint`] to decoded, ready-to-play audio. The cache is what
//! makes paragraph transitions instant: the pre-fetch worker fills it one
//! paragraph ahead of playback, so `speak()` almost never has to wait on the
//! synthesizer.
//!
//! Eviction is FIFO by insertion order — a `get` does not refresh recency.
//! The pipeline's access pattern is a moving window over consecutive
//! paragraphs, so insertion order and last-use order coincide except after a
//! rewind, and a rewound paragraph is cheap to re-synthesize.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use narrata_core::SpeechAudio;

use crate::fingerprint::Fingerprint;

/// Default number of cached paragraphs.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Bounded fingerprint → audio store shared by the pre-fetch worker and the
/// playback controller. All methods take `&self`; a single internal mutex
/// serialises access.
pub struct SpeechCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    map: HashMap<Fingerprint, Arc<SpeechAudio>>,
    order: VecDeque<Fingerprint>,
}

impl SpeechCache {
    /// Create a cache bounded at `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be at least 1");
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Look up cached audio. No effect on eviction order.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<SpeechAudio>> {
        self.lock().map.get(fingerprint).cloned()
    }

    /// Insert audio for a fingerprint.
    ///
    /// Overwriting an existing key keeps its original eviction slot.
    /// Inserting a new key beyond capacity evicts the oldest entry first.
    pub fn put(&self, fingerprint: Fingerprint, audio: Arc<SpeechAudio>) {
        let mut inner = self.lock();
        if inner.map.insert(fingerprint, audio).is_none() {
            inner.order.push_back(fingerprint);
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.map.remove(&oldest);
                    tracing::trace!(evicted = %oldest, "Speech cache evicted oldest entry");
                }
            }
        }
    }

    /// Drop every entry. Called when the active voice changes — cached audio
    /// is voice-specific and must not outlive the voice it was spoken in.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
        tracing::debug!("Speech cache cleared");
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned cache mutex would mean a panic mid-insert; the data is
        // best-effort, so recover rather than propagate.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn audio(marker: f32) -> Arc<SpeechAudio> {
        Arc::new(SpeechAudio {
            samples: vec![marker],
            sample_rate: 16_000,
            duration: Duration::from_millis(10),
        })
    }

    fn fp(n: u32) -> Fingerprint {
        Fingerprint::compute(&format!("paragraph {n}"), "voice", 0)
    }

    #[test]
    fn get_returns_what_put_stored() {
        let cache = SpeechCache::new(4);
        let asset = audio(1.0);
        cache.put(fp(1), Arc::clone(&asset));

        let hit = cache.get(&fp(1)).expect("entry should be present");
        assert!(Arc::ptr_eq(&hit, &asset));
        assert!(cache.get(&fp(2)).is_none());
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let cache = SpeechCache::new(3);
        for n in 0..20 {
            cache.put(fp(n), audio(f32::from(n as u8)));
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn overflow_evicts_the_first_inserted_entry() {
        let cache = SpeechCache::new(3);
        for n in 1..=4 {
            cache.put(fp(n), audio(0.0));
        }
        assert!(cache.get(&fp(1)).is_none(), "oldest entry must be evicted");
        assert!(cache.get(&fp(2)).is_some());
        assert!(cache.get(&fp(4)).is_some());
    }

    #[test]
    fn get_does_not_refresh_eviction_order() {
        let cache = SpeechCache::new(2);
        cache.put(fp(1), audio(0.0));
        cache.put(fp(2), audio(0.0));

        // Touch the oldest entry, then overflow: FIFO still evicts it.
        let _ = cache.get(&fp(1));
        cache.put(fp(3), audio(0.0));
        assert!(cache.get(&fp(1)).is_none());
        assert!(cache.get(&fp(2)).is_some());
    }

    #[test]
    fn overwrite_keeps_eviction_slot_and_size() {
        let cache = SpeechCache::new(2);
        cache.put(fp(1), audio(1.0));
        cache.put(fp(2), audio(2.0));
        cache.put(fp(1), audio(9.0));
        assert_eq!(cache.len(), 2);

        // fp(1) kept its original (oldest) slot, so it goes first.
        cache.put(fp(3), audio(3.0));
        assert!(cache.get(&fp(1)).is_none());
        assert!(cache.get(&fp(2)).is_some());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = SpeechCache::new(4);
        cache.put(fp(1), audio(0.0));
        cache.put(fp(2), audio(0.0));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&fp(1)).is_none());
    }
}
