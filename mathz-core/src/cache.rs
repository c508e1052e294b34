//! Bounded memoization around the pure [`Classifier`].
//!
//! Entries are keyed by an xxHash64 of the raw text and store the text
//! itself, so a hash collision degrades to a recomputation instead of a
//! wrong answer. Observable output is identical with or without the cache.

use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use twox_hash::XxHash64;

use crate::classifier::Classifier;
use crate::types::ClassificationResult;

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the classifier.
    pub misses: u64,
    /// Current number of cached entries.
    pub len: usize,
}

struct CacheInner {
    entries: LruCache<u64, (String, ClassificationResult)>,
    hits: u64,
    misses: u64,
}

/// A [`Classifier`] with an LRU cache in front of it.
///
/// Cloning shares both the classifier and the cache.
#[derive(Clone)]
pub struct CachedClassifier {
    classifier: Arc<Classifier>,
    inner: Option<Arc<Mutex<CacheInner>>>,
}

impl std::fmt::Debug for CachedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedClassifier")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(text.as_bytes());
    hasher.finish()
}

impl CachedClassifier {
    /// Wrap a classifier with a cache of `capacity` entries.
    ///
    /// A capacity of zero disables caching; every call goes straight to
    /// the classifier.
    #[must_use]
    pub fn new(classifier: Classifier, capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|cap| {
            Arc::new(Mutex::new(CacheInner {
                entries: LruCache::new(cap),
                hits: 0,
                misses: 0,
            }))
        });
        Self {
            classifier: Arc::new(classifier),
            inner,
        }
    }

    /// Classify, answering from the cache when the same text was seen.
    #[must_use]
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let Some(inner) = &self.inner else {
            return self.classifier.classify(text);
        };

        let key = content_hash(text);
        {
            let mut guard = inner.lock();
            if let Some((cached_text, result)) = guard.entries.get(&key)
                && cached_text == text
            {
                let result = result.clone();
                guard.hits += 1;
                return result;
            }
            guard.misses += 1;
        }

        // Classify outside the lock; concurrent misses on the same text
        // compute the same value, so the last write wins harmlessly.
        let result = self.classifier.classify(text);
        inner
            .lock()
            .entries
            .put(key, (text.to_string(), result.clone()));
        result
    }

    /// The wrapped classifier.
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Current counters. All zero when caching is disabled.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.as_ref().map_or_else(CacheStats::default, |inner| {
            let guard = inner.lock();
            CacheStats {
                hits: guard.hits,
                misses: guard.misses,
                len: guard.entries.len(),
            }
        })
    }

    /// Drop every cached entry (counters are kept).
    pub fn clear(&self) {
        if let Some(inner) = &self.inner {
            inner.lock().entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;

    fn cached(capacity: usize) -> CachedClassifier {
        let classifier = Classifier::new(&ClassifierConfig::default()).expect("classifier");
        CachedClassifier::new(classifier, capacity)
    }

    #[test]
    fn repeated_text_hits_cache() {
        let cache = cached(8);
        let first = cache.classify("Resolva a equação: 2x + 5 = 13");
        let second = cache.classify("Resolva a equação: 2x + 5 = 13");
        assert_eq!(first, second);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.len, 1);
    }

    #[test]
    fn cached_output_matches_uncached() {
        let cache = cached(8);
        let text = "Calcule sen(30°) em um triângulo retângulo";
        let _ = cache.classify(text);
        assert_eq!(cache.classify(text), cache.classifier().classify(text));
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = cached(2);
        cache.classify("1 + 1");
        cache.classify("2 + 2");
        cache.classify("3 + 3");
        assert_eq!(cache.stats().len, 2);
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let cache = cached(0);
        cache.classify("1 + 1");
        cache.classify("1 + 1");
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn clones_share_entries() {
        let a = cached(4);
        let b = a.clone();
        a.classify("5 * 5");
        b.classify("5 * 5");
        assert_eq!(b.stats().hits, 1);
    }
}
