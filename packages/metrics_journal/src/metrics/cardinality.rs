use std::fmt::{Debug, Display, Write as _};
use std::hash::Hash;

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;

use crate::Metric;

/// The number of most frequent keys listed in the value unless configured otherwise.
const DEFAULT_TOP_N: usize = 5;

/// Counts how often each distinct key has been observed.
///
/// The value reports the number of distinct keys and lists the most frequent ones with
/// their quantities, most frequent first. Keys with equal quantities are listed in the
/// order of their rendering, so the value is deterministic for a given set of
/// observations.
///
/// The value is rendered on a single line, e.g.
/// `General number of unique elements: 3; 2 most frequent: GET (quantity: 7), PUT (quantity: 2)`.
///
/// # Example
///
/// ```
/// use metrics_journal::{Cardinality, Metric};
///
/// let methods = Cardinality::new(2);
///
/// methods.observe("GET");
/// methods.observe_many("GET", 6);
/// methods.observe("PUT");
/// methods.observe("DELETE");
/// methods.observe("PUT");
///
/// assert_eq!(methods.unique_count(), 3);
/// assert_eq!(
///     methods.value_as_string(),
///     "General number of unique elements: 3; 2 most frequent: GET (quantity: 7), PUT (quantity: 2)"
/// );
/// ```
#[derive(Debug)]
pub struct Cardinality<K> {
    top_n: usize,
    observed: Mutex<HashMap<K, u64>>,
}

impl<K> Cardinality<K>
where
    K: Hash + Eq + Display + Clone + Send + Sync + 'static,
{
    const NAME: &'static str = "\"CardinalityValue\"";

    /// Creates a metric that lists the `top_n` most frequent keys in its value.
    #[must_use]
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            observed: Mutex::new(HashMap::new()),
        }
    }

    /// Records one occurrence of `key`.
    pub fn observe(&self, key: K) {
        self.observe_many(key, 1);
    }

    /// Records `count` occurrences of `key`.
    pub fn observe_many(&self, key: K, count: u64) {
        let mut observed = self.observed.lock();

        let quantity = observed.entry(key).or_insert(0);
        *quantity = quantity.saturating_add(count);
    }

    /// The number of distinct keys observed since construction or the last reset.
    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.observed.lock().len()
    }

    /// How many times `key` has been observed.
    #[must_use]
    pub fn quantity(&self, key: &K) -> u64 {
        self.observed.lock().get(key).copied().unwrap_or(0)
    }

    /// The most frequent keys with their quantities, most frequent first.
    #[must_use]
    pub fn top(&self) -> Vec<(K, u64)> {
        self.snapshot().1
    }

    /// The number of distinct keys and the top keys, taken under one lock.
    fn snapshot(&self) -> (usize, Vec<(K, u64)>) {
        let observed = self.observed.lock();

        // Each key is rendered once up front instead of inside the comparator.
        let mut ranked = observed
            .iter()
            .map(|(key, quantity)| (key.to_string(), key.clone(), *quantity))
            .collect::<Vec<_>>();

        let unique_count = observed.len();
        drop(observed);

        ranked.sort_unstable_by(|(a_label, _, a_quantity), (b_label, _, b_quantity)| {
            b_quantity.cmp(a_quantity).then_with(|| a_label.cmp(b_label))
        });

        let top = ranked
            .into_iter()
            .take(self.top_n)
            .map(|(_, key, quantity)| (key, quantity))
            .collect();

        (unique_count, top)
    }
}

impl<K> Default for Cardinality<K>
where
    K: Hash + Eq + Display + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl<K> Metric for Cardinality<K>
where
    K: Hash + Eq + Display + Debug + Clone + Send + Sync + 'static,
{
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn name(&self) -> &str {
        Self::NAME
    }

    fn value_as_string(&self) -> String {
        let (unique_count, top) = self.snapshot();

        let mut value = format!(
            "General number of unique elements: {unique_count}; {} most frequent: ",
            self.top_n
        );

        for (i, (key, quantity)) in top.iter().enumerate() {
            if i > 0 {
                value.push_str(", ");
            }

            // Writing to a String cannot fail.
            _ = write!(value, "{key} (quantity: {quantity})");
        }

        value
    }

    fn evaluate(&self) {}

    fn reset(&self) {
        self.observed.lock().clear();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Capability;

    assert_impl_all!(Cardinality<String>: Send, Sync);
    assert_impl_all!(Cardinality<u32>: Send, Sync);

    #[test]
    fn has_fixed_name() {
        assert_eq!(Cardinality::<u32>::new(3).name(), "\"CardinalityValue\"");
    }

    #[test]
    fn empty_lists_nothing() {
        let cardinality = Cardinality::<u32>::new(3);

        assert_eq!(
            cardinality.value_as_string(),
            "General number of unique elements: 0; 3 most frequent: "
        );
    }

    #[test]
    fn counts_distinct_keys() {
        let cardinality = Cardinality::new(10);

        for key in [1, 2, 2, 3, 3, 3] {
            cardinality.observe(key);
        }

        assert_eq!(cardinality.unique_count(), 3);
        assert_eq!(cardinality.quantity(&3), 3);
        assert_eq!(cardinality.quantity(&4), 0);
    }

    #[test]
    fn top_is_limited_and_ordered() {
        let cardinality = Cardinality::new(2);

        cardinality.observe_many("rare".to_string(), 1);
        cardinality.observe_many("common".to_string(), 10);
        cardinality.observe_many("medium".to_string(), 5);

        let top = cardinality.top();

        assert_eq!(
            top,
            vec![("common".to_string(), 10), ("medium".to_string(), 5)]
        );
    }

    #[test]
    fn ties_are_ordered_by_rendering() {
        let cardinality = Cardinality::new(3);

        cardinality.observe('c');
        cardinality.observe('a');
        cardinality.observe('b');

        assert_eq!(
            cardinality.value_as_string(),
            "General number of unique elements: 3; 3 most frequent: a (quantity: 1), b (quantity: 1), c (quantity: 1)"
        );
    }

    #[test]
    fn top_larger_than_population_lists_everything() {
        let cardinality = Cardinality::new(100);
        cardinality.observe(7_u8);

        assert_eq!(cardinality.top(), vec![(7, 1)]);
    }

    #[test]
    fn reset_clears_everything() {
        let cardinality = Cardinality::new(2);
        cardinality.observe("x");

        cardinality.reset();
        cardinality.reset();

        assert_eq!(cardinality.unique_count(), 0);
        assert_eq!(
            cardinality.value_as_string(),
            Cardinality::<&str>::new(2).value_as_string()
        );
    }

    #[test]
    fn default_lists_five() {
        let cardinality = Cardinality::<u8>::default();

        assert!(cardinality.value_as_string().contains("; 5 most frequent: "));
    }

    #[test]
    fn carries_only_root_capability() {
        let capabilities = Cardinality::<u8>::new(1).capabilities();

        assert!(capabilities.carries(Capability::Default));
        assert!(!capabilities.carries(Capability::Algo));
    }

    #[cfg_attr(miri, ignore)] // Too slow under Miri.
    #[test]
    fn concurrent_observations_are_not_lost() {
        const THREADS: u64 = 8;
        const OBSERVATIONS_PER_THREAD: u64 = 1_000;

        let cardinality = Arc::new(Cardinality::new(4));

        let handles = (0..THREADS)
            .map(|_| {
                let cardinality = Arc::clone(&cardinality);
                thread::spawn(move || {
                    for i in 0..OBSERVATIONS_PER_THREAD {
                        cardinality.observe(i % 4);
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cardinality.unique_count(), 4);
        for key in 0..4 {
            assert_eq!(cardinality.quantity(&key), THREADS * OBSERVATIONS_PER_THREAD / 4);
        }
    }
}
