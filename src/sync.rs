//! Lockstep iteration over several keyed record streams.
//!
//! Streams describing the same events are positionally aligned: record `i` of
//! every stream belongs to event `i`. [`Lockstep`] advances all of them
//! together and yields one [`Joined`] record per position, ending as soon as
//! any stream runs out.

use std::iter::FusedIterator;

/// One aligned position across all streams, ordered by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined<K, T> {
    entries: Vec<(K, T)>,
}

impl<K: Ord, T> Joined<K, T> {
    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

impl<K, T> Joined<K, T> {
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> Vec<(K, T)> {
        self.entries
    }
}

/// Joins keyed iterators of `Result<T, E>` position by position.
///
/// Each step advances every cursor exactly once:
/// - all cursors produced a record: the joined record is yielded;
/// - any cursor is exhausted: iteration ends without a partial record;
/// - any cursor failed: the first error (in key order) is yielded, then
///   iteration ends.
///
/// With no streams the sequence is empty.
///
/// # Example
///
/// ```
/// use evskim::sync::Lockstep;
///
/// let a = vec![Ok::<_, ()>(1), Ok(2), Ok(3)];
/// let b = vec![Ok(10), Ok(20)];
/// let joined: Vec<_> = Lockstep::new(vec![("a", a.into_iter()), ("b", b.into_iter())])
///     .map(|r| r.unwrap().into_inner())
///     .collect();
/// assert_eq!(joined, vec![vec![("a", 1), ("b", 10)], vec![("a", 2), ("b", 20)]]);
/// ```
pub struct Lockstep<K, I> {
    cursors: Vec<(K, I)>,
    done: bool,
}

impl<K, I, T, E> Lockstep<K, I>
where
    K: Ord + Clone,
    I: Iterator<Item = Result<T, E>>,
{
    pub fn new(streams: impl IntoIterator<Item = (K, I)>) -> Self {
        let mut cursors: Vec<(K, I)> = streams.into_iter().collect();
        cursors.sort_by(|a, b| a.0.cmp(&b.0));
        let done = cursors.is_empty();
        Self { cursors, done }
    }

    /// Number of joined streams.
    pub fn width(&self) -> usize {
        self.cursors.len()
    }
}

impl<K, I, T, E> Iterator for Lockstep<K, I>
where
    K: Ord + Clone,
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<Joined<K, T>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut entries = Vec::with_capacity(self.cursors.len());
        let mut exhausted = false;
        let mut failure = None;
        for (key, cursor) in &mut self.cursors {
            match cursor.next() {
                Some(Ok(record)) => entries.push((key.clone(), record)),
                Some(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                None => exhausted = true,
            }
        }

        if let Some(e) = failure {
            self.done = true;
            return Some(Err(e));
        }
        if exhausted {
            self.done = true;
            return None;
        }
        Some(Ok(Joined { entries }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let upper = self
            .cursors
            .iter()
            .filter_map(|(_, c)| c.size_hint().1)
            .min();
        (0, upper)
    }
}

impl<K, I, T, E> FusedIterator for Lockstep<K, I>
where
    K: Ord + Clone,
    I: Iterator<Item = Result<T, E>>,
{
}
