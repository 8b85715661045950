//! Host-fair URL batching.
//!
//! URLs are grouped by host, the groups are interleaved largest-first so
//! requests to the same host are spread as far apart as possible, and the
//! interleaved sequence is cut into fixed-size batches.

use std::collections::{HashMap, VecDeque};

use crate::error::{Result, ScrapeError};
use crate::urls::host_of;

/// Interleave URLs by host: round `i` emits the `i`-th URL of every host
/// group, groups ordered by descending size.
///
/// Groups of equal size keep the order in which their host first appeared,
/// but callers should treat that tie order as implementation-defined.
pub fn order_urls<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&str>> = Vec::new();

    for url in urls {
        let url = url.as_ref();
        let slot = *index.entry(host_of(url)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(url);
    }

    // Stable sort, so ties stay in first-seen order
    groups.sort_by(|a, b| b.len().cmp(&a.len()));

    let rounds = groups.first().map_or(0, Vec::len);
    let mut ordered = Vec::with_capacity(urls.len());
    for i in 0..rounds {
        for group in &groups {
            if let Some(url) = group.get(i) {
                ordered.push((*url).to_string());
            }
        }
    }
    ordered
}

/// Front-to-back queue of URL batches. Built once, consumed by [`pop`],
/// not reusable after exhaustion.
///
/// [`pop`]: BatchQueue::pop
#[derive(Debug, Clone)]
pub struct BatchQueue {
    batches: VecDeque<Vec<String>>,
    total: usize,
    batch_index: usize,
}

impl BatchQueue {
    /// Order `urls` by host and slice them into batches of `batch_size`
    /// (the last batch may be shorter). A zero batch size is treated as 1.
    pub fn build<S: AsRef<str>>(urls: &[S], batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let batches: VecDeque<Vec<String>> = order_urls(urls)
            .chunks(batch_size)
            .map(<[String]>::to_vec)
            .collect();

        Self {
            total: batches.len(),
            batches,
            batch_index: 1,
        }
    }

    /// Remove and return the next batch.
    ///
    /// Popping an exhausted queue is a caller bug; check [`remaining`]
    /// first.
    ///
    /// [`remaining`]: BatchQueue::remaining
    pub fn pop(&mut self) -> Result<Vec<String>> {
        let batch = self.batches.pop_front().ok_or(ScrapeError::QueueExhausted)?;
        self.batch_index += 1;
        Ok(batch)
    }

    /// Unconsumed batches.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }

    /// Batches at creation time.
    pub fn total(&self) -> usize {
        self.total
    }

    /// 1-based number of the next batch `pop` will return.
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl Iterator for BatchQueue {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(spec: &[(&str, usize)]) -> Vec<String> {
        spec.iter()
            .flat_map(|(host, n)| (1..=*n).map(move |i| format!("https://{host}/p{i}")))
            .collect()
    }

    #[test]
    fn test_largest_group_first_interleave() {
        let input = vec![
            "https://a.com/1",
            "https://a.com/2",
            "https://a.com/3",
            "https://b.com/1",
        ];
        assert_eq!(
            order_urls(&input),
            vec!["https://a.com/1", "https://b.com/1", "https://a.com/2", "https://a.com/3"]
        );
    }

    #[test]
    fn test_smaller_group_listed_first_still_follows_larger() {
        let input = vec!["https://b.com/1", "https://a.com/1", "https://a.com/2"];
        assert_eq!(
            order_urls(&input),
            vec!["https://a.com/1", "https://b.com/1", "https://a.com/2"]
        );
    }

    #[test]
    fn test_batches_are_permutation_with_full_sizes() {
        let input = urls(&[("a.com", 7), ("b.com", 4), ("c.com", 2), ("d.com", 1)]);
        let queue = BatchQueue::build(&input, 3);
        assert_eq!(queue.total(), 5);

        let batches: Vec<Vec<String>> = queue.collect();
        let last = batches.len() - 1;
        for (i, batch) in batches.iter().enumerate() {
            if i < last {
                assert_eq!(batch.len(), 3);
            } else {
                assert!(!batch.is_empty() && batch.len() <= 3);
            }
        }

        let mut flat: Vec<String> = batches.into_iter().flatten().collect();
        let mut expected = input.clone();
        flat.sort();
        expected.sort();
        assert_eq!(flat, expected);
    }

    #[test]
    fn test_no_back_to_back_host_when_avoidable() {
        let input = urls(&[("a.com", 3), ("b.com", 3), ("c.com", 2)]);
        let ordered = order_urls(&input);
        for pair in ordered.windows(2) {
            assert_ne!(host_of(&pair[0]), host_of(&pair[1]));
        }
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<String> = vec![];
        let mut queue = BatchQueue::build(&empty, 10);
        assert!(queue.is_empty());
        assert_eq!(queue.remaining(), 0);
        assert_eq!(queue.total(), 0);
        assert!(matches!(queue.pop(), Err(ScrapeError::QueueExhausted)));
    }

    #[test]
    fn test_pop_updates_counters() {
        let input = urls(&[("a.com", 5)]);
        let mut queue = BatchQueue::build(&input, 2);
        assert_eq!((queue.remaining(), queue.total(), queue.batch_index()), (3, 3, 1));

        let first = queue.pop().unwrap();
        assert_eq!(first, vec!["https://a.com/p1", "https://a.com/p2"]);
        assert_eq!((queue.remaining(), queue.batch_index()), (2, 2));

        queue.pop().unwrap();
        let last = queue.pop().unwrap();
        assert_eq!(last, vec!["https://a.com/p5"]);
        assert_eq!(queue.remaining(), 0);
        assert!(queue.pop().is_err());
        assert_eq!(queue.total(), 3);
    }
}
