//! Bounded-memory top-K selection over the raw item stream.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashSet};

use opmon_core::{Platform, RawItem};

use crate::filter::{ContentFilter, RejectReason};

/// Heap entry ordered by engagement, then by arrival (earlier ranks higher).
struct Ranked {
    score: u64,
    seq: u64,
    item: RawItem,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Counters collected over one reducer pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReducerStats {
    /// Every item offered to the reducer, valid or not.
    pub seen: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    /// Raw item count per platform, over everything seen.
    pub platform_counts: BTreeMap<Platform, usize>,
}

impl ReducerStats {
    #[must_use]
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Output of a reducer pass.
#[derive(Debug)]
pub struct Reduced {
    /// At most K items, descending engagement.
    pub items: Vec<RawItem>,
    pub stats: ReducerStats,
}

/// Cleans items and keeps the K most engaging ones in a min-heap.
pub struct StreamReducer<'a> {
    filter: &'a ContentFilter,
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
    /// Every `(platform, source_id)` that passed cleaning this pass.
    seen_ids: HashSet<(Platform, String)>,
    seq: u64,
    stats: ReducerStats,
}

/// What happened to an item offered to [`StreamReducer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Passed cleaning and is currently among the top K.
    Retained,
    /// Passed cleaning but did not beat the current minimum.
    Outranked,
    Rejected(RejectReason),
}

impl<'a> StreamReducer<'a> {
    #[must_use]
    pub fn new(filter: &'a ContentFilter, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            filter,
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
            seen_ids: HashSet::with_capacity(capacity),
            seq: 0,
            stats: ReducerStats::default(),
        }
    }

    /// Offer one item.
    ///
    /// The first cleaned occurrence of an id wins for the whole pass, even
    /// after it has been evicted from the top K.
    pub fn push(&mut self, item: RawItem) -> Admission {
        self.push_observed(item, |_| {})
    }

    /// Like [`push`](Self::push), calling `observe` on every item that
    /// passes cleaning, whether or not it ends up in the top K.
    pub fn push_observed(&mut self, item: RawItem, observe: impl FnOnce(&RawItem)) -> Admission {
        self.stats.seen += 1;
        *self.stats.platform_counts.entry(item.platform).or_default() += 1;

        if let Err(reason) = self.filter.check(&item) {
            return self.reject(reason);
        }

        if !self.seen_ids.insert((item.platform, item.source_id.clone())) {
            return self.reject(RejectReason::Duplicate);
        }
        observe(&item);

        let score = item.engagement_score();
        self.seq += 1;
        let entry = Ranked {
            score,
            seq: self.seq,
            item,
        };

        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return Admission::Retained;
        }

        let beats_min = self
            .heap
            .peek()
            .is_some_and(|Reverse(min)| score > min.score);
        if !beats_min {
            return Admission::Outranked;
        }

        self.heap.pop();
        self.heap.push(Reverse(entry));
        Admission::Retained
    }

    fn reject(&mut self, reason: RejectReason) -> Admission {
        *self.stats.rejected.entry(reason).or_default() += 1;
        Admission::Rejected(reason)
    }

    /// Drain the heap into descending engagement order.
    #[must_use]
    pub fn finish(self) -> Reduced {
        let mut ranked: Vec<Ranked> = self.heap.into_iter().map(|Reverse(r)| r).collect();
        ranked.sort_by(|a, b| b.cmp(a));

        tracing::info!(
            seen = self.stats.seen,
            kept = ranked.len(),
            rejected = self.stats.rejected_total(),
            "stream reduction complete"
        );
        for (reason, count) in &self.stats.rejected {
            tracing::debug!(reason = %reason, count, "reducer rejections");
        }

        Reduced {
            items: ranked.into_iter().map(|r| r.item).collect(),
            stats: self.stats,
        }
    }
}

/// Convenience wrapper: reduce a whole iterator at once.
pub fn reduce<I>(items: I, filter: &ContentFilter, capacity: usize) -> Reduced
where
    I: IntoIterator<Item = RawItem>,
{
    let mut reducer = StreamReducer::new(filter, capacity);
    for item in items {
        reducer.push(item);
    }
    reducer.finish()
}
