//! # Interval map
//!
//! A coordinate-compressed interval container keyed by reference position,
//! supporting insertion with additive merging and ordered traversal. Rather
//! than a tree of disjoint intervals that splits/merges nodes, this keeps a
//! sorted set of breakpoints and lets each breakpoint own the value active
//! from itself up to the next breakpoint.
use std::collections::{BTreeMap, BTreeSet};

/// A value that can live inside an [`IntervalMap`] span. `merge` combines
/// two overlapping spans; `empty` is the value of an unoccupied span and is
/// used to terminate traversal and to drop degenerate spans from output.
pub trait IntervalValue: Clone + PartialEq {
    fn empty() -> Self;
    fn merge(&self, other: &Self) -> Self;

    fn is_empty_value(&self) -> bool {
        *self == Self::empty()
    }
}

/// Half-open intervals `[a, b)` of `u64` reference coordinates mapping to `V`.
#[derive(Debug, Clone)]
pub struct IntervalMap<V: IntervalValue> {
    breaks: BTreeMap<u64, V>,
}

impl<V: IntervalValue> Default for IntervalMap<V> {
    fn default() -> Self {
        Self {
            breaks: BTreeMap::new(),
        }
    }
}

impl<V: IntervalValue> IntervalMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value active at `pos`, or `V::empty()` if `pos` precedes every breakpoint.
    pub fn value_at(&self, pos: u64) -> V {
        self.breaks
            .range(..=pos)
            .next_back()
            .map(|(_, v)| v.clone())
            .unwrap_or_else(V::empty)
    }

    fn ensure_breakpoint(&mut self, pos: u64) {
        if !self.breaks.contains_key(&pos) {
            let v = self.value_at(pos);
            self.breaks.insert(pos, v);
        }
    }

    /// Additively merge `value` into every point of `[start, end)`.
    pub fn insert(&mut self, start: u64, end: u64, value: V) {
        if start >= end {
            return;
        }
        self.ensure_breakpoint(start);
        self.ensure_breakpoint(end);
        for (_, v) in self.breaks.range_mut(start..end) {
            *v = v.merge(&value);
        }
    }

    /// Additively merge every span of `other`, scaled by nothing (caller
    /// pre-scales values before calling this if a weighted merge is needed).
    pub fn merge_from(&mut self, other: &IntervalMap<V>) {
        for (start, end, value) in other.iter() {
            self.insert(start, end, value.clone());
        }
    }

    /// Ordered traversal over populated (non-empty-value) spans.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64, &V)> {
        self.breaks
            .iter()
            .zip(self.breaks.keys().skip(1))
            .filter_map(|((start, v), end)| {
                if v.is_empty_value() {
                    None
                } else {
                    Some((*start, *end, v))
                }
            })
    }

    /// Spans overlapping the query interval `[q_start, q_end)`, clipped to it.
    pub fn intersection(&self, q_start: u64, q_end: u64) -> Vec<(u64, u64, V)> {
        self.iter()
            .filter_map(|(s, e, v)| {
                let clipped_start = s.max(q_start);
                let clipped_end = e.min(q_end);
                if clipped_start < clipped_end {
                    Some((clipped_start, clipped_end, v.clone()))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Per-parental-haplotype copy-number counts. Additive merge is
/// component-wise addition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlleleSpecificCn {
    pub count_a: f64,
    pub count_b: f64,
}

impl AlleleSpecificCn {
    pub fn new(count_a: f64, count_b: f64) -> Self {
        Self { count_a, count_b }
    }

    pub fn total(&self) -> f64 {
        self.count_a + self.count_b
    }

    pub fn scaled(&self, weight: f64) -> Self {
        Self {
            count_a: self.count_a * weight,
            count_b: self.count_b * weight,
        }
    }
}

impl IntervalValue for AlleleSpecificCn {
    fn empty() -> Self {
        Self::default()
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            count_a: self.count_a + other.count_a,
            count_b: self.count_b + other.count_b,
        }
    }
}

/// Set of segment-copy ids occupying a span; additive merge is set union.
pub type SegmentIdSet = BTreeSet<u64>;

impl IntervalValue for SegmentIdSet {
    fn empty() -> Self {
        BTreeSet::new()
    }

    fn merge(&self, other: &Self) -> Self {
        self.union(other).copied().collect()
    }
}

pub type IntervalSegmentMap = IntervalMap<SegmentIdSet>;
pub type CnIntervalMap = IntervalMap<AlleleSpecificCn>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_disjoint_spans() {
        let mut m = CnIntervalMap::new();
        m.insert(0, 100, AlleleSpecificCn::new(1.0, 1.0));
        m.insert(100, 200, AlleleSpecificCn::new(2.0, 0.0));

        let spans: Vec<_> = m.iter().map(|(s, e, v)| (s, e, *v)).collect();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], (0, 100, AlleleSpecificCn::new(1.0, 1.0)));
        assert_eq!(spans[1], (100, 200, AlleleSpecificCn::new(2.0, 0.0)));
    }

    #[test]
    fn additive_merge_overlapping_spans() {
        let mut m = CnIntervalMap::new();
        m.insert(0, 100, AlleleSpecificCn::new(1.0, 1.0));
        m.insert(50, 150, AlleleSpecificCn::new(1.0, 0.0));

        assert_eq!(m.value_at(10), AlleleSpecificCn::new(1.0, 1.0));
        assert_eq!(m.value_at(75), AlleleSpecificCn::new(2.0, 1.0));
        assert_eq!(m.value_at(125), AlleleSpecificCn::new(1.0, 0.0));
        assert_eq!(m.value_at(175), AlleleSpecificCn::default());
    }

    #[test]
    fn intersection_clips_to_query() {
        let mut m = CnIntervalMap::new();
        m.insert(0, 100, AlleleSpecificCn::new(2.0, 0.0));

        let hits = m.intersection(50, 200);
        assert_eq!(hits, vec![(50, 100, AlleleSpecificCn::new(2.0, 0.0))]);

        let miss = m.intersection(200, 300);
        assert!(miss.is_empty());
    }

    #[test]
    fn segment_id_set_union_merge() {
        let mut m: IntervalSegmentMap = IntervalMap::new();
        m.insert(0, 100, SegmentIdSet::from([1]));
        m.insert(50, 150, SegmentIdSet::from([2]));

        assert_eq!(m.value_at(75), SegmentIdSet::from([1, 2]));
        assert_eq!(m.value_at(10), SegmentIdSet::from([1]));
    }
}
