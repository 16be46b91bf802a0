use crate::PatternId;
use std::collections::HashMap;

/// A set of token sequences usable to distinguish between alternatives at a
/// given look-ahead depth, plus a per-sequence "repetitive" flag marking
/// sequences that were widened from an unbounded repetition (and so should
/// be treated as matching any further repeats of their own tail, not just
/// the exact sequence recorded).
///
/// Backed by a map rather than a plain `HashSet` so the repetitive flag can
/// rides along with each sequence without a wrapper struct at every call
/// site.
#[derive(Debug, Clone, Default)]
pub struct LookAheadSet {
    sequences: HashMap<Vec<PatternId>, bool>,
}

impl LookAheadSet {
    pub fn new() -> Self {
        Self { sequences: HashMap::new() }
    }

    /// A set containing only the empty sequence, i.e. "matches without
    /// consuming any token" -- used as the seed for nullable elements.
    pub fn empty() -> Self {
        let mut set = Self::new();
        set.add(Vec::new(), false);
        set
    }

    pub fn add(&mut self, sequence: Vec<PatternId>, repetitive: bool) {
        let entry = self.sequences.entry(sequence).or_insert(false);
        *entry |= repetitive;
    }

    pub fn add_empty(&mut self) {
        self.add(Vec::new(), false);
    }

    pub fn contains_empty(&self) -> bool {
        self.sequences.contains_key(&Vec::new())
    }

    pub fn union(&mut self, other: &LookAheadSet) {
        for (seq, repetitive) in &other.sequences {
            self.add(seq.clone(), *repetitive);
        }
    }

    pub fn size(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn sequences(&self) -> impl Iterator<Item = (&[PatternId], bool)> {
        self.sequences.iter().map(|(s, r)| (s.as_slice(), *r))
    }

    pub fn min_length(&self) -> usize {
        self.sequences.keys().map(|s| s.len()).min().unwrap_or(0)
    }

    pub fn max_length(&self) -> usize {
        self.sequences.keys().map(|s| s.len()).max().unwrap_or(0)
    }

    /// Whether any sequence in `self` is a prefix of, or is prefixed by, any
    /// sequence in `other` -- the base case for an ambiguity conflict
    /// between two alternatives at a shared look-ahead depth.
    pub fn intersects(&self, other: &LookAheadSet) -> bool {
        for (a, a_rep) in &self.sequences {
            for (b, b_rep) in &other.sequences {
                if sequence_overlaps(a, *a_rep, b, *b_rep) {
                    return true;
                }
            }
        }
        false
    }

    /// The sequences that overlap with some sequence of `other`, used when
    /// reporting which tokens are ambiguous.
    pub fn create_overlaps(&self, other: &LookAheadSet) -> LookAheadSet {
        let mut result = LookAheadSet::new();
        for (a, a_rep) in &self.sequences {
            for (b, b_rep) in &other.sequences {
                if sequence_overlaps(a, *a_rep, b, *b_rep) {
                    result.add(a.clone(), *a_rep);
                }
            }
        }
        result
    }

    /// The intersection of two sets under prefix-overlap equivalence,
    /// keeping the shorter of each overlapping pair (used while narrowing
    /// the look-ahead needed to disambiguate two alternatives).
    pub fn create_intersection(&self, other: &LookAheadSet) -> LookAheadSet {
        let mut result = LookAheadSet::new();
        for (a, a_rep) in &self.sequences {
            for (b, b_rep) in &other.sequences {
                if sequence_overlaps(a, *a_rep, b, *b_rep) {
                    if a.len() <= b.len() {
                        result.add(a.clone(), *a_rep);
                    } else {
                        result.add(b.clone(), *b_rep);
                    }
                }
            }
        }
        result
    }

    /// Prepend `prefix` to every sequence in `self`, used when combining an
    /// element's look-ahead with the look-ahead of what follows it in an
    /// alternative.
    pub fn create_combination(&self, prefix: &[PatternId], max_length: usize) -> LookAheadSet {
        let mut result = LookAheadSet::new();
        for (seq, repetitive) in &self.sequences {
            let mut combined: Vec<PatternId> = prefix.to_vec();
            combined.extend_from_slice(seq);
            combined.truncate(max_length);
            result.add(combined, *repetitive);
        }
        if self.sequences.is_empty() {
            let mut combined = prefix.to_vec();
            combined.truncate(max_length);
            result.add(combined, false);
        }
        result
    }

    /// Keep only sequences no longer than `max_length`, marking any sequence
    /// exactly at the cap as repetitive if it was already repetitive or if
    /// truncation occurred.
    pub fn create_filter(&self, max_length: usize) -> LookAheadSet {
        let mut result = LookAheadSet::new();
        for (seq, repetitive) in &self.sequences {
            if seq.len() <= max_length {
                result.add(seq.clone(), *repetitive);
            } else {
                let mut truncated = seq.clone();
                truncated.truncate(max_length);
                result.add(truncated, true);
            }
        }
        result
    }

    /// Mark every sequence in the set as repetitive, used when an element is
    /// wrapped in an unbounded repetition: its look-ahead recurs.
    pub fn create_repetitive(&self) -> LookAheadSet {
        let mut result = LookAheadSet::new();
        for (seq, _) in &self.sequences {
            result.add(seq.clone(), true);
        }
        result
    }

    /// The first tokens of every sequence, used to compute a one-token
    /// look-ahead set cheaply when deeper look-ahead is not required.
    pub fn initial_tokens(&self) -> Vec<PatternId> {
        let mut tokens: Vec<PatternId> = self
            .sequences
            .keys()
            .filter_map(|seq| seq.first().copied())
            .collect();
        tokens.sort_unstable();
        tokens.dedup();
        tokens
    }

    /// Whether the token sequence peeked so far (`peeked`) matches some
    /// sequence in this set, either exactly or as a repeating tail.
    pub fn is_next(&self, peeked: &[PatternId]) -> bool {
        for (seq, repetitive) in &self.sequences {
            if sequence_overlaps(seq, *repetitive, peeked, false) {
                return true;
            }
        }
        false
    }
}

/// Whether sequence `a` and sequence `b` overlap: one is a prefix of, or
/// equal to, the other. Structural only -- the `repetitive` tags say
/// nothing about overlap itself, only about whether an overlap found at the
/// look-ahead cap must be reported as an inherent ambiguity rather than
/// resolved by widening further.
fn sequence_overlaps(a: &[PatternId], _a_rep: bool, b: &[PatternId], _b_rep: bool) -> bool {
    let common = a.len().min(b.len());
    a[..common] == b[..common]
}

/// A small peek window over a token stream, used by the look-ahead analyzer
/// and the parse driver to test a `LookAheadSet` against tokens actually
/// seen without committing to consuming them.
pub trait TokenPeek {
    /// Look `offset` tokens ahead (0 = the next token), returning its
    /// pattern id, or `None` at end of input.
    fn peek_token(&mut self, offset: usize) -> Option<PatternId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_contains_empty_sequence() {
        let set = LookAheadSet::empty();
        assert!(set.contains_empty());
        assert_eq!(set.size(), 1);
    }

    #[test]
    fn union_merges_sequences_and_keeps_repetitive_flag() {
        let mut a = LookAheadSet::new();
        a.add(vec![1], false);
        let mut b = LookAheadSet::new();
        b.add(vec![1], true);
        a.union(&b);
        assert_eq!(a.size(), 1);
        assert!(a.sequences().any(|(seq, rep)| seq == [1] && rep));
    }

    #[test]
    fn intersects_detects_prefix_overlap() {
        // [1] is a prefix of [1, 2] -- they overlap regardless of length or
        // the repetitive tag, per the structural prefix-or-equal rule.
        let mut a = LookAheadSet::new();
        a.add(vec![1, 2], false);
        let mut b = LookAheadSet::new();
        b.add(vec![1], false);
        assert!(a.intersects(&b));
    }

    #[test]
    fn intersects_is_false_for_genuinely_disjoint_sequences() {
        let mut a = LookAheadSet::new();
        a.add(vec![1, 2], false);
        let mut b = LookAheadSet::new();
        b.add(vec![1, 3], false);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn repetitive_sequence_covers_longer_peek() {
        let mut set = LookAheadSet::new();
        set.add(vec![1], true);
        assert!(set.is_next(&[1, 1, 1]));
        assert!(!set.is_next(&[2]));
    }

    #[test]
    fn create_combination_prepends_and_truncates() {
        let mut tail = LookAheadSet::new();
        tail.add(vec![2, 3], false);
        let combined = tail.create_combination(&[1], 2);
        assert!(combined.sequences().any(|(seq, _)| seq == [1, 2]));
    }

    #[test]
    fn initial_tokens_deduplicates() {
        let mut set = LookAheadSet::new();
        set.add(vec![1, 2], false);
        set.add(vec![1, 3], false);
        assert_eq!(set.initial_tokens(), vec![1]);
    }
}
