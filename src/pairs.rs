use super::traits::ObjectID;

use rustc_hash::FxHashSet;

#[cfg(feature="parallel")]
use rayon::prelude::*;

/// An unordered pair of objects whose bounds may intersect
///
/// The lesser id is always stored first, so `(a, b)` and `(b, a)` compare equal.  Ordering is by the
/// first id, then the second.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidatePair<ID> {
    a: ID,
    b: ID
}

impl<ID> CandidatePair<ID>
where
    ID: Copy + Ord
{
    pub fn new(lhs: ID, rhs: ID) -> Self {
        if lhs <= rhs {
            Self{a: lhs, b: rhs}
        } else {
            Self{a: rhs, b: lhs}
        }
    }

    /// The lesser id
    pub fn a(self) -> ID {
        self.a
    }

    /// The greater id
    pub fn b(self) -> ID {
        self.b
    }

    pub fn ids(self) -> (ID, ID) {
        (self.a, self.b)
    }

    pub fn contains(self, id: ID) -> bool {
        self.a == id || self.b == id
    }
}

/// Collects one tick's candidate pairs for the narrow phase
///
/// A pair pushed more than once is kept once; [`finish`] sorts the result.
///
/// [`finish`]: struct.PairEmitter.html#method.finish
pub struct PairEmitter<ID>
where
    ID: ObjectID
{
    seen: FxHashSet<CandidatePair<ID>>,
    pairs: Vec<CandidatePair<ID>>
}

impl<ID> Default for PairEmitter<ID>
where
    ID: ObjectID
{
    fn default() -> Self {
        Self{
            seen: FxHashSet::default(),
            pairs: Vec::new()
        }
    }
}

impl<ID> PairEmitter<ID>
where
    ID: ObjectID
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut seen = FxHashSet::default();
        seen.reserve(capacity);
        Self{
            seen,
            pairs: Vec::with_capacity(capacity)
        }
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.pairs.clear();
    }

    /// Returns `false` if the pair was already emitted this tick
    pub fn push(&mut self, pair: CandidatePair<ID>) -> bool {
        if self.seen.insert(pair) {
            self.pairs.push(pair);
            true
        } else {
            false
        }
    }

    pub fn extend<Iter>(&mut self, pairs: Iter)
    where
        Iter: IntoIterator<Item = CandidatePair<ID>>
    {
        self.extend_filtered(pairs, |_, _| true);
    }

    /// Emit only those pairs which pass a user-specified test
    ///
    /// The filter runs before duplicate removal and may see the same pair more than once.
    pub fn extend_filtered<Iter, F>(&mut self, pairs: Iter, mut filter: F)
    where
        Iter: IntoIterator<Item = CandidatePair<ID>>,
        F: FnMut(ID, ID) -> bool
    {
        for pair in pairs {
            if filter(pair.a, pair.b) {
                self.push(pair);
            }
        }
    }

    /// Sort this tick's pairs into their deterministic emission order
    pub fn finish(&mut self) -> &Vec<CandidatePair<ID>> {
        self.pairs.sort_unstable();
        &self.pairs
    }

    /// [`finish`]: struct.PairEmitter.html#method.finish
    /// Parallel version of [`finish`]
    #[cfg(feature="parallel")]
    pub fn par_finish(&mut self) -> &Vec<CandidatePair<ID>> {
        self.pairs.par_sort_unstable();
        &self.pairs
    }

    pub fn pairs(&self) -> &Vec<CandidatePair<ID>> {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
