use super::error::Error;
use super::pairs::CandidatePair;
use super::traits::ObjectID;

use rustc_hash::FxHashMap;

use std::cmp::Ordering;

#[cfg(feature="parallel")]
use rayon::prelude::*;

/// Insertion sort gives up (and falls back to a full sort) after `len * INSERTION_SWAP_FACTOR` swaps
const INSERTION_SWAP_FACTOR: usize = 8;

/// A closed extent `[min, max]` along one axis
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    min: f32,
    max: f32
}

impl Interval {
    /// Returns `DegenerateInterval` unless `min <= max`
    pub fn new(min: f32, max: f32) -> Result<Self, Error> {
        if min <= max {
            Ok(Self{min, max})
        } else {
            Err(Error::DegenerateInterval{min, max})
        }
    }

    /// Build an interval from bounds which are ordered by construction
    ///
    /// Reversed or NaN bounds are a bug in the caller: this asserts in debug builds.  Otherwise reversed
    /// bounds are swapped, and a NaN bound collapses onto the other one (or onto zero if both are NaN), so
    /// the result always has a well-defined sweep order.
    pub fn clamped(min: f32, max: f32) -> Self {
        debug_assert!(min <= max, "degenerate interval [{}, {}]", min, max);
        let (min, max) = match (min.is_nan(), max.is_nan()) {
            (false, false) => (min, max),
            (true, false) => (max, max),
            (false, true) => (min, min),
            (true, true) => (0f32, 0f32)
        };
        if min <= max {
            Self{min, max}
        } else {
            Self{min: max, max: min}
        }
    }

    #[inline]
    pub fn min(self) -> f32 {
        self.min
    }

    #[inline]
    pub fn max(self) -> f32 {
        self.max
    }

    pub fn overlaps(self, other: Interval, boundary: Boundary) -> bool {
        match boundary {
            Boundary::Closed => self.min <= other.max && other.min <= self.max,
            Boundary::Open   => self.min <  other.max && other.min <  self.max
        }
    }
}

/// Whether intervals which only touch at an endpoint count as overlapping
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Boundary {
    Closed,
    Open
}

impl Default for Boundary {
    fn default() -> Self {
        Boundary::Closed
    }
}

/// Starts sort before ends at equal values
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EndpointKind {
    Start,
    End
}

/// One end of an object's interval
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Endpoint<ID> {
    pub id: ID,
    pub kind: EndpointKind,
    pub interval: Interval
}

impl<ID> Endpoint<ID>
where
    ID: ObjectID
{
    fn pair(id: ID, interval: Interval) -> [Self; 2] {
        [
            Self{id, kind: EndpointKind::Start, interval},
            Self{id, kind: EndpointKind::End, interval}
        ]
    }

    /// Position of this endpoint along the axis
    #[inline]
    pub fn value(&self) -> f32 {
        match self.kind {
            EndpointKind::Start => self.interval.min,
            EndpointKind::End => self.interval.max
        }
    }

    /// Sweep order: by value, then starts before ends, then by id
    ///
    /// This is a total order over the endpoints of one tick, so any correct sort yields the same sequence.
    pub fn sweep_cmp(&self, other: &Self) -> Ordering {
        self.value().partial_cmp(&other.value())
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Endpoints of one axis in sweep order
///
/// This is the handle which carries one tick's order into the next: pass it by value to
/// [`AxisSweep::sort`] and keep the returned order for the following tick.
///
/// [`AxisSweep::sort`]: struct.AxisSweep.html#method.sort
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointOrder<ID> {
    endpoints: Vec<Endpoint<ID>>
}

impl<ID> Default for EndpointOrder<ID> {
    fn default() -> Self {
        Self{endpoints: Vec::new()}
    }
}

impl<ID> EndpointOrder<ID> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint<ID>> {
        self.endpoints.iter()
    }

    pub fn as_slice(&self) -> &[Endpoint<ID>] {
        self.endpoints.as_slice()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Forget the order while keeping the allocation
    pub fn clear(&mut self) {
        self.endpoints.clear();
    }
}

/// Scratch state for sorting and sweeping one axis
///
/// Holds no results between calls; only buffers are reused.
pub struct AxisSweep<ID>
where
    ID: ObjectID
{
    pending: FxHashMap<ID, Interval>,
    fresh: Vec<Endpoint<ID>>,
    merged: Vec<Endpoint<ID>>,
    active: Vec<(ID, Interval)>,
    slots: FxHashMap<ID, usize>
}

impl<ID> Default for AxisSweep<ID>
where
    ID: ObjectID
{
    fn default() -> Self {
        Self{
            pending: FxHashMap::default(),
            fresh: Vec::new(),
            merged: Vec::new(),
            active: Vec::new(),
            slots: FxHashMap::default()
        }
    }
}

impl<ID> AxisSweep<ID>
where
    ID: ObjectID
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Order the endpoints of `intervals`
    ///
    /// With `incremental`, `previous` is refreshed in place and insertion sorted, which is close to linear
    /// when objects moved only a little since the previous tick.  Objects absent from `previous` are sorted
    /// separately and merged in.  The result is identical to a full sort either way.
    ///
    /// `intervals` must not repeat an id.
    pub fn sort(&mut self, intervals: &[(ID, Interval)], previous: EndpointOrder<ID>, incremental: bool)
        -> EndpointOrder<ID>
    {
        self.sort_impl(intervals, previous, incremental, |endpoints| {
            endpoints.sort_unstable_by(Endpoint::sweep_cmp);
        })
    }

    /// [`sort`]: struct.AxisSweep.html#method.sort
    /// Parallel version of [`sort`]
    ///
    /// Only full sorts run in parallel; insertion sort is inherently sequential.
    #[cfg(feature="parallel")]
    pub fn par_sort(&mut self, intervals: &[(ID, Interval)], previous: EndpointOrder<ID>, incremental: bool)
        -> EndpointOrder<ID>
    {
        self.sort_impl(intervals, previous, incremental, |endpoints| {
            endpoints.par_sort_unstable_by(Endpoint::sweep_cmp);
        })
    }

    fn sort_impl<S>(&mut self, intervals: &[(ID, Interval)], previous: EndpointOrder<ID>, incremental: bool, full_sort: S)
        -> EndpointOrder<ID>
    where
        S: Fn(&mut Vec<Endpoint<ID>>)
    {
        let EndpointOrder{mut endpoints} = previous;

        if !incremental || endpoints.is_empty() {
            endpoints.clear();
            endpoints.reserve(2 * intervals.len());
            for &(id, interval) in intervals {
                endpoints.extend_from_slice(&Endpoint::pair(id, interval));
            }
            full_sort(&mut endpoints);
            return EndpointOrder{endpoints};
        }

        self.pending.clear();
        self.pending.extend(intervals.iter().cloned());

        {
            let pending = &self.pending;
            endpoints.retain(|endpoint| pending.contains_key(&endpoint.id));
            for endpoint in endpoints.iter_mut() {
                if let Some(&interval) = pending.get(&endpoint.id) {
                    endpoint.interval = interval;
                }
            }
        }

        for endpoint in endpoints.iter() {
            if endpoint.kind == EndpointKind::Start {
                self.pending.remove(&endpoint.id);
            }
        }

        let budget = INSERTION_SWAP_FACTOR * endpoints.len().max(64);
        if !insertion_sort(endpoints.as_mut_slice(), budget) {
            debug!("insertion sort exceeded {} swaps for {} endpoints; falling back to a full sort",
                budget, endpoints.len());
            full_sort(&mut endpoints);
        }

        if self.pending.is_empty() {
            return EndpointOrder{endpoints};
        }

        self.fresh.clear();
        for &(id, interval) in intervals {
            if self.pending.contains_key(&id) {
                self.fresh.extend_from_slice(&Endpoint::pair(id, interval));
            }
        }
        full_sort(&mut self.fresh);

        self.merged.clear();
        self.merged.reserve(endpoints.len() + self.fresh.len());
        let (mut i, mut j) = (0, 0);
        while i < endpoints.len() && j < self.fresh.len() {
            if self.fresh[j].sweep_cmp(&endpoints[i]) == Ordering::Less {
                self.merged.push(self.fresh[j]);
                j += 1;
            } else {
                self.merged.push(endpoints[i]);
                i += 1;
            }
        }
        self.merged.extend_from_slice(&endpoints[i..]);
        self.merged.extend_from_slice(&self.fresh[j..]);

        std::mem::swap(&mut endpoints, &mut self.merged);
        EndpointOrder{endpoints}
    }

    /// Report every pair of objects whose intervals overlap
    ///
    /// Pairs are appended to `pairs`; each overlapping pair is reported exactly once.
    pub fn sweep(&mut self, order: &EndpointOrder<ID>, boundary: Boundary, pairs: &mut Vec<CandidatePair<ID>>) {
        self.active.clear();
        self.slots.clear();

        for endpoint in order.iter() {
            match endpoint.kind {
                EndpointKind::Start => {
                    // every active interval contains this start value, so closed overlap is implied
                    for &(id_, interval_) in &self.active {
                        if boundary == Boundary::Closed || endpoint.interval.overlaps(interval_, boundary) {
                            pairs.push(CandidatePair::new(endpoint.id, id_));
                        }
                    }
                    self.slots.insert(endpoint.id, self.active.len());
                    self.active.push((endpoint.id, endpoint.interval));
                }
                EndpointKind::End => {
                    match self.slots.remove(&endpoint.id) {
                        Some(slot) => {
                            self.active.swap_remove(slot);
                            if let Some(&(moved, _)) = self.active.get(slot) {
                                self.slots.insert(moved, slot);
                            }
                        }
                        None => {
                            debug_assert!(false, "end endpoint without start for {:?}", endpoint.id);
                            warn!("end endpoint without start for {:?}", endpoint.id);
                        }
                    }
                }
            }
        }

        debug_assert!(self.active.is_empty(), "unbalanced endpoints");
    }
}

/// Sort and sweep `intervals` from scratch
pub fn sweep_intervals<ID>(intervals: &[(ID, Interval)], boundary: Boundary) -> Vec<CandidatePair<ID>>
where
    ID: ObjectID
{
    let mut sweep = AxisSweep::new();
    let order = sweep.sort(intervals, EndpointOrder::new(), false);
    let mut pairs = Vec::new();
    sweep.sweep(&order, boundary, &mut pairs);
    pairs
}

/// Returns `false` if more than `budget` swaps were needed, leaving `endpoints` partially sorted
fn insertion_sort<ID>(endpoints: &mut [Endpoint<ID>], budget: usize) -> bool
where
    ID: ObjectID
{
    let mut swaps = 0usize;
    for i in 1..endpoints.len() {
        let mut j = i;
        while j > 0 && endpoints[j - 1].sweep_cmp(&endpoints[j]) == Ordering::Greater {
            endpoints.swap(j - 1, j);
            j -= 1;
            swaps += 1;
            if swaps > budget {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use rand::prelude::*;

    fn interval(min: f32, max: f32) -> Interval {
        Interval::new(min, max).expect("test intervals are ordered")
    }

    fn random_intervals<R: Rng>(rng: &mut R, ids: std::ops::Range<u32>) -> Vec<(u32, Interval)> {
        ids.map(|id| {
                let min = rng.gen_range(0f32, 100f32);
                (id, interval(min, min + rng.gen_range(0f32, 4f32)))
            })
            .collect()
    }

    fn brute_force(intervals: &[(u32, Interval)], boundary: Boundary) -> Vec<CandidatePair<u32>> {
        let mut pairs: Vec<_> = intervals.iter()
            .tuple_combinations()
            .filter(|((_, lhs), (_, rhs))| lhs.overlaps(*rhs, boundary))
            .map(|((lhs, _), (rhs, _))| CandidatePair::new(*lhs, *rhs))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn degenerate_interval() {
        assert_eq!(Interval::new(2f32, 1f32), Err(Error::DegenerateInterval{min: 2f32, max: 1f32}));
        assert!(Interval::new(1f32, 1f32).is_ok());
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn clamped_swaps_in_release() {
        assert_eq!(Interval::clamped(2f32, 1f32), interval(1f32, 2f32));
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn clamped_never_yields_nan() {
        assert_eq!(Interval::clamped(std::f32::NAN, 3f32), interval(3f32, 3f32));
        assert_eq!(Interval::clamped(3f32, std::f32::NAN), interval(3f32, 3f32));
        assert_eq!(Interval::clamped(std::f32::NAN, std::f32::NAN), interval(0f32, 0f32));
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn clamped_asserts_nan_in_debug() {
        Interval::clamped(std::f32::NAN, 3f32);
    }

    #[test]
    fn new_rejects_nan() {
        assert!(Interval::new(std::f32::NAN, 3f32).is_err());
        assert!(Interval::new(3f32, std::f32::NAN).is_err());
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn clamped_asserts_in_debug() {
        Interval::clamped(2f32, 1f32);
    }

    #[test]
    fn three_intervals() {
        let intervals = vec![
            (1u32, interval(0f32, 5f32)),
            (2u32, interval(4f32, 9f32)),
            (3u32, interval(10f32, 15f32))];
        assert_eq!(sweep_intervals(&intervals, Boundary::Closed), vec![CandidatePair::new(1, 2)]);
    }

    #[test]
    fn touching_boundaries() {
        let intervals = vec![
            (1u32, interval(0f32, 5f32)),
            (2u32, interval(5f32, 9f32)),
            (3u32, interval(9f32, 9f32))];

        let mut closed = sweep_intervals(&intervals, Boundary::Closed);
        closed.sort();
        assert_eq!(closed, vec![CandidatePair::new(1, 2), CandidatePair::new(2, 3)]);

        assert!(sweep_intervals(&intervals, Boundary::Open).is_empty());
    }

    #[test]
    fn zero_width_inside_open_interval() {
        let intervals = vec![
            (1u32, interval(0f32, 5f32)),
            (2u32, interval(3f32, 3f32))];
        assert_eq!(sweep_intervals(&intervals, Boundary::Open), vec![CandidatePair::new(1, 2)]);
    }

    #[test]
    fn matches_brute_force() {
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(0);
        for _ in 0..20 {
            let intervals = random_intervals(&mut rng, 0..200);
            for &boundary in &[Boundary::Closed, Boundary::Open] {
                let mut actual = sweep_intervals(&intervals, boundary);
                actual.sort();
                let before = actual.len();
                actual.dedup();
                assert_eq!(actual.len(), before, "sweep reported a pair twice");
                assert_eq!(actual, brute_force(&intervals, boundary));
            }
        }
    }

    #[test]
    fn sort_order_is_ascending() {
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(1);
        let intervals = random_intervals(&mut rng, 0..500);
        let order = AxisSweep::new().sort(&intervals, EndpointOrder::new(), false);
        assert_eq!(order.len(), 1000);
        assert!(order.as_slice().windows(2).all(|w| w[0].sweep_cmp(&w[1]) == Ordering::Less));
    }

    #[test]
    fn incremental_matches_full() {
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(2);
        let mut sweep = AxisSweep::new();
        let mut intervals = random_intervals(&mut rng, 0..300);
        let mut order = sweep.sort(&intervals, EndpointOrder::new(), true);

        for tick in 0..30u32 {
            // drift, then retire a few objects and spawn a few more
            for (_, interval_) in intervals.iter_mut() {
                let offset = rng.gen_range(-0.5f32, 0.5f32);
                *interval_ = interval(interval_.min() + offset, interval_.max() + offset);
            }
            intervals.retain(|(id, _)| (id + tick) % 37 != 0);
            intervals.extend(random_intervals(&mut rng, (1000 + 10 * tick)..(1005 + 10 * tick)));

            order = sweep.sort(&intervals, order, true);
            let full = AxisSweep::new().sort(&intervals, EndpointOrder::new(), false);
            assert_eq!(order, full);
        }
    }

    #[test]
    fn incremental_survives_teleports() {
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(3);
        let mut sweep = AxisSweep::new();
        let intervals = random_intervals(&mut rng, 0..200);
        let order = sweep.sort(&intervals, EndpointOrder::new(), true);

        let shuffled = random_intervals(&mut rng, 0..200);
        let order = sweep.sort(&shuffled, order, true);
        assert_eq!(order, AxisSweep::new().sort(&shuffled, EndpointOrder::new(), false));
    }

    #[cfg(feature="parallel")]
    #[test]
    fn par_sort_matches_sort() {
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(4);
        let intervals = random_intervals(&mut rng, 0..5000);
        let mut sweep = AxisSweep::new();
        assert_eq!(
            sweep.par_sort(&intervals, EndpointOrder::new(), false),
            sweep.sort(&intervals, EndpointOrder::new(), false));
    }
}
