use super::density::{DensityMonitor, DensitySample, YSweepState};
use super::error::Error;
use super::geom::{self, Axis, Bounds, ObjectState};
use super::pairs::{CandidatePair, PairEmitter};
use super::sweep::{AxisSweep, Boundary, EndpointOrder, Interval};
use super::traits::ObjectID;

use cgmath::Point2;
use rustc_hash::FxHashSet;

use std::time::{Duration, Instant};

/// When the Y refinement pass runs
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum YSweepMode {
    /// Let the [`DensityMonitor`] decide
    ///
    /// [`DensityMonitor`]: struct.DensityMonitor.html
    Adaptive,
    Always,
    Never
}

impl Default for YSweepMode {
    fn default() -> Self {
        YSweepMode::Adaptive
    }
}

/// Tunable parameters for a [`Layer`]
///
/// [`Layer`]: struct.Layer.html
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature="serialize", serde(default))]
pub struct Config {
    /// X candidates per object above which the scene counts as dense
    pub density_threshold: f32,
    /// Consecutive ticks across the threshold before the Y pass is toggled
    pub hysteresis_ticks: usize,
    /// Number of ticks averaged by the density monitor
    pub window_size: usize,
    /// Carry each axis' endpoint order into the next tick
    pub enable_incremental_sort: bool,
    pub y_sweep: YSweepMode,
    pub boundary: Boundary,
    /// Ticks slower than this are flagged in [`TickStats`]; `None` disables the check
    ///
    /// [`TickStats`]: struct.TickStats.html
    pub tick_budget: Option<Duration>
}

impl Default for Config {
    fn default() -> Self {
        Self{
            density_threshold: 2f32,
            hysteresis_ticks: 5,
            window_size: 30,
            enable_incremental_sort: true,
            y_sweep: YSweepMode::Adaptive,
            boundary: Boundary::Closed,
            tick_budget: Some(Duration::from_millis(16))
        }
    }
}

/// What happened during the most recent tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickStats {
    pub tick: u64,
    /// Objects supplied by the caller
    pub objects: usize,
    /// Objects left out of this tick (see [`Layer::invalid`])
    ///
    /// [`Layer::invalid`]: struct.Layer.html#method.invalid
    pub excluded: usize,
    pub x_candidates: usize,
    pub density: YSweepState,
    pub activation_ratio: f32,
    pub y_sweep: bool,
    pub emitted: usize,
    pub elapsed: Duration,
    /// Advisory only; the tick still completed
    pub deadline_exceeded: bool
}

#[derive(Copy, Clone)]
enum Execution {
    Sequential,
    #[cfg(feature="parallel")]
    Parallel
}

/// Broadphase state for one set of objects, carried from tick to tick
///
/// `ID` is the type representing object IDs
///
/// Each tick extracts bounds, sweeps the X axis, feeds the X candidate count to the [`DensityMonitor`],
/// optionally refines the candidates on the Y axis, and emits the deduplicated pairs in sorted order.
/// Skipping the Y pass only ever yields a superset of the refined candidates.
///
/// [`DensityMonitor`]: struct.DensityMonitor.html
pub struct Layer<ID>
where
    ID: ObjectID
{
    config: Config,
    tick: u64,
    bounds: Vec<Result<Bounds<Point2<f32>>, Error>>,
    aabbs: Vec<(ID, Bounds<Point2<f32>>)>,
    live: FxHashSet<ID>,
    invalid: Vec<ID>,
    intervals: Vec<(ID, Interval)>,
    x_order: EndpointOrder<ID>,
    y_order: EndpointOrder<ID>,
    sweep: AxisSweep<ID>,
    x_pairs: Vec<CandidatePair<ID>>,
    y_pairs: Vec<CandidatePair<ID>>,
    x_pair_set: FxHashSet<CandidatePair<ID>>,
    narrowed: FxHashSet<ID>,
    monitor: DensityMonitor,
    emitter: PairEmitter<ID>,
    stats: TickStats
}

impl<ID> Default for Layer<ID>
where
    ID: ObjectID
{
    fn default() -> Self {
        LayerBuilder::new().build()
    }
}

impl<ID> Layer<ID>
where
    ID: ObjectID
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Iterate over the bounds cached by the most recent tick
    ///
    /// This is primarily intended for visualization + debugging
    pub fn iter<'a>(&'a self) -> std::slice::Iter<'a, (ID, Bounds<Point2<f32>>)> {
        self.aabbs.iter()
    }

    /// Objects excluded from the most recent tick, in input order
    pub fn invalid(&self) -> &[ID] {
        self.invalid.as_slice()
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn monitor(&self) -> &DensityMonitor {
        &self.monitor
    }

    /// Candidate pairs emitted by the most recent tick
    pub fn pairs(&self) -> &Vec<CandidatePair<ID>> {
        self.emitter.pairs()
    }

    /// The X endpoint order which the next tick will start from
    pub fn x_order(&self) -> &EndpointOrder<ID> {
        &self.x_order
    }

    /// The Y endpoint order which the next Y pass will start from
    pub fn y_order(&self) -> &EndpointOrder<ID> {
        &self.y_order
    }

    /// Clear all internal state
    pub fn clear(&mut self) {
        self.tick = 0;
        self.bounds.clear();
        self.aabbs.clear();
        self.live.clear();
        self.invalid.clear();
        self.intervals.clear();
        self.x_order.clear();
        self.y_order.clear();
        self.x_pairs.clear();
        self.y_pairs.clear();
        self.x_pair_set.clear();
        self.narrowed.clear();
        self.monitor.reset();
        self.emitter.clear();
        self.stats = TickStats::default();
    }

    /// Detect candidate pairs among `objects`
    pub fn tick<'a>(&'a mut self, objects: &[ObjectState<ID>])
        -> &'a Vec<CandidatePair<ID>>
    {
        self.tick_filtered(objects, |_, _| true)
    }

    /// Detect candidate pairs among `objects`, returning only those which pass a user-specified test
    ///
    /// Pairs are filtered prior to duplicate removal.  The density monitor always sees the unfiltered
    /// X candidate count.
    pub fn tick_filtered<'a, F>(&'a mut self, objects: &[ObjectState<ID>], filter: F)
        -> &'a Vec<CandidatePair<ID>>
    where
        F: FnMut(ID, ID) -> bool
    {
        let started = Instant::now();
        geom::extract_bounds(objects, &mut self.bounds);
        self.process(objects, started, Execution::Sequential, filter)
    }

    /// [`tick`]: struct.Layer.html#method.tick
    /// Parallel version of [`tick`]
    ///
    /// Produces exactly the same pairs as [`tick`].
    #[cfg(feature="parallel")]
    pub fn par_tick<'a>(&'a mut self, objects: &[ObjectState<ID>])
        -> &'a Vec<CandidatePair<ID>>
    {
        self.par_tick_filtered(objects, |_, _| true)
    }

    /// [`tick_filtered`]: struct.Layer.html#method.tick_filtered
    /// Parallel version of [`tick_filtered`]
    #[cfg(feature="parallel")]
    pub fn par_tick_filtered<'a, F>(&'a mut self, objects: &[ObjectState<ID>], filter: F)
        -> &'a Vec<CandidatePair<ID>>
    where
        F: FnMut(ID, ID) -> bool
    {
        let started = Instant::now();
        geom::par_extract_bounds(objects, &mut self.bounds);
        self.process(objects, started, Execution::Parallel, filter)
    }

    fn process<F>(&mut self, objects: &[ObjectState<ID>], started: Instant, execution: Execution, filter: F)
        -> &Vec<CandidatePair<ID>>
    where
        F: FnMut(ID, ID) -> bool
    {
        self.tick += 1;
        self.collect_bounds(objects);

        self.intervals.clear();
        self.intervals.extend(self.aabbs.iter().map(|&(id, bounds)| (id, bounds.interval(Axis::X))));
        let previous = std::mem::take(&mut self.x_order);
        self.x_order = sort_axis(
            &mut self.sweep, &self.intervals, previous, self.config.enable_incremental_sort, execution);
        self.x_pairs.clear();
        self.sweep.sweep(&self.x_order, self.config.boundary, &mut self.x_pairs);

        let density = self.monitor.record(DensitySample{
            tick: self.tick,
            object_count: self.aabbs.len(),
            candidate_count: self.x_pairs.len()});

        let y_sweep = match self.config.y_sweep {
            YSweepMode::Adaptive => density == YSweepState::Enabled,
            YSweepMode::Always => true,
            YSweepMode::Never => false
        };

        self.emitter.clear();
        if y_sweep {
            self.refine_y(execution);
            self.emitter.extend_filtered(self.y_pairs.iter().cloned(), filter);
        } else {
            self.emitter.extend_filtered(self.x_pairs.iter().cloned(), filter);
        }

        match execution {
            Execution::Sequential => { self.emitter.finish(); },
            #[cfg(feature="parallel")]
            Execution::Parallel => { self.emitter.par_finish(); }
        }

        let elapsed = started.elapsed();
        let deadline_exceeded = match self.config.tick_budget {
            Some(budget) => elapsed > budget,
            None => false
        };
        if deadline_exceeded {
            warn!("tick {} took {:?} for {} objects ({} candidates); budget is {:?}",
                self.tick, elapsed, objects.len(), self.x_pairs.len(), self.config.tick_budget);
        }

        self.stats = TickStats{
            tick: self.tick,
            objects: objects.len(),
            excluded: self.invalid.len(),
            x_candidates: self.x_pairs.len(),
            density,
            activation_ratio: self.monitor.activation_ratio(),
            y_sweep,
            emitted: self.emitter.len(),
            elapsed,
            deadline_exceeded
        };
        trace!("{:?}", self.stats);

        self.emitter.pairs()
    }

    fn collect_bounds(&mut self, objects: &[ObjectState<ID>]) {
        self.aabbs.clear();
        self.aabbs.reserve(objects.len());
        self.live.clear();
        self.invalid.clear();

        for (object, bounds) in objects.iter().zip(self.bounds.iter()) {
            let result = match bounds {
                Ok(bounds) => if self.live.insert(object.id) {
                    Ok(*bounds)
                } else {
                    Err(Error::DuplicateObject)
                },
                Err(err) => Err(err.clone())
            };

            match result {
                Ok(bounds) => self.aabbs.push((object.id, bounds)),
                Err(err) => {
                    warn!("excluding object {:?} from tick {}: {}", object.id, self.tick, err);
                    self.invalid.push(object.id);
                }
            }
        }
    }

    /// Narrow `x_pairs` down to those which also overlap on Y, leaving the result in `y_pairs`
    fn refine_y(&mut self, execution: Execution) {
        self.narrowed.clear();
        for pair in &self.x_pairs {
            self.narrowed.insert(pair.a());
            self.narrowed.insert(pair.b());
        }

        self.intervals.clear();
        {
            let narrowed = &self.narrowed;
            self.intervals.extend(self.aabbs.iter()
                .filter(|entry| narrowed.contains(&entry.0))
                .map(|&(id, bounds)| (id, bounds.interval(Axis::Y))));
        }

        let previous = std::mem::take(&mut self.y_order);
        self.y_order = sort_axis(
            &mut self.sweep, &self.intervals, previous, self.config.enable_incremental_sort, execution);
        self.y_pairs.clear();
        self.sweep.sweep(&self.y_order, self.config.boundary, &mut self.y_pairs);

        self.x_pair_set.clear();
        self.x_pair_set.extend(self.x_pairs.iter().cloned());
        let x_pair_set = &self.x_pair_set;
        self.y_pairs.retain(|pair| x_pair_set.contains(pair));
    }
}

fn sort_axis<ID>(
    sweep: &mut AxisSweep<ID>,
    intervals: &[(ID, Interval)],
    previous: EndpointOrder<ID>,
    incremental: bool,
    execution: Execution)
    -> EndpointOrder<ID>
where
    ID: ObjectID
{
    match execution {
        Execution::Sequential => sweep.sort(intervals, previous, incremental),
        #[cfg(feature="parallel")]
        Execution::Parallel => sweep.par_sort(intervals, previous, incremental)
    }
}

/// A builder for `Layer`s
#[derive(Default)]
pub struct LayerBuilder {
    config: Config,
    object_capacity: Option<usize>,
    pair_capacity: Option<usize>
}

impl LayerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(&mut self, config: Config) -> &mut Self {
        self.config = config;
        self
    }

    pub fn with_density_threshold(&mut self, threshold: f32) -> &mut Self {
        self.config.density_threshold = threshold;
        self
    }

    pub fn with_hysteresis_ticks(&mut self, ticks: usize) -> &mut Self {
        self.config.hysteresis_ticks = ticks;
        self
    }

    pub fn with_window_size(&mut self, ticks: usize) -> &mut Self {
        self.config.window_size = ticks;
        self
    }

    pub fn with_incremental_sort(&mut self, enabled: bool) -> &mut Self {
        self.config.enable_incremental_sort = enabled;
        self
    }

    pub fn with_y_sweep(&mut self, mode: YSweepMode) -> &mut Self {
        self.config.y_sweep = mode;
        self
    }

    pub fn with_boundary(&mut self, boundary: Boundary) -> &mut Self {
        self.config.boundary = boundary;
        self
    }

    pub fn with_tick_budget(&mut self, budget: Option<Duration>) -> &mut Self {
        self.config.tick_budget = budget;
        self
    }

    pub fn with_object_capacity(&mut self, capacity: usize) -> &mut Self {
        self.object_capacity = Some(capacity);
        self
    }

    pub fn with_pair_capacity(&mut self, capacity: usize) -> &mut Self {
        self.pair_capacity = Some(capacity);
        self
    }

    pub fn build<ID>(&self) -> Layer<ID>
    where
        ID: ObjectID
    {
        let objects = self.object_capacity.unwrap_or(0);
        let pairs = self.pair_capacity.unwrap_or(0);
        Layer::<ID>{
            config: self.config.clone(),
            tick: 0,
            bounds: Vec::with_capacity(objects),
            aabbs: Vec::with_capacity(objects),
            live: FxHashSet::default(),
            invalid: Vec::new(),
            intervals: Vec::with_capacity(objects),
            x_order: EndpointOrder::new(),
            y_order: EndpointOrder::new(),
            sweep: AxisSweep::new(),
            x_pairs: Vec::with_capacity(pairs),
            y_pairs: Vec::new(),
            x_pair_set: FxHashSet::default(),
            narrowed: FxHashSet::default(),
            monitor: DensityMonitor::new(
                self.config.density_threshold,
                self.config.window_size,
                self.config.hysteresis_ticks),
            emitter: PairEmitter::with_capacity(pairs),
            stats: TickStats::default()
        }
    }
}
