// mlodato, 20190219

//! An adaptive sweep-and-prune broadphase for large sets of moving 2D polygons
//!
//! Every tick, a [`Layer`] computes an axis-aligned bounding box per polygon, sweeps the X axis for
//! overlapping intervals and, when the scene is dense enough for it to pay off, refines those candidates
//! with a second sweep on the Y axis.  The result is a sorted, duplicate-free list of
//! [`CandidatePair`]s for an exact (narrow-phase) test elsewhere.
//!
//! Endpoint orders are carried from one tick to the next so that nearly-sorted data is re-sorted with
//! insertion sort rather than from scratch.
//!
//! [`Layer`]: struct.Layer.html
//! [`CandidatePair`]: struct.CandidatePair.html

#[macro_use]
extern crate log;

mod density;
mod error;
mod geom;
mod layer;
mod pairs;
mod sweep;
mod traits;

pub use density::{DensityMonitor, DensitySample, YSweepState};
pub use error::Error;
pub use geom::{Axis, Bounds, ObjectState, Polygon, Transform, INLINE_VERTICES, extract_bounds};
pub use layer::{Config, Layer, LayerBuilder, TickStats, YSweepMode};
pub use pairs::{CandidatePair, PairEmitter};
pub use sweep::{AxisSweep, Boundary, Endpoint, EndpointKind, EndpointOrder, Interval, sweep_intervals};
pub use traits::{ObjectID, Overlaps};

#[cfg(feature="parallel")]
pub use geom::par_extract_bounds;
