/// Errors raised while preparing objects for the sweep
///
/// None of these cross a tick boundary: [`Layer`] excludes the offending object and logs a
/// warning instead.
///
/// [`Layer`]: struct.Layer.html
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("polygon has {vertices} vertices; at least 3 are required")]
    InvalidGeometry { vertices: usize },
    #[error("polygon or transform contains a non-finite coordinate")]
    NonFiniteGeometry,
    #[error("interval is degenerate (min {min} > max {max})")]
    DegenerateInterval { min: f32, max: f32 },
    #[error("object id appears more than once in a single tick")]
    DuplicateObject,
}
