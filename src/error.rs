use crate::MAX_DEPTH;

use thiserror::Error;

/// Returned by the fallible constructors and insertion methods of [`Octree`](crate::Octree).
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum OctreeError {
    #[error("octree width must be a power of two in [4, {max}], got {width}", max = 1u32 << MAX_DEPTH)]
    InvalidWidth { width: u32 },

    #[error("coordinates {coordinates:?} are outside of the octree cube with width {width}")]
    OutOfBounds { coordinates: [u32; 3], width: u32 },
}
