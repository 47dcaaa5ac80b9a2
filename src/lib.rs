//! Sparse point octrees with nearest neighbor search.
//!
//! An [`Octree`] maps integer points of the cube `[0, width)^3` to values of any type `T`, where `width` is a power of
//! two. Each level of the tree decides one bit of every coordinate: at each branch the x, y and z bits for that level
//! are packed into a 3-bit [`ChildIndex`] (x in bit 0, y in bit 1, z in bit 2). So the path from the root to a leaf
//! spells out the leaf's coordinates and vice versa.
//!
//! Branches only spring into existence along paths that insertions actually use, and nodes are never removed. That
//! keeps allocation simple: all branches and leaves live in bump-allocated [`Pool`]s that hand out dense [`AllocPtr`]
//! handles and never move or free an item.
//!
//! ```
//! use point_octree::Octree;
//!
//! let mut tree = Octree::new(8);
//! tree.insert(0, 2, 3, 23);
//! tree.insert(0, 4, 5, 42);
//!
//! let nearest = tree.find_nearest_neighbor(0, 2, 4).unwrap();
//! assert_eq!(nearest.coordinates, [0, 2, 3]);
//! assert_eq!(tree.value(nearest.leaf), &23);
//! ```
//!
//! # Performance
//!
//! - lookup and insertion: O(depth)
//! - nearest neighbor: O(depth) for the first candidate, after which siblings outside the shrinking search box are
//!   pruned
//! - iteration: O(nodes), either structurally with [`Octree::leaves`] or in allocation order with
//!   [`Octree::iter_leaf_values`]
//! - memory usage per node:
//!   - **leaf**: `size_of::<T>()` bytes
//!   - **branch**: `8 * 4` bytes

mod allocator;
mod error;
mod iter;
mod search;
mod shape;
mod tree;

pub use allocator::*;
pub use error::*;
pub use iter::*;
pub use search::*;
pub use shape::*;
pub use tree::*;

#[cfg(feature = "glam")]
mod impl_glam;

#[cfg(feature = "glam")]
pub use glam;

/// The depth of an [`Octree`], i.e. the number of coordinate bits it resolves.
pub type Level = u8;

/// A linear index of a node relative to its parent.
pub type ChildIndex = u8;
