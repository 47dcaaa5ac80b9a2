use crate::ChildIndex;

use ndshape::{ConstPow2Shape3u32, ConstShape};

/// The 2x2x2 shape of a branch's children.
///
/// Linearizing a child offset `[x, y, z]`, where each component is 0 or 1, puts the x bit at bit 0, the y bit at bit 1
/// and the z bit at bit 2 of the resulting [`ChildIndex`].
pub type OctantShape = ConstPow2Shape3u32<1, 1, 1>;

/// The number of child slots in a branch.
pub const CHILDREN: usize = 8;

/// Picks the child on the path to `coordinates`, where `span` is the side length of the children.
///
/// `span` is a power of two, so it masks exactly the coordinate bit that belongs to this level of the tree.
#[inline]
pub fn child_index(coordinates: [u32; 3], span: u32) -> ChildIndex {
    debug_assert!(span.is_power_of_two());
    OctantShape::linearize(coordinates.map(|c| u32::from(c & span != 0))) as ChildIndex
}

/// Same as [`child_index`] for a search query, which may lie outside of the cube.
#[inline]
pub fn query_child_index(query: [i64; 3], span: u32) -> ChildIndex {
    debug_assert!(span.is_power_of_two());
    let mask = i64::from(span);
    OctantShape::linearize(query.map(|c| u32::from(c & mask != 0))) as ChildIndex
}

/// The minimum corner of child `index` given the minimum corner of its parent. `span` is the side length of the child.
#[inline]
pub fn child_origin(parent_origin: [u32; 3], index: ChildIndex, span: u32) -> [u32; 3] {
    let offset = OctantShape::delinearize(u32::from(index & 7));
    let mut origin = parent_origin;
    for (component, bit) in origin.iter_mut().zip(offset) {
        *component |= bit * span;
    }
    origin
}
