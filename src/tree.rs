use crate::allocator::{AllocPtr, Pool, DEFAULT_CHUNK_LEN, EMPTY_ALLOC_PTR};
use crate::shape::{child_index, child_origin, CHILDREN};
use crate::{ChildIndex, Leaves, Level, OctreeError};

/// The deepest tree that can be constructed. Its width `2^31` is the largest power of two a `u32` can hold.
pub const MAX_DEPTH: Level = 31;

/// Uniquely and stably identifies a leaf in the [`Octree`] that created it.
///
/// There is no removal, so a `LeafPtr` stays valid for as long as its tree lives.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LeafPtr(pub(crate) AllocPtr);

impl LeafPtr {
    /// The position of this leaf in allocation order.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// All child slots of some branch node. Some may be empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BranchChildren<'a> {
    pointers: &'a [AllocPtr; CHILDREN],
}

impl<'a> BranchChildren<'a> {
    #[inline]
    pub fn is_occupied(&self, child: ChildIndex) -> bool {
        self.pointers[child as usize] != EMPTY_ALLOC_PTR
    }

    /// The [`ChildIndex`] of every occupied slot, ascending.
    pub fn occupied(&self) -> impl Iterator<Item = ChildIndex> + 'a {
        let pointers = self.pointers;
        (0..CHILDREN as ChildIndex).filter(move |&i| pointers[i as usize] != EMPTY_ALLOC_PTR)
    }

    /// The number of occupied slots. Always at least 1.
    #[inline]
    pub fn num_occupied(&self) -> usize {
        self.pointers
            .iter()
            .filter(|&&ptr| ptr != EMPTY_ALLOC_PTR)
            .count()
    }
}

/// A sparse octree storing one `T` per occupied integer point of a cube with side `2^depth`.
///
/// Each level of the tree consumes one bit of every coordinate, most significant bit at the root. Branches are created
/// lazily along the paths that insertions actually take, and leaves only exist at the deepest level. Nodes are never
/// removed, so the tree only grows.
///
/// Branches and leaves live in two [`Pool`]s with `CHUNK_LEN` items per chunk. A child slot holds an [`AllocPtr`] into
/// the branch pool or, at the last level, into the leaf pool.
#[derive(Clone, Debug)]
pub struct Octree<T, const CHUNK_LEN: usize = DEFAULT_CHUNK_LEN> {
    /// [`EMPTY_ALLOC_PTR`] until the first insertion.
    root: AllocPtr,
    depth: Level,
    branches: Pool<[AllocPtr; CHILDREN], CHUNK_LEN>,
    leaves: Pool<T, CHUNK_LEN>,
}

impl<T> Octree<T> {
    /// Creates an empty tree covering the cube `[0, width)^3`.
    ///
    /// # Panics
    ///
    /// If `width` is not a power of two in `[4, 2^MAX_DEPTH]`.
    pub fn new(width: u32) -> Self {
        Self::new_generic(width)
    }

    /// Like [`Octree::new`] but reports an invalid `width` as an error.
    pub fn try_new(width: u32) -> Result<Self, OctreeError> {
        Self::try_new_generic(width)
    }
}

impl<T, const CHUNK_LEN: usize> Octree<T, CHUNK_LEN> {
    /// This constructor is only necessary if you need a custom pool chunk length. Otherwise use [`Octree::new`].
    pub fn new_generic(width: u32) -> Self {
        Self::try_new_generic(width).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new_generic(width: u32) -> Result<Self, OctreeError> {
        if !width.is_power_of_two() || width <= 2 || width > 1u32 << MAX_DEPTH {
            return Err(OctreeError::InvalidWidth { width });
        }
        let depth = width.trailing_zeros() as Level;
        tracing::trace!(width, depth, chunk_len = CHUNK_LEN, "created octree");

        Ok(Self {
            root: EMPTY_ALLOC_PTR,
            depth,
            branches: Pool::new(),
            leaves: Pool::new(),
        })
    }

    /// The number of levels between the root and the leaves.
    #[inline]
    pub fn depth(&self) -> Level {
        self.depth
    }

    /// Side length of the cube. Always a power of two.
    #[inline]
    pub fn width(&self) -> u32 {
        1u32 << self.depth
    }

    /// The maximum number of leaves, `width^3`. Nothing is reserved up front.
    #[inline]
    pub fn capacity(&self) -> u128 {
        u128::from(self.width()).pow(3)
    }

    #[inline]
    pub fn count_leaves(&self) -> usize {
        self.leaves.count()
    }

    #[inline]
    pub fn count_branches(&self) -> usize {
        self.branches.count()
    }

    /// True iff nothing was ever inserted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root == EMPTY_ALLOC_PTR
    }

    /// True iff every coordinate is in `[0, width)`.
    #[inline]
    pub fn in_bounds(&self, coordinates: [u32; 3]) -> bool {
        let width = self.width();
        coordinates.iter().all(|&c| c < width)
    }

    /// Looks up the leaf at `(x, y, z)`. Never allocates.
    ///
    /// Coordinates outside of the cube are never occupied, so they simply aren't found.
    pub fn at(&self, x: u32, y: u32, z: u32) -> Option<LeafPtr> {
        let coordinates = [x, y, z];
        if !self.in_bounds(coordinates) {
            return None;
        }

        let mut node = self.root;
        let mut span = self.width();
        while span > 1 && node != EMPTY_ALLOC_PTR {
            span >>= 1;
            node = self.branches[node][child_index(coordinates, span) as usize];
        }

        (node != EMPTY_ALLOC_PTR).then_some(LeafPtr(node))
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32, z: u32) -> bool {
        self.at(x, y, z).is_some()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<&T> {
        self.at(x, y, z).map(|leaf| &self.leaves[leaf.0])
    }

    #[inline]
    pub fn get_mut(&mut self, x: u32, y: u32, z: u32) -> Option<&mut T> {
        let leaf = self.at(x, y, z)?;
        Some(&mut self.leaves[leaf.0])
    }

    /// # Panics
    ///
    /// If `leaf` was not created by this tree.
    #[inline]
    pub fn value(&self, leaf: LeafPtr) -> &T {
        &self.leaves[leaf.0]
    }

    /// # Panics
    ///
    /// If `leaf` was not created by this tree.
    #[inline]
    pub fn value_mut(&mut self, leaf: LeafPtr) -> &mut T {
        &mut self.leaves[leaf.0]
    }

    /// Inserts a leaf holding `value` at `(x, y, z)`.
    ///
    /// If the leaf already exists, it is returned unchanged and `value` is dropped: the first write wins. Use
    /// [`Octree::get_mut`] or [`Octree::value_mut`] to overwrite.
    ///
    /// # Panics
    ///
    /// If any coordinate is outside of `[0, width)`.
    #[inline]
    pub fn insert(&mut self, x: u32, y: u32, z: u32, value: T) -> LeafPtr {
        self.get_or_insert_with(x, y, z, || value)
    }

    /// Like [`Octree::insert`] but reports out of bounds coordinates as an error.
    #[inline]
    pub fn try_insert(&mut self, x: u32, y: u32, z: u32, value: T) -> Result<LeafPtr, OctreeError> {
        self.try_get_or_insert_with(x, y, z, || value)
    }

    /// Gets the leaf at `(x, y, z)` or calls `filler` to create it first.
    ///
    /// # Panics
    ///
    /// If any coordinate is outside of `[0, width)`.
    #[inline]
    pub fn get_or_insert_with(
        &mut self,
        x: u32,
        y: u32,
        z: u32,
        filler: impl FnOnce() -> T,
    ) -> LeafPtr {
        self.try_get_or_insert_with(x, y, z, filler)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Walks exactly `depth` levels from the root, allocating every missing branch on the way. `filler` only runs if the
    /// leaf slot at the end of the path is vacant.
    pub fn try_get_or_insert_with(
        &mut self,
        x: u32,
        y: u32,
        z: u32,
        filler: impl FnOnce() -> T,
    ) -> Result<LeafPtr, OctreeError> {
        let coordinates = [x, y, z];
        if !self.in_bounds(coordinates) {
            return Err(OctreeError::OutOfBounds {
                coordinates,
                width: self.width(),
            });
        }

        let Self {
            root,
            depth,
            branches,
            leaves,
        } = self;

        if *root == EMPTY_ALLOC_PTR {
            *root = branches.allocate([EMPTY_ALLOC_PTR; CHILDREN]);
        }

        // Every level above the last one links a branch to a child branch.
        let mut parent = *root;
        for level in (1..*depth).rev() {
            let child = child_index(coordinates, 1u32 << level) as usize;
            let mut child_ptr = branches[parent][child];
            if child_ptr == EMPTY_ALLOC_PTR {
                child_ptr = branches.allocate([EMPTY_ALLOC_PTR; CHILDREN]);
                branches[parent][child] = child_ptr;
            }
            parent = child_ptr;
        }

        let child = child_index(coordinates, 1) as usize;
        let mut leaf_ptr = branches[parent][child];
        if leaf_ptr == EMPTY_ALLOC_PTR {
            leaf_ptr = leaves.allocate(filler());
            branches[parent][child] = leaf_ptr;
        }

        Ok(LeafPtr(leaf_ptr))
    }

    /// Calls `visitor` with the coordinates and value of every leaf, depth-first in ascending [`ChildIndex`] order.
    pub fn traverse(&mut self, mut visitor: impl FnMut([u32; 3], &mut T)) {
        if self.root != EMPTY_ALLOC_PTR {
            let span = self.width() >> 1;
            Self::traverse_branch(
                &self.branches,
                &mut self.leaves,
                self.root,
                [0; 3],
                span,
                &mut visitor,
            );
        }
    }

    /// Read-only version of [`Octree::traverse`].
    pub fn visit_leaves(&self, mut visitor: impl FnMut([u32; 3], &T)) {
        for (coordinates, _leaf, value) in self.leaves() {
            visitor(coordinates, value);
        }
    }

    /// Iterates over all leaves following the tree structure, reconstructing each leaf's coordinates on the way.
    ///
    /// The order is the same as [`Octree::traverse`].
    #[inline]
    pub fn leaves(&self) -> Leaves<'_, T, CHUNK_LEN> {
        Leaves::new(self)
    }

    /// Iterates over leaf values in allocation order. This order is not spatial.
    #[inline]
    pub fn iter_leaf_values(&self) -> crate::allocator::Iter<'_, T> {
        self.leaves.iter()
    }

    #[inline]
    pub fn iter_leaf_values_mut(&mut self) -> crate::allocator::IterMut<'_, T> {
        self.leaves.iter_mut()
    }

    /// Like [`Octree::iter_leaf_values`] but with each leaf's [`LeafPtr`].
    #[inline]
    pub fn iter_leaves_unordered(&self) -> impl Iterator<Item = (LeafPtr, &T)> + '_ {
        self.leaves
            .iter_with_ptrs()
            .map(|(ptr, value)| (LeafPtr(ptr), value))
    }

    /// Iterates over all branches in allocation order. Branches don't know their own position.
    #[inline]
    pub fn iter_branches(&self) -> impl Iterator<Item = BranchChildren<'_>> + '_ {
        self.branches
            .iter()
            .map(|pointers| BranchChildren { pointers })
    }

    #[inline]
    pub(crate) fn root_ptr(&self) -> Option<AllocPtr> {
        (self.root != EMPTY_ALLOC_PTR).then_some(self.root)
    }

    #[inline]
    pub(crate) fn branch_pool(&self) -> &Pool<[AllocPtr; CHILDREN], CHUNK_LEN> {
        &self.branches
    }

    #[inline]
    pub(crate) fn leaf_pool(&self) -> &Pool<T, CHUNK_LEN> {
        &self.leaves
    }

    /// `span` is the side length of the children of `branch`.
    fn traverse_branch<F>(
        branches: &Pool<[AllocPtr; CHILDREN], CHUNK_LEN>,
        leaves: &mut Pool<T, CHUNK_LEN>,
        branch: AllocPtr,
        origin: [u32; 3],
        span: u32,
        visitor: &mut F,
    ) where
        F: FnMut([u32; 3], &mut T),
    {
        for (child, &child_ptr) in branches[branch].iter().enumerate() {
            if child_ptr == EMPTY_ALLOC_PTR {
                continue;
            }
            let child_coords = child_origin(origin, child as ChildIndex, span);
            if span == 1 {
                visitor(child_coords, &mut leaves[child_ptr]);
            } else {
                Self::traverse_branch(branches, leaves, child_ptr, child_coords, span >> 1, visitor);
            }
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn geometry() {
        let tree = Octree::<()>::new(8);

        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.width(), 8);
        assert_eq!(tree.capacity(), 512);
        assert!(tree.is_empty());

        let tree = Octree::<()>::new(1u32 << MAX_DEPTH);
        assert_eq!(tree.depth(), 31);
        assert_eq!(tree.capacity(), 1u128 << 93);
    }

    #[test]
    fn invalid_widths() {
        for width in [0, 1, 2, 3, 6, 100, (1u32 << MAX_DEPTH) + 1, u32::MAX] {
            assert_eq!(
                Octree::<()>::try_new(width).err(),
                Some(OctreeError::InvalidWidth { width })
            );
        }
        assert!(Octree::<()>::try_new(4).is_ok());
    }

    #[test]
    fn every_power_of_two_from_four_is_valid() {
        for shift in 2..=MAX_DEPTH {
            let tree = Octree::<u8>::try_new(1u32 << shift).unwrap();
            assert_eq!(tree.depth(), shift);
        }
    }

    #[test]
    fn widest_tree_reaches_its_far_corner() {
        let mut tree = Octree::new(1u32 << MAX_DEPTH);
        let far = u32::MAX >> 1;
        let corner = tree.insert(far, far, far, 'z');
        tree.insert(0, 0, 0, 'a');

        assert_eq!(tree.at(far, far, far), Some(corner));
        assert_eq!(tree.at(far + 1, 0, 0), None);
        // The two paths split at the root.
        assert_eq!(tree.count_branches(), 1 + 2 * 30);
        let coords: Vec<_> = tree.leaves().map(|(coords, _, _)| coords).collect();
        assert_eq!(coords, vec![[0, 0, 0], [far, far, far]]);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn new_panics_on_invalid_width() {
        let _ = Octree::<()>::new(12);
    }

    #[test]
    fn empty_tree_finds_nothing() {
        let tree = Octree::<u32>::new(16);

        assert_eq!(tree.at(0, 0, 0), None);
        assert_eq!(tree.at(15, 15, 15), None);
        assert_eq!(tree.get(3, 4, 5), None);
        assert_eq!(tree.count_leaves(), 0);
        assert_eq!(tree.count_branches(), 0);
        assert_eq!(tree.leaves().next(), None);
    }

    #[test]
    fn insert_then_at() {
        let mut tree = Octree::new(8);

        let leaf = tree.insert(0, 2, 3, 23);
        assert!(!tree.is_empty());
        assert_eq!(tree.at(0, 2, 3), Some(leaf));
        assert_eq!(tree.value(leaf), &23);
        assert_eq!(tree.get(0, 2, 3), Some(&23));
        assert!(tree.contains(0, 2, 3));

        assert_eq!(tree.at(0, 2, 4), None);
        assert_eq!(tree.at(3, 2, 0), None);
    }

    #[test]
    fn insert_creates_one_branch_per_level() {
        let mut tree = Octree::new(8);

        tree.insert(0, 2, 3, 23);
        assert_eq!(tree.count_branches(), 3);
        assert_eq!(tree.count_leaves(), 1);

        // Shares only the root with (0, 2, 3).
        tree.insert(0, 4, 5, 42);
        assert_eq!(tree.count_branches(), 5);
        assert_eq!(tree.count_leaves(), 2);

        // Shares the whole path down to the last branch.
        tree.insert(1, 2, 3, 7);
        assert_eq!(tree.count_branches(), 5);
        assert_eq!(tree.count_leaves(), 3);
    }

    #[test]
    fn first_insert_wins() {
        let mut tree = Octree::new(4);

        let first = tree.insert(1, 2, 3, "first");
        let branches = tree.count_branches();
        let second = tree.insert(1, 2, 3, "second");

        assert_eq!(first, second);
        assert_eq!(tree.value(second), &"first");
        assert_eq!(tree.count_leaves(), 1);
        assert_eq!(tree.count_branches(), branches);
    }

    #[test]
    fn get_or_insert_with_only_fills_vacant_leaves() {
        let mut tree = Octree::new(4);

        let mut calls = 0;
        let leaf = tree.get_or_insert_with(3, 3, 3, || {
            calls += 1;
            10
        });
        let again = tree.get_or_insert_with(3, 3, 3, || {
            calls += 1;
            20
        });

        assert_eq!(leaf, again);
        assert_eq!(calls, 1);
        assert_eq!(tree.value(leaf), &10);
    }

    #[test]
    fn out_of_bounds() {
        let mut tree = Octree::new(8);
        tree.insert(0, 0, 0, ());

        // Would alias (0, 0, 0) if the width bit were ignored.
        assert_eq!(tree.at(8, 0, 0), None);
        assert_eq!(tree.at(0, 0, u32::MAX), None);
        assert_eq!(
            tree.try_insert(0, 8, 0, ()),
            Err(OctreeError::OutOfBounds {
                coordinates: [0, 8, 0],
                width: 8
            })
        );
        assert_eq!(tree.count_leaves(), 1);
    }

    #[test]
    #[should_panic(expected = "outside of the octree")]
    fn insert_out_of_bounds_panics() {
        let mut tree = Octree::new(8);
        tree.insert(1, 9, 1, ());
    }

    #[test]
    fn overwrite_through_get_mut() {
        let mut tree = Octree::new(16);
        let leaf = tree.insert(5, 6, 7, 1);

        *tree.get_mut(5, 6, 7).unwrap() = 2;
        assert_eq!(tree.value(leaf), &2);

        *tree.value_mut(leaf) += 1;
        assert_eq!(tree.get(5, 6, 7), Some(&3));

        assert_eq!(tree.get_mut(5, 6, 8), None);
    }

    #[test]
    fn every_point_of_a_small_cube() {
        let mut tree = Octree::<u32, 16>::new_generic(4);

        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    tree.insert(x, y, z, x + 10 * y + 100 * z);
                }
            }
        }

        assert_eq!(tree.count_leaves(), 64);
        assert_eq!(tree.count_branches(), 1 + 8);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    assert_eq!(tree.get(x, y, z), Some(&(x + 10 * y + 100 * z)));
                }
            }
        }
    }

    #[test]
    fn traverse_reconstructs_coordinates() {
        let mut tree = Octree::new(8);
        let points = [[7, 0, 0], [0, 0, 1], [3, 5, 6], [0, 0, 0], [7, 7, 7]];
        for p in points {
            tree.insert(p[0], p[1], p[2], p);
        }

        let mut visited = Vec::new();
        tree.traverse(|coords, value| {
            assert_eq!(coords, *value);
            visited.push(coords);
        });

        // Depth-first, ascending child index.
        assert_eq!(
            visited,
            vec![[0, 0, 0], [0, 0, 1], [7, 0, 0], [3, 5, 6], [7, 7, 7]]
        );
    }

    #[test]
    fn traverse_can_mutate() {
        let mut tree = Octree::new(16);
        tree.insert(1, 1, 1, 1);
        tree.insert(9, 9, 9, 2);

        tree.traverse(|_coords, value| *value *= 10);

        assert_eq!(tree.get(1, 1, 1), Some(&10));
        assert_eq!(tree.get(9, 9, 9), Some(&20));
    }

    #[test]
    fn traverse_empty_tree_is_a_no_op() {
        let mut tree = Octree::<u8>::new(8);
        let mut calls = 0;
        tree.traverse(|_, _| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn visit_leaves_matches_traverse() {
        let mut tree = Octree::new(32);
        for (i, p) in [[31, 0, 4], [2, 2, 2], [16, 17, 18], [2, 2, 3]].iter().enumerate() {
            tree.insert(p[0], p[1], p[2], i);
        }

        let mut from_traverse = Vec::new();
        tree.traverse(|coords, value| from_traverse.push((coords, *value)));
        let mut from_visit = Vec::new();
        tree.visit_leaves(|coords, value| from_visit.push((coords, *value)));

        assert_eq!(from_traverse, from_visit);
    }

    #[test]
    fn pool_order_iteration() {
        let mut tree = Octree::<char, 2>::new_generic(8);
        tree.insert(7, 7, 7, 'a');
        tree.insert(0, 0, 0, 'b');
        tree.insert(4, 4, 4, 'c');

        // Allocation order, not spatial order.
        let values: String = tree.iter_leaf_values().collect();
        assert_eq!(values, "abc");

        let unordered: Vec<_> = tree.iter_leaves_unordered().collect();
        assert_eq!(unordered[1], (tree.at(0, 0, 0).unwrap(), &'b'));

        for value in tree.iter_leaf_values_mut() {
            *value = value.to_ascii_uppercase();
        }
        assert_eq!(tree.get(4, 4, 4), Some(&'C'));

        assert_eq!(tree.iter_branches().count(), tree.count_branches());
        let root = tree.iter_branches().next().unwrap();
        assert_eq!(root.occupied().collect::<Vec<_>>(), vec![0, 7]);
        assert_eq!(root.num_occupied(), 2);
        assert!(root.is_occupied(7));
        assert!(!root.is_occupied(3));
        assert!(tree.iter_branches().all(|branch| branch.num_occupied() >= 1));
    }

    #[test]
    fn clone_is_independent() {
        let mut tree = Octree::new(8);
        tree.insert(1, 2, 3, 1);

        let mut copy = tree.clone();
        copy.insert(3, 2, 1, 2);
        *copy.get_mut(1, 2, 3).unwrap() = 5;

        assert_eq!(tree.count_leaves(), 1);
        assert_eq!(tree.get(1, 2, 3), Some(&1));
        assert_eq!(copy.count_leaves(), 2);
        assert_eq!(copy.get(1, 2, 3), Some(&5));
    }
}
