use crate::allocator::{AllocPtr, EMPTY_ALLOC_PTR};
use crate::shape::{child_origin, CHILDREN};
use crate::{ChildIndex, LeafPtr, Octree, MAX_DEPTH};

use smallvec::SmallVec;
use std::iter::FusedIterator;

/// One branch on the path from the root to the current leaf.
#[derive(Clone, Copy, Debug)]
struct Frame {
    branch: AllocPtr,
    /// The next child slot to look at.
    next_child: ChildIndex,
    origin: [u32; 3],
}

/// Depth-first iterator over the leaves of an [`Octree`], in ascending [`ChildIndex`] order.
///
/// Leaves don't store their coordinates. They are rebuilt from the child indices on the stack, one bit per level.
///
/// Created by [`Octree::leaves`].
#[derive(Clone, Debug)]
pub struct Leaves<'a, T, const CHUNK_LEN: usize> {
    tree: &'a Octree<T, CHUNK_LEN>,
    stack: SmallVec<[Frame; MAX_DEPTH as usize]>,
}

impl<'a, T, const CHUNK_LEN: usize> Leaves<'a, T, CHUNK_LEN> {
    pub(crate) fn new(tree: &'a Octree<T, CHUNK_LEN>) -> Self {
        let mut stack = SmallVec::new();
        if let Some(root) = tree.root_ptr() {
            stack.push(Frame {
                branch: root,
                next_child: 0,
                origin: [0; 3],
            });
        }
        Self { tree, stack }
    }
}

impl<'a, T, const CHUNK_LEN: usize> Iterator for Leaves<'a, T, CHUNK_LEN> {
    type Item = ([u32; 3], LeafPtr, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let depth = tree.depth() as usize;
        loop {
            let level = self.stack.len();
            let frame = self.stack.last_mut()?;
            // Side length of the children of `frame.branch`.
            let span = 1u32 << (depth - level);
            let children = &tree.branch_pool()[frame.branch];

            let next = (frame.next_child as usize..CHILDREN).find(|&i| children[i] != EMPTY_ALLOC_PTR);
            let Some(child) = next else {
                self.stack.pop();
                continue;
            };

            frame.next_child = child as ChildIndex + 1;
            let child_ptr = children[child];
            let origin = child_origin(frame.origin, child as ChildIndex, span);
            if span == 1 {
                return Some((origin, LeafPtr(child_ptr), &tree.leaf_pool()[child_ptr]));
            }
            self.stack.push(Frame {
                branch: child_ptr,
                next_child: 0,
                origin,
            });
        }
    }
}

impl<'a, T, const CHUNK_LEN: usize> FusedIterator for Leaves<'a, T, CHUNK_LEN> {}
