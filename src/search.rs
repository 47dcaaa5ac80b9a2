use crate::allocator::{AllocPtr, Pool, EMPTY_ALLOC_PTR};
use crate::shape::{child_origin, query_child_index, CHILDREN};
use crate::{ChildIndex, LeafPtr, Octree};

/// A leaf found by a nearest neighbor search.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Neighbor {
    pub leaf: LeafPtr,
    pub coordinates: [u32; 3],
    /// Squared Euclidean distance to the query. Wider than `u64` because an `i32` query can be almost `2^32` away from
    /// a point on every axis.
    pub squared_distance: u128,
}

impl<T, const CHUNK_LEN: usize> Octree<T, CHUNK_LEN> {
    /// Finds the occupied point closest to `(x, y, z)`. The query doesn't need to be occupied or even inside the cube.
    ///
    /// If several points are equally close, the first one found wins. Returns `None` iff the tree is empty.
    pub fn find_nearest_neighbor(&self, x: i32, y: i32, z: i32) -> Option<Neighbor> {
        let root = self.root_ptr()?;
        let mut search = BranchAndBound::new(self.branch_pool(), [x, y, z], Nearest { best: None });
        search.search(root, [0; 3], self.width() >> 1);
        search.candidates.best
    }

    /// Finds up to `k` occupied points closest to `(x, y, z)`, sorted by ascending distance.
    ///
    /// Points at equal distance keep the order in which they were found. Returns fewer than `k` neighbors iff the tree
    /// holds fewer than `k` leaves.
    pub fn find_k_nearest_neighbors(&self, x: i32, y: i32, z: i32, k: usize) -> Vec<Neighbor> {
        let Some(root) = self.root_ptr().filter(|_| k > 0) else {
            return Vec::new();
        };
        let candidates = KNearest {
            k,
            found: Vec::with_capacity(k.min(self.count_leaves())),
        };
        let mut search = BranchAndBound::new(self.branch_pool(), [x, y, z], candidates);
        search.search(root, [0; 3], self.width() >> 1);
        search.candidates.found
    }
}

/// Keeps the leaves a search has accepted so far.
trait Candidates {
    /// Returns the squared radius the search is still bounded by if `candidate` was accepted.
    fn offer(&mut self, candidate: Neighbor) -> Option<u128>;
}

struct Nearest {
    best: Option<Neighbor>,
}

impl Candidates for Nearest {
    #[inline]
    fn offer(&mut self, candidate: Neighbor) -> Option<u128> {
        let best_distance = self.best.map_or(u128::MAX, |best| best.squared_distance);
        if candidate.squared_distance < best_distance {
            self.best = Some(candidate);
            Some(candidate.squared_distance)
        } else {
            None
        }
    }
}

struct KNearest {
    k: usize,
    /// Sorted by ascending distance.
    found: Vec<Neighbor>,
}

impl Candidates for KNearest {
    fn offer(&mut self, candidate: Neighbor) -> Option<u128> {
        if self.found.len() == self.k {
            match self.found.last() {
                Some(worst) if candidate.squared_distance < worst.squared_distance => {
                    self.found.pop();
                }
                _ => return None,
            }
        }

        let position = self
            .found
            .partition_point(|n| n.squared_distance <= candidate.squared_distance);
        self.found.insert(position, candidate);

        // Until there are k candidates, anything might still be accepted.
        if self.found.len() == self.k {
            self.found.last().map(|worst| worst.squared_distance)
        } else {
            None
        }
    }
}

/// Axis-aligned search volume, inclusive on both ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SearchBox {
    min: [i64; 3],
    max: [i64; 3],
}

impl SearchBox {
    const UNBOUNDED: Self = Self {
        min: [i64::MIN; 3],
        max: [i64::MAX; 3],
    };

    /// The cube of half-width `ceil(sqrt(squared_radius))` centered on `center`.
    fn around(center: [i64; 3], squared_radius: u128) -> Self {
        let r = i64::try_from(ceil_sqrt(squared_radius)).unwrap_or(i64::MAX);
        Self {
            min: center.map(|c| c.saturating_sub(r)),
            max: center.map(|c| c.saturating_add(r)),
        }
    }

    /// True unless the cube at `origin` with side `span` is fully separated from this box along some axis.
    #[inline]
    fn intersects_cube(&self, origin: [u32; 3], span: u32) -> bool {
        (0..3).all(|axis| {
            let lo = i64::from(origin[axis]);
            let hi = lo + i64::from(span);
            !(self.max[axis] < lo || self.min[axis] > hi)
        })
    }
}

/// Recursive branch-and-bound walk shared by all nearest neighbor queries.
struct BranchAndBound<'a, C, const CHUNK_LEN: usize> {
    branches: &'a Pool<[AllocPtr; CHILDREN], CHUNK_LEN>,
    query: [i64; 3],
    /// Reset around the query whenever the candidates tighten their bound.
    search_box: SearchBox,
    candidates: C,
}

impl<'a, C, const CHUNK_LEN: usize> BranchAndBound<'a, C, CHUNK_LEN>
where
    C: Candidates,
{
    fn new(branches: &'a Pool<[AllocPtr; CHILDREN], CHUNK_LEN>, query: [i32; 3], candidates: C) -> Self {
        Self {
            branches,
            query: query.map(i64::from),
            search_box: SearchBox::UNBOUNDED,
            candidates,
        }
    }

    fn check_leaf(&mut self, leaf: AllocPtr, coordinates: [u32; 3]) {
        let candidate = Neighbor {
            leaf: LeafPtr(leaf),
            coordinates,
            squared_distance: squared_distance(self.query, coordinates),
        };
        if let Some(squared_radius) = self.candidates.offer(candidate) {
            self.search_box = SearchBox::around(self.query, squared_radius);
        }
    }

    #[inline]
    fn check_branch(&self, origin: [u32; 3], span: u32) -> bool {
        self.search_box.intersects_cube(origin, span)
    }

    /// `span` is the side length of the children of `branch`.
    fn search(&mut self, branch: AllocPtr, origin: [u32; 3], span: u32) {
        let branches = self.branches;
        let children = &branches[branch];

        // The octant on the direct path to the query usually yields a tight bound early.
        let expected = query_child_index(self.query, span);
        for i in 0..CHILDREN as ChildIndex {
            let child = (expected + i) & 7;
            let child_ptr = children[child as usize];
            if child_ptr == EMPTY_ALLOC_PTR {
                continue;
            }

            let child_coords = child_origin(origin, child, span);
            if span == 1 {
                self.check_leaf(child_ptr, child_coords);
            } else if self.check_branch(child_coords, span) {
                self.search(child_ptr, child_coords, span >> 1);
            }
        }
    }
}

#[inline]
fn squared_distance(query: [i64; 3], point: [u32; 3]) -> u128 {
    query
        .iter()
        .zip(point)
        .map(|(&q, p)| u128::from((q - i64::from(p)).unsigned_abs()).pow(2))
        .sum()
}

fn ceil_sqrt(n: u128) -> u128 {
    let mut root = (n as f64).sqrt() as u128;
    while root.checked_mul(root).map_or(true, |square| square > n) {
        root -= 1;
    }
    while root.checked_mul(root).is_some_and(|square| square < n) {
        root += 1;
    }
    root
}
