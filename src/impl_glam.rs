use crate::{LeafPtr, Neighbor, Octree, OctreeError};

use glam::{IVec3, UVec3};

impl<T, const CHUNK_LEN: usize> Octree<T, CHUNK_LEN> {
    /// Same as [`Octree::at`].
    #[inline]
    pub fn at_vec(&self, p: UVec3) -> Option<LeafPtr> {
        self.at(p.x, p.y, p.z)
    }

    /// Same as [`Octree::get`].
    #[inline]
    pub fn get_vec(&self, p: UVec3) -> Option<&T> {
        self.get(p.x, p.y, p.z)
    }

    /// Same as [`Octree::get_mut`].
    #[inline]
    pub fn get_vec_mut(&mut self, p: UVec3) -> Option<&mut T> {
        self.get_mut(p.x, p.y, p.z)
    }

    /// Same as [`Octree::insert`].
    #[inline]
    pub fn insert_vec(&mut self, p: UVec3, value: T) -> LeafPtr {
        self.insert(p.x, p.y, p.z, value)
    }

    /// Same as [`Octree::try_insert`].
    #[inline]
    pub fn try_insert_vec(&mut self, p: UVec3, value: T) -> Result<LeafPtr, OctreeError> {
        self.try_insert(p.x, p.y, p.z, value)
    }

    /// Same as [`Octree::find_nearest_neighbor`].
    #[inline]
    pub fn find_nearest_neighbor_vec(&self, query: IVec3) -> Option<Neighbor> {
        self.find_nearest_neighbor(query.x, query.y, query.z)
    }

    /// Same as [`Octree::find_k_nearest_neighbors`].
    #[inline]
    pub fn find_k_nearest_neighbors_vec(&self, query: IVec3, k: usize) -> Vec<Neighbor> {
        self.find_k_nearest_neighbors(query.x, query.y, query.z, k)
    }
}

impl Neighbor {
    /// The neighbor's [`coordinates`](Neighbor::coordinates) as a vector.
    #[inline]
    pub fn position(&self) -> UVec3 {
        UVec3::from_array(self.coordinates)
    }
}
