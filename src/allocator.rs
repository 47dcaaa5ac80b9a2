use std::iter::Flatten;
use std::ops::{Index, IndexMut};
use std::slice;

/// Points to an item owned by a [`Pool`].
pub type AllocPtr = u32;

/// An [`AllocPtr`] that doesn't point to anything.
pub const EMPTY_ALLOC_PTR: AllocPtr = AllocPtr::MAX;

/// The number of items in one [`Pool`] chunk unless configured otherwise.
pub const DEFAULT_CHUNK_LEN: usize = 1024;

/// Iterates over pool items in allocation order.
pub type Iter<'a, T> = Flatten<slice::Iter<'a, Vec<T>>>;

/// Mutably iterates over pool items in allocation order.
pub type IterMut<'a, T> = Flatten<slice::IterMut<'a, Vec<T>>>;

/// A non-freeing block allocator for a single item type.
///
/// Items live in chunks of exactly `LEN` slots. A chunk is allocated with capacity `LEN` and never pushed past it, so an
/// item never moves after it has been allocated and its [`AllocPtr`] stays valid for the whole lifetime of the pool.
/// Individual items can't be freed; every chunk is released together when the pool is dropped.
///
/// Pointers are handed out densely: the `n`th allocation gets the pointer `n`.
#[derive(Debug)]
pub struct Pool<T, const LEN: usize = DEFAULT_CHUNK_LEN> {
    /// Every chunk except the last one is full.
    chunks: Vec<Vec<T>>,
}

impl<T, const LEN: usize> Default for Pool<T, LEN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, const LEN: usize> Clone for Pool<T, LEN> {
    fn clone(&self) -> Self {
        // `Vec::clone` shrinks capacity to the length, which would let the last chunk reallocate on the next push.
        let chunks = self
            .chunks
            .iter()
            .map(|chunk| {
                let mut copy = Vec::with_capacity(LEN);
                copy.extend_from_slice(chunk);
                copy
            })
            .collect();
        Self { chunks }
    }
}

impl<T, const LEN: usize> Pool<T, LEN> {
    /// The number of item slots in each chunk.
    pub const CHUNK_LEN: usize = LEN;

    /// Only whole chunks below [`EMPTY_ALLOC_PTR`] are handed out, so every slot has a valid pointer.
    const MAX_CHUNKS: usize = EMPTY_ALLOC_PTR as usize / LEN;

    /// Creates an empty pool. No memory is reserved until the first allocation.
    pub fn new() -> Self {
        const { assert!(LEN > 0, "pool chunks must hold at least one item") };
        Self { chunks: Vec::new() }
    }

    /// Moves `value` into the next free slot, appending a fresh chunk first if the current one is full.
    ///
    /// Running out of memory aborts, as with any other Rust allocation.
    #[inline]
    pub fn allocate(&mut self, value: T) -> AllocPtr {
        if self.cursor() == LEN {
            self.grow();
        }

        let chunk_index = self.chunks.len() - 1;
        let chunk = &mut self.chunks[chunk_index];
        let ptr = chunk_index * LEN + chunk.len();
        debug_assert!(chunk.len() < chunk.capacity());
        chunk.push(value);

        ptr as AllocPtr
    }

    /// The number of items ever allocated.
    #[inline]
    pub fn count(&self) -> usize {
        match self.chunks.last() {
            Some(last) => (self.chunks.len() - 1) * LEN + last.len(),
            None => 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The number of chunks backing this pool.
    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn contains(&self, ptr: AllocPtr) -> bool {
        (ptr as usize) < self.count()
    }

    #[inline]
    pub fn get(&self, ptr: AllocPtr) -> Option<&T> {
        let (chunk, slot) = Self::split(ptr);
        self.chunks.get(chunk)?.get(slot)
    }

    #[inline]
    pub fn get_mut(&mut self, ptr: AllocPtr) -> Option<&mut T> {
        let (chunk, slot) = Self::split(ptr);
        self.chunks.get_mut(chunk)?.get_mut(slot)
    }

    /// Visits every item in allocation order: chunk by chunk, then slot by slot.
    ///
    /// This order is a memory layout artifact and says nothing about how the items relate to each other.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        self.chunks.iter().flatten()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        self.chunks.iter_mut().flatten()
    }

    /// Like [`Pool::iter`], but each item is paired with its pointer.
    #[inline]
    pub fn iter_with_ptrs(&self) -> impl Iterator<Item = (AllocPtr, &T)> + '_ {
        self.iter()
            .enumerate()
            .map(|(ptr, item)| (ptr as AllocPtr, item))
    }

    /// Next free slot of the last chunk. A pool without chunks counts as full.
    #[inline]
    fn cursor(&self) -> usize {
        self.chunks.last().map_or(LEN, Vec::len)
    }

    #[cold]
    fn grow(&mut self) {
        assert!(
            self.chunks.len() < Self::MAX_CHUNKS,
            "pool exhausted the AllocPtr space"
        );
        self.chunks.push(Vec::with_capacity(LEN));
        tracing::debug!(
            item = std::any::type_name::<T>(),
            chunk_len = LEN,
            num_chunks = self.chunks.len(),
            "pool grew by one chunk"
        );
    }

    #[inline]
    fn split(ptr: AllocPtr) -> (usize, usize) {
        let ptr = ptr as usize;
        (ptr / LEN, ptr % LEN)
    }
}

impl<T, const LEN: usize> Index<AllocPtr> for Pool<T, LEN> {
    type Output = T;

    #[inline]
    fn index(&self, ptr: AllocPtr) -> &T {
        self.get(ptr)
            .unwrap_or_else(|| panic!("{ptr:?} was not allocated by this pool"))
    }
}

impl<T, const LEN: usize> IndexMut<AllocPtr> for Pool<T, LEN> {
    #[inline]
    fn index_mut(&mut self, ptr: AllocPtr) -> &mut T {
        self.get_mut(ptr)
            .unwrap_or_else(|| panic!("{ptr:?} was not allocated by this pool"))
    }
}

impl<'a, T, const LEN: usize> IntoIterator for &'a Pool<T, LEN> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
