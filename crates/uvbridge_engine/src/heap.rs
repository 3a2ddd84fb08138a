//! # Engine Heap
//!
//! First-fit allocator over the linear buffer, standing in for the compiled
//! module's `malloc`/`realloc`/`free`.
//!
//! ## Design
//!
//! - Bookkeeping lives on the Rust side; memory holds only payload bytes
//! - Blocks are 8-byte aligned and at least 8 bytes long
//! - Address 0 is never handed out, so null always means "no block"
//! - When no free block fits, the buffer grows by whole pages; if it cannot
//!   grow, the request fails with a null address

use std::collections::{BTreeMap, HashMap};
use uvbridge_memory::{Address, LinearBuffer, MemoryViews, PAGE_SIZE};

/// Allocation granularity and alignment.
pub const BLOCK_ALIGN: u32 = 8;

/// First byte the heap manages. Everything below stays reserved.
pub const HEAP_BASE: u32 = BLOCK_ALIGN;

#[inline]
const fn round_up(size: u32) -> Option<u32> {
    match size.checked_add(BLOCK_ALIGN - 1) {
        Some(padded) => Some(padded & !(BLOCK_ALIGN - 1)),
        None => None,
    }
}

/// Free-list allocator for the engine side of linear memory.
#[derive(Debug)]
pub struct EngineHeap {
    /// Free blocks, start -> length.
    free: BTreeMap<u32, u32>,
    /// Live blocks, start -> length.
    live: HashMap<u32, u32>,
    /// One past the last managed byte.
    end: u32,
}

impl EngineHeap {
    /// Creates a heap managing `[HEAP_BASE, size)` of the buffer.
    #[must_use]
    pub fn new<B: LinearBuffer>(memory: &MemoryViews<B>) -> Self {
        let mut heap = Self {
            free: BTreeMap::new(),
            live: HashMap::new(),
            end: HEAP_BASE,
        };
        heap.adopt(memory);
        heap
    }

    /// Number of live blocks.
    #[inline]
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.live.len()
    }

    /// Total bytes held by live blocks.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        self.live.values().map(|&len| u64::from(len)).sum()
    }

    /// Usable size of the block at `address`, if it is live.
    #[inline]
    #[must_use]
    pub fn block_size(&self, address: Address) -> Option<u32> {
        self.live.get(&address.get()).copied()
    }

    /// Takes ownership of any bytes the buffer gained beyond `end`.
    fn adopt<B: LinearBuffer>(&mut self, memory: &MemoryViews<B>) {
        let size = u32::try_from(memory.size()).unwrap_or(u32::MAX) & !(BLOCK_ALIGN - 1);
        if size > self.end {
            self.release(self.end, size - self.end);
            self.end = size;
        }
    }

    /// Returns a range to the free list, merging with its neighbours.
    fn release(&mut self, mut start: u32, mut len: u32) {
        if let Some((&prev, &prev_len)) = self.free.range(..start).next_back() {
            if prev + prev_len == start {
                self.free.remove(&prev);
                start = prev;
                len += prev_len;
            }
        }
        if let Some(next_len) = self.free.remove(&(start + len)) {
            len += next_len;
        }
        self.free.insert(start, len);
    }

    fn take_fit(&mut self, len: u32) -> Option<u32> {
        let (&start, &block) = self.free.iter().find(|(_, &block)| block >= len)?;
        self.free.remove(&start);
        if block > len {
            self.free.insert(start + len, block - len);
        }
        self.live.insert(start, len);
        Some(start)
    }

    /// Grows the buffer so a block of `len` bytes fits at the end.
    fn grow_for<B: LinearBuffer>(&mut self, memory: &mut MemoryViews<B>, len: u32) -> bool {
        let tail = self
            .free
            .range(..self.end)
            .next_back()
            .filter(|(&start, &block)| start + block == self.end)
            .map_or(0, |(_, &block)| block);
        let missing = u64::from(len - tail.min(len));
        let pages = missing.div_ceil(PAGE_SIZE as u64);
        let Ok(pages) = u32::try_from(pages) else {
            return false;
        };
        match memory.grow(pages) {
            Ok(_) => {
                self.adopt(memory);
                true
            }
            Err(err) => {
                tracing::warn!("engine heap cannot grow for {} bytes: {}", len, err);
                false
            }
        }
    }

    /// Allocates `size` bytes. Returns null on exhaustion.
    pub fn malloc<B: LinearBuffer>(&mut self, memory: &mut MemoryViews<B>, size: u32) -> Address {
        let Some(len) = round_up(size.max(1)) else {
            return Address::NULL;
        };
        if let Some(start) = self.take_fit(len) {
            return Address::new(start);
        }
        if self.grow_for(memory, len) {
            if let Some(start) = self.take_fit(len) {
                return Address::new(start);
            }
        }
        Address::NULL
    }

    /// Allocates `size` zeroed bytes. Returns null on exhaustion.
    pub fn calloc<B: LinearBuffer>(&mut self, memory: &mut MemoryViews<B>, size: u32) -> Address {
        let address = self.malloc(memory, size);
        if !address.is_null() && memory.fill(address, size as usize, 0).is_err() {
            self.free(address);
            return Address::NULL;
        }
        address
    }

    /// Resizes a block, moving it if needed.
    ///
    /// A null `address` behaves like [`EngineHeap::malloc`]; a zero `size`
    /// frees the block and returns null. On failure the old block is intact.
    pub fn realloc<B: LinearBuffer>(
        &mut self,
        memory: &mut MemoryViews<B>,
        address: Address,
        size: u32,
    ) -> Address {
        if address.is_null() {
            return self.malloc(memory, size);
        }
        if size == 0 {
            self.free(address);
            return Address::NULL;
        }
        let Some(old_len) = self.block_size(address) else {
            tracing::warn!("realloc of unknown block {}", address);
            return Address::NULL;
        };
        if round_up(size).is_some_and(|len| len <= old_len) {
            return address;
        }

        let moved = self.malloc(memory, size);
        if moved.is_null() {
            return Address::NULL;
        }
        if memory.copy_within(address, moved, old_len as usize).is_err() {
            self.free(moved);
            return Address::NULL;
        }
        self.free(address);
        moved
    }

    /// Frees a block. Null and unknown addresses are ignored.
    pub fn free(&mut self, address: Address) {
        if address.is_null() {
            return;
        }
        match self.live.remove(&address.get()) {
            Some(len) => self.release(address.get(), len),
            None => tracing::warn!("free of unknown block {}", address),
        }
    }
}
