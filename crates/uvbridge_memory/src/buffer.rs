//! # Linear Buffers
//!
//! The backing storage behind the memory views.
//!
//! A linear buffer is one contiguous, growable byte region. Growing it may
//! move the storage, so every buffer exposes a [`BufferIdentity`] that changes
//! whenever previously derived slices would alias freed memory.

use crate::error::{MemoryError, MemoryResult};

/// Size of one linear memory page in bytes (the wasm page size).
pub const PAGE_SIZE: usize = 65_536;

/// Words per page for the word-backed heap buffer.
const WORDS_PER_PAGE: usize = PAGE_SIZE / 4;

/// Identity of a buffer's current backing storage.
///
/// Two identities compare equal only if slices derived under one are still
/// valid under the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferIdentity {
    /// Bumped on every reallocation of the backing storage.
    pub generation: u64,
    /// Size of the storage in bytes.
    pub byte_len: usize,
}

/// One contiguous, growable memory region shared with the engine.
pub trait LinearBuffer {
    /// The whole buffer as bytes.
    fn bytes(&self) -> &[u8];

    /// The whole buffer as mutable bytes.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Identity of the current backing storage.
    fn identity(&self) -> BufferIdentity;

    /// Grows the buffer by `delta_pages` pages.
    ///
    /// Returns the page count before the grow.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::GrowFailed`] when the ceiling would be exceeded.
    fn grow(&mut self, delta_pages: u32) -> MemoryResult<u32>;

    /// Current size in pages.
    fn pages(&self) -> u32 {
        u32::try_from(self.bytes().len() / PAGE_SIZE).unwrap_or(u32::MAX)
    }
}

/// A host-side linear buffer that behaves like a wasm memory.
///
/// Storage is word-backed so every typed view over it is naturally aligned.
/// Growing always reallocates, exactly the case the view cache must survive.
#[derive(Debug)]
pub struct HeapBuffer {
    /// The backing storage.
    words: Vec<u32>,
    /// Hard page ceiling.
    max_pages: u32,
    /// Reallocation counter.
    generation: u64,
}

impl HeapBuffer {
    /// Creates a zeroed buffer of `initial_pages` pages.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidPageLimits`] if `initial_pages > max_pages`.
    pub fn new(initial_pages: u32, max_pages: u32) -> MemoryResult<Self> {
        if initial_pages > max_pages {
            return Err(MemoryError::InvalidPageLimits {
                initial: initial_pages,
                max: max_pages,
            });
        }
        Ok(Self {
            words: vec![0u32; initial_pages as usize * WORDS_PER_PAGE],
            max_pages,
            generation: 0,
        })
    }

    /// Returns the page ceiling.
    #[inline]
    #[must_use]
    pub const fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

impl LinearBuffer for HeapBuffer {
    #[inline]
    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    #[inline]
    fn identity(&self) -> BufferIdentity {
        BufferIdentity {
            generation: self.generation,
            byte_len: self.words.len() * 4,
        }
    }

    fn grow(&mut self, delta_pages: u32) -> MemoryResult<u32> {
        let current = self.pages();
        if delta_pages == 0 {
            return Ok(current);
        }

        let target = current
            .checked_add(delta_pages)
            .filter(|&pages| pages <= self.max_pages)
            .ok_or(MemoryError::GrowFailed {
                requested_pages: delta_pages,
                current_pages: current,
                max_pages: self.max_pages,
            })?;

        let mut words = Vec::with_capacity(target as usize * WORDS_PER_PAGE);
        words.extend_from_slice(&self.words);
        words.resize(target as usize * WORDS_PER_PAGE, 0);
        self.words = words;
        self.generation += 1;

        tracing::debug!(
            "linear buffer grew {} -> {} pages (generation {})",
            current,
            target,
            self.generation
        );
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_zeroed() {
        let buffer = HeapBuffer::new(2, 4).unwrap();
        assert_eq!(buffer.pages(), 2);
        assert_eq!(buffer.bytes().len(), 2 * PAGE_SIZE);
        assert!(buffer.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_limits() {
        assert_eq!(
            HeapBuffer::new(5, 4).unwrap_err(),
            MemoryError::InvalidPageLimits { initial: 5, max: 4 }
        );
    }

    #[test]
    fn test_grow_preserves_contents_and_changes_identity() {
        let mut buffer = HeapBuffer::new(1, 4).unwrap();
        buffer.bytes_mut()[100] = 0xAB;
        let before = buffer.identity();

        assert_eq!(buffer.grow(2).unwrap(), 1);
        assert_eq!(buffer.pages(), 3);
        assert_eq!(buffer.bytes()[100], 0xAB);
        assert_ne!(buffer.identity(), before);
    }

    #[test]
    fn test_grow_past_ceiling_fails() {
        let mut buffer = HeapBuffer::new(3, 4).unwrap();
        let before = buffer.identity();
        assert!(matches!(buffer.grow(2), Err(MemoryError::GrowFailed { .. })));
        assert_eq!(buffer.identity(), before);
    }

    #[test]
    fn test_zero_grow_keeps_identity() {
        let mut buffer = HeapBuffer::new(1, 1).unwrap();
        let before = buffer.identity();
        assert_eq!(buffer.grow(0).unwrap(), 1);
        assert_eq!(buffer.identity(), before);
    }
}
