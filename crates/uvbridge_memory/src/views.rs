//! # Memory Views
//!
//! Zero-copy typed windows over one [`LinearBuffer`].
//!
//! ## Identity-keyed cache
//!
//! The view layout (element counts per width) is cached together with the
//! [`BufferIdentity`] it was derived from. Every accessor compares the cached
//! identity with the live one and re-derives the layout when they differ, so a
//! grow performed by the engine can never leave a stale view behind.
//!
//! Windows borrow the manager, which means the borrow checker already rejects
//! holding a window across any call that could grow the buffer.
//!
//! ## Addressing
//!
//! All addresses are byte addresses. A `u16` window starts at element
//! `address >> 1`, a `u32`/`f32` window at `address >> 2`. Misaligned
//! addresses are rejected rather than rounded.

use crate::address::Address;
use crate::buffer::{BufferIdentity, LinearBuffer};
use crate::error::{MemoryError, MemoryResult};
use std::cell::Cell;
use std::ops::Range;

/// Element counts of each typed view for one buffer identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewLayout {
    /// Identity the layout was derived from.
    pub identity: BufferIdentity,
    /// Length of the byte view.
    pub u8_len: usize,
    /// Length of the halfword view.
    pub u16_len: usize,
    /// Length of the word and float views.
    pub u32_len: usize,
}

impl ViewLayout {
    /// Derives the layout for a buffer identity.
    #[must_use]
    pub const fn derive(identity: BufferIdentity) -> Self {
        Self {
            identity,
            u8_len: identity.byte_len,
            u16_len: identity.byte_len >> 1,
            u32_len: identity.byte_len >> 2,
        }
    }
}

/// Typed views over the engine's linear memory.
///
/// # Thread Safety
///
/// Not `Sync`. One engine instance, one thread.
#[derive(Debug)]
pub struct MemoryViews<B: LinearBuffer> {
    /// The shared buffer.
    buffer: B,
    /// Layout derived at the last reload.
    layout: Cell<ViewLayout>,
    /// Number of reloads performed.
    reloads: Cell<u64>,
}

impl<B: LinearBuffer> MemoryViews<B> {
    /// Wraps a buffer and derives the initial views.
    #[must_use]
    pub fn new(buffer: B) -> Self {
        let layout = ViewLayout::derive(buffer.identity());
        Self {
            buffer,
            layout: Cell::new(layout),
            reloads: Cell::new(0),
        }
    }

    /// Returns the underlying buffer.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Returns the underlying buffer mutably.
    ///
    /// Anything done through this handle is picked up by the next access.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    /// Unwraps the buffer.
    #[must_use]
    pub fn into_inner(self) -> B {
        self.buffer
    }

    /// Re-derives every typed view from the buffer's current storage.
    pub fn reload(&self) -> ViewLayout {
        let layout = ViewLayout::derive(self.buffer.identity());
        let previous = self.layout.replace(layout);
        self.reloads.set(self.reloads.get() + 1);
        tracing::debug!(
            "memory views reloaded: {} -> {} bytes (generation {} -> {})",
            previous.u8_len,
            layout.u8_len,
            previous.identity.generation,
            layout.identity.generation
        );
        layout
    }

    /// Returns the current layout, reloading first if the buffer moved.
    #[inline]
    pub fn layout(&self) -> ViewLayout {
        let cached = self.layout.get();
        if cached.identity == self.buffer.identity() {
            cached
        } else {
            self.reload()
        }
    }

    /// Number of reloads since construction.
    #[inline]
    #[must_use]
    pub fn reload_count(&self) -> u64 {
        self.reloads.get()
    }

    /// Current buffer size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.layout().u8_len
    }

    /// Grows the buffer and reloads the views.
    ///
    /// # Errors
    ///
    /// Propagates the buffer's grow failure.
    pub fn grow(&mut self, delta_pages: u32) -> MemoryResult<u32> {
        let previous = self.buffer.grow(delta_pages)?;
        self.reload();
        Ok(previous)
    }

    /// Byte range of `count` elements of width `1 << shift` at `address`.
    fn window(&self, address: Address, count: usize, shift: u32) -> MemoryResult<Range<usize>> {
        let width = 1usize << shift;
        if !address.is_aligned(1 << shift) {
            return Err(MemoryError::Misaligned { address, align: width });
        }

        let layout = self.layout();
        let view_len = match shift {
            0 => layout.u8_len,
            1 => layout.u16_len,
            _ => layout.u32_len,
        };
        let out_of_range = || MemoryError::OutOfRange {
            address,
            len: count.saturating_mul(width),
            size: layout.u8_len,
        };

        let start = address.as_usize() >> shift;
        let end = start.checked_add(count).ok_or_else(out_of_range)?;
        if end > view_len {
            return Err(out_of_range());
        }
        Ok(start << shift..end << shift)
    }

    /// Reads `len` bytes at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`] past the end of the buffer.
    pub fn read_u8(&self, address: Address, len: usize) -> MemoryResult<&[u8]> {
        let range = self.window(address, len, 0)?;
        Ok(&self.buffer.bytes()[range])
    }

    /// Reads `len` halfwords at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    pub fn read_u16(&self, address: Address, len: usize) -> MemoryResult<&[u16]> {
        let range = self.window(address, len, 1)?;
        bytemuck::try_cast_slice(&self.buffer.bytes()[range])
            .map_err(|_| MemoryError::Misaligned { address, align: 2 })
    }

    /// Reads `len` words at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    pub fn read_u32(&self, address: Address, len: usize) -> MemoryResult<&[u32]> {
        let range = self.window(address, len, 2)?;
        bytemuck::try_cast_slice(&self.buffer.bytes()[range])
            .map_err(|_| MemoryError::Misaligned { address, align: 4 })
    }

    /// Reads `len` floats at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    pub fn read_f32(&self, address: Address, len: usize) -> MemoryResult<&[f32]> {
        let range = self.window(address, len, 2)?;
        bytemuck::try_cast_slice(&self.buffer.bytes()[range])
            .map_err(|_| MemoryError::Misaligned { address, align: 4 })
    }

    /// Copies `values` into memory at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`]; the buffer never grows here.
    pub fn write_u8(&mut self, address: Address, values: &[u8]) -> MemoryResult<()> {
        let range = self.window(address, values.len(), 0)?;
        self.buffer.bytes_mut()[range].copy_from_slice(values);
        Ok(())
    }

    /// Copies halfwords into memory at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    pub fn write_u16(&mut self, address: Address, values: &[u16]) -> MemoryResult<()> {
        let range = self.window(address, values.len(), 1)?;
        self.buffer.bytes_mut()[range].copy_from_slice(bytemuck::cast_slice(values));
        Ok(())
    }

    /// Copies words into memory at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    pub fn write_u32(&mut self, address: Address, values: &[u32]) -> MemoryResult<()> {
        let range = self.window(address, values.len(), 2)?;
        self.buffer.bytes_mut()[range].copy_from_slice(bytemuck::cast_slice(values));
        Ok(())
    }

    /// Copies floats into memory at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    pub fn write_f32(&mut self, address: Address, values: &[f32]) -> MemoryResult<()> {
        let range = self.window(address, values.len(), 2)?;
        self.buffer.bytes_mut()[range].copy_from_slice(bytemuck::cast_slice(values));
        Ok(())
    }

    /// Sets `len` bytes at `address` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`].
    pub fn fill(&mut self, address: Address, len: usize, value: u8) -> MemoryResult<()> {
        let range = self.window(address, len, 0)?;
        self.buffer.bytes_mut()[range].fill(value);
        Ok(())
    }

    /// Copies `len` bytes from `src` to `dst` inside the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`] if either range is outside the buffer.
    pub fn copy_within(&mut self, src: Address, dst: Address, len: usize) -> MemoryResult<()> {
        let from = self.window(src, len, 0)?;
        let to = self.window(dst, len, 0)?;
        self.buffer.bytes_mut().copy_within(from, to.start);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    /// Loads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`].
    #[inline]
    pub fn load_u8(&self, address: Address) -> MemoryResult<u8> {
        Ok(self.read_u8(address, 1)?[0])
    }

    /// Loads one little-endian halfword.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn load_u16(&self, address: Address) -> MemoryResult<u16> {
        let range = self.window(address, 1, 1)?;
        let bytes = &self.buffer.bytes()[range];
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Loads one little-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn load_u32(&self, address: Address) -> MemoryResult<u32> {
        let range = self.window(address, 1, 2)?;
        let bytes = &self.buffer.bytes()[range];
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Loads one little-endian signed word.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn load_i32(&self, address: Address) -> MemoryResult<i32> {
        self.load_u32(address).map(|raw| i32::from_le_bytes(raw.to_le_bytes()))
    }

    /// Loads one little-endian float.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn load_f32(&self, address: Address) -> MemoryResult<f32> {
        self.load_u32(address).map(f32::from_bits)
    }

    /// Loads one address-sized word.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn load_address(&self, address: Address) -> MemoryResult<Address> {
        self.load_u32(address).map(Address::new)
    }

    /// Stores one byte.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`].
    #[inline]
    pub fn store_u8(&mut self, address: Address, value: u8) -> MemoryResult<()> {
        self.write_u8(address, &[value])
    }

    /// Stores one little-endian halfword.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn store_u16(&mut self, address: Address, value: u16) -> MemoryResult<()> {
        let range = self.window(address, 1, 1)?;
        self.buffer.bytes_mut()[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Stores one little-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn store_u32(&mut self, address: Address, value: u32) -> MemoryResult<()> {
        let range = self.window(address, 1, 2)?;
        self.buffer.bytes_mut()[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Stores one little-endian signed word.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn store_i32(&mut self, address: Address, value: i32) -> MemoryResult<()> {
        self.store_u32(address, u32::from_le_bytes(value.to_le_bytes()))
    }

    /// Stores one little-endian float.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn store_f32(&mut self, address: Address, value: f32) -> MemoryResult<()> {
        self.store_u32(address, value.to_bits())
    }

    /// Stores one address-sized word.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Misaligned`] or [`MemoryError::OutOfRange`].
    #[inline]
    pub fn store_address(&mut self, address: Address, value: Address) -> MemoryResult<()> {
        self.store_u32(address, value.get())
    }

    /// Reads a NUL-terminated string starting at `address`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the engine's strings
    /// are plain ASCII.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unterminated`] if no NUL byte follows.
    pub fn read_c_str(&self, address: Address) -> MemoryResult<String> {
        let size = self.size();
        let tail = self.read_u8(address, size.saturating_sub(address.as_usize()))?;
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(MemoryError::Unterminated(address))?;
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{HeapBuffer, PAGE_SIZE};

    fn views(pages: u32) -> MemoryViews<HeapBuffer> {
        MemoryViews::new(HeapBuffer::new(pages, 8).unwrap())
    }

    #[test]
    fn test_typed_windows_share_storage() {
        let mut memory = views(1);
        memory.write_u32(Address::new(16), &[0x0403_0201, 0x0807_0605]).unwrap();

        assert_eq!(memory.read_u8(Address::new(16), 4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(memory.read_u16(Address::new(18), 1).unwrap(), &[0x0403]);
        assert_eq!(memory.load_u32(Address::new(20)).unwrap(), 0x0807_0605);
    }

    #[test]
    fn test_float_window() {
        let mut memory = views(1);
        memory.write_f32(Address::new(64), &[0.5, -2.0, 3.25]).unwrap();
        assert_eq!(memory.read_f32(Address::new(64), 3).unwrap(), &[0.5, -2.0, 3.25]);
        assert_eq!(memory.load_f32(Address::new(68)).unwrap(), -2.0);
    }

    #[test]
    fn test_misaligned_access_is_rejected() {
        let mut memory = views(1);
        assert_eq!(
            memory.read_u32(Address::new(6), 1).unwrap_err(),
            MemoryError::Misaligned { address: Address::new(6), align: 4 }
        );
        assert!(matches!(
            memory.write_u16(Address::new(3), &[1]),
            Err(MemoryError::Misaligned { align: 2, .. })
        ));
        assert!(memory.read_u16(Address::new(6), 1).is_ok());
    }

    #[test]
    fn test_write_past_end_is_out_of_range() {
        let mut memory = views(1);
        let last_word = Address::new(u32::try_from(PAGE_SIZE - 4).unwrap());
        assert!(memory.write_u32(last_word, &[7]).is_ok());
        assert!(matches!(
            memory.write_u32(last_word, &[7, 8]),
            Err(MemoryError::OutOfRange { .. })
        ));
        assert!(matches!(
            memory.read_u8(Address::new(u32::MAX), 2),
            Err(MemoryError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_views_follow_buffer_identity() {
        let mut memory = views(1);
        memory.store_u32(Address::new(8), 42).unwrap();
        let reloads = memory.reload_count();

        // Grow behind the manager's back: the next access must re-derive.
        memory.buffer_mut().grow(1).unwrap();
        assert_eq!(memory.size(), 2 * PAGE_SIZE);
        assert_eq!(memory.reload_count(), reloads + 1);

        let high = Address::new(u32::try_from(PAGE_SIZE + 8).unwrap());
        memory.store_u32(high, 7).unwrap();
        assert_eq!(memory.load_u32(Address::new(8)).unwrap(), 42);
        assert_eq!(memory.load_u32(high).unwrap(), 7);
    }

    #[test]
    fn test_explicit_grow_reloads() {
        let mut memory = views(1);
        assert_eq!(memory.grow(2).unwrap(), 1);
        assert_eq!(memory.layout().u32_len, 3 * PAGE_SIZE / 4);
    }

    #[test]
    fn test_signed_and_address_scalars() {
        let mut memory = views(1);
        memory.store_i32(Address::new(4), -1).unwrap();
        assert_eq!(memory.load_u32(Address::new(4)).unwrap(), u32::MAX);
        assert_eq!(memory.load_i32(Address::new(4)).unwrap(), -1);

        memory.store_address(Address::new(8), Address::new(0x100)).unwrap();
        assert_eq!(memory.load_address(Address::new(8)).unwrap(), Address::new(0x100));
    }

    #[test]
    fn test_c_string() {
        let mut memory = views(1);
        memory.write_u8(Address::new(32), b"Success\0tail").unwrap();
        assert_eq!(memory.read_c_str(Address::new(32)).unwrap(), "Success");
    }

    #[test]
    fn test_fill_and_copy_within() {
        let mut memory = views(1);
        memory.fill(Address::new(0), 8, 0xFF).unwrap();
        memory.copy_within(Address::new(0), Address::new(100), 4).unwrap();
        assert_eq!(memory.read_u8(Address::new(100), 5).unwrap(), &[0xFF, 0xFF, 0xFF, 0xFF, 0]);
    }
}
