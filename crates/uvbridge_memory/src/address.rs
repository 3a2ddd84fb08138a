//! Raw 32-bit addresses into the engine's linear memory.

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// A byte address inside the linear memory.
///
/// Addresses are stored in engine structs as plain little-endian `u32`
/// values. `0` means "absent".
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct Address(pub u32);

impl Address {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Wraps a raw address.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns true for the null address.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the address as a byte index.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns true if the address is a multiple of `align`.
    #[inline]
    #[must_use]
    pub const fn is_aligned(self, align: u32) -> bool {
        self.0 % align == 0
    }

    /// Adds a byte offset, returning `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn offset(self, bytes: u32) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Address of element `index` in an array of `stride`-byte elements.
    #[inline]
    #[must_use]
    pub fn element(self, index: u32, stride: u32) -> Option<Self> {
        index.checked_mul(stride).and_then(|bytes| self.offset(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<u32> for Address {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Address> for u32 {
    fn from(address: Address) -> Self {
        address.0
    }
}
