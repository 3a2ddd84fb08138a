//! # Struct Codecs
//!
//! Stateless fixed-offset codecs between host records and engine memory.
//!
//! ## Design
//!
//! - A codec is a trait impl on the record type, not an object
//! - Field access goes through [`FieldReader`] / [`FieldWriter`], which only
//!   accept offsets inside the struct's declared size
//! - Encoding zeroes all `SIZE` bytes first, so padding and unset fields are
//!   never left holding whatever occupied the allocation before

use crate::error::{AbiError, AbiResult};
use uvbridge_memory::{Address, LinearBuffer, MemoryViews};

/// Read access to the fields of one struct instance.
pub struct FieldReader<'a, B: LinearBuffer> {
    memory: &'a MemoryViews<B>,
    base: Address,
    size: u32,
}

impl<B: LinearBuffer> FieldReader<'_, B> {
    /// Address of the field at `offset`.
    #[inline]
    fn at(&self, offset: u32, width: u32) -> Address {
        debug_assert!(offset + width <= self.size, "field outside struct");
        // The struct range was bounds-checked before any field access.
        self.base.offset(offset).unwrap_or(Address::NULL)
    }

    /// Reads a `u32` field.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn u32(&self, offset: u32) -> AbiResult<u32> {
        Ok(self.memory.load_u32(self.at(offset, 4))?)
    }

    /// Reads an `i32` field.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn i32(&self, offset: u32) -> AbiResult<i32> {
        Ok(self.memory.load_i32(self.at(offset, 4))?)
    }

    /// Reads an `f32` field.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn f32(&self, offset: u32) -> AbiResult<f32> {
        Ok(self.memory.load_f32(self.at(offset, 4))?)
    }

    /// Reads an address field without following it.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn address(&self, offset: u32) -> AbiResult<Address> {
        Ok(self.memory.load_address(self.at(offset, 4))?)
    }

    /// Reads a single-byte boolean.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn flag(&self, offset: u32) -> AbiResult<bool> {
        Ok(self.memory.load_u8(self.at(offset, 1))? != 0)
    }

    /// Reads an enum field through its `from_raw` conversion.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::InvalidEnum`] for values outside the enumeration.
    #[inline]
    pub fn enumeration<T>(
        &self,
        offset: u32,
        kind: &'static str,
        from_raw: impl FnOnce(u32) -> Option<T>,
    ) -> AbiResult<T> {
        let value = self.u32(offset)?;
        from_raw(value).ok_or(AbiError::InvalidEnum { kind, value })
    }
}

/// Write access to the fields of one struct instance.
pub struct FieldWriter<'a, B: LinearBuffer> {
    memory: &'a mut MemoryViews<B>,
    base: Address,
    size: u32,
}

impl<B: LinearBuffer> FieldWriter<'_, B> {
    #[inline]
    fn at(&self, offset: u32, width: u32) -> Address {
        debug_assert!(offset + width <= self.size, "field outside struct");
        self.base.offset(offset).unwrap_or(Address::NULL)
    }

    /// Writes a `u32` field.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn set_u32(&mut self, offset: u32, value: u32) -> AbiResult<()> {
        let address = self.at(offset, 4);
        Ok(self.memory.store_u32(address, value)?)
    }

    /// Writes an `i32` field.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn set_i32(&mut self, offset: u32, value: i32) -> AbiResult<()> {
        let address = self.at(offset, 4);
        Ok(self.memory.store_i32(address, value)?)
    }

    /// Writes an `f32` field.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn set_f32(&mut self, offset: u32, value: f32) -> AbiResult<()> {
        let address = self.at(offset, 4);
        Ok(self.memory.store_f32(address, value)?)
    }

    /// Writes an address field.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn set_address(&mut self, offset: u32, value: Address) -> AbiResult<()> {
        let address = self.at(offset, 4);
        Ok(self.memory.store_address(address, value)?)
    }

    /// Writes a single-byte boolean as `0` or `1`.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    #[inline]
    pub fn set_flag(&mut self, offset: u32, value: bool) -> AbiResult<()> {
        let address = self.at(offset, 1);
        Ok(self.memory.store_u8(address, u8::from(value))?)
    }
}

/// A fixed-layout engine struct.
pub trait StructCodec: Sized {
    /// Size of the struct in engine memory, in bytes.
    const SIZE: u32;

    /// Struct name used in errors and logs.
    const NAME: &'static str;

    /// Reads every field from a validated struct location.
    ///
    /// # Errors
    ///
    /// Propagates field faults.
    fn read_fields<B: LinearBuffer>(fields: &FieldReader<'_, B>) -> AbiResult<Self>;

    /// Writes every field into a zeroed struct location.
    ///
    /// # Errors
    ///
    /// Propagates field faults.
    fn write_fields<B: LinearBuffer>(&self, fields: &mut FieldWriter<'_, B>) -> AbiResult<()>;

    /// Decodes the struct at `address`.
    ///
    /// # Errors
    ///
    /// - [`AbiError::AbsentData`] for the null address
    /// - [`AbiError::Misaligned`] unless `address` is 4-byte aligned
    /// - memory faults if the struct does not fit in the buffer
    fn decode<B: LinearBuffer>(memory: &MemoryViews<B>, address: Address) -> AbiResult<Self> {
        check_location::<Self>(address)?;
        memory.read_u8(address, Self::SIZE as usize)?;
        Self::read_fields(&FieldReader {
            memory,
            base: address,
            size: Self::SIZE,
        })
    }

    /// Encodes the record at `address`, initializing all `SIZE` bytes.
    ///
    /// # Errors
    ///
    /// Same conditions as [`StructCodec::decode`].
    fn encode<B: LinearBuffer>(&self, memory: &mut MemoryViews<B>, address: Address) -> AbiResult<()> {
        check_location::<Self>(address)?;
        memory.fill(address, Self::SIZE as usize, 0)?;
        self.write_fields(&mut FieldWriter {
            memory,
            base: address,
            size: Self::SIZE,
        })
    }
}

fn check_location<T: StructCodec>(address: Address) -> AbiResult<()> {
    if address.is_null() {
        return Err(AbiError::AbsentData { kind: T::NAME });
    }
    if !address.is_aligned(4) {
        return Err(AbiError::Misaligned { kind: T::NAME, address });
    }
    Ok(())
}

/// Address of element `index` of a `T` array, failing on overflow.
fn element_address<T: StructCodec>(base: Address, index: u32, count: u32) -> AbiResult<Address> {
    base.element(index, T::SIZE).ok_or_else(|| {
        AbiError::Memory(uvbridge_memory::MemoryError::OutOfRange {
            address: base,
            len: (count as usize).saturating_mul(T::SIZE as usize),
            size: u32::MAX as usize,
        })
    })
}

/// Decodes `count` consecutive structs starting at `address`.
///
/// An empty array may have a null address.
///
/// # Errors
///
/// Returns [`AbiError::AbsentData`] for a non-empty array at the null address.
pub fn decode_array<T: StructCodec, B: LinearBuffer>(
    memory: &MemoryViews<B>,
    address: Address,
    count: u32,
) -> AbiResult<Vec<T>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    (0..count)
        .map(|i| T::decode(memory, element_address::<T>(address, i, count)?))
        .collect()
}

/// Encodes `records` as consecutive structs starting at `address`.
///
/// # Errors
///
/// Returns [`AbiError::AbsentData`] for a non-empty array at the null address.
pub fn encode_array<T: StructCodec, B: LinearBuffer>(
    memory: &mut MemoryViews<B>,
    address: Address,
    records: &[T],
) -> AbiResult<()> {
    let count = u32::try_from(records.len()).unwrap_or(u32::MAX);
    for (i, record) in (0..count).zip(records) {
        record.encode(memory, element_address::<T>(address, i, count)?)?;
    }
    Ok(())
}
