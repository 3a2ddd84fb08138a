//! # Element Arrays
//!
//! Helpers for the flat arrays that struct address fields point at:
//! index buffers, face lists, flags and per-sub-atlas floats.
//!
//! Every helper accepts a null address for an empty array and rejects it
//! for a non-empty one.

use crate::enums::IndexFormat;
use crate::error::{AbiError, AbiResult};
use uvbridge_memory::{Address, LinearBuffer, MemoryViews};

fn check_present(address: Address, count: u32, kind: &'static str) -> AbiResult<bool> {
    if count == 0 {
        return Ok(false);
    }
    if address.is_null() {
        return Err(AbiError::AbsentData { kind });
    }
    Ok(true)
}

/// Reads an index buffer, widening every entry to `u32`.
///
/// # Errors
///
/// Returns [`AbiError::AbsentData`] or a memory fault.
pub fn read_index_array<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    address: Address,
    count: u32,
    format: IndexFormat,
) -> AbiResult<Vec<u32>> {
    if !check_present(address, count, "index array")? {
        return Ok(Vec::new());
    }
    Ok(match format {
        IndexFormat::UInt16 => memory
            .read_u16(address, count as usize)?
            .iter()
            .map(|&i| u32::from(i))
            .collect(),
        IndexFormat::UInt32 => memory.read_u32(address, count as usize)?.to_vec(),
    })
}

/// Writes an index buffer in the given format.
///
/// # Errors
///
/// Returns [`AbiError::IndexOverflow`] if a value does not fit a 16-bit
/// buffer, or a memory fault.
pub fn write_index_array<B: LinearBuffer>(
    memory: &mut MemoryViews<B>,
    address: Address,
    indices: &[u32],
    format: IndexFormat,
) -> AbiResult<()> {
    let count = u32::try_from(indices.len()).unwrap_or(u32::MAX);
    if !check_present(address, count, "index array")? {
        return Ok(());
    }
    match format {
        IndexFormat::UInt16 => {
            let narrow = indices
                .iter()
                .map(|&i| u16::try_from(i).map_err(|_| AbiError::IndexOverflow { value: i }))
                .collect::<AbiResult<Vec<u16>>>()?;
            memory.write_u16(address, &narrow)?;
        }
        IndexFormat::UInt32 => memory.write_u32(address, indices)?,
    }
    Ok(())
}

/// Reads `count` words.
///
/// # Errors
///
/// Returns [`AbiError::AbsentData`] or a memory fault.
pub fn read_u32_array<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    address: Address,
    count: u32,
) -> AbiResult<Vec<u32>> {
    if !check_present(address, count, "u32 array")? {
        return Ok(Vec::new());
    }
    Ok(memory.read_u32(address, count as usize)?.to_vec())
}

/// Reads `count` floats.
///
/// # Errors
///
/// Returns [`AbiError::AbsentData`] or a memory fault.
pub fn read_f32_array<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    address: Address,
    count: u32,
) -> AbiResult<Vec<f32>> {
    if !check_present(address, count, "f32 array")? {
        return Ok(Vec::new());
    }
    Ok(memory.read_f32(address, count as usize)?.to_vec())
}

/// Reads `count` bytes.
///
/// # Errors
///
/// Returns [`AbiError::AbsentData`] or a memory fault.
pub fn read_u8_array<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    address: Address,
    count: u32,
) -> AbiResult<Vec<u8>> {
    if !check_present(address, count, "u8 array")? {
        return Ok(Vec::new());
    }
    Ok(memory.read_u8(address, count as usize)?.to_vec())
}

/// Reads `count` single-byte booleans.
///
/// # Errors
///
/// Returns [`AbiError::AbsentData`] or a memory fault.
pub fn read_flags<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    address: Address,
    count: u32,
) -> AbiResult<Vec<bool>> {
    Ok(read_u8_array(memory, address, count)?
        .into_iter()
        .map(|b| b != 0)
        .collect())
}
