//! Typed, zero-copy views into guest linear memory.
//!
//! Every (pointer, length, element type) reference coming from the guest is checked
//! against the memory size before a view is built. Views borrow the memory slice, so
//! the guest cannot grow or mutate memory while a command holds them.

use bytemuck::Pod;

use crate::error::{BridgeError, BridgeResult};
use rasterlink_shared::WasmSlice;

/// Bounds-checked accessor over a linear memory snapshot.
#[derive(Debug, Clone, Copy)]
pub struct GuestMemory<'a> {
    bytes: &'a [u8],
}

impl<'a> GuestMemory<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn byte_range(&self, ptr: u32, len: usize) -> BridgeResult<&'a [u8]> {
        let start = ptr as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(BridgeError::BoundsViolation {
                ptr,
                len,
                memory_size: self.bytes.len(),
            })?;
        Ok(&self.bytes[start..end])
    }

    /// View `len` elements of `T` starting at `ptr` without copying.
    ///
    /// `T` is the element type of the (pointer, length, element type) reference.
    pub fn slice<T: Pod>(&self, ptr: u32, len: u32) -> BridgeResult<&'a [T]> {
        let size = std::mem::size_of::<T>();
        let byte_len = (len as usize)
            .checked_mul(size)
            .ok_or(BridgeError::BoundsViolation {
                ptr,
                len: usize::MAX,
                memory_size: self.bytes.len(),
            })?;
        let bytes = self.byte_range(ptr, byte_len)?;
        bytemuck::try_cast_slice(bytes).map_err(|_| BridgeError::Misaligned {
            ptr,
            align: std::mem::align_of::<T>(),
        })
    }

    /// Like [`slice`](Self::slice), but a null pointer yields `None`.
    pub fn optional_slice<T: Pod>(&self, slice: WasmSlice) -> BridgeResult<Option<&'a [T]>> {
        if slice.is_null() {
            return Ok(None);
        }
        self.slice(slice.ptr, slice.len).map(Some)
    }

    /// Read one argument bundle. Argument structs need not be aligned.
    pub fn read<T: Pod>(&self, ptr: u32) -> BridgeResult<T> {
        let bytes = self.byte_range(ptr, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Borrow a UTF-8 string of `len` bytes.
    pub fn str(&self, ptr: u32, len: u32) -> BridgeResult<&'a str> {
        let bytes = self.byte_range(ptr, len as usize)?;
        std::str::from_utf8(bytes).map_err(|_| BridgeError::InvalidUtf8 { ptr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4-byte aligned backing store so typed views can be built.
    fn aligned(words: usize) -> Vec<u32> {
        vec![0u32; words]
    }

    #[test]
    fn float_view_reads_in_place() {
        let mut words = aligned(8);
        words[2] = 1.5f32.to_bits();
        words[3] = (-2.0f32).to_bits();
        let mem = GuestMemory::new(bytemuck::cast_slice(&words));

        let floats: &[f32] = mem.slice(8, 2).unwrap();
        assert_eq!(floats, &[1.5, -2.0]);
        assert_eq!(floats.as_ptr() as usize, words.as_ptr() as usize + 8);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let words = aligned(4);
        let mem = GuestMemory::new(bytemuck::cast_slice(&words));

        assert_eq!(
            mem.slice::<u32>(8, 3),
            Err(BridgeError::BoundsViolation {
                ptr: 8,
                len: 12,
                memory_size: 16
            })
        );
        assert!(mem.slice::<u8>(16, 0).is_ok());
        assert!(mem.slice::<u8>(u32::MAX, 2).is_err());
    }

    #[test]
    fn misaligned_view_is_rejected() {
        let words = aligned(4);
        let mem = GuestMemory::new(bytemuck::cast_slice(&words));
        assert_eq!(
            mem.slice::<f32>(2, 1),
            Err(BridgeError::Misaligned { ptr: 2, align: 4 })
        );
    }

    #[test]
    fn null_optional_slice_is_none() {
        let words = aligned(4);
        let mem = GuestMemory::new(bytemuck::cast_slice(&words));
        assert_eq!(mem.optional_slice::<f32>(WasmSlice::NULL).unwrap(), None);
        assert_eq!(
            mem.optional_slice::<f32>(WasmSlice::new(4, 2)).unwrap(),
            Some(&[0.0f32, 0.0][..])
        );
    }

    #[test]
    fn strings_and_unaligned_reads() {
        let mut bytes = vec![0u8; 32];
        bytes[1..5].copy_from_slice(&7u32.to_le_bytes());
        bytes[10..15].copy_from_slice(b"hello");
        bytes[20] = 0xFF;
        let mem = GuestMemory::new(&bytes);

        assert_eq!(mem.read::<u32>(1).unwrap(), 7);
        assert_eq!(mem.str(10, 5).unwrap(), "hello");
        assert_eq!(mem.str(20, 1), Err(BridgeError::InvalidUtf8 { ptr: 20 }));
    }
}
