//! Guest memory bridge.
//!
//! The only path between host functions and the guest's linear memory:
//! - Bounds checks on every `(ptr, len)` pair before any access.
//! - Truncating writes that report the number of bytes copied.
//! - "Write or return" mode where a null destination encodes up to eight
//!   bytes directly into the return value.
//! - Region overlap detection for functions that read and write at once.

use crate::api::{ApiError, ApiResult};

/// A bounds-checked view over a guest's linear memory.
pub struct GuestMemory<'a> {
    bytes: &'a mut [u8],
}

impl<'a> GuestMemory<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when `[ptr, ptr + len)` lies entirely inside guest memory.
    pub fn in_bounds(&self, ptr: u32, len: u32) -> bool {
        let end = ptr as u64 + len as u64;
        (ptr as u64) <= self.len() && end <= self.len()
    }

    pub fn check(&self, ptr: u32, len: u32) -> ApiResult<()> {
        if self.in_bounds(ptr, len) {
            Ok(())
        } else {
            Err(ApiError::OutOfBounds)
        }
    }

    pub fn read(&self, ptr: u32, len: u32) -> ApiResult<&[u8]> {
        self.check(ptr, len)?;
        let start = ptr as usize;
        Ok(&self.bytes[start..start + len as usize])
    }

    /// Read exactly `N` bytes into an owned array.
    pub fn read_array<const N: usize>(&self, ptr: u32) -> ApiResult<[u8; N]> {
        let slice = self.read(ptr, N as u32)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_vec(&self, ptr: u32, len: u32) -> ApiResult<Vec<u8>> {
        self.read(ptr, len).map(<[u8]>::to_vec)
    }

    /// Copy `data` into guest memory, truncated to `capacity` bytes.
    /// Returns the number of bytes written.
    pub fn write(&mut self, ptr: u32, capacity: u32, data: &[u8]) -> ApiResult<i64> {
        let count = data.len().min(capacity as usize);
        if count == 0 {
            return Ok(0);
        }
        self.check(ptr, count as u32)?;
        let start = ptr as usize;
        self.bytes[start..start + count].copy_from_slice(&data[..count]);
        Ok(count as i64)
    }

    /// Write `data` to the guest, or when `ptr` is zero encode it into the
    /// return value. Account payloads arrive with their one-byte length
    /// prefix which is dropped first.
    pub fn write_or_return(
        &mut self,
        ptr: u32,
        capacity: u32,
        data: &[u8],
        is_account: bool,
    ) -> ApiResult<i64> {
        let data = if is_account {
            data.get(1..).ok_or(ApiError::InternalError)?
        } else {
            data
        };
        if data.is_empty() {
            return Ok(0);
        }
        if ptr != 0 {
            return self.write(ptr, capacity, data);
        }
        data_as_int64(data)
    }
}

/// Pack up to eight big-endian bytes into a non-negative `i64`.
pub fn data_as_int64(data: &[u8]) -> ApiResult<i64> {
    if data.len() > 8 {
        return Err(ApiError::TooBig);
    }
    let value = data.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    if value >> 63 != 0 {
        return Err(ApiError::TooBig);
    }
    Ok(value as i64)
}

/// True when any two `(ptr, len)` regions intersect. Regions that merely
/// touch do not overlap.
pub fn overlapping(regions: &[(u32, u32)]) -> bool {
    let spans: Vec<(u64, u64)> = regions
        .iter()
        .map(|(ptr, len)| (*ptr as u64, *ptr as u64 + *len as u64))
        .collect();
    spans.iter().enumerate().any(|(i, (a, b))| {
        spans[i + 1..]
            .iter()
            .any(|(c, d)| !(d <= a || b <= c))
    })
}

pub fn be_u16(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(..2)?.try_into().ok()?))
}

pub fn be_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(..4)?.try_into().ok()?))
}

pub fn be_u64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.get(..8)?.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut buf = vec![0u8; 64];
        let mem = GuestMemory::new(&mut buf);
        assert!(mem.in_bounds(0, 64));
        assert!(mem.in_bounds(64, 0));
        assert!(!mem.in_bounds(60, 5));
        assert!(!mem.in_bounds(u32::MAX, u32::MAX));
        assert_eq!(mem.read(63, 2), Err(ApiError::OutOfBounds));
    }

    #[test]
    fn test_write_truncates_to_capacity() {
        let mut buf = vec![0u8; 8];
        let mut mem = GuestMemory::new(&mut buf);
        assert_eq!(mem.write(2, 3, &[1, 2, 3, 4, 5]), Ok(3));
        assert_eq!(buf, vec![0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut buf = vec![0u8; 8];
        let mut mem = GuestMemory::new(&mut buf);
        assert_eq!(mem.write(6, 4, &[1, 2, 3, 4]), Err(ApiError::OutOfBounds));
    }

    #[test]
    fn test_write_or_return_inline() {
        let mut buf = vec![0u8; 8];
        let mut mem = GuestMemory::new(&mut buf);
        assert_eq!(mem.write_or_return(0, 0, &[0x01, 0x02], false), Ok(0x0102));
        assert_eq!(
            mem.write_or_return(0, 0, &[0x14, 0x7f, 0xff], true),
            Ok(0x7fff)
        );
        assert_eq!(
            mem.write_or_return(0, 0, &[0u8; 9], false),
            Err(ApiError::TooBig)
        );
    }

    #[test]
    fn test_data_as_int64_rejects_high_bit() {
        assert_eq!(data_as_int64(&[0x80, 0, 0, 0, 0, 0, 0, 0]), Err(ApiError::TooBig));
        assert_eq!(data_as_int64(&[]), Ok(0));
    }

    #[test]
    fn test_overlapping() {
        assert!(overlapping(&[(0, 10), (5, 10)]));
        assert!(!overlapping(&[(0, 10), (10, 10)]));
        assert!(!overlapping(&[(0, 0), (0, 10)]));
        assert!(overlapping(&[(100, 4), (0, 10), (2, 1)]));
    }

    #[test]
    fn test_be_helpers() {
        assert_eq!(be_u32(&[0, 0, 1, 0]), Some(256));
        assert_eq!(be_u16(&[1]), None);
        assert_eq!(be_u64(&[0, 0, 0, 0, 0, 0, 0, 7, 9]), Some(7));
    }
}
