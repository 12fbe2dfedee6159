//! Utility functions for ELF parsing

use crate::formats::elf::types::{ElfClass, ElfData, ElfError, Result};

/// Trait for reading values with endianness support
pub trait EndianRead {
    fn read_u16(&self, offset: usize, data: ElfData) -> Result<u16>;
    fn read_u32(&self, offset: usize, data: ElfData) -> Result<u32>;
    fn read_u64(&self, offset: usize, data: ElfData) -> Result<u64>;
    fn read_i32(&self, offset: usize, data: ElfData) -> Result<i32>;
    fn read_i64(&self, offset: usize, data: ElfData) -> Result<i64>;
}

fn fixed<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .and_then(|s| s.try_into().ok())
        .ok_or(ElfError::Truncated { offset, needed: N })
}

impl EndianRead for [u8] {
    fn read_u16(&self, offset: usize, data: ElfData) -> Result<u16> {
        let bytes = fixed::<2>(self, offset)?;
        Ok(match data {
            ElfData::Little => u16::from_le_bytes(bytes),
            ElfData::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(&self, offset: usize, data: ElfData) -> Result<u32> {
        let bytes = fixed::<4>(self, offset)?;
        Ok(match data {
            ElfData::Little => u32::from_le_bytes(bytes),
            ElfData::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_u64(&self, offset: usize, data: ElfData) -> Result<u64> {
        let bytes = fixed::<8>(self, offset)?;
        Ok(match data {
            ElfData::Little => u64::from_le_bytes(bytes),
            ElfData::Big => u64::from_be_bytes(bytes),
        })
    }

    fn read_i32(&self, offset: usize, data: ElfData) -> Result<i32> {
        let bytes = fixed::<4>(self, offset)?;
        Ok(match data {
            ElfData::Little => i32::from_le_bytes(bytes),
            ElfData::Big => i32::from_be_bytes(bytes),
        })
    }

    fn read_i64(&self, offset: usize, data: ElfData) -> Result<i64> {
        let bytes = fixed::<8>(self, offset)?;
        Ok(match data {
            ElfData::Little => i64::from_le_bytes(bytes),
            ElfData::Big => i64::from_be_bytes(bytes),
        })
    }
}

/// Read a class-sized word (`Elf32_Addr`/`Elf64_Addr`, `Elf*_Off`, ...)
pub fn read_word(data: &[u8], offset: usize, class: ElfClass, endian: ElfData) -> Result<u64> {
    match class {
        ElfClass::Elf32 => data.read_u32(offset, endian).map(u64::from),
        ElfClass::Elf64 => data.read_u64(offset, endian),
    }
}

/// Read a null-terminated string from data
pub fn read_cstring(data: &[u8], offset: usize) -> Result<&str> {
    let slice = data
        .get(offset..)
        .filter(|s| !s.is_empty())
        .ok_or(ElfError::InvalidOffset { offset })?;
    let end = memchr::memchr(0, slice).unwrap_or(slice.len());

    std::str::from_utf8(&slice[..end]).map_err(|_| ElfError::InvalidString)
}

/// Return `data[offset..offset + size]` or `None` when the range overflows or escapes the buffer
pub fn checked_slice(data: &[u8], offset: u64, size: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let len = usize::try_from(size).ok()?;
    data.get(start..start.checked_add(len)?)
}
