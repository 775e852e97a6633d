//! Bounds-checked byte cursor over an in-memory `.dta` file.

use crate::error::Error;
use crate::types::{ByteOrder, Result};

use super::layout::TextEncoding;

pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::invalid_format(format!(
                    "unexpected end of file reading {} bytes at offset {}",
                    len, self.pos
                ))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.array::<2>()?;
        Ok(match self.order {
            ByteOrder::Big => u16::from_be_bytes(b),
            ByteOrder::Little => u16::from_le_bytes(b),
        })
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.array::<4>()?;
        Ok(match self.order {
            ByteOrder::Big => u32::from_be_bytes(b),
            ByteOrder::Little => u32::from_le_bytes(b),
        })
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.array::<8>()?;
        Ok(match self.order {
            ByteOrder::Big => u64::from_be_bytes(b),
            ByteOrder::Little => u64::from_le_bytes(b),
        })
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    /// Unsigned integer of `width` bytes (1..=8) in file byte order
    pub fn uint(&mut self, width: usize) -> Result<u64> {
        let bytes = self.take(width)?;
        Ok(uint_from(bytes, self.order))
    }

    /// A non-negative count stored as i32
    pub fn len32(&mut self) -> Result<usize> {
        let value = self.i32()?;
        usize::try_from(value)
            .map_err(|_| Error::invalid_format(format!("negative length {}", value)))
    }

    /// Fixed-width, NUL-padded text field
    pub fn fixed_str(&mut self, len: usize, encoding: TextEncoding) -> Result<String> {
        Ok(encoding.decode(self.take(len)?))
    }

    pub fn peek_tag(&self, tag: &str) -> bool {
        self.data
            .get(self.pos..)
            .is_some_and(|rest| rest.starts_with(tag.as_bytes()))
    }

    /// Consume an exact tag such as `<data>`
    pub fn expect_tag(&mut self, tag: &str) -> Result<()> {
        if !self.peek_tag(tag) {
            return Err(Error::invalid_format(format!(
                "expected {} at offset {}",
                tag, self.pos
            )));
        }
        self.pos += tag.len();
        Ok(())
    }
}

fn uint_from(bytes: &[u8], order: ByteOrder) -> u64 {
    let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
    match order {
        ByteOrder::Big => bytes.iter().fold(0, fold),
        ByteOrder::Little => bytes.iter().rev().fold(0, fold),
    }
}
