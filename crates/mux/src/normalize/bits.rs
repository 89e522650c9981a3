//! MSB-first bit reader over RBSP data with Exp-Golomb support.

use crate::error::{MuxError, MuxResult};

/// Strip emulation-prevention bytes (`00 00 03` → `00 00`) from a NAL payload.
pub fn unescape_rbsp(nal: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nal.len());
    let mut zeros = 0usize;
    for &byte in nal {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }
    out
}

pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    pub fn read_bit(&mut self) -> MuxResult<bool> {
        if self.pos >= self.data.len() * 8 {
            return Err(MuxError::InvalidData("Bitstream truncated".into()));
        }
        let byte = self.data[self.pos / 8];
        let bit = (byte >> (7 - (self.pos % 8))) & 1;
        self.pos += 1;
        Ok(bit == 1)
    }

    pub fn read_bits(&mut self, count: u32) -> MuxResult<u32> {
        debug_assert!(count <= 32);
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Ok(value)
    }

    pub fn read_bits_u64(&mut self, count: u32) -> MuxResult<u64> {
        let mut value = 0u64;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value)
    }

    pub fn skip_bits(&mut self, count: usize) -> MuxResult<()> {
        if count > self.bits_left() {
            return Err(MuxError::InvalidData("Bitstream truncated".into()));
        }
        self.pos += count;
        Ok(())
    }

    /// Unsigned Exp-Golomb, `ue(v)`.
    pub fn read_ue(&mut self) -> MuxResult<u32> {
        let mut leading_zeros = 0u32;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(MuxError::InvalidData("Exp-Golomb code too long".into()));
            }
        }
        let suffix = self.read_bits(leading_zeros)? as u64;
        Ok(((1u64 << leading_zeros) - 1 + suffix) as u32)
    }

    /// Signed Exp-Golomb, `se(v)`.
    pub fn read_se(&mut self) -> MuxResult<i32> {
        let code = self.read_ue()? as i64;
        let value = if code % 2 == 1 {
            (code + 1) / 2
        } else {
            -(code / 2)
        };
        Ok(value as i32)
    }
}
