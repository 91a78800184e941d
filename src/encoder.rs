//! Byte sink used by the generation path.
//!
//! All multi-byte integers on the IKE wire are big-endian, so the sink only
//! offers network-order puts. The header's total-length field is only known
//! once every payload has been generated; [`Encoder::patch_u32`] backpatches
//! it in place.

use crate::error::{Error, Result};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.buf.write_u8(value)?;
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.buf.write_u16::<BigEndian>(value)?;
        Ok(())
    }

    pub fn put_u24(&mut self, value: u32) -> Result<()> {
        if value > 0x00FF_FFFF {
            return Err(Error::encoding("value exceeds 24 bits"));
        }
        self.buf.write_u24::<BigEndian>(value)?;
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.buf.write_u64::<BigEndian>(value)?;
        Ok(())
    }

    pub fn put_slice(&mut self, value: &[u8]) -> Result<()> {
        std::io::Write::write_all(&mut self.buf, value)?;
        Ok(())
    }

    /// Overwrite four bytes at `offset` with `value` in network order.
    pub fn patch_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let end = offset
            .checked_add(4)
            .ok_or_else(|| Error::encoding("patch offset overflow"))?;
        match self.buf.get_mut(offset..end) {
            Some(window) => {
                BigEndian::write_u32(window, value);
                Ok(())
            }
            None => Err(Error::encoding("patch offset past end of buffer")),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_order_puts() {
        let mut enc = Encoder::new();
        enc.put_u8(0x01).unwrap();
        enc.put_u16(0x0203).unwrap();
        enc.put_u24(0x040506).unwrap();
        enc.put_u32(0x0708090a).unwrap();
        assert_eq!(
            enc.into_bytes(),
            vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a]
        );
    }

    #[test]
    fn patch_in_place() {
        let mut enc = Encoder::new();
        enc.put_u64(0).unwrap();
        enc.patch_u32(4, 0xdeadbeef).unwrap();
        assert_eq!(
            enc.into_bytes(),
            vec![0x00, 0x00, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn patch_out_of_bounds() {
        let mut enc = Encoder::new();
        enc.put_u16(0).unwrap();
        assert!(enc.patch_u32(0, 1).is_err());
    }

    #[test]
    fn u24_overflow() {
        let mut enc = Encoder::new();
        assert_eq!(
            enc.put_u24(0x0100_0000),
            Err(Error::encoding("value exceeds 24 bits"))
        );
    }
}
