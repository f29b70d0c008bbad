//! Little-endian primitive writer matching the .NET `BinaryWriter` conventions
//! the mu and MBM formats were defined against: one-byte booleans and strings
//! prefixed with a 7-bit encoded byte length.

use std::io::{self, Write};

pub struct BinaryWriter<W> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_all(&[value])
    }

    pub fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    pub fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.write_u8(value as u8)
    }

    /// Write a count as an `i32`. Counts beyond `i32::MAX` cannot be expressed
    /// in the format and are rejected.
    pub fn write_len(&mut self, len: usize) -> io::Result<()> {
        let len = i32::try_from(len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("count {len} does not fit in an i32"),
            )
        })?;
        self.write_i32(len)
    }

    pub fn write_string(&mut self, value: &str) -> io::Result<()> {
        let mut len = value.len();
        while len >= 0x80 {
            self.write_u8((len as u8 & 0x7F) | 0x80)?;
            len >>= 7;
        }
        self.write_u8(len as u8)?;
        self.inner.write_all(value.as_bytes())
    }

    pub fn write_floats(&mut self, values: &[f32]) -> io::Result<()> {
        for value in values {
            self.write_f32(*value)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser_utils::read_string;

    #[test]
    fn short_strings_have_single_byte_prefix() {
        let mut writer = BinaryWriter::new(Vec::new());
        writer.write_string("KSP").unwrap();
        assert_eq!(writer.into_inner(), b"\x03KSP");
    }

    #[test]
    fn long_strings_round_trip_through_reader() {
        let text = "x".repeat(1000);
        let mut writer = BinaryWriter::new(Vec::new());
        writer.write_string(&text).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(&bytes[..2], &[0xE8, 0x07]);
        assert_eq!(read_string(&mut &bytes[..]).unwrap(), text);
    }

    #[test]
    fn booleans_are_one_byte() {
        let mut writer = BinaryWriter::new(Vec::new());
        writer.write_bool(true).unwrap();
        writer.write_bool(false).unwrap();
        assert_eq!(writer.into_inner(), vec![1, 0]);
    }
}
