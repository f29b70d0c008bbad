//! Shared winnow-based parsing utilities used by the TGA and mu readers.
//!
//! Every primitive is pinned to [`WResult`] so call sites can use `?` without
//! naming winnow's error type.

use winnow::Parser;
use winnow::binary::{le_f32, le_i16, le_i32, le_u8, le_u16};
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};
use winnow::token::take;

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, ErrMode<ContextError>>;

pub fn read_u8(input: &mut &[u8]) -> WResult<u8> {
    le_u8.parse_next(input)
}

pub fn read_u16(input: &mut &[u8]) -> WResult<u16> {
    le_u16.parse_next(input)
}

pub fn read_i16(input: &mut &[u8]) -> WResult<i16> {
    le_i16.parse_next(input)
}

pub fn read_i32(input: &mut &[u8]) -> WResult<i32> {
    le_i32.parse_next(input)
}

pub fn read_f32(input: &mut &[u8]) -> WResult<f32> {
    le_f32.parse_next(input)
}

/// A one-byte boolean; any non-zero byte is `true`.
pub fn read_bool(input: &mut &[u8]) -> WResult<bool> {
    Ok(read_u8(input)? != 0)
}

pub fn read_bytes<'a>(input: &mut &'a [u8], len: usize) -> WResult<&'a [u8]> {
    take(len).parse_next(input)
}

pub fn read_vec2(input: &mut &[u8]) -> WResult<[f32; 2]> {
    Ok([read_f32(input)?, read_f32(input)?])
}

pub fn read_vec3(input: &mut &[u8]) -> WResult<[f32; 3]> {
    Ok([read_f32(input)?, read_f32(input)?, read_f32(input)?])
}

pub fn read_vec4(input: &mut &[u8]) -> WResult<[f32; 4]> {
    Ok([
        read_f32(input)?,
        read_f32(input)?,
        read_f32(input)?,
        read_f32(input)?,
    ])
}

/// Read exactly `count` consecutive items.
pub fn read_array<T>(
    input: &mut &[u8],
    count: usize,
    item: fn(&mut &[u8]) -> WResult<T>,
) -> WResult<Vec<T>> {
    repeat(count, item).parse_next(input)
}

/// Read a 7-bit encoded (unsigned LEB128) length, at most five bytes long.
pub fn read_7bit_len(input: &mut &[u8]) -> WResult<usize> {
    let mut value = 0usize;
    for shift in (0..35).step_by(7) {
        let byte = read_u8(input)?;
        value |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ErrMode::Cut(ContextError::new()))
}

/// Read a length-prefixed UTF-8 string. Invalid sequences are replaced rather
/// than rejected.
pub fn read_string(input: &mut &[u8]) -> WResult<String> {
    let len = read_7bit_len(input)?;
    let bytes = read_bytes(input, len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Offset of the parser position within the original buffer.
pub fn offset_in(data: &[u8], input: &[u8]) -> usize {
    data.len() - input.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_multi_byte_length_prefix() {
        let mut data = vec![0xAC, 0x02];
        data.extend(std::iter::repeat_n(b'a', 300));
        let input = &mut data.as_slice();
        let s = read_string(input).unwrap();
        assert_eq!(s.len(), 300);
        assert!(input.is_empty());
    }

    #[test]
    fn truncated_string_is_an_error() {
        let data = [0x05, b'a', b'b'];
        assert!(read_string(&mut &data[..]).is_err());
    }

    #[test]
    fn reads_fixed_count_arrays() {
        let data: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let input = &mut data.as_slice();
        let vectors = read_array(input, 2, read_vec3).unwrap();
        assert_eq!(vectors, [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert!(input.is_empty());
        assert!(read_array(&mut &data[..8], 1, read_vec3).is_err());
    }

    #[test]
    fn overlong_length_prefix_is_rejected() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert!(read_7bit_len(&mut &data[..]).is_err());
    }
}
