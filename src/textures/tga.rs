//! Truevision TGA: header parsing and emission, a decoder for uncompressed and
//! run-length encoded true-color images, and the scanline-bounded run-length
//! encoder used when writing.

use rootcause::Report;
use thiserror::Error;
use winnow::error::{ContextError, ErrMode};

use crate::data::parser_utils::{WResult, offset_in, read_bytes, read_i16, read_u8, read_u16};
use crate::models::texture::{Bitmap, PixelFormat, Rgba};
use crate::recognized::Recognized;

pub const HEADER_LEN: usize = 18;

/// Largest number of pixels one packet can describe.
pub const MAX_PACKET_PIXELS: usize = 128;

#[derive(Debug, Error)]
pub enum TgaError {
    #[error("TGA data is {len} bytes, the header alone needs {HEADER_LEN}")]
    TooShort { len: usize },
    #[error("unsupported TGA image type {0}")]
    UnsupportedImageType(Recognized<TgaImageType, u8>),
    #[error("unsupported TGA pixel depth {0}")]
    UnsupportedDepth(u8),
    #[error("TGA pixel data truncated at offset 0x{offset:X}")]
    Truncated { offset: usize },
    #[error("run-length packet at offset 0x{offset:X} runs past the last pixel")]
    PacketOverrun { offset: usize },
    #[error("bitmap holds {actual} pixels, its dimensions need {expected}")]
    PixelCount { expected: usize, actual: usize },
    #[error("{width}x{height} image does not fit in a TGA header")]
    TooLarge { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TgaImageType {
    NoImage = 0,
    UncompressedColorMap = 1,
    UncompressedTrueColor = 2,
    UncompressedGreyScale = 3,
    RteColorMap = 9,
    RteTrueColor = 10,
    RteGreyScale = 11,
}

impl TgaImageType {
    pub fn from_u8(value: u8) -> Recognized<Self, u8> {
        let known = match value {
            0 => TgaImageType::NoImage,
            1 => TgaImageType::UncompressedColorMap,
            2 => TgaImageType::UncompressedTrueColor,
            3 => TgaImageType::UncompressedGreyScale,
            9 => TgaImageType::RteColorMap,
            10 => TgaImageType::RteTrueColor,
            11 => TgaImageType::RteGreyScale,
            other => return Recognized::Unknown(other),
        };
        Recognized::Known(known)
    }

    pub fn is_run_length(self) -> bool {
        (self as u8) & 0x08 != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TgaHeader {
    pub id_length: u8,
    pub has_color_map: bool,
    pub image_type: Recognized<TgaImageType, u8>,
    pub color_map: [u8; 5],
    pub x_origin: i16,
    pub y_origin: i16,
    pub width: u16,
    pub height: u16,
    pub pixel_depth: u8,
    pub image_descriptor: u8,
}

impl TgaHeader {
    /// Header for a true-color image as this crate writes it.
    pub fn true_color(width: u16, height: u16, pixel_depth: u8, run_length: bool) -> Self {
        let image_type = if run_length {
            TgaImageType::RteTrueColor
        } else {
            TgaImageType::UncompressedTrueColor
        };
        Self {
            id_length: 0,
            has_color_map: false,
            image_type: Recognized::Known(image_type),
            color_map: [0; 5],
            x_origin: 0,
            y_origin: 0,
            width,
            height,
            pixel_depth,
            image_descriptor: 0,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, Report<TgaError>> {
        Self::parse_prefix(data).map_err(Report::new)
    }

    fn parse_prefix(data: &[u8]) -> Result<Self, TgaError> {
        if data.len() < HEADER_LEN {
            return Err(TgaError::TooShort { len: data.len() });
        }
        let input = &mut &data[..HEADER_LEN];
        parse_header(input)
            .map_err(|_: ErrMode<ContextError>| TgaError::TooShort { len: data.len() })
    }

    /// Emit the header. Only the image type, dimensions and pixel depth are
    /// written; every other byte is zero.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut data = [0u8; HEADER_LEN];
        data[2] = match self.image_type {
            Recognized::Known(t) => t as u8,
            Recognized::Unknown(raw) => raw,
        };
        data[12..14].copy_from_slice(&self.width.to_le_bytes());
        data[14..16].copy_from_slice(&self.height.to_le_bytes());
        data[16] = self.pixel_depth;
        data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.pixel_depth as usize / 8
    }
}

fn parse_header(input: &mut &[u8]) -> WResult<TgaHeader> {
    let id_length = read_u8(input)?;
    let has_color_map = read_u8(input)? != 0;
    let image_type = TgaImageType::from_u8(read_u8(input)?);
    let mut color_map = [0u8; 5];
    color_map.copy_from_slice(read_bytes(input, 5)?);
    let x_origin = read_i16(input)?;
    let y_origin = read_i16(input)?;
    let width = read_u16(input)?;
    let height = read_u16(input)?;
    let pixel_depth = read_u8(input)?;
    let image_descriptor = read_u8(input)?;

    Ok(TgaHeader {
        id_length,
        has_color_map,
        image_type,
        color_map,
        x_origin,
        y_origin,
        width,
        height,
        pixel_depth,
        image_descriptor,
    })
}

/// Pixels are stored B, G, R and optionally A. Missing alpha reads as opaque.
fn read_pixel(input: &mut &[u8], with_alpha: bool) -> WResult<Rgba> {
    let b = read_u8(input)?;
    let g = read_u8(input)?;
    let r = read_u8(input)?;
    let a = if with_alpha { read_u8(input)? } else { 255 };
    Ok([r, g, b, a])
}

/// Decode a TGA image. Only uncompressed and run-length encoded true-color
/// images at 24 or 32 bits per pixel are supported.
pub fn decode(data: &[u8]) -> Result<Bitmap, Report<TgaError>> {
    decode_image(data).map_err(Report::new)
}

pub(crate) fn decode_image(data: &[u8]) -> Result<Bitmap, TgaError> {
    let header = TgaHeader::parse_prefix(data)?;
    let input = &mut &data[HEADER_LEN..];

    read_bytes(input, header.id_length as usize).map_err(|_: ErrMode<ContextError>| {
        TgaError::Truncated { offset: HEADER_LEN }
    })?;

    let run_length = match header.image_type {
        Recognized::Known(TgaImageType::UncompressedTrueColor) => false,
        Recognized::Known(TgaImageType::RteTrueColor) => true,
        other => return Err(TgaError::UnsupportedImageType(other)),
    };
    let with_alpha = match header.pixel_depth {
        24 => false,
        32 => true,
        depth => return Err(TgaError::UnsupportedDepth(depth)),
    };

    let count = header.pixel_count();
    // the header's dimensions are untrusted; size the buffer by what the data can hold
    let mut pixels = Vec::with_capacity(count.min(input.len() / header.bytes_per_pixel() + 1));

    while pixels.len() < count {
        let offset = offset_in(data, input);
        let truncated = |_: ErrMode<ContextError>| TgaError::Truncated { offset };

        if !run_length {
            pixels.push(read_pixel(input, with_alpha).map_err(truncated)?);
            continue;
        }

        let packet = read_u8(input).map_err(truncated)?;
        let len = (packet & 0x7F) as usize + 1;
        if pixels.len() + len > count {
            return Err(TgaError::PacketOverrun { offset });
        }

        if packet & 0x80 != 0 {
            let pixel = read_pixel(input, with_alpha).map_err(truncated)?;
            pixels.extend(std::iter::repeat_n(pixel, len));
        } else {
            for _ in 0..len {
                pixels.push(read_pixel(input, with_alpha).map_err(truncated)?);
            }
        }
    }

    let format = if with_alpha {
        PixelFormat::Rgba32
    } else {
        PixelFormat::Rgb24
    };
    Ok(Bitmap::new(
        header.width as u32,
        header.height as u32,
        format,
        pixels,
    ))
}

/// Encode `bitmap` as a true-color TGA, 32-bit when `with_alpha` is set and
/// 24-bit otherwise.
pub fn encode(
    bitmap: &Bitmap,
    with_alpha: bool,
    run_length: bool,
) -> Result<Vec<u8>, Report<TgaError>> {
    let (Ok(width), Ok(height)) = (u16::try_from(bitmap.width), u16::try_from(bitmap.height))
    else {
        return Err(Report::new(TgaError::TooLarge {
            width: bitmap.width,
            height: bitmap.height,
        }));
    };

    if !bitmap.has_expected_len() {
        return Err(Report::new(TgaError::PixelCount {
            expected: bitmap.expected_len(),
            actual: bitmap.pixels.len(),
        }));
    }

    let depth = if with_alpha { 32 } else { 24 };
    let header = TgaHeader::true_color(width, height, depth, run_length);

    let bpp = header.bytes_per_pixel();
    let mut out = Vec::with_capacity(HEADER_LEN + bitmap.pixels.len() * bpp);
    out.extend_from_slice(&header.to_bytes());

    if run_length {
        encode_run_length(&bitmap.pixels, width as usize, with_alpha, &mut out);
    } else {
        for pixel in &bitmap.pixels {
            push_pixel(&mut out, pixel, with_alpha);
        }
    }

    Ok(out)
}

fn push_pixel(out: &mut Vec<u8>, pixel: &Rgba, with_alpha: bool) {
    let [r, g, b, a] = *pixel;
    out.extend_from_slice(&[b, g, r]);
    if with_alpha {
        out.push(a);
    }
}

fn push_literal(out: &mut Vec<u8>, pixels: &[Rgba], with_alpha: bool) {
    out.push((pixels.len() - 1) as u8);
    for pixel in pixels {
        push_pixel(out, pixel, with_alpha);
    }
}

/// Packets never span two scanlines. Colors are compared on all four
/// channels even when alpha is not written.
fn encode_run_length(pixels: &[Rgba], width: usize, with_alpha: bool, out: &mut Vec<u8>) {
    if width == 0 {
        return;
    }

    for line in pixels.chunks(width) {
        let mut pos = 0;
        while pos < line.len() {
            if pos == line.len() - 1 {
                push_literal(out, &line[pos..], with_alpha);
                pos += 1;
                continue;
            }

            let repeats = repetition_count(line, pos);
            if repeats > 0 {
                out.push(0x80 | (repeats - 1) as u8);
                push_pixel(out, &line[pos], with_alpha);
                pos += repeats;
            } else {
                let literal = literal_count(line, pos);
                push_literal(out, &line[pos..pos + literal], with_alpha);
                pos += literal;
            }
        }
    }
}

/// Number of pixels following `start` that equal it.
fn repetition_count(line: &[Rgba], start: usize) -> usize {
    line[start + 1..]
        .iter()
        .take(MAX_PACKET_PIXELS)
        .take_while(|pixel| **pixel == line[start])
        .count()
}

/// Number of positions from `start` whose pixel differs from its successor.
fn literal_count(line: &[Rgba], start: usize) -> usize {
    line[start..]
        .windows(2)
        .take(MAX_PACKET_PIXELS)
        .take_while(|pair| pair[0] != pair[1])
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, format: PixelFormat) -> Bitmap {
        let pixels = (0..width * height)
            .map(|i| [(i % 7) as u8 * 30, (i / 3) as u8, 200, (i % 2) as u8 * 255])
            .collect();
        Bitmap::new(width, height, format, pixels)
    }

    fn opaque(bitmap: &Bitmap) -> Vec<Rgba> {
        bitmap
            .pixels
            .iter()
            .map(|[r, g, b, _]| [*r, *g, *b, 255])
            .collect()
    }

    /// Walk RLE packet headers, returning the pixel count of each packet per
    /// scanline.
    fn packet_lengths(data: &[u8], bpp: usize) -> Vec<(bool, usize)> {
        let mut packets = Vec::new();
        let mut pos = HEADER_LEN;
        while pos < data.len() {
            let packet = data[pos];
            let len = (packet & 0x7F) as usize + 1;
            let run = packet & 0x80 != 0;
            pos += 1 + if run { bpp } else { bpp * len };
            packets.push((run, len));
        }
        packets
    }

    #[test]
    fn round_trips_32_bit() {
        let bitmap = gradient(13, 5, PixelFormat::Rgba32);
        for run_length in [false, true] {
            let data = encode(&bitmap, true, run_length).unwrap();
            let decoded = decode(&data).unwrap();
            assert_eq!(decoded.width, 13);
            assert_eq!(decoded.height, 5);
            assert_eq!(decoded.format, PixelFormat::Rgba32);
            assert_eq!(decoded.pixels, bitmap.pixels);
        }
    }

    #[test]
    fn round_trips_24_bit_with_opaque_alpha() {
        let bitmap = gradient(9, 4, PixelFormat::Rgb24);
        for run_length in [false, true] {
            let data = encode(&bitmap, false, run_length).unwrap();
            let decoded = decode(&data).unwrap();
            assert_eq!(decoded.format, PixelFormat::Rgb24);
            assert_eq!(decoded.pixels, opaque(&bitmap));
        }
    }

    #[test]
    fn uncompressed_layout_is_bgr() {
        let bitmap = Bitmap::new(1, 1, PixelFormat::Rgb24, vec![[1, 2, 3, 255]]);
        let data = encode(&bitmap, false, false).unwrap();
        assert_eq!(data.len(), HEADER_LEN + 3);
        assert_eq!(data[2], 2);
        assert_eq!(&data[12..17], &[1, 0, 1, 0, 24]);
        assert_eq!(&data[HEADER_LEN..], &[3, 2, 1]);
    }

    #[test]
    fn runs_stop_at_scanline_end() {
        let bitmap = Bitmap::filled(2, 2, PixelFormat::Rgb24, [10, 20, 30, 255]);
        let data = encode(&bitmap, false, true).unwrap();
        assert_eq!(data[2], 10);
        assert_eq!(
            &data[HEADER_LEN..],
            &[0x80, 30, 20, 10, 0x00, 30, 20, 10, 0x80, 30, 20, 10, 0x00, 30, 20, 10]
        );
    }

    #[test]
    fn packets_are_capped_at_128_pixels() {
        let bitmap = Bitmap::filled(300, 2, PixelFormat::Rgba32, [5, 5, 5, 5]);
        let data = encode(&bitmap, true, true).unwrap();
        let packets = packet_lengths(&data, 4);
        assert!(packets.iter().all(|(_, len)| *len <= MAX_PACKET_PIXELS));
        assert_eq!(packets[0], (true, 128));

        let mut line_total = 0;
        for (_, len) in &packets {
            line_total += len;
            assert!(line_total <= 300, "packet crossed a scanline");
            if line_total == 300 {
                line_total = 0;
            }
        }
        assert_eq!(line_total, 0);
        assert_eq!(decode(&data).unwrap().pixels, bitmap.pixels);
    }

    #[test]
    fn literal_packets_cover_differing_neighbours() {
        let pixels = vec![[1, 0, 0, 255], [2, 0, 0, 255], [3, 0, 0, 255], [3, 0, 0, 255]];
        let bitmap = Bitmap::new(4, 1, PixelFormat::Rgb24, pixels);
        let data = encode(&bitmap, false, true).unwrap();
        // literal [1, 2], run of one [3], trailing literal [3]
        assert_eq!(packet_lengths(&data, 3), [(false, 2), (true, 1), (false, 1)]);
    }

    #[test]
    fn colors_differing_only_in_alpha_are_distinct() {
        let pixels = vec![[9, 9, 9, 0], [9, 9, 9, 255]];
        let bitmap = Bitmap::new(2, 1, PixelFormat::Rgb24, pixels);
        let data = encode(&bitmap, false, true).unwrap();
        assert_eq!(packet_lengths(&data, 3), [(false, 1), (false, 1)]);
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(decode(&[0u8; 17]).is_err());
        assert!(matches!(
            decode_image(&[0u8; 17]),
            Err(TgaError::TooShort { len: 17 })
        ));
    }

    #[test]
    fn grey_scale_is_unsupported() {
        let mut data = TgaHeader::true_color(1, 1, 8, false).to_bytes();
        data[2] = TgaImageType::UncompressedGreyScale as u8;
        assert!(matches!(
            decode_image(&data),
            Err(TgaError::UnsupportedImageType(Recognized::Known(
                TgaImageType::UncompressedGreyScale
            )))
        ));

        data[2] = 42;
        assert!(matches!(
            decode_image(&data),
            Err(TgaError::UnsupportedImageType(Recognized::Unknown(42)))
        ));
    }

    #[test]
    fn odd_depth_is_unsupported() {
        let data = TgaHeader::true_color(1, 1, 16, false).to_bytes();
        assert!(matches!(
            decode_image(&data),
            Err(TgaError::UnsupportedDepth(16))
        ));
    }

    #[test]
    fn truncated_pixels_are_malformed() {
        let bitmap = Bitmap::filled(4, 4, PixelFormat::Rgb24, [1, 2, 3, 255]);
        let data = encode(&bitmap, false, false).unwrap();
        assert!(matches!(
            decode_image(&data[..data.len() - 2]),
            Err(TgaError::Truncated { .. })
        ));
    }

    #[test]
    fn oversized_header_without_pixels_is_truncated() {
        for run_length in [false, true] {
            let data = TgaHeader::true_color(65535, 65535, 32, run_length).to_bytes();
            assert!(matches!(
                decode_image(&data),
                Err(TgaError::Truncated { offset: HEADER_LEN })
            ));
        }
    }

    #[test]
    fn short_pixel_buffer_is_rejected() {
        let bitmap = Bitmap {
            width: 4,
            height: 4,
            format: PixelFormat::Rgb24,
            pixels: vec![[0, 0, 0, 255]; 3],
        };
        let err = encode(&bitmap, false, true).unwrap_err();
        assert!(matches!(
            err.current_context(),
            TgaError::PixelCount { expected: 16, actual: 3 }
        ));
    }

    #[test]
    fn image_id_field_is_skipped() {
        let mut data = TgaHeader::true_color(1, 1, 24, false).to_bytes().to_vec();
        data[0] = 3;
        data.extend_from_slice(b"abc");
        data.extend_from_slice(&[30, 20, 10]);
        let bitmap = decode(&data).unwrap();
        assert_eq!(bitmap.pixels, [[10, 20, 30, 255]]);
    }

    #[test]
    fn header_fields_parse() {
        let data = [
            0, 1, 10, 0, 0, 0, 0, 0, 0xFE, 0xFF, 2, 0, 0x00, 0x01, 0x80, 0x00, 32, 8,
        ];
        let header = TgaHeader::parse(&data).unwrap();
        assert!(header.has_color_map);
        assert_eq!(header.image_type, Recognized::Known(TgaImageType::RteTrueColor));
        assert!(TgaImageType::RteTrueColor.is_run_length());
        assert_eq!(header.x_origin, -2);
        assert_eq!(header.y_origin, 2);
        assert_eq!(header.width, 256);
        assert_eq!(header.height, 128);
        assert_eq!(header.pixel_depth, 32);
        assert_eq!(header.image_descriptor, 8);
    }
}
