//! MBM, the engine's raw bitmap container: a `"KSP"` magic string, the image
//! dimensions, the texture type and bit depth, then unpadded R, G, B[, A]
//! pixels bottom row first.

use std::io;

use crate::data::binary_writer::BinaryWriter;
use crate::models::texture::{Bitmap, PixelFormat, TextureType};

pub const MAGIC: &str = "KSP";

/// Whether a plain texture keeps its alpha channel in an MBM file.
pub fn texture_has_alpha(format: PixelFormat) -> bool {
    matches!(format, PixelFormat::Rgba32 | PixelFormat::Dxt5)
}

/// Encode `bitmap` as MBM. Normal maps are always 32-bit; plain textures are
/// 32-bit only when their source format carries alpha.
pub fn encode(bitmap: &Bitmap, texture_type: TextureType) -> io::Result<Vec<u8>> {
    if !bitmap.has_expected_len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{}x{} bitmap holds {} pixels",
                bitmap.width,
                bitmap.height,
                bitmap.pixels.len()
            ),
        ));
    }
    let with_alpha = match texture_type {
        TextureType::NormalMap => true,
        TextureType::Texture => texture_has_alpha(bitmap.format),
    };

    let bpp = if with_alpha { 4 } else { 3 };
    let mut writer = BinaryWriter::new(Vec::with_capacity(20 + bitmap.pixels.len() * bpp));
    writer.write_string(MAGIC)?;
    writer.write_len(bitmap.width as usize)?;
    writer.write_len(bitmap.height as usize)?;
    writer.write_i32(texture_type as i32)?;
    writer.write_i32(if with_alpha { 32 } else { 24 })?;

    for [r, g, b, a] in &bitmap.pixels {
        writer.write_u8(*r)?;
        writer.write_u8(*g)?;
        writer.write_u8(*b)?;
        if with_alpha {
            writer.write_u8(*a)?;
        }
    }

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_texture_layout() {
        let bitmap = Bitmap::new(
            2,
            1,
            PixelFormat::Rgb24,
            vec![[1, 2, 3, 4], [5, 6, 7, 8]],
        );
        let data = encode(&bitmap, TextureType::Texture).unwrap();
        let mut expected = vec![0x03, b'K', b'S', b'P'];
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
        expected.extend_from_slice(&24i32.to_le_bytes());
        expected.extend_from_slice(&[1, 2, 3, 5, 6, 7]);
        assert_eq!(data, expected);
    }

    #[test]
    fn short_pixel_buffer_is_invalid_input() {
        let bitmap = Bitmap {
            width: 3,
            height: 3,
            format: PixelFormat::Rgb24,
            pixels: vec![[0; 4]; 4],
        };
        let err = encode(&bitmap, TextureType::Texture).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn dxt1_textures_drop_alpha_but_dxt5_keeps_it() {
        let mut bitmap = Bitmap::filled(1, 1, PixelFormat::Dxt1, [1, 2, 3, 4]);
        let data = encode(&bitmap, TextureType::Texture).unwrap();
        assert_eq!(&data[16..20], &24i32.to_le_bytes());
        assert_eq!(data.len(), 23);

        bitmap.format = PixelFormat::Dxt5;
        let data = encode(&bitmap, TextureType::Texture).unwrap();
        assert_eq!(&data[16..20], &32i32.to_le_bytes());
        assert_eq!(&data[20..], &[1, 2, 3, 4]);
    }

    #[test]
    fn normal_maps_are_always_rgba() {
        let bitmap = Bitmap::filled(1, 1, PixelFormat::Rgb24, [9, 8, 7, 6]);
        let data = encode(&bitmap, TextureType::NormalMap).unwrap();
        assert_eq!(&data[12..16], &1i32.to_le_bytes());
        assert_eq!(&data[16..20], &32i32.to_le_bytes());
        assert_eq!(&data[20..], &[9, 8, 7, 6]);
    }
}
