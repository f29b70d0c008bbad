//! Height-to-normal conversion using a Sobel gradient, and the channel
//! permutations between the engine's packed normal encoding and plain RGB
//! normal maps.

use crate::models::texture::{Bitmap, PixelFormat, Rgba};

/// Height scales are authored in thousandths for the packed engine encoding.
const ENGINE_STRENGTH_FACTOR: f32 = 0.001;

/// Convert a unit float to a byte, clamping first.
pub fn float_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn normalize([x, y, z]: [f32; 3]) -> [f32; 3] {
    let len = (x * x + y * y + z * z).sqrt();
    if len > 1e-5 {
        [x / len, y / len, z / len]
    } else {
        [0.0; 3]
    }
}

/// Sobel normal at `(x, y)`, remapped from `[-1, 1]` into `[0, 1]`.
///
/// Neighbour reads wrap around the edges. "Top" is the `y - 1` row.
fn sobel_normal(height_map: &Bitmap, x: u32, y: u32, strength: f32) -> [f32; 3] {
    let (x, y) = (x as i64, y as i64);
    let sample = |dx: i64, dy: i64| height_map.grayscale_wrapped(x + dx, y + dy);

    let tl = sample(-1, -1);
    let l = sample(-1, 0);
    let bl = sample(-1, 1);
    let t = sample(0, -1);
    let b = sample(0, 1);
    let tr = sample(1, -1);
    let r = sample(1, 0);
    let br = sample(1, 1);

    let dx = tr + 2.0 * r + br - tl - 2.0 * l - bl;
    let dy = bl + 2.0 * b + br - tl - 2.0 * t - tr;

    normalize([dx, strength, dy]).map(|c| c * 0.5 + 0.5)
}

fn map_normals(
    height_map: &Bitmap,
    strength: f32,
    format: PixelFormat,
    pack: impl Fn([f32; 3]) -> Rgba,
) -> Bitmap {
    let mut pixels = Vec::with_capacity(height_map.pixels.len());
    for y in 0..height_map.height {
        for x in 0..height_map.width {
            pixels.push(pack(sobel_normal(height_map, x, y, strength)));
        }
    }
    Bitmap::new(height_map.width, height_map.height, format, pixels)
}

/// Greyscale height map to a plain RGB normal map, written when a copied
/// texture is flagged for conversion. `strength` is used as given.
pub fn height_to_normal_map(height_map: &Bitmap, strength: f32) -> Bitmap {
    map_normals(height_map, strength, PixelFormat::Rgb24, |[nx, ny, nz]| {
        [
            float_to_byte(1.0 - nx),
            float_to_byte(1.0 - nz),
            float_to_byte(1.0 - ny),
            255,
        ]
    })
}

/// Greyscale height map to the engine's packed normal encoding, with the X
/// component in alpha.
pub fn greyscale_to_engine_normal_map(height_map: &Bitmap, strength: f32) -> Bitmap {
    let strength = strength * ENGINE_STRENGTH_FACTOR;
    map_normals(height_map, strength, PixelFormat::Rgba32, |[nx, ny, nz]| {
        [
            float_to_byte(1.0 - ny),
            float_to_byte(1.0 - nz),
            255,
            float_to_byte(1.0 - nx),
        ]
    })
}

/// Unpack an engine-encoded normal map into plain RGB: red from alpha, green
/// from red, blue and alpha saturated.
pub fn engine_to_generic(normal_map: &Bitmap) -> Bitmap {
    let pixels = normal_map
        .pixels
        .iter()
        .map(|[r, _, _, a]| [*a, *r, 255, 255])
        .collect();
    Bitmap::new(
        normal_map.width,
        normal_map.height,
        PixelFormat::Rgba32,
        pixels,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> Bitmap {
        let pixels = (0..height)
            .flat_map(|_| (0..width).map(move |x| [(x * 40) as u8; 4]))
            .collect();
        Bitmap::new(width, height, PixelFormat::Rgb24, pixels)
    }

    #[test]
    fn float_conversion_rounds_and_clamps() {
        assert_eq!(float_to_byte(0.5), 128);
        assert_eq!(float_to_byte(-1.0), 0);
        assert_eq!(float_to_byte(2.0), 255);
        assert_eq!(float_to_byte(1.0 / 255.0), 1);
    }

    #[test]
    fn flat_height_map_points_straight_up() {
        let flat = Bitmap::filled(4, 4, PixelFormat::Rgb24, [128, 128, 128, 255]);

        // normal (0, 1, 0) remaps to (0.5, 1.0, 0.5)
        let generic = height_to_normal_map(&flat, 2.0);
        assert!(generic.pixels.iter().all(|p| *p == [128, 128, 0, 255]));

        let engine = greyscale_to_engine_normal_map(&flat, 2.0);
        assert!(engine.pixels.iter().all(|p| *p == [0, 128, 255, 128]));
    }

    #[test]
    fn zero_strength_on_flat_input_is_neutral() {
        let flat = Bitmap::filled(2, 2, PixelFormat::Rgb24, [0, 0, 0, 255]);
        let generic = height_to_normal_map(&flat, 0.0);
        assert!(generic.pixels.iter().all(|p| *p == [128, 128, 128, 255]));
    }

    #[test]
    fn conversion_is_deterministic() {
        let height_map = ramp(5, 3);
        let first = greyscale_to_engine_normal_map(&height_map, 7.5);
        let second = greyscale_to_engine_normal_map(&height_map, 7.5);
        assert_eq!(first, second);
        assert_eq!(
            height_to_normal_map(&height_map, 1.0),
            height_to_normal_map(&height_map, 1.0)
        );
    }

    #[test]
    fn slope_tilts_the_x_component() {
        let height_map = ramp(5, 3);
        let generic = height_to_normal_map(&height_map, 1.0);
        // at x = 2 the ramp rises to the right, so nx > 0.5 and red < 128
        let [r, _, _, _] = generic.pixel(2, 1);
        assert!(r < 128, "red was {r}");
    }

    #[test]
    fn engine_encoding_unpacks() {
        let packed = Bitmap::new(1, 1, PixelFormat::Rgba32, vec![[10, 20, 30, 40]]);
        let generic = engine_to_generic(&packed);
        assert_eq!(generic.pixels, [[40, 10, 255, 255]]);
    }
}
