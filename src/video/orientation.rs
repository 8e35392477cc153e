//! Orientation correction.
//!
//! Cameras store frames in sensor orientation and describe the display
//! rotation as a track transform. Only the four plain rotations are
//! recognised; every other signature (mirrored capture included) maps to
//! the identity transform and the frame is left as-is.

use image::{ImageBuffer, RgbImage};
use tracing::warn;

/// 2D affine transform in the `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty` convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    pub const fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    /// Transform matching a clockwise display rotation in degrees, as found in
    /// container metadata. Anything that is not a multiple of 90 gives identity.
    pub fn from_clockwise_degrees(degrees: i64, natural_size: (u32, u32)) -> Self {
        let (w, h) = (f64::from(natural_size.0), f64::from(natural_size.1));
        match degrees.rem_euclid(360) {
            90 => Self::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
            180 => Self::new(-1.0, 0.0, 0.0, -1.0, w, h),
            270 => Self::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
            _ => Self::IDENTITY,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation() == Rotation::None && self.tx == 0.0 && self.ty == 0.0
    }

    /// Which canonical rotation the linear part encodes, if any
    pub fn rotation(&self) -> Rotation {
        match (self.a, self.b, self.c, self.d) {
            (a, b, c, d) if a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0 => Rotation::None,
            (a, b, c, d) if a == 0.0 && b == 1.0 && c == -1.0 && d == 0.0 => Rotation::Clockwise90,
            (a, b, c, d) if a == 0.0 && b == -1.0 && c == 1.0 && d == 0.0 => Rotation::CounterClockwise90,
            (a, b, c, d) if a == -1.0 && b == 0.0 && c == 0.0 && d == -1.0 => Rotation::Half,
            _ => Rotation::Unrecognized,
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.tx, self.b * x + self.d * y + self.ty)
    }

    fn invert_linear(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.a * self.d - self.b * self.c;
        ((self.d * x - self.c * y) / det, (-self.b * x + self.a * y) / det)
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Clockwise90,
    CounterClockwise90,
    Half,
    Unrecognized,
}

/// Transform needed to bring frames of `natural_size` upright.
pub fn transform_for(track_transform: &AffineTransform, natural_size: (u32, u32)) -> AffineTransform {
    let (w, h) = (f64::from(natural_size.0), f64::from(natural_size.1));
    match track_transform.rotation() {
        Rotation::None => AffineTransform::IDENTITY,
        Rotation::Clockwise90 => AffineTransform::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
        Rotation::CounterClockwise90 => AffineTransform::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
        Rotation::Half => AffineTransform::new(-1.0, 0.0, 0.0, -1.0, w, h),
        Rotation::Unrecognized => {
            warn!("Unrecognized track transform {:?}, leaving frames unrotated", track_transform);
            AffineTransform::IDENTITY
        }
    }
}

/// Render `image` through `transform`.
///
/// The output canvas is the bounding box of the transformed image, so the
/// translation part only has to be consistent with the rotation, not exact.
pub fn apply_transform(image: RgbImage, transform: &AffineTransform) -> RgbImage {
    if transform.rotation() == Rotation::None || transform.rotation() == Rotation::Unrecognized {
        return image;
    }

    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)].map(|(x, y)| transform.apply(x, y));
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let out_w = (max_x - min_x).round() as u32;
    let out_h = (max_y - min_y).round() as u32;

    // Map each destination pixel centre back into the source image.
    let offset = transform.apply(0.0, 0.0);
    ImageBuffer::from_fn(out_w, out_h, |dx, dy| {
        let px = f64::from(dx) + 0.5 + min_x - offset.0;
        let py = f64::from(dy) + 0.5 + min_y - offset.1;
        let (sx, sy) = transform.invert_linear(px, py);
        let sx = (sx.floor() as i64).clamp(0, i64::from(image.width()) - 1) as u32;
        let sy = (sy.floor() as i64).clamp(0, i64::from(image.height()) - 1) as u32;
        *image.get_pixel(sx, sy)
    })
}
