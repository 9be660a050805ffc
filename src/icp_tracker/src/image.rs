//! Row-major image buffers for depth and point/normal maps.

use nalgebra::Vector4;

/// Dense row-major image with `stride == width`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

/// Depth in meters. Values `<= 0` mark holes.
pub type DepthImage = Image<f32>;

/// Homogeneous points or normals. A negative `w` marks a hole.
pub type PointMap = Image<Vector4<f32>>;

impl<T: Copy> Image<T> {
    /// Create an image filled with `value`.
    pub fn new(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap an existing buffer. Returns `None` if the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.width + x] = value;
    }

    /// One row of pixels.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Copy `other` into this image, reusing the buffer when sizes match.
    pub fn copy_from(&mut self, other: &Image<T>) {
        if self.size() == other.size() {
            self.data.copy_from_slice(&other.data);
        } else {
            self.width = other.width;
            self.height = other.height;
            self.data.clear();
            self.data.extend_from_slice(&other.data);
        }
    }
}

/// Bilinearly sample a point map at a sub-pixel position.
///
/// Returns `None` when the 2x2 neighbourhood leaves the image or contains a
/// hole, so interpolation never blends valid geometry with missing samples.
pub fn interpolate_bilinear_with_holes(map: &PointMap, u: f32, v: f32) -> Option<Vector4<f32>> {
    if !(u >= 0.0 && v >= 0.0) {
        return None;
    }
    let x = u.floor() as usize;
    let y = v.floor() as usize;
    if x + 1 >= map.width() || y + 1 >= map.height() {
        return None;
    }

    let a = map.get(x, y);
    let b = map.get(x + 1, y);
    let c = map.get(x, y + 1);
    let d = map.get(x + 1, y + 1);
    if a.w < 0.0 || b.w < 0.0 || c.w < 0.0 || d.w < 0.0 {
        return None;
    }

    let dx = u - x as f32;
    let dy = v - y as f32;
    Some(
        a * ((1.0 - dx) * (1.0 - dy))
            + b * (dx * (1.0 - dy))
            + c * ((1.0 - dx) * dy)
            + d * (dx * dy),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_image_indexing() {
        let img = Image::from_fn(4, 3, |x, y| (x + 10 * y) as f32);
        assert_eq!(img.size(), (4, 3));
        assert_eq!(img.get(3, 2), 23.0);
        assert_eq!(img.row(1), &[10.0, 11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_from_vec_length_check() {
        assert!(Image::from_vec(2, 2, vec![0.0f32; 3]).is_none());
        assert!(Image::from_vec(2, 2, vec![0.0f32; 4]).is_some());
    }

    #[test]
    fn test_copy_from_resizes() {
        let mut dst = DepthImage::new(2, 2, 0.0);
        let src = DepthImage::new(3, 1, 5.0);
        dst.copy_from(&src);
        assert_eq!(dst.size(), (3, 1));
        assert_eq!(dst.get(2, 0), 5.0);
    }

    #[test]
    fn test_bilinear_interpolation() {
        let map = PointMap::from_fn(2, 2, |x, y| Vector4::new(x as f32, y as f32, 1.0, 1.0));
        let p = interpolate_bilinear_with_holes(&map, 0.25, 0.75).unwrap();
        assert_relative_eq!(p.x, 0.25, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.75, epsilon = 1e-6);
        assert_relative_eq!(p.w, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bilinear_rejects_holes_and_border() {
        let mut map = PointMap::new(3, 3, Vector4::new(0.0, 0.0, 1.0, 1.0));
        map.set(1, 1, Vector4::new(0.0, 0.0, 0.0, -1.0));
        assert!(interpolate_bilinear_with_holes(&map, 0.5, 0.5).is_none());
        assert!(interpolate_bilinear_with_holes(&map, 2.5, 0.0).is_none());
        assert!(interpolate_bilinear_with_holes(&map, -0.1, 0.0).is_none());
        assert!(interpolate_bilinear_with_holes(&map, f32::NAN, 0.0).is_none());
    }
}
