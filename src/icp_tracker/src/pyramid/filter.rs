//! Hole-aware depth subsampling and valid-sample counting.

use rayon::prelude::*;

use crate::image::DepthImage;

/// Value written for output pixels with no valid input sample.
pub const DEPTH_HOLE: f32 = -1.0;

/// Halve `src` into `dst` by averaging the valid samples of each 2x2 block.
///
/// Samples `<= 0` are holes and do not contribute. A block without any
/// valid sample produces [`DEPTH_HOLE`]. `dst` is resized to
/// `(src.width / 2, src.height / 2)` only if it does not already have that
/// size.
pub fn filter_subsample_with_holes(dst: &mut DepthImage, src: &DepthImage) {
    let (out_w, out_h) = (src.width() / 2, src.height() / 2);
    if dst.size() != (out_w, out_h) {
        *dst = DepthImage::new(out_w, out_h, DEPTH_HOLE);
    }
    if out_w == 0 || out_h == 0 {
        return;
    }

    dst.as_mut_slice()
        .par_chunks_mut(out_w)
        .enumerate()
        .for_each(|(y, row)| {
            let top = src.row(2 * y);
            let bottom = src.row(2 * y + 1);
            for (x, out) in row.iter_mut().enumerate() {
                let samples = [top[2 * x], top[2 * x + 1], bottom[2 * x], bottom[2 * x + 1]];
                let (sum, count) = samples
                    .iter()
                    .filter(|&&d| d > 0.0)
                    .fold((0.0f32, 0u32), |(s, n), &d| (s + d, n + 1));
                *out = if count > 0 {
                    sum / count as f32
                } else {
                    DEPTH_HOLE
                };
            }
        });
}

/// Number of valid (`> 0`) depth samples.
pub fn count_valid_depths(image: &DepthImage) -> usize {
    image.as_slice().par_iter().filter(|&&d| d > 0.0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_subsample_averages_valid_samples() {
        #[rustfmt::skip]
        let src = DepthImage::from_vec(4, 2, vec![
            1.0, 3.0,  0.0, 0.0,
            2.0, 2.0, -1.0, 4.0,
        ]).unwrap();
        let mut dst = DepthImage::new(1, 1, 0.0);

        filter_subsample_with_holes(&mut dst, &src);

        assert_eq!(dst.size(), (2, 1));
        assert_relative_eq!(dst.get(0, 0), 2.0);
        assert_relative_eq!(dst.get(1, 0), 4.0);
    }

    #[test]
    fn test_subsample_all_holes() {
        let src = DepthImage::new(4, 4, 0.0);
        let mut dst = DepthImage::new(2, 2, 7.0);
        filter_subsample_with_holes(&mut dst, &src);
        assert!(dst.as_slice().iter().all(|&d| d == DEPTH_HOLE));
    }

    #[test]
    fn test_subsample_odd_size() {
        let src = DepthImage::new(5, 3, 1.5);
        let mut dst = DepthImage::new(0, 0, 0.0);
        filter_subsample_with_holes(&mut dst, &src);
        assert_eq!(dst.size(), (2, 1));
        assert!(dst.as_slice().iter().all(|&d| d == 1.5));
    }

    #[test]
    fn test_count_valid_depths() {
        let src = DepthImage::from_vec(3, 2, vec![1.0, 0.0, -1.0, 0.5, f32::NAN, 2.0]).unwrap();
        assert_eq!(count_valid_depths(&src), 3);
    }
}
