/// Separable linear resampling of single-channel `f32` planes
///
/// The lightness channel is shrunk to the model grid and the predicted
/// chrominance is grown back with this same routine, so both directions
/// share one interpolation method. Downsampling an axis first smooths it
/// with a Gaussian (sigma = (factor - 1) / 2) to avoid aliasing.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1};

/// Gaussian kernels are truncated at this many standard deviations
const KERNEL_TRUNCATE: f32 = 4.0;

/// Resample a plane to `out_height` x `out_width`.
///
/// Both output dimensions must be non-zero.
pub fn resize(plane: ArrayView2<f32>, out_height: usize, out_width: usize) -> Array2<f32> {
    // Rows first, then the columns via a transposed view
    let horizontal = resample_rows(plane, out_width);
    resample_rows(horizontal.t(), out_height).reversed_axes()
}

/// Resample every row of `plane` to `out_len` samples.
fn resample_rows(plane: ArrayView2<f32>, out_len: usize) -> Array2<f32> {
    let (rows, in_len) = plane.dim();
    let mut out = Array2::zeros((rows, out_len));
    if in_len == 0 || out_len == 0 {
        return out;
    }

    let scale = in_len as f32 / out_len as f32;
    let smoothed;
    let src = if scale > 1.0 {
        smoothed = blur_rows(plane, (scale - 1.0) / 2.0);
        smoothed.view()
    } else {
        plane.view()
    };

    for (src_row, dst_row) in src.outer_iter().zip(out.outer_iter_mut()) {
        interpolate(src_row, dst_row, scale);
    }

    out
}

/// Linear interpolation with half-pixel centres, clamped at the edges.
fn interpolate(src: ArrayView1<f32>, mut dst: ArrayViewMut1<f32>, scale: f32) {
    let last = src.len() - 1;

    for (i, out) in dst.iter_mut().enumerate() {
        let pos = ((i as f32 + 0.5) * scale - 0.5).clamp(0.0, last as f32);
        let left = pos.floor() as usize;
        let right = (left + 1).min(last);
        let t = pos - left as f32;
        *out = src[left] * (1.0 - t) + src[right] * t;
    }
}

/// Normalized 1-D Gaussian kernel, centre tap at index `radius`.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (KERNEL_TRUNCATE * sigma + 0.5) as usize;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-d * d / denom).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Mirror an out-of-range index back into `0..len` (d c b | a b c d | c b a).
fn mirror(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = index.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - folded) as usize
    }
}

fn blur_rows(plane: ArrayView2<f32>, sigma: f32) -> Array2<f32> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let (rows, len) = plane.dim();
    let mut out = Array2::zeros((rows, len));

    for (src, mut dst) in plane.outer_iter().zip(out.outer_iter_mut()) {
        for (i, value) in dst.iter_mut().enumerate() {
            *value = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * src[mirror(i as isize + k as isize - radius, len)])
                .sum();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_output_shape() {
        let plane = Array2::<f32>::zeros((600, 800));
        assert_eq!(resize(plane.view(), 256, 256).dim(), (256, 256));

        let small = Array2::<f32>::zeros((256, 256));
        assert_eq!(resize(small.view(), 600, 800).dim(), (600, 800));
    }

    #[test]
    fn test_constant_plane_is_preserved() {
        let plane = Array2::from_elem((37, 91), 42.5f32);
        for (h, w) in [(256, 256), (3, 200), (91, 37)] {
            let out = resize(plane.view(), h, w);
            assert!(out.iter().all(|&v| (v - 42.5).abs() < 1e-3));
        }
    }

    #[test]
    fn test_identity_size_is_exact() {
        let plane = Array2::from_shape_fn((4, 5), |(r, c)| (r * 5 + c) as f32);
        let out = resize(plane.view(), 4, 5);
        assert_eq!(out, plane);
    }

    #[test]
    fn test_upsampling_interpolates_linearly() {
        let plane = Array2::from_shape_vec((1, 2), vec![0.0f32, 100.0]).unwrap();
        let out = resize(plane.view(), 1, 4);
        // Half-pixel centres: 0.0, 25.0, 75.0, 100.0
        let expected = [0.0, 25.0, 75.0, 100.0];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
    }

    #[test]
    fn test_downsampling_stays_in_range() {
        let plane = Array2::from_shape_fn((64, 64), |(r, c)| if (r + c) % 2 == 0 { 0.0 } else { 100.0 });
        let out = resize(plane.view(), 8, 8);
        assert!(out.iter().all(|&v| (0.0..=100.0).contains(&v)));
        // Anti-aliasing flattens the checkerboard towards its mean
        assert!(out.iter().all(|&v| (v - 50.0).abs() < 10.0));
    }

    #[test]
    fn test_shrink_one_axis_grow_the_other() {
        // Width goes through the smoothed path, height through the direct one
        let plane = Array2::from_shape_fn((10, 40), |(_, c)| c as f32);
        let out = resize(plane.view(), 30, 10);
        assert_eq!(out.dim(), (30, 10));
        for row in out.rows() {
            assert!(row.iter().zip(row.iter().skip(1)).all(|(a, b)| a <= b));
            assert!(row.iter().zip(out.row(0)).all(|(a, b)| (a - b).abs() < 1e-3));
        }
    }

    #[test]
    fn test_mirror_boundaries() {
        assert_eq!(mirror(-1, 4), 1);
        assert_eq!(mirror(4, 4), 2);
        assert_eq!(mirror(0, 1), 0);
        assert_eq!(mirror(-7, 1), 0);
    }

    #[test]
    fn test_kernel_is_normalized() {
        let kernel = gaussian_kernel(1.5);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(kernel.len() % 2, 1);
    }
}
