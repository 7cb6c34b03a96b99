/// Color space conversion utilities
///
/// This module handles conversion between the color spaces used by the
/// colorization pipeline:
/// - sRGB (standard display color space, gamma companded)
/// - XYZ (device-independent color space, D65 white point)
/// - CIE L*a*b* (lightness plus two chrominance axes)

use cgmath::{Matrix3, Vector3};
use image::{Rgb, Rgb32FImage, RgbImage};
use ndarray::{Array3, ArrayView3};

/// Linear sRGB to XYZ conversion matrix (D65 white point)
const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];

/// Standard XYZ to sRGB conversion matrix (D65 white point)
/// Inverse of `SRGB_TO_XYZ`
const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [ 3.240481, -1.537152, -0.498536],
    [-0.969255,  1.875990,  0.041556],
    [ 0.055647, -0.204041,  1.057311],
];

/// Reference white for the D65 illuminant, 2 degree observer
const D65_WHITE: [f32; 3] = [0.95047, 1.0, 1.08883];

/// CIE epsilon (6/29)^3
const LAB_EPSILON: f32 = 0.008856;
/// Slope of the linear segment of the CIE lightness function
const LAB_KAPPA: f32 = 7.787;
const LAB_OFFSET: f32 = 16.0 / 116.0;

/// Convert a row-major 3x3 array into a cgmath matrix.
/// cgmath matrices are column-major, so rows become columns here.
fn matrix(rows: [[f32; 3]; 3]) -> Matrix3<f32> {
    Matrix3::new(
        rows[0][0], rows[1][0], rows[2][0], // Column 0
        rows[0][1], rows[1][1], rows[2][1], // Column 1
        rows[0][2], rows[1][2], rows[2][2], // Column 2
    )
}

fn srgb_to_linear(c: f32) -> f32 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c > 0.0031308 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        LAB_KAPPA * t + LAB_OFFSET
    }
}

fn lab_f_inv(f: f32) -> f32 {
    // 0.2068966 = cbrt(LAB_EPSILON)
    if f > 0.2068966 {
        f * f * f
    } else {
        (f - LAB_OFFSET) / LAB_KAPPA
    }
}

/// Convert one sRGB sample (components in [0, 1]) to L*a*b*
///
/// # Returns
/// * `[L, a, b]` with L in [0, 100]
pub fn srgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let linear = Vector3::new(
        srgb_to_linear(rgb[0]),
        srgb_to_linear(rgb[1]),
        srgb_to_linear(rgb[2]),
    );
    let xyz = matrix(SRGB_TO_XYZ) * linear;

    let fx = lab_f(xyz.x / D65_WHITE[0]);
    let fy = lab_f(xyz.y / D65_WHITE[1]);
    let fz = lab_f(xyz.z / D65_WHITE[2]);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Convert one L*a*b* sample back to sRGB
///
/// The result is NOT clipped: predicted chrominance can describe colors
/// outside the sRGB gamut, so callers clamp before quantizing.
pub fn lab_to_srgb(lab: [f32; 3]) -> [f32; 3] {
    let fy = (lab[0] + 16.0) / 116.0;
    let fx = fy + lab[1] / 500.0;
    // Negative Z has no physical meaning
    let fz = (fy - lab[2] / 200.0).max(0.0);

    let xyz = Vector3::new(
        lab_f_inv(fx) * D65_WHITE[0],
        lab_f_inv(fy) * D65_WHITE[1],
        lab_f_inv(fz) * D65_WHITE[2],
    );
    let linear = matrix(XYZ_TO_SRGB) * xyz;

    [
        linear_to_srgb(linear.x.max(0.0)),
        linear_to_srgb(linear.y.max(0.0)),
        linear_to_srgb(linear.z.max(0.0)),
    ]
}

/// Convert a floating point RGB image into a channel-first L*a*b* buffer
/// of shape `(3, height, width)`.
pub fn rgb_image_to_lab(img: &Rgb32FImage) -> Array3<f32> {
    let (width, height) = img.dimensions();
    let mut lab = Array3::zeros((3, height as usize, width as usize));

    for (x, y, pixel) in img.enumerate_pixels() {
        let [l, a, b] = srgb_to_lab(pixel.0);
        let (row, col) = (y as usize, x as usize);
        lab[[0, row, col]] = l;
        lab[[1, row, col]] = a;
        lab[[2, row, col]] = b;
    }

    lab
}

/// Convert a channel-first L*a*b* buffer back to an 8-bit RGB image,
/// clipping every component into [0, 1] first.
pub fn lab_to_rgb_image(lab: ArrayView3<f32>) -> RgbImage {
    let (_, height, width) = lab.dim();

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (row, col) = (y as usize, x as usize);
        let rgb = lab_to_srgb([lab[[0, row, col]], lab[[1, row, col]], lab[[2, row, col]]]);
        Rgb(rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}
