//! Image normalization.
//!
//! Turns a raw capture into the working-resolution artifact bundle the rest
//! of the pipeline consumes: white-balanced RGB plus derived grayscale, HSV
//! and Lab planes, all at the same resolution.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::filter::median_filter;
use ndarray::Array3;

use crate::module::error::ScanError;
use crate::module::util::conf;
use crate::module::vision::color;

/// Artifact bundle produced once per run.
///
/// All buffers share the same working resolution and are never mutated after
/// creation.
#[derive(Debug, Clone)]
pub struct PreprocArtifacts {
    /// White-balanced, denoised RGB at working resolution.
    pub rgb: RgbImage,
    /// Grayscale plane.
    pub gray: GrayImage,
    /// HSV plane, shape (H, W, 3): hue in degrees, s and v in [0, 1].
    pub hsv: Array3<f32>,
    /// CIE Lab plane, shape (H, W, 3).
    pub lab: Array3<f32>,
}

/// Normalize a raw capture.
///
/// Rescales to the configured working width (aspect preserved), applies the
/// brightest-percentile white balance, a small median denoise, and derives
/// the auxiliary color-space planes.
pub fn preprocess(
    input: &RgbImage,
    conf: &conf::Preprocess,
) -> Result<PreprocArtifacts, ScanError> {
    let (in_w, in_h) = input.dimensions();
    if in_w == 0 || in_h == 0 || conf.work_width == 0 {
        return Err(ScanError::Preprocess(format!(
            "degenerate input {}x{} at work width {}",
            in_w, in_h, conf.work_width
        )));
    }

    let work_w = conf.work_width;
    let work_h = ((work_w as f32 * in_h as f32 / in_w as f32).round() as u32).max(1);
    let resized = imageops::resize(input, work_w, work_h, FilterType::Triangle);

    let balanced = white_balance(&resized, conf.white_percentile)?;
    let denoised = if conf.denoise_radius > 0 {
        median_filter(&balanced, conf.denoise_radius, conf.denoise_radius)
    } else {
        balanced
    };

    let gray = imageops::grayscale(&denoised);
    let (hsv, lab) = derive_planes(&denoised);

    Ok(PreprocArtifacts {
        rgb: denoised,
        gray,
        hsv,
        lab,
    })
}

/// Rescale each channel so its brightest `percentile` maps to neutral white.
///
/// The background is the brightest thing in the frame under the capture rig,
/// so the top percentile of each channel tracks the illuminant.
fn white_balance(image: &RgbImage, percentile: f32) -> Result<RgbImage, ScanError> {
    let mut hist = [[0u32; 256]; 3];
    for px in image.pixels() {
        for c in 0..3 {
            hist[c][px.0[c] as usize] += 1;
        }
    }

    let total = (image.width() * image.height()) as f32;
    let target = (total * percentile.clamp(0.0, 1.0)) as u32;
    let mut scale = [0f32; 3];
    for c in 0..3 {
        let mut cum = 0u32;
        let mut level = 255usize;
        for (v, count) in hist[c].iter().enumerate() {
            cum += count;
            if cum >= target {
                level = v;
                break;
            }
        }
        if level == 0 {
            return Err(ScanError::Preprocess(
                "channel percentile collapsed to zero".to_string(),
            ));
        }
        scale[c] = 255.0 / level as f32;
        if !scale[c].is_finite() {
            return Err(ScanError::Preprocess(
                "white balance scale overflow".to_string(),
            ));
        }
    }

    let mut out = image.clone();
    for px in out.pixels_mut() {
        for c in 0..3 {
            px.0[c] = (px.0[c] as f32 * scale[c]).min(255.0) as u8;
        }
    }
    Ok(out)
}

/// Derive the HSV and Lab planes for a working-resolution image.
fn derive_planes(image: &RgbImage) -> (Array3<f32>, Array3<f32>) {
    let (w, h) = image.dimensions();
    let mut hsv = Array3::<f32>::zeros((h as usize, w as usize, 3));
    let mut lab = Array3::<f32>::zeros((h as usize, w as usize, 3));
    for (x, y, px) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        let h_px = color::hsv_of(*px);
        hsv[[yi, xi, 0]] = h_px.hue.into_positive_degrees();
        hsv[[yi, xi, 1]] = h_px.saturation;
        hsv[[yi, xi, 2]] = h_px.value;
        let l_px = color::lab_of(*px);
        lab[[yi, xi, 0]] = l_px.l;
        lab[[yi, xi, 1]] = l_px.a;
        lab[[yi, xi, 2]] = l_px.b;
    }
    (hsv, lab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn default_conf() -> conf::Preprocess {
        conf::Preprocess {
            work_width: 320,
            white_percentile: 0.99,
            denoise_radius: 1,
        }
    }

    #[test]
    fn working_resolution_test() {
        let input = RgbImage::from_pixel(640, 480, Rgb([230, 230, 230]));
        let artifacts = preprocess(&input, &default_conf()).unwrap();
        assert_eq!(artifacts.rgb.dimensions(), (320, 240));
        assert_eq!(artifacts.gray.dimensions(), (320, 240));
        assert_eq!(artifacts.hsv.dim(), (240, 320, 3));
        assert_eq!(artifacts.lab.dim(), (240, 320, 3));
    }

    #[test]
    fn white_balance_neutralizes_cast() {
        // Bluish-cast background; after balancing, the background should be
        // close to neutral with all channels near the top of the range.
        let input = RgbImage::from_pixel(64, 48, Rgb([200, 205, 240]));
        let artifacts = preprocess(&input, &default_conf()).unwrap();
        let px = artifacts.rgb.get_pixel(32, 24);
        assert!(px.0[0] > 240);
        assert!(px.0[1] > 240);
        assert!(px.0[2] > 240);
        let spread = px.0.iter().max().unwrap() - px.0.iter().min().unwrap();
        assert!(spread < 16, "channels still spread by {}", spread);
    }

    #[test]
    fn degenerate_input_fails() {
        let input = RgbImage::new(0, 0);
        let res = preprocess(&input, &default_conf());
        assert!(matches!(res, Err(ScanError::Preprocess(_))));
    }

    #[test]
    fn black_frame_fails() {
        let input = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
        let res = preprocess(&input, &default_conf());
        assert!(matches!(res, Err(ScanError::Preprocess(_))));
    }
}
