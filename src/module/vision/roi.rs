//! Resistor ROI localization.
//!
//! Separates the resistor from the white background, scores candidate
//! components by elongation, estimates the principal axis from image
//! moments, and returns an axis-aligned crop of the winning candidate.

use image::imageops::crop_imm;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::{distance_transform, Norm};
use imageproc::geometric_transformations::{rotate, Interpolation};
use imageproc::morphology::open;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::module::error::ScanError;
use crate::module::util::conf;
use crate::module::vision::preprocess::PreprocArtifacts;

/// Localized resistor body.
#[derive(Debug, Clone)]
pub struct Roi {
    /// Bounding box origin in the rotated working frame.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Axis-aligned crop of the body, major axis horizontal.
    pub crop: RgbImage,
    /// Estimated major-axis angle in the original frame, radians.
    pub angle: f32,
    /// Localization confidence in [0, 1].
    pub confidence: f32,
    /// Foreground mask of the winning candidate, original frame.
    pub mask: GrayImage,
}

/// Candidate component statistics derived from raw image moments.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    label: u32,
    area: f64,
    cx: f64,
    cy: f64,
    /// Long/short axis ratio.
    elongation: f64,
    /// Principal-axis angle, radians.
    theta: f64,
}

/// Locate the resistor body in the preprocessed frame.
///
/// Fails with `RoiNotFound` when no elongated candidate of plausible size
/// passes the localization-confidence threshold.
pub fn detect(artifacts: &PreprocArtifacts, conf: &conf::Roi) -> Result<Roi, ScanError> {
    let mask = foreground_mask(artifacts, conf);
    let mask = open(&mask, Norm::LInf, 1);
    let mask = remove_leads(&mask, conf.lead_thickness);

    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
    let (w, h) = mask.dimensions();
    let frame_area = (w * h) as f64;

    let candidates = component_stats(&labels);
    let best = candidates
        .into_iter()
        .filter(|c| c.area >= conf.min_area_frac as f64 * frame_area)
        .filter(|c| c.area <= conf.max_area_frac as f64 * frame_area)
        .filter(|c| c.elongation >= conf.min_elongation as f64)
        .max_by(|a, b| {
            (a.elongation, a.area)
                .partial_cmp(&(b.elongation, b.area))
                .unwrap()
        })
        .ok_or(ScanError::RoiNotFound)?;

    let confidence = localization_confidence(artifacts, &labels, &best, conf);
    if confidence < conf.min_confidence {
        log::debug!(
            "roi candidate rejected: confidence {:.3} < {:.3}",
            confidence,
            conf.min_confidence
        );
        return Err(ScanError::RoiNotFound);
    }

    // Keep only the winning component before rotating.
    let mut body_mask = GrayImage::new(w, h);
    for (x, y, px) in labels.enumerate_pixels() {
        if px.0[0] == best.label {
            body_mask.put_pixel(x, y, Luma([255u8]));
        }
    }

    let theta = best.theta as f32;
    let center = (best.cx as f32, best.cy as f32);
    let rotated_rgb = rotate(
        &artifacts.rgb,
        center,
        -theta,
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
    );
    let rotated_mask = rotate(&body_mask, center, -theta, Interpolation::Nearest, Luma([0]));

    let (x0, y0, bw, bh) = mask_bbox(&rotated_mask).ok_or(ScanError::RoiNotFound)?;
    let crop = crop_imm(&rotated_rgb, x0, y0, bw, bh).to_image();

    Ok(Roi {
        x: x0,
        y: y0,
        width: bw,
        height: bh,
        crop,
        angle: theta,
        confidence,
        mask: body_mask,
    })
}

/// Binary mask separating the resistor from the white background.
///
/// A background pixel is bright and desaturated; anything saturated or dark
/// is foreground.
fn foreground_mask(artifacts: &PreprocArtifacts, conf: &conf::Roi) -> GrayImage {
    let dims = artifacts.hsv.dim();
    let (h, w) = (dims.0, dims.1);
    let mut mask = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let s = artifacts.hsv[[y, x, 1]];
            let v = artifacts.hsv[[y, x, 2]];
            if s >= conf.saturation_min || v <= conf.value_max {
                mask.put_pixel(x as u32, y as u32, Luma([255u8]));
            }
        }
    }
    mask
}

/// Remove thin leads: keep only pixels deeper than `thickness` from the
/// background, measured with a distance transform of the inverted mask.
fn remove_leads(mask: &GrayImage, thickness: u8) -> GrayImage {
    if thickness == 0 {
        return mask.clone();
    }
    let mut inverted = mask.clone();
    for px in inverted.pixels_mut() {
        px.0[0] = if px.0[0] == 0 { 255 } else { 0 };
    }
    let dist = distance_transform(&inverted, Norm::LInf);
    let mut out = GrayImage::new(mask.width(), mask.height());
    for (x, y, px) in dist.enumerate_pixels() {
        if px.0[0] >= thickness {
            out.put_pixel(x, y, Luma([255u8]));
        }
    }
    out
}

/// Per-component raw moments folded into centroid, elongation and axis angle.
fn component_stats(labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<Candidate> {
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    if max_label == 0 {
        return Vec::new();
    }

    // Raw moments per label: n, sx, sy, sxx, syy, sxy.
    let mut acc = vec![[0f64; 6]; max_label + 1];
    for (x, y, px) in labels.enumerate_pixels() {
        let l = px.0[0] as usize;
        if l == 0 {
            continue;
        }
        let (xf, yf) = (x as f64, y as f64);
        let a = &mut acc[l];
        a[0] += 1.0;
        a[1] += xf;
        a[2] += yf;
        a[3] += xf * xf;
        a[4] += yf * yf;
        a[5] += xf * yf;
    }

    let mut out = Vec::new();
    for (label, a) in acc.iter().enumerate().skip(1) {
        let n = a[0];
        if n < 1.0 {
            continue;
        }
        let (cx, cy) = (a[1] / n, a[2] / n);
        let mu20 = a[3] / n - cx * cx;
        let mu02 = a[4] / n - cy * cy;
        let mu11 = a[5] / n - cx * cy;
        let common = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
        let lam1 = (mu20 + mu02) / 2.0 + common;
        let lam2 = (mu20 + mu02) / 2.0 - common;
        if lam2 <= 1e-9 {
            // Degenerate (line-like) component, nothing to crop from.
            continue;
        }
        out.push(Candidate {
            label: label as u32,
            area: n,
            cx,
            cy,
            elongation: (lam1 / lam2).sqrt(),
            theta: 0.5 * (2.0 * mu11).atan2(mu20 - mu02),
        });
    }
    out
}

/// Monotone in elongation margin and in the gray-level contrast between the
/// candidate and the background.
fn localization_confidence(
    artifacts: &PreprocArtifacts,
    labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>,
    candidate: &Candidate,
    conf: &conf::Roi,
) -> f32 {
    let mut fg_sum = 0f64;
    let mut fg_n = 0f64;
    let mut bg_sum = 0f64;
    let mut bg_n = 0f64;
    for (x, y, px) in labels.enumerate_pixels() {
        let g = artifacts.gray.get_pixel(x, y).0[0] as f64;
        if px.0[0] == candidate.label {
            fg_sum += g;
            fg_n += 1.0;
        } else if px.0[0] == 0 {
            bg_sum += g;
            bg_n += 1.0;
        }
    }
    if fg_n < 1.0 || bg_n < 1.0 {
        return 0.0;
    }
    let contrast = ((bg_sum / bg_n - fg_sum / fg_n) / 96.0).clamp(0.0, 1.0);
    let min_e = conf.min_elongation as f64;
    let elong = ((candidate.elongation - min_e) / min_e).clamp(0.0, 1.0);
    ((elong * contrast) as f32).sqrt()
}

/// Tight bounding box of the non-zero mask pixels.
fn mask_bbox(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (mut x0, mut y0) = (u32::MAX, u32::MAX);
    let (mut x1, mut y1) = (0u32, 0u32);
    for (x, y, px) in mask.enumerate_pixels() {
        if px.0[0] > 0 {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }
    if x0 == u32::MAX {
        None
    } else {
        Some((x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::vision::preprocess;
    use image::Rgb;

    fn roi_conf() -> conf::Roi {
        conf::Roi {
            saturation_min: 0.20,
            value_max: 0.85,
            lead_thickness: 3,
            min_elongation: 2.0,
            min_area_frac: 0.005,
            max_area_frac: 0.40,
            min_confidence: 0.2,
        }
    }

    fn pre_conf() -> conf::Preprocess {
        conf::Preprocess {
            work_width: 320,
            white_percentile: 0.99,
            denoise_radius: 1,
        }
    }

    const BODY: Rgb<u8> = Rgb([205, 170, 130]);
    const BG: Rgb<u8> = Rgb([245, 245, 245]);

    fn draw_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn horizontal_body_test() {
        let mut img = RgbImage::from_pixel(320, 240, BG);
        draw_rect(&mut img, 80, 100, 240, 140, BODY);
        let artifacts = preprocess::preprocess(&img, &pre_conf()).unwrap();
        let roi = detect(&artifacts, &roi_conf()).unwrap();
        // Lead removal erodes the outline a little; the crop must still be
        // an elongated horizontal body.
        assert!(roi.width > 140 && roi.width <= 162, "width {}", roi.width);
        assert!(roi.height > 28 && roi.height <= 42, "height {}", roi.height);
        assert!(roi.angle.abs() < 0.1 || (roi.angle.abs() - std::f32::consts::PI).abs() < 0.1);
        assert!(roi.confidence >= 0.2);
    }

    #[test]
    fn vertical_body_is_rotated_horizontal() {
        let mut img = RgbImage::from_pixel(320, 240, BG);
        draw_rect(&mut img, 140, 40, 180, 200, BODY);
        let artifacts = preprocess::preprocess(&img, &pre_conf()).unwrap();
        let roi = detect(&artifacts, &roi_conf()).unwrap();
        assert!(roi.width > roi.height, "crop not axis-aligned");
        assert!(roi.width > 140, "width {}", roi.width);
    }

    #[test]
    fn all_white_fails() {
        let img = RgbImage::from_pixel(320, 240, BG);
        let artifacts = preprocess::preprocess(&img, &pre_conf()).unwrap();
        assert!(matches!(
            detect(&artifacts, &roi_conf()),
            Err(ScanError::RoiNotFound)
        ));
    }

    #[test]
    fn squat_blob_fails() {
        // A square blob has elongation 1 and must be rejected.
        let mut img = RgbImage::from_pixel(320, 240, BG);
        draw_rect(&mut img, 120, 80, 200, 160, BODY);
        let artifacts = preprocess::preprocess(&img, &pre_conf()).unwrap();
        assert!(matches!(
            detect(&artifacts, &roi_conf()),
            Err(ScanError::RoiNotFound)
        ));
    }

    #[test]
    fn thin_leads_are_ignored() {
        let mut img = RgbImage::from_pixel(320, 240, BG);
        draw_rect(&mut img, 80, 100, 240, 140, BODY);
        // 2-px leads sticking out of both ends.
        draw_rect(&mut img, 10, 119, 80, 121, Rgb([120, 120, 120]));
        draw_rect(&mut img, 240, 119, 310, 121, Rgb([120, 120, 120]));
        let artifacts = preprocess::preprocess(&img, &pre_conf()).unwrap();
        let roi = detect(&artifacts, &roi_conf()).unwrap();
        assert!(roi.width <= 162, "leads kept: width {}", roi.width);
    }
}
