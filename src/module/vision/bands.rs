//! Band segmentation.
//!
//! The ROI crop is already axis-horizontal. A 1-D profile of color distance
//! to the body base color is scanned for the four strongest peaks; their
//! half-height extents become the band regions. The resistor's physical
//! reading direction is not resolved here, that is the value resolver's job.

use image::imageops::crop_imm;
use image::RgbImage;
use ndarray::{Array1, Array2, Axis};

use crate::module::error::ScanError;
use crate::module::util::conf;
use crate::module::vision::color;
use crate::module::vision::roi::Roi;

/// One of the four ordered band regions.
#[derive(Debug, Clone)]
pub struct BandRegion {
    /// Position index along the canonical axis, 0..3.
    pub index: usize,
    /// Column extent `[start, end)` within the ROI crop.
    pub start: u32,
    pub end: u32,
    /// Crop of the band, full ROI height.
    pub crop: RgbImage,
}

/// Partition the body into exactly four ordered band regions.
///
/// Returns the regions left-to-right plus a separation score in [0, 1]
/// (worst adjacent band spacing against the ideal quarter-body spacing).
pub fn segment(roi: &Roi, conf: &conf::Segmentation) -> Result<(Vec<BandRegion>, f32), ScanError> {
    let crop = &roi.crop;
    let (w, h) = crop.dimensions();
    let margin = (w as f32 * conf.end_margin) as u32;
    if w <= 2 * margin + 4 * conf.min_band_width {
        return Err(ScanError::Segmentation(format!(
            "body too short for four bands: {} usable columns",
            w.saturating_sub(2 * margin)
        )));
    }

    let profile = color_profile(crop, margin);
    let smooth = moving_average(&profile, conf.smooth_window.max(1));

    let min_dist = (conf.min_band_width as usize).max(w as usize / 20);
    let peaks = find_peaks(&smooth, min_dist);
    if peaks.len() < 4 {
        return Err(ScanError::Segmentation(format!(
            "found {} band peaks",
            peaks.len()
        )));
    }

    // Four strongest peaks, in column order.
    let mut centers: Vec<usize> = peaks.into_iter().take(4).collect();
    centers.sort_unstable();

    let len = smooth.len();
    let mut regions = Vec::with_capacity(4);
    for (i, &c) in centers.iter().enumerate() {
        // Boundaries never cross the midpoint towards a neighboring band, so
        // regions stay disjoint whatever the half-height walk finds.
        let lo_bound = if i > 0 { (centers[i - 1] + c) / 2 } else { 0 };
        let hi_bound = if i < 3 { (c + centers[i + 1]) / 2 } else { len };
        let half = 0.5 * smooth[c];
        let mut left = c;
        while left > lo_bound && smooth[left - 1] > half {
            left -= 1;
        }
        let mut right = c + 1;
        while right < hi_bound && smooth[right] > half {
            right += 1;
        }

        let width = (right - left) as u32;
        if width < conf.min_band_width {
            return Err(ScanError::Segmentation(format!(
                "band {} narrower than minimum: {} px",
                i, width
            )));
        }

        let start = left as u32 + margin;
        let end = right as u32 + margin;
        log::debug!("band {}: cols {}..{}", i, start, end);
        regions.push(BandRegion {
            index: i,
            start,
            end,
            crop: crop_imm(crop, start, 0, end - start, h).to_image(),
        });
    }

    let ideal = len as f32 / 4.0;
    let min_gap = centers
        .windows(2)
        .map(|p| (p[1] - p[0]) as f32)
        .fold(f32::INFINITY, f32::min);
    let separation = (min_gap / ideal).clamp(0.0, 1.0);

    Ok((regions, separation))
}

/// Column profile: Euclidean Lab distance of each column's mean color to the
/// per-channel median over all columns (the body base color).
fn color_profile(crop: &RgbImage, margin: u32) -> Array1<f32> {
    let (w, h) = crop.dimensions();
    let cols = (w - 2 * margin) as usize;
    let mut col_means = Array2::<f32>::zeros((cols, 3));
    for (i, col) in (margin..w - margin).enumerate() {
        let mut sum = [0f32; 3];
        for row in 0..h {
            let lab = color::lab_of(*crop.get_pixel(col, row));
            sum[0] += lab.l;
            sum[1] += lab.a;
            sum[2] += lab.b;
        }
        for c in 0..3 {
            col_means[[i, c]] = sum[c] / h as f32;
        }
    }

    let mut base = [0f32; 3];
    for c in 0..3 {
        let mut channel: Vec<f32> = col_means
            .index_axis(Axis(1), c)
            .iter()
            .copied()
            .collect();
        channel.sort_by(|a, b| a.partial_cmp(b).unwrap());
        base[c] = channel[channel.len() / 2];
    }

    Array1::from_iter((0..cols).map(|i| {
        ((col_means[[i, 0]] - base[0]).powi(2)
            + (col_means[[i, 1]] - base[1]).powi(2)
            + (col_means[[i, 2]] - base[2]).powi(2))
        .sqrt()
    }))
}

/// Moving average with a window truncated at the edges.
fn moving_average(profile: &Array1<f32>, window: usize) -> Array1<f32> {
    let len = profile.len();
    let half = window / 2;
    Array1::from_iter((0..len).map(|i| {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(len);
        profile.slice(ndarray::s![lo..hi]).mean().unwrap_or(0.0)
    }))
}

/// Local maxima with a minimum mutual separation, strongest first.
fn find_peaks(profile: &Array1<f32>, min_dist: usize) -> Vec<usize> {
    let len = profile.len();
    let mut candidates: Vec<usize> = (1..len.saturating_sub(1))
        .filter(|&i| profile[i] >= profile[i - 1] && profile[i] > profile[i + 1])
        .collect();
    candidates.sort_by(|&a, &b| profile[b].partial_cmp(&profile[a]).unwrap());

    let mut accepted: Vec<usize> = Vec::new();
    for c in candidates {
        if accepted
            .iter()
            .all(|&a| a.abs_diff(c) >= min_dist)
        {
            accepted.push(c);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb};

    const BODY: Rgb<u8> = Rgb([205, 170, 130]);

    fn seg_conf() -> conf::Segmentation {
        conf::Segmentation {
            end_margin: 0.07,
            smooth_window: 9,
            min_band_width: 3,
        }
    }

    fn paint_band(img: &mut RgbImage, x0: u32, x1: u32, color: Rgb<u8>) {
        for y in 0..img.height() {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
    }

    fn roi_of(crop: RgbImage) -> Roi {
        let (w, h) = crop.dimensions();
        Roi {
            x: 0,
            y: 0,
            width: w,
            height: h,
            crop,
            angle: 0.0,
            confidence: 0.9,
            mask: GrayImage::new(w, h),
        }
    }

    /// Body with bands painted at the given column ranges.
    fn body_with_bands(bands: &[(u32, u32, Rgb<u8>)]) -> RgbImage {
        let mut img = RgbImage::from_pixel(160, 36, BODY);
        for &(x0, x1, color) in bands {
            paint_band(&mut img, x0, x1, color);
        }
        img
    }

    #[test]
    fn four_bands_found_in_order() {
        let img = body_with_bands(&[
            (20, 30, Rgb([124, 88, 24])),  // yellow
            (55, 65, Rgb([51, 42, 68])),   // violet
            (90, 100, Rgb([149, 60, 31])), // orange
            (125, 135, Rgb([120, 64, 39])), // gold
        ]);
        let (regions, separation) = segment(&roi_of(img), &seg_conf()).unwrap();
        assert_eq!(regions.len(), 4);
        let expected_centers = [25u32, 60, 95, 130];
        for (region, expected) in regions.iter().zip(expected_centers) {
            let center = (region.start + region.end) / 2;
            assert!(
                center.abs_diff(expected) <= 4,
                "band {} center {} vs {}",
                region.index,
                center,
                expected
            );
            assert!(region.end > region.start);
        }
        // Strictly ordered, non-overlapping.
        for pair in regions.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert!(separation > 0.5);
    }

    #[test]
    fn three_bands_fail() {
        let img = body_with_bands(&[
            (25, 35, Rgb([124, 88, 24])),
            (70, 80, Rgb([51, 42, 68])),
            (115, 125, Rgb([149, 60, 31])),
        ]);
        let res = segment(&roi_of(img), &seg_conf());
        assert!(matches!(res, Err(ScanError::Segmentation(_))));
    }

    #[test]
    fn narrow_band_fails() {
        // Bands of ~10 px cannot satisfy a 14 px minimum.
        let img = body_with_bands(&[
            (20, 30, Rgb([124, 88, 24])),
            (55, 65, Rgb([51, 42, 68])),
            (90, 100, Rgb([149, 60, 31])),
            (125, 135, Rgb([120, 64, 39])),
        ]);
        let conf = conf::Segmentation {
            min_band_width: 14,
            ..seg_conf()
        };
        let res = segment(&roi_of(img), &conf);
        assert!(matches!(res, Err(ScanError::Segmentation(_))));
    }

    #[test]
    fn short_body_fails() {
        let img = RgbImage::from_pixel(20, 10, BODY);
        let res = segment(&roi_of(img), &seg_conf());
        assert!(matches!(res, Err(ScanError::Segmentation(_))));
    }
}
