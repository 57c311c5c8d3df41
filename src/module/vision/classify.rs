//! Per-band color classification.
//!
//! Each band region gets a robust central color estimate (median, so glare
//! and shadow outliers drop out) which is matched against the color table in
//! Lab space. Confidence is the margin between the nearest and second
//! nearest reference: near-ties keep the label but collapse the confidence
//! instead of being broken arbitrarily.

use palette::Lab;

use crate::module::error::ScanError;
use crate::module::util::conf;
use crate::module::vision::bands::BandRegion;
use crate::module::vision::color::{self, BandColor, ColorTable};

/// A classified band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLabel {
    pub color: BandColor,
    /// Classification confidence in [0, 1].
    pub confidence: f32,
}

/// Classify all band regions, in order.
///
/// Fails with `LowConfidenceColor` when any band's best match falls below
/// the configured threshold.
pub fn classify(
    regions: &[BandRegion],
    table: &ColorTable,
    conf: &conf::Classification,
) -> Result<Vec<BandLabel>, ScanError> {
    let mut labels = Vec::with_capacity(regions.len());
    for region in regions {
        let label = classify_region(region, table);
        log::debug!(
            "band {}: {} at {:.3}",
            region.index,
            label.color.as_str(),
            label.confidence
        );
        if label.confidence < conf.min_confidence {
            return Err(ScanError::LowConfidenceColor);
        }
        labels.push(label);
    }
    Ok(labels)
}

/// Nearest-reference match for one region.
fn classify_region(region: &BandRegion, table: &ColorTable) -> BandLabel {
    let estimate = median_lab(region);

    let mut best: Option<(BandColor, f32)> = None;
    let mut second = f32::INFINITY;
    for (color, reference) in table.entries() {
        let d = lab_dist(&estimate, reference);
        match best {
            Some((_, d1)) if d < d1 => {
                second = d1;
                best = Some((*color, d));
            }
            Some(_) => second = second.min(d),
            None => best = Some((*color, d)),
        }
    }

    let (color, d1) = best.expect("color table is never empty");
    let confidence = if second > 0.0 {
        ((second - d1) / second).clamp(0.0, 1.0)
    } else {
        0.0
    };
    BandLabel { color, confidence }
}

/// Per-channel median Lab over the central rows of the band crop.
///
/// The top and bottom 20% of rows carry most of the glare and body-edge
/// shading, so only the central 20-80% contributes.
fn median_lab(region: &BandRegion) -> Lab {
    let (w, h) = region.crop.dimensions();
    let y0 = (h as f32 * 0.2) as u32;
    let y1 = ((h as f32 * 0.8) as u32).max(y0 + 1).min(h);

    let mut l = Vec::with_capacity((w * (y1 - y0)) as usize);
    let mut a = Vec::with_capacity(l.capacity());
    let mut b = Vec::with_capacity(l.capacity());
    for y in y0..y1 {
        for x in 0..w {
            let lab = color::lab_of(*region.crop.get_pixel(x, y));
            l.push(lab.l);
            a.push(lab.a);
            b.push(lab.b);
        }
    }
    Lab::new(median(&mut l), median(&mut a), median(&mut b))
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values[values.len() / 2]
}

fn lab_dist(a: &Lab, b: &Lab) -> f32 {
    ((a.l - b.l).powi(2) + (a.a - b.a).powi(2) + (a.b - b.b).powi(2)).sqrt()
}
