//! Resistor value resolution.
//!
//! Turns four ordered band labels into a resistance and tolerance using the
//! standard 4-band code. The segmenter is direction-agnostic, so both
//! traversal directions are evaluated here and the one that reads as a valid
//! code wins.

use crate::module::error::ScanError;
use crate::module::vision::classify::BandLabel;

/// Terminal artifact of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Resistance in ohms.
    pub ohms: f64,
    /// Tolerance, e.g. "±5%".
    pub tolerance: &'static str,
    /// Overall confidence: the weakest link across ROI localization, band
    /// separation and the four classifications.
    pub confidence: f32,
}

/// Resolve four ordered labels into a reading.
///
/// A direction qualifies when the first two positions are significant
/// digits, the third is a valid multiplier, the fourth is a valid tolerance
/// color and the first is not one. If both directions qualify, the one whose
/// tolerance-position band was classified with more confidence wins.
pub fn resolve(
    labels: &[BandLabel],
    roi_confidence: f32,
    separation: f32,
) -> Result<Reading, ScanError> {
    if labels.len() != 4 {
        return Err(ScanError::Resolve);
    }

    let forward: Vec<BandLabel> = labels.to_vec();
    let mut backward = forward.clone();
    backward.reverse();

    let canonical = [forward, backward]
        .into_iter()
        .filter(|seq| qualifies(seq))
        .max_by(|a, b| {
            a[3].confidence
                .partial_cmp(&b[3].confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or(ScanError::Resolve)?;

    let d1 = canonical[0].color.digit().expect("qualified digit") as f64;
    let d2 = canonical[1].color.digit().expect("qualified digit") as f64;
    let multiplier = canonical[2].color.multiplier().expect("qualified multiplier");
    let ohms = (10.0 * d1 + d2) * multiplier;
    if ohms <= 0.0 {
        return Err(ScanError::Resolve);
    }
    let tolerance = canonical[3].color.tolerance().expect("qualified tolerance");

    let band_min = canonical
        .iter()
        .map(|l| l.confidence)
        .fold(f32::INFINITY, f32::min);
    let confidence = roi_confidence.min(separation).min(band_min).clamp(0.0, 1.0);

    Ok(Reading {
        ohms,
        tolerance,
        confidence,
    })
}

fn qualifies(seq: &[BandLabel]) -> bool {
    seq[0].color.digit().is_some()
        && !seq[0].color.is_tolerance()
        && seq[1].color.digit().is_some()
        && seq[2].color.multiplier().is_some()
        && seq[3].color.is_tolerance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::vision::color::BandColor;

    fn labels(colors: [BandColor; 4]) -> Vec<BandLabel> {
        colors
            .iter()
            .map(|c| BandLabel {
                color: *c,
                confidence: 0.9,
            })
            .collect()
    }

    fn resolve_colors(colors: [BandColor; 4]) -> Result<Reading, ScanError> {
        resolve(&labels(colors), 0.9, 0.9)
    }

    #[test]
    fn standard_codes_test() {
        use BandColor::*;
        let reading = resolve_colors([Yellow, Violet, Orange, Gold]).unwrap();
        assert!((reading.ohms - 47_000.0).abs() < 1e-6);
        assert_eq!(reading.tolerance, "±5%");

        let reading = resolve_colors([Brown, Black, Red, Gold]).unwrap();
        assert!((reading.ohms - 1_000.0).abs() < 1e-6);
        assert_eq!(reading.tolerance, "±5%");

        let reading = resolve_colors([Red, Red, Brown, Gold]).unwrap();
        assert!((reading.ohms - 220.0).abs() < 1e-6);
        assert_eq!(reading.tolerance, "±5%");

        let reading = resolve_colors([Blue, Gray, Black, Silver]).unwrap();
        assert!((reading.ohms - 68.0).abs() < 1e-6);
        assert_eq!(reading.tolerance, "±10%");
    }

    #[test]
    fn fractional_multipliers_test() {
        use BandColor::*;
        let reading = resolve_colors([Red, Red, Gold, Gold]).unwrap();
        assert!((reading.ohms - 2.2).abs() < 1e-9);
        let reading = resolve_colors([Red, Red, Silver, Gold]).unwrap();
        assert!((reading.ohms - 0.22).abs() < 1e-9);
    }

    #[test]
    fn reversed_scan_gives_identical_reading() {
        use BandColor::*;
        let forward = resolve_colors([Yellow, Violet, Orange, Gold]).unwrap();
        let reversed = resolve_colors([Gold, Orange, Violet, Yellow]).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn invalid_codes_fail() {
        use BandColor::*;
        // No tolerance color at either end.
        assert_eq!(
            resolve_colors([Red, Violet, Orange, Brown]),
            Err(ScanError::Resolve)
        );
        // Tolerance color in a digit position.
        assert_eq!(
            resolve_colors([Gold, Gold, Orange, Gold]),
            Err(ScanError::Resolve)
        );
    }

    #[test]
    fn zero_ohms_fails() {
        use BandColor::*;
        assert_eq!(
            resolve_colors([Black, Black, Black, Gold]),
            Err(ScanError::Resolve)
        );
    }

    #[test]
    fn wrong_arity_fails() {
        use BandColor::*;
        let three = labels([Red, Red, Brown, Gold])[..3].to_vec();
        assert_eq!(resolve(&three, 0.9, 0.9), Err(ScanError::Resolve));
    }

    #[test]
    fn confidence_is_weakest_link() {
        use BandColor::*;
        let mut lbls = labels([Yellow, Violet, Orange, Gold]);
        lbls[1].confidence = 0.4;
        let reading = resolve(&lbls, 0.8, 0.7).unwrap();
        assert!((reading.confidence - 0.4).abs() < 1e-6);
    }
}
