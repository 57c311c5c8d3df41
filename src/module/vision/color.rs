//! Resistor color code table.
//!
//! Maps each canonical band color to its reference chromaticity and to its
//! digit / multiplier / tolerance semantics. The reference colors are
//! calibrated sRGB values measured from golden capture data; their CIE Lab
//! forms are computed once at startup and shared read-only for the lifetime
//! of the process.

use image::Rgb;
use palette::{Hsv, IntoColor, Lab, Srgb};

/// Canonical band colors.
///
/// `None` means an absent tolerance band (a bare body end); it carries
/// semantics but no reference chromaticity, so the classifier never emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandColor {
    Black,
    Brown,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Violet,
    Gray,
    White,
    Gold,
    Silver,
    None,
}

/// Reference sRGB chromaticities, measured from golden capture data under
/// the fixed illumination rig.
const REFERENCE_RGB: [(BandColor, [u8; 3]); 12] = [
    (BandColor::Black, [49, 31, 23]),
    (BandColor::Brown, [107, 42, 33]),
    (BandColor::Red, [122, 29, 29]),
    (BandColor::Orange, [149, 60, 31]),
    (BandColor::Yellow, [124, 88, 24]),
    (BandColor::Green, [22, 43, 43]),
    (BandColor::Blue, [21, 37, 55]),
    (BandColor::Violet, [51, 42, 68]),
    (BandColor::Gray, [97, 78, 72]),
    (BandColor::White, [130, 103, 91]),
    (BandColor::Gold, [120, 64, 39]),
    (BandColor::Silver, [192, 192, 192]),
];

impl BandColor {
    /// Convert a color name to a band color. Accepts both "gray" and "grey".
    pub fn from_str(s: &str) -> Option<BandColor> {
        match s.trim().to_lowercase().as_str() {
            "black" => Some(BandColor::Black),
            "brown" => Some(BandColor::Brown),
            "red" => Some(BandColor::Red),
            "orange" => Some(BandColor::Orange),
            "yellow" => Some(BandColor::Yellow),
            "green" => Some(BandColor::Green),
            "blue" => Some(BandColor::Blue),
            "violet" => Some(BandColor::Violet),
            "gray" | "grey" => Some(BandColor::Gray),
            "white" => Some(BandColor::White),
            "gold" => Some(BandColor::Gold),
            "silver" => Some(BandColor::Silver),
            "none" => Some(BandColor::None),
            _ => None,
        }
    }

    /// Canonical color name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BandColor::Black => "black",
            BandColor::Brown => "brown",
            BandColor::Red => "red",
            BandColor::Orange => "orange",
            BandColor::Yellow => "yellow",
            BandColor::Green => "green",
            BandColor::Blue => "blue",
            BandColor::Violet => "violet",
            BandColor::Gray => "gray",
            BandColor::White => "white",
            BandColor::Gold => "gold",
            BandColor::Silver => "silver",
            BandColor::None => "none",
        }
    }

    /// Significant digit value, when this color is a valid digit band.
    pub fn digit(&self) -> Option<u32> {
        match self {
            BandColor::Black => Some(0),
            BandColor::Brown => Some(1),
            BandColor::Red => Some(2),
            BandColor::Orange => Some(3),
            BandColor::Yellow => Some(4),
            BandColor::Green => Some(5),
            BandColor::Blue => Some(6),
            BandColor::Violet => Some(7),
            BandColor::Gray => Some(8),
            BandColor::White => Some(9),
            _ => None,
        }
    }

    /// Multiplier value, when this color is a valid multiplier band.
    pub fn multiplier(&self) -> Option<f64> {
        match self {
            BandColor::Gold => Some(0.1),
            BandColor::Silver => Some(0.01),
            other => other.digit().map(|d| 10f64.powi(d as i32)),
        }
    }

    /// Tolerance string, when this color is a valid tolerance band.
    /// An absent band means ±20% by convention.
    pub fn tolerance(&self) -> Option<&'static str> {
        match self {
            BandColor::Gold => Some("±5%"),
            BandColor::Silver => Some("±10%"),
            BandColor::None => Some("±20%"),
            _ => None,
        }
    }

    /// Whether this color is a valid tolerance band.
    pub fn is_tolerance(&self) -> bool {
        self.tolerance().is_some()
    }
}

/// CIE Lab of an 8-bit sRGB pixel.
pub fn lab_of(px: Rgb<u8>) -> Lab {
    let srgb = Srgb::new(
        px.0[0] as f32 / 255.0,
        px.0[1] as f32 / 255.0,
        px.0[2] as f32 / 255.0,
    );
    srgb.into_color()
}

/// HSV of an 8-bit sRGB pixel. Hue in degrees [0, 360), s and v in [0, 1].
pub fn hsv_of(px: Rgb<u8>) -> Hsv {
    let srgb = Srgb::new(
        px.0[0] as f32 / 255.0,
        px.0[1] as f32 / 255.0,
        px.0[2] as f32 / 255.0,
    );
    srgb.into_color()
}

/// The color table: reference Lab per classifiable band color.
///
pub struct ColorTable {
    entries: Vec<(BandColor, Lab)>,
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorTable {
    /// Build the table, converting the sRGB references to Lab once.
    ///
    pub fn new() -> Self {
        let entries = REFERENCE_RGB
            .iter()
            .map(|(color, rgb)| (*color, lab_of(Rgb(*rgb))))
            .collect();
        Self { entries }
    }

    /// Reference entries, one per classifiable color.
    pub fn entries(&self) -> &[(BandColor, Lab)] {
        &self.entries
    }
}
