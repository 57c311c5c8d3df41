//! Image analysis pipeline.
//!
//! Stages are pure functions over explicit immutable inputs: capture hands a
//! frame to preprocessing, whose artifacts flow through ROI localization,
//! band segmentation, color classification and value resolution. Only the
//! orchestrator in `module::pilot` sequences them.

pub mod bands; // Band segmentation
pub mod camera; // V4L2 still capture
pub mod classify; // Per-band color classification
pub mod color; // Resistor color code table
pub mod preprocess; // Image normalization
pub mod resolve; // Value resolution
pub mod roi; // Resistor localization
