//! Outcome sinks.
//!
//! Exactly one of these is invoked per trigger: `export` for a reading,
//! `handle` for a failure code. Debug persistence goes through a background
//! writer so enabling it never eats into the run's deadline budget.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use image::{GrayImage, RgbImage};

use crate::module::device::display::Panel;
use crate::module::error::ScanError;
use crate::module::pilot::RunArtifacts;
use crate::module::util::path;
use crate::module::vision::resolve::Reading;

/// An intermediate image handed to the debug writer.
#[derive(Debug, Clone)]
pub enum DebugArtifact {
    Rgb(RgbImage),
    Gray(GrayImage),
}

struct DebugItem {
    ts: String,
    tag: String,
    artifact: DebugArtifact,
}

/// Fire-and-forget artifact writer.
///
/// `save` only enqueues; a dedicated thread does the disk writes. Writer
/// failures are logged with the `DebugPersistence` code and never propagate
/// to the run that produced the artifact.
pub struct DebugSink {
    tx: Sender<DebugItem>,
    handle: Option<JoinHandle<()>>,
}

impl DebugSink {
    /// Start the writer thread targeting the given directory.
    pub fn spawn(dir: &str) -> Self {
        let (tx, rx) = mpsc::channel::<DebugItem>();
        let dir = dir.to_string();
        let handle = thread::spawn(move || {
            for item in rx {
                let file = path::join(&[&dir, &format!("{}_{}.jpg", item.ts, item.tag)]);
                let res = match item.artifact {
                    DebugArtifact::Rgb(img) => img.save(&file),
                    DebugArtifact::Gray(img) => img.save(&file),
                };
                if let Err(e) = res {
                    let err = ScanError::DebugPersistence(e.to_string());
                    log::warn!("[{}] {}", err.code(), err);
                }
            }
        });
        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Enqueue one artifact. Never blocks, never fails the caller.
    pub fn save(&self, ts: &str, tag: &str, artifact: DebugArtifact) {
        let item = DebugItem {
            ts: ts.to_string(),
            tag: tag.to_string(),
            artifact,
        };
        if self.tx.send(item).is_err() {
            let err = ScanError::DebugPersistence("writer thread gone".to_string());
            log::warn!("[{}] {}", err.code(), err);
        }
    }

    /// Flush pending writes and stop the writer.
    pub fn close(mut self) {
        drop(std::mem::replace(&mut self.tx, mpsc::channel().0));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Result sink: log the reading, render it, persist the annotated input.
///
pub fn export(
    reading: &Reading,
    panel: Option<&mut dyn Panel>,
    debug: Option<&DebugSink>,
    artifacts: &RunArtifacts,
    ts: &str,
) {
    log::info!(
        "reading: {} ohm {} (confidence {:.2})",
        reading.ohms,
        reading.tolerance,
        reading.confidence
    );
    if let Some(panel) = panel {
        panel.print(&format_ohms(reading.ohms));
    }
    if let Some(sink) = debug {
        if let Some(input) = &artifacts.input {
            sink.save(ts, "result", DebugArtifact::Rgb(input.clone()));
        }
    }
}

/// Error sink: log the failure, render its code, persist the failing input
/// alongside the most recent successful intermediate artifact.
///
pub fn handle(
    err: &ScanError,
    panel: Option<&mut dyn Panel>,
    debug: Option<&DebugSink>,
    artifacts: &RunArtifacts,
    ts: &str,
) {
    log::warn!("scan failed [{}]: {}", err.code(), err);
    if let Some(panel) = panel {
        panel.print(err.code());
    }
    if let Some(sink) = debug {
        if let Some(input) = &artifacts.input {
            sink.save(ts, "fail", DebugArtifact::Rgb(input.clone()));
        }
        if let Some((tag, artifact)) = artifacts.latest() {
            sink.save(ts, tag, artifact);
        }
    }
}

/// Format a resistance so it fits 4 display characters plus decimal points.
///
pub fn format_ohms(ohms: f64) -> String {
    let (x, suffix) = if ohms >= 1e6 {
        (ohms / 1e6, "M")
    } else if ohms >= 1e3 {
        (ohms / 1e3, "k")
    } else {
        (ohms, "")
    };
    let digits = if x < 10.0 {
        format!("{:.2}", x)
    } else if x < 100.0 {
        format!("{:.1}", x)
    } else {
        format!("{:.0}", x)
    };
    format!("{}{}", digits, suffix)
}
