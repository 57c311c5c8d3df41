//! Provide Loop for Scanning.
//!

use std::thread::{self, JoinHandle};

use crate::module::device::display::Panel;
use crate::module::device::Devices;
use crate::module::pilot::Orchestrator;
use crate::module::sink::{self, DebugSink};
use crate::module::util::init::Property;
use crate::module::vision::camera::V4l2Camera;
use crate::module::vision::color::ColorTable;

/// Start scan thread
///
/// Owns the devices and runs one pipeline pass per button press. Only one
/// run is ever in flight; presses while busy are absorbed by the button
/// device's press-and-release cycle.
pub fn run(property: Property) -> JoinHandle<()> {
    thread::spawn(move || {
        // init devices
        let mut devices = Devices::new(&property.conf);
        // color table and debug side channel, read-only for the process
        let table = ColorTable::new();
        let debug = match property.conf.runtime.debug {
            true => Some(DebugSink::spawn(&property.path.dir.debug)),
            false => None,
        };
        // init camera
        let mut camera = match V4l2Camera::new(&property.conf.camera) {
            Ok(camera) => camera,
            Err(e) => {
                log::error!("camera init failed: {}", e);
                if let Some(panel) = devices.panel.as_mut() {
                    panel.print(e.code());
                }
                return;
            }
        };

        let orchestrator = Orchestrator::new(&property.conf, &table, debug.as_ref());
        log::info!("scan loop ready");

        loop {
            devices.button.wait_for_trigger();
            log::info!("trigger received");
            if let Some(panel) = devices.panel.as_mut() {
                panel.print("----");
            }

            devices.light.on();
            let report = orchestrator.run_once(&mut camera);
            devices.light.off();

            let panel = devices.panel.as_mut().map(|p| p as &mut dyn Panel);
            match &report.outcome {
                Ok(reading) => {
                    sink::export(reading, panel, debug.as_ref(), &report.artifacts, &report.ts)
                }
                Err(err) => {
                    sink::handle(err, panel, debug.as_ref(), &report.artifacts, &report.ts)
                }
            }
        }
    })
}
