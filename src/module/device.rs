//! Provide Device Control.
//!
pub mod button;
pub mod display;
pub mod light;

use crate::module::util::conf::Config;

/// Device aggregator
///
pub struct Devices {
    pub button: button::Button,
    pub light: light::Light,
    pub panel: Option<display::Seg14>,
}

/// Devices' methods
///
impl Devices {
    /// Construct all hardware devices from the pin/display configuration.
    ///
    /// Runs at startup only; failures here panic before the scan loop
    /// accepts any trigger.
    pub fn new(conf: &Config) -> Self {
        let panel = match conf.display.enabled {
            true => Some(display::Seg14::new(
                conf.display.i2c_addr,
                conf.display.brightness,
            )),
            false => None,
        };
        Self {
            button: button::Button::new(conf.pin.button_pin),
            light: light::Light::new(conf.pin.light_pin),
            panel,
        }
    }
}
