//! Illumination control.
//!

use rppal::gpio::Gpio;

/// LED ring lit around the capture window for fixed illumination.
pub struct Light {
    pin: rppal::gpio::OutputPin,
}

impl Light {
    /// Creates a new Light instance.
    ///
    /// # Arguments
    ///
    /// * `pin` - GPIO pin number for the LEDs (BCM).
    ///
    pub fn new(pin: u8) -> Self {
        let gpio = Gpio::new().unwrap();
        Self {
            pin: gpio.get(pin).unwrap().into_output_low(),
        }
    }

    /// Turn the LEDs on.
    pub fn on(&mut self) {
        self.pin.set_high();
    }

    /// Turn the LEDs off.
    pub fn off(&mut self) {
        self.pin.set_low();
    }
}
