//! Trigger button.
//!

use std::{thread, time};

use rppal::gpio::Gpio;

/// Debounced GPIO push button. One press is one trigger event.
pub struct Button {
    pub switch: rppal::gpio::InputPin,
}

impl Button {
    /// Creates a new Button instance.
    ///
    /// # Arguments
    ///
    /// * `pin` - GPIO pin number for the button (BCM).
    ///
    pub fn new(pin: u8) -> Self {
        let gpio = Gpio::new().unwrap();
        Self {
            switch: gpio.get(pin).unwrap().into_input_pullup(),
        }
    }

    /// Block until one debounced press-and-release cycle.
    ///
    /// A 30 ms recheck filters switch bounce; waiting for the release keeps
    /// a held button from retriggering.
    pub fn wait_for_trigger(&self) {
        loop {
            if self.switch.is_low() {
                thread::sleep(time::Duration::from_millis(30));
                if self.switch.is_low() {
                    while self.switch.is_low() {
                        thread::sleep(time::Duration::from_millis(10));
                    }
                    return;
                }
            }
            thread::sleep(time::Duration::from_millis(10));
        }
    }
}
