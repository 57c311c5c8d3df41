//! 4-character 14-segment display.
//!

use rppal::i2c::I2c;

/// Rendering surface for readings and error codes.
///
pub trait Panel {
    fn print(&mut self, msg: &str);
    fn clear(&mut self);
}

// HT16K33 command bytes.
const CMD_OSCILLATOR_ON: u8 = 0x21;
const CMD_DISPLAY_ON: u8 = 0x81;
const CMD_BRIGHTNESS: u8 = 0xE0;

// Decimal point bit, OR-ed onto the preceding glyph.
const DP: u16 = 0x4000;

/// HT16K33-driven 4-character alphanumeric display.
pub struct Seg14 {
    i2c: I2c,
}

impl Seg14 {
    /// Open the I2C bus and initialize the controller.
    ///
    /// # Arguments
    ///
    /// * `addr` - I2C address of the HT16K33 (usually 0x70).
    /// * `brightness` - Duty setting, 0-15.
    ///
    pub fn new(addr: u16, brightness: u8) -> Self {
        let mut i2c = I2c::new().unwrap();
        i2c.set_slave_address(addr).unwrap();
        i2c.write(&[CMD_OSCILLATOR_ON]).unwrap();
        i2c.write(&[CMD_DISPLAY_ON]).unwrap();
        i2c.write(&[CMD_BRIGHTNESS | brightness.min(15)]).unwrap();
        let mut display = Self { i2c };
        display.clear();
        display
    }

    fn write_frame(&mut self, frame: [u16; 4]) {
        let mut buf = [0u8; 9];
        for (i, glyph) in frame.iter().enumerate() {
            buf[1 + i * 2] = (glyph & 0xFF) as u8;
            buf[2 + i * 2] = (glyph >> 8) as u8;
        }
        if let Err(e) = self.i2c.write(&buf) {
            log::warn!("display write failed: {}", e);
        }
    }
}

impl Panel for Seg14 {
    /// Render up to 4 characters; a '.' lights the decimal point of the
    /// character before it. Longer messages are truncated.
    fn print(&mut self, msg: &str) {
        self.write_frame(frame(msg));
    }

    fn clear(&mut self) {
        self.write_frame([0; 4]);
    }
}

/// Map a message to the 4 glyphs of one display frame.
fn frame(msg: &str) -> [u16; 4] {
    let mut glyphs: Vec<u16> = Vec::with_capacity(4);
    for c in msg.chars() {
        if c == '.' {
            match glyphs.last_mut() {
                Some(last) => *last |= DP,
                None => glyphs.push(DP),
            }
        } else {
            glyphs.push(glyph(c));
        }
    }
    let mut out = [0u16; 4];
    for (slot, g) in out.iter_mut().zip(glyphs) {
        *slot = g;
    }
    out
}

/// 14-segment glyphs for the character set the sinks emit.
fn glyph(c: char) -> u16 {
    match c {
        '0' => 0x003F,
        '1' => 0x0006,
        '2' => 0x00DB,
        '3' => 0x00CF,
        '4' => 0x00E6,
        '5' => 0x00ED,
        '6' => 0x00FD,
        '7' => 0x0007,
        '8' => 0x00FF,
        '9' => 0x00EF,
        'E' => 0x0079,
        'r' => 0x0050,
        'k' => 0x2470,
        'M' => 0x0536,
        '-' => 0x00C0,
        _ => 0x0000,
    }
}
