//! HD44780 16x2 character LCD driven in 4-bit mode over GPIO.
//! Write-only wiring (RW tied low), so timing is by fixed delays.

use anyhow::{Context, Result, ensure};
use rppal::gpio::{Gpio, Level, OutputPin};
use std::{thread::sleep, time::Duration};

use crate::display::{COLS, CharDisplay, ROWS, display_byte};

// BCM numbering.
const PIN_RS: u8 = 27;
const PIN_E: u8 = 17;
const PINS_DATA: [u8; 4] = [22, 23, 24, 10];

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x06; // increment, no shift
const CMD_DISPLAY_ON: u8 = 0x0C; // cursor and blink off
const CMD_FUNCTION_SET: u8 = 0x28; // 4-bit, 2 lines, 5x8
const CMD_SET_DDRAM: u8 = 0x80;

const ROW_OFFSETS: [u8; ROWS] = [0x00, 0x40];

pub struct Hd44780 {
    rs: OutputPin,
    e: OutputPin,
    data: [OutputPin; 4],
    col: usize,
}

impl Hd44780 {
    pub fn open() -> Result<Self> {
        let gpio = Gpio::new().context("open GPIO for LCD")?;
        let output = |pin: u8| -> Result<OutputPin> {
            Ok(gpio
                .get(pin)
                .with_context(|| format!("claim LCD pin {pin}"))?
                .into_output_low())
        };

        let mut lcd = Self {
            rs: output(PIN_RS)?,
            e: output(PIN_E)?,
            data: [
                output(PINS_DATA[0])?,
                output(PINS_DATA[1])?,
                output(PINS_DATA[2])?,
                output(PINS_DATA[3])?,
            ],
            col: 0,
        };
        lcd.init();
        log::info!("📟 HD44780 {ROWS}x{COLS} ready");
        Ok(lcd)
    }

    fn init(&mut self) {
        sleep(Duration::from_millis(50));
        self.rs.set_low();

        // Force 8-bit mode three times, then switch to 4-bit.
        self.write_nibble(0x03);
        sleep(Duration::from_micros(4500));
        self.write_nibble(0x03);
        sleep(Duration::from_micros(4500));
        self.write_nibble(0x03);
        sleep(Duration::from_micros(150));
        self.write_nibble(0x02);

        self.command(CMD_FUNCTION_SET);
        self.command(CMD_DISPLAY_ON);
        self.command(CMD_CLEAR);
        sleep(Duration::from_millis(2));
        self.command(CMD_ENTRY_MODE);
    }

    fn command(&mut self, byte: u8) {
        self.send(byte, Level::Low);
    }

    fn send(&mut self, byte: u8, rs: Level) {
        self.rs.write(rs);
        self.write_nibble(byte >> 4);
        self.write_nibble(byte & 0x0F);
    }

    fn write_nibble(&mut self, nibble: u8) {
        for (bit, pin) in self.data.iter_mut().enumerate() {
            pin.write(if nibble >> bit & 1 == 1 {
                Level::High
            } else {
                Level::Low
            });
        }
        self.e.set_high();
        sleep(Duration::from_micros(1));
        self.e.set_low();
        sleep(Duration::from_micros(100)); // > 37 µs execution time
    }
}

impl CharDisplay for Hd44780 {
    fn clear(&mut self) -> Result<()> {
        self.command(CMD_CLEAR);
        sleep(Duration::from_millis(2));
        self.col = 0;
        Ok(())
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> Result<()> {
        ensure!(
            row < ROWS && col < COLS,
            "cursor ({row}, {col}) outside {ROWS}x{COLS}"
        );
        self.command(CMD_SET_DDRAM | (ROW_OFFSETS[row] + col as u8));
        self.col = col;
        Ok(())
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        for ch in text.chars() {
            if self.col >= COLS {
                break;
            }
            self.send(display_byte(ch), Level::High);
            self.col += 1;
        }
        Ok(())
    }
}
