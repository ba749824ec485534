//! The line transfer protocol.
//!
//! The COG has no frame memory. Every transfer carries one scan line: a border byte, the line's
//! pixels split into odd and even halves at two bits per pixel, and a scan bitmap that selects
//! which physical row receives them. The pixel halves are sent in different orders and bit
//! arrangements, matching how the source drivers are wired on the glass.

use embedded_hal::{delay::DelayNs as _, digital::OutputPin as _};

use crate::{
    hw::{CogComms as _, Register, HEADER_WRITE},
    log::{debug_assert, trace},
    CogHw, EpdG2,
};

/// Border byte used for all ordinary line transfers.
pub const BORDER_IDLE: u8 = 0x00;

/// Value written to [Register::OutputEnable] to drive the transferred line onto the panel.
const OUTPUT_LINE: u8 = 0x07;

/// Settle time between starting a data transfer and selecting the chip.
const DATA_START_SETTLE_US: u32 = 10;

/// How pixel data is re-encoded for the panel.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Drives each pixel towards the opposite of its image colour (black becomes white and white
    /// becomes black).
    Inverse,
    /// Drives each pixel towards its image colour.
    Normal,
}

/// The content of one line transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource<'a> {
    /// Every pixel byte is sent as this value, without any encoding. `0x00` leaves pixels
    /// undriven, `0xFF` drives them black and `0xAA` white.
    Fixed(u8),
    /// One line of packed 1bpp image data, [crate::panel::PanelProfile::bytes_per_line] long.
    Row(&'a [u8]),
}

/// Encodes the odd pixels (bits 0, 2, 4 and 6) of an image byte into a two bit per pixel byte.
///
/// ```
/// use epd_pervasive::line::{odd_pixels, Stage};
///
/// assert_eq!(odd_pixels(0xFF, Stage::Normal), 0xFF);
/// assert_eq!(odd_pixels(0xFF, Stage::Inverse), 0xAA);
/// ```
pub const fn odd_pixels(byte: u8, stage: Stage) -> u8 {
    let pixels = byte & 0x55;
    match stage {
        Stage::Inverse => 0xAA | (pixels ^ 0x55),
        Stage::Normal => 0xAA | pixels,
    }
}

/// Encodes the even pixels (bits 1, 3, 5 and 7) of an image byte into a two bit per pixel byte.
///
/// After encoding, the four pixel pairs are sent in reverse order.
pub const fn even_pixels(byte: u8, stage: Stage) -> u8 {
    let pixels = byte & 0xAA;
    let pixels = match stage {
        Stage::Inverse => 0xAA | ((pixels ^ 0xAA) >> 1),
        Stage::Normal => 0xAA | (pixels >> 1),
    };
    let p1 = (pixels >> 6) & 0x03;
    let p2 = (pixels >> 4) & 0x03;
    let p3 = (pixels >> 2) & 0x03;
    let p4 = pixels & 0x03;
    p1 | (p2 << 2) | (p3 << 4) | (p4 << 6)
}

/// Returns byte `index` of the scan bitmap that selects `line` on a panel with
/// `lines_per_display` lines.
///
/// Each bitmap byte covers four lines, two bits each, with the last line in the first byte.
/// `None` selects no line at all, which is used for dummy transfers.
pub const fn scan_byte(lines_per_display: u16, line: Option<u16>, index: usize) -> u8 {
    match line {
        Some(line) if line < lines_per_display => {
            let scan_pos = (lines_per_display - line - 1) as usize / 4;
            if index == scan_pos {
                0x03 << (2 * (line & 0x03))
            } else {
                0x00
            }
        }
        _ => 0x00,
    }
}

impl<HW> EpdG2<HW>
where
    HW: CogHw,
{
    /// Transfers one line to the COG and drives it onto the panel.
    ///
    /// `line` selects the physical row; `None` sends a dummy line that addresses no row. Every
    /// byte is followed by a busy handshake, which blocks forever if the COG stops responding.
    pub fn send_line(
        &mut self,
        spi: &mut HW::Spi,
        line: Option<u16>,
        source: LineSource<'_>,
        stage: Stage,
        border: u8,
    ) -> Result<(), HW::Error> {
        trace!("Sending line {:?}", line);
        let bytes_per_line = self.profile.bytes_per_line();
        if let LineSource::Row(row) = source {
            debug_assert!(row.len() >= bytes_per_line, "image row is shorter than a line");
        }
        let lines_per_display = self.profile.lines_per_display;
        let hw = &mut self.hw;

        hw.bus_idle(spi)?;
        hw.select_register(spi, Register::DataStart)?;
        hw.delay().delay_us(DATA_START_SETTLE_US);

        hw.cs().set_low()?;
        hw.put_wait(spi, HEADER_WRITE)?;
        hw.put_wait(spi, border)?;

        for b in (0..bytes_per_line).rev() {
            let byte = match source {
                LineSource::Fixed(value) => value,
                // Bytes missing from a short row are left undriven.
                LineSource::Row(row) => row.get(b).map_or(0x00, |p| odd_pixels(*p, stage)),
            };
            hw.put_wait(spi, byte)?;
        }

        for b in 0..self.profile.bytes_per_scan() {
            hw.put_wait(spi, scan_byte(lines_per_display, line, b))?;
        }

        for b in 0..bytes_per_line {
            let byte = match source {
                LineSource::Fixed(value) => value,
                LineSource::Row(row) => row.get(b).map_or(0x00, |p| even_pixels(*p, stage)),
            };
            hw.put_wait(spi, byte)?;
        }

        hw.cs().set_high()?;

        hw.write_register(spi, Register::OutputEnable, OUTPUT_LINE)?;
        hw.bus_idle(spi)
    }
}
