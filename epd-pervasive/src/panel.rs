//! Geometry and controller configuration of the supported panels.

use embedded_graphics::prelude::Size;

/// The panel sizes driven by the G2 COG.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelSize {
    /// 1.44" panel, 128 x 96.
    Epd1in44,
    /// 2.0" panel, 200 x 96.
    Epd2in0,
    /// 2.7" panel, 264 x 176.
    Epd2in7,
}

impl PanelSize {
    /// Returns the static profile for this panel size.
    pub const fn profile(&self) -> &'static PanelProfile {
        match self {
            PanelSize::Epd1in44 => &EPD_1IN44,
            PanelSize::Epd2in0 => &EPD_2IN0,
            PanelSize::Epd2in7 => &EPD_2IN7,
        }
    }
}

/// Fixed properties of one panel variant.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelProfile {
    /// Number of scan lines (rows).
    pub lines_per_display: u16,
    /// Number of pixels in each line.
    pub dots_per_line: u16,
    /// Sent to the channel select register (0x01) once during power up. The leading 0x72 is the
    /// data header of the register write, so the slice is sent as a single frame.
    pub channel_select: &'static [u8],
}

impl PanelProfile {
    const fn new(lines_per_display: u16, dots_per_line: u16, channel_select: &'static [u8]) -> Self {
        PanelProfile {
            lines_per_display,
            dots_per_line,
            channel_select,
        }
    }

    /// Bytes of packed 1bpp image data per line.
    pub const fn bytes_per_line(&self) -> usize {
        self.dots_per_line as usize / 8
    }

    /// Bytes of scan select bitmap per line transfer. Each byte addresses four lines.
    pub const fn bytes_per_scan(&self) -> usize {
        self.lines_per_display as usize / 4
    }

    /// Length of a full image for this panel.
    pub const fn image_len(&self) -> usize {
        self.bytes_per_line() * self.lines_per_display as usize
    }

    /// Image dimensions, with lines along the y axis.
    pub const fn size(&self) -> Size {
        Size::new(self.dots_per_line as u32, self.lines_per_display as u32)
    }
}

pub const EPD_1IN44: PanelProfile = PanelProfile::new(
    96,
    128,
    &[0x72, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0f, 0xff, 0x00],
);

pub const EPD_2IN0: PanelProfile = PanelProfile::new(
    96,
    200,
    &[0x72, 0x00, 0x00, 0x00, 0x00, 0x01, 0xff, 0xe0, 0x00],
);

pub const EPD_2IN7: PanelProfile = PanelProfile::new(
    176,
    264,
    &[0x72, 0x00, 0x00, 0x00, 0x7f, 0xff, 0xfe, 0x00, 0x00],
);
