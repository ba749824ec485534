use core::convert::Infallible;

use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{Dimensions, DrawTarget, Point, Size},
    primitives::Rectangle,
    Pixel,
};

use crate::panel::{PanelSize, EPD_1IN44, EPD_2IN0, EPD_2IN7};

/// The buffer type for the 1.44" panel.
pub type Epd1in44Buffer = FrameBuffer<{ EPD_1IN44.image_len() }>;
/// The buffer type for the 2.0" panel.
pub type Epd2in0Buffer = FrameBuffer<{ EPD_2IN0.image_len() }>;
/// The buffer type for the 2.7" panel.
pub type Epd2in7Buffer = FrameBuffer<{ EPD_2IN7.image_len() }>;

/// A packed 1bpp image in the layout the COG line protocol consumes.
///
/// Each byte holds 8 horizontally adjacent pixels, most significant bit first, and each scan line
/// is [crate::panel::PanelProfile::bytes_per_line] bytes. `BinaryColor::On` is black and
/// `BinaryColor::Off` is white, matching the COG where a set bit drives a pixel black.
pub struct FrameBuffer<const L: usize> {
    size: Size,
    bytes_per_line: usize,
    data: [u8; L],
}

impl<const L: usize> FrameBuffer<L> {
    /// Creates a new all-white buffer for the given panel.
    ///
    /// `L` must be the panel's image length; prefer the aliases such as [Epd2in0Buffer].
    ///
    /// ```
    /// use epd_pervasive::buffer::Epd2in0Buffer;
    /// use epd_pervasive::panel::PanelSize;
    ///
    /// let buffer = Epd2in0Buffer::new(PanelSize::Epd2in0);
    /// assert!(buffer.data().iter().all(|b| *b == 0));
    /// ```
    pub fn new(panel: PanelSize) -> Self {
        let profile = panel.profile();
        debug_assert_eq!(
            profile.image_len(),
            L,
            "Buffer length must match the panel's image length"
        );
        Self {
            size: profile.size(),
            bytes_per_line: profile.bytes_per_line(),
            data: [0; L],
        }
    }

    /// Access the packed image data, ready for [crate::EpdG2::update].
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the packed image data, e.g. to copy in a prepared image.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The packed bytes of one scan line, or `None` past the last line.
    pub fn line(&self, line: usize) -> Option<&[u8]> {
        let start = line.checked_mul(self.bytes_per_line)?;
        self.data.get(start..start.checked_add(self.bytes_per_line)?)
    }

    // Pixels that fall outside `data` are dropped, which only happens when `L` does not match
    // the panel.
    fn set_pixel(&mut self, x: usize, y: usize, color: BinaryColor) {
        let mask = 0x80 >> (x % 8);
        let Some(byte) = self.data.get_mut(x / 8 + y * self.bytes_per_line) else {
            return;
        };
        if color == BinaryColor::On {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

impl<const L: usize> Dimensions for FrameBuffer<L> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), self.size)
    }
}

impl<const L: usize> DrawTarget for FrameBuffer<L> {
    type Color = BinaryColor;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels.into_iter() {
            if point.x < 0
                || point.x >= self.size.width as i32
                || point.y < 0
                || point.y >= self.size.height as i32
            {
                continue;
            }
            self.set_pixel(point.x as usize, point.y as usize, color);
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let drawable_area = self.bounding_box().intersection(area);
        if drawable_area.size.width == 0 || drawable_area.size.height == 0 {
            return Ok(());
        }

        let x_start = drawable_area.top_left.x as usize;
        let x_end = x_start + drawable_area.size.width as usize;
        let y_start = drawable_area.top_left.y as usize;
        let y_end = y_start + drawable_area.size.height as usize;
        let fill = if color == BinaryColor::On { 0xFF } else { 0x00 };

        for y in y_start..y_end {
            let mut x = x_start;
            while x < x_end {
                if x % 8 == 0 && x + 8 <= x_end {
                    // Whole byte covered.
                    if let Some(byte) = self.data.get_mut(x / 8 + y * self.bytes_per_line) {
                        *byte = fill;
                    }
                    x += 8;
                } else {
                    self.set_pixel(x, y, color);
                    x += 1;
                }
            }
        }

        Ok(())
    }
}
