use embedded_hal::{
    delay::DelayNs as _,
    digital::{InputPin as _, OutputPin as _},
    spi::SpiBus as _,
};

use crate::{log::trace, CogHw};

/// Header byte selecting the register for the following frame.
const HEADER_INDEX: u8 = 0x70;
/// Header byte of a frame that reads the COG ID.
const HEADER_ID: u8 = 0x71;
/// Header byte of a frame carrying register data.
pub(crate) const HEADER_WRITE: u8 = 0x72;
/// Header byte of a frame that reads the selected register.
const HEADER_READ: u8 = 0x73;

/// Time between selecting the chip and clocking the first byte of a frame.
const FRAME_SETTLE_US: u32 = 10;

/// Registers of the G2 COG. You probably want to use the methods on [crate::EpdG2] instead, but
/// these are exposed for low-level experimentation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Selects which source and gate channels the panel is wired to.
    ChannelSelect = 0x01,
    /// Output enable control. Also used to latch a transferred line onto the panel.
    OutputEnable = 0x02,
    /// Driver latch.
    DriverLatch = 0x03,
    /// Power setting, including the internal discharge switch.
    PowerSetting = 0x04,
    /// Enables the positive, negative and Vcom charge pumps.
    ChargePump = 0x05,
    /// Oscillator mode.
    Oscillator = 0x07,
    /// Gate and source voltage level.
    VoltageLevel = 0x08,
    /// Vcom level.
    VcomLevel = 0x09,
    /// Starts a line data transfer.
    DataStart = 0x0A,
    /// Power saving mode.
    PowerSaving = 0x0B,
    /// Read-only status flags, see [crate::power::CogStatus].
    Status = 0x0F,
}

impl Register {
    /// Returns the index of this register.
    pub fn index(&self) -> u8 {
        *self as u8
    }
}

/// Provides "wait" support for the COG busy line.
pub(crate) trait BusyWait: CogHw {
    /// Spins until the busy line is low.
    ///
    /// Note that this will wait forever if the COG never becomes ready.
    fn wait_until_idle(&mut self) -> Result<(), Self::Error>;

    /// Like [BusyWait::wait_until_idle], but sleeps `poll_us` between polls.
    fn wait_until_idle_polling(&mut self, poll_us: u32) -> Result<(), Self::Error>;
}

/// Framed register access over the SPI bus.
pub(crate) trait CogComms: CogHw {
    /// Clocks out two idle bytes to leave the bus in a known state.
    fn bus_idle(&mut self, spi: &mut Self::Spi) -> Result<(), Self::Error>;

    /// Sends `bytes` inside one chip-select frame.
    fn send_frame(&mut self, spi: &mut Self::Spi, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Exchanges a two byte frame starting with `header`, returning the second byte received.
    fn read_frame(&mut self, spi: &mut Self::Spi, header: u8) -> Result<u8, Self::Error>;

    /// Sends the index frame for `register` on its own, for writes whose data frame is built by
    /// the caller.
    fn select_register(&mut self, spi: &mut Self::Spi, register: Register)
        -> Result<(), Self::Error>;

    /// Writes `data` to `register`.
    fn write_register(
        &mut self,
        spi: &mut Self::Spi,
        register: Register,
        data: u8,
    ) -> Result<(), Self::Error>;

    /// Reads the current value of `register`.
    fn read_register(&mut self, spi: &mut Self::Spi, register: Register)
        -> Result<u8, Self::Error>;

    /// Reads the COG identification byte.
    fn read_id(&mut self, spi: &mut Self::Spi) -> Result<u8, Self::Error>;

    /// Writes a single byte within an open frame, then waits for the COG to accept it.
    fn put_wait(&mut self, spi: &mut Self::Spi, byte: u8) -> Result<(), Self::Error>;
}

impl<HW: CogHw> BusyWait for HW {
    fn wait_until_idle(&mut self) -> Result<(), HW::Error> {
        let busy = self.busy();
        while busy.is_high()? {}
        Ok(())
    }

    fn wait_until_idle_polling(&mut self, poll_us: u32) -> Result<(), HW::Error> {
        if self.busy().is_high()? {
            trace!("Waiting for busy COG");
            while self.busy().is_high()? {
                self.delay().delay_us(poll_us);
            }
        }
        Ok(())
    }
}

impl<HW: CogHw> CogComms for HW {
    fn bus_idle(&mut self, spi: &mut Self::Spi) -> Result<(), HW::Error> {
        spi.write(&[0x00, 0x00])?;
        spi.flush()?;
        self.delay().delay_us(FRAME_SETTLE_US);
        Ok(())
    }

    fn send_frame(&mut self, spi: &mut Self::Spi, bytes: &[u8]) -> Result<(), HW::Error> {
        self.delay().delay_us(FRAME_SETTLE_US);
        self.cs().set_low()?;
        spi.write(bytes)?;
        spi.flush()?;
        self.cs().set_high()?;
        Ok(())
    }

    fn read_frame(&mut self, spi: &mut Self::Spi, header: u8) -> Result<u8, HW::Error> {
        let mut frame = [header, 0x00];
        self.delay().delay_us(FRAME_SETTLE_US);
        self.cs().set_low()?;
        spi.transfer_in_place(&mut frame)?;
        spi.flush()?;
        self.cs().set_high()?;
        Ok(frame[1])
    }

    fn select_register(&mut self, spi: &mut Self::Spi, register: Register) -> Result<(), HW::Error> {
        self.send_frame(spi, &[HEADER_INDEX, register.index()])
    }

    fn write_register(
        &mut self,
        spi: &mut Self::Spi,
        register: Register,
        data: u8,
    ) -> Result<(), HW::Error> {
        trace!("Writing COG register {:?}: {:#x}", register, data);
        self.select_register(spi, register)?;
        self.send_frame(spi, &[HEADER_WRITE, data])
    }

    fn read_register(&mut self, spi: &mut Self::Spi, register: Register) -> Result<u8, HW::Error> {
        self.select_register(spi, register)?;
        let value = self.read_frame(spi, HEADER_READ)?;
        trace!("Read COG register {:?}: {:#x}", register, value);
        Ok(value)
    }

    fn read_id(&mut self, spi: &mut Self::Spi) -> Result<u8, HW::Error> {
        self.read_frame(spi, HEADER_ID)
    }

    fn put_wait(&mut self, spi: &mut Self::Spi, byte: u8) -> Result<(), HW::Error> {
        spi.write(&[byte])?;
        spi.flush()?;
        self.wait_until_idle()
    }
}
