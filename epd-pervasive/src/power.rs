//! The COG power sequencer.
//!
//! The timings here come from the COG interface timing document and must not be shortened: the
//! charge pumps need the full delays to ramp up, and the panel has to be discharged before power
//! is removed.

use bitflags::bitflags;
use embedded_hal::{delay::DelayNs as _, digital::OutputPin as _};

use crate::{
    hw::{BusyWait as _, CogComms as _, Register},
    line::{LineSource, Stage},
    log::{debug, info, warn_log},
    panel::PanelSize,
    waveform::FILL_NOTHING,
    CogHw, EpdG2,
};

/// Low nibble of the COG ID for the supported (G2) controller.
pub const SUPPORTED_COG_ID: u8 = 0x02;

/// Attempts at bringing up the charge pumps before giving up.
const CHARGE_PUMP_ATTEMPTS: usize = 4;

/// Poll interval while waiting for the COG to come out of reset.
const READY_POLL_US: u32 = 10;

/// Number of pulses on the discharge pin when removing power.
const DISCHARGE_PULSES: usize = 10;

bitflags! {
    /// Flags in [Register::Status].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CogStatus: u8 {
        /// Set while the panel's breakage detection loop is intact.
        const PANEL_INTACT = 0b1000_0000;
        /// Set once the DC/DC converter (charge pumps) is up.
        const DC_DC_OK = 0b0100_0000;
    }
}

/// The outcome of a power sequence.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The COG reported an ID other than [SUPPORTED_COG_ID].
    UnsupportedController,
    /// The panel's breakage detection loop is open.
    PanelBroken,
    /// The charge pumps did not come up (or dropped out before power down).
    PowerFailure,
}

/// Where the panel is in its power cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Unpowered,
    Powering,
    Ready,
    Transitioning,
    PoweringDown,
    /// A power sequence failed. See [crate::EpdG2::status] for the reason.
    Faulted,
}

impl<HW> EpdG2<HW>
where
    HW: CogHw,
{
    /// Powers up the panel and initialises the COG.
    ///
    /// Hardware faults are reported through the returned [Status], which is also kept in
    /// [EpdG2::status]. On any fault the panel is powered off and discharged again before
    /// returning. `Err` is only returned if the bus or a pin fails.
    pub fn power_up(&mut self, spi: &mut HW::Spi) -> Result<Status, HW::Error> {
        info!("Powering up {:?}", self.size);
        self.status = Status::Ok;
        self.state = PowerState::Powering;

        self.reset_sequence(spi)?;

        self.hw.wait_until_idle_polling(READY_POLL_US)?;

        // The first read after reset returns garbage.
        self.hw.read_id(spi)?;
        let cog_id = self.hw.read_id(spi)?;
        if cog_id & 0x0F != SUPPORTED_COG_ID {
            warn_log!("Unsupported COG ID: {:#x}", cog_id);
            return self.fault(spi, Status::UnsupportedController);
        }

        self.hw.write_register(spi, Register::OutputEnable, 0x40)?;

        let status = self.read_status(spi)?;
        if !status.contains(CogStatus::PANEL_INTACT) {
            warn_log!("Panel is broken: {:#x}", status.bits());
            return self.fault(spi, Status::PanelBroken);
        }

        self.configure(spi)?;

        if !self.start_charge_pumps(spi)? {
            warn_log!("DC/DC did not come up");
            return self.fault(spi, Status::PowerFailure);
        }

        self.hw.write_register(spi, Register::OutputEnable, 0x40)?;
        self.hw.bus_idle(spi)?;

        debug!("COG ready");
        self.state = PowerState::Ready;
        Ok(Status::Ok)
    }

    /// Powers down the panel.
    ///
    /// This drives the border, switches off the charge pumps, discharges the panel internally and
    /// finally removes power and bleeds the remaining charge through the discharge pin. Returns
    /// [Status::PowerFailure] if the DC/DC converter had already dropped out, in which case the
    /// panel is powered off without the orderly shutdown.
    pub fn power_down(&mut self, spi: &mut HW::Spi) -> Result<Status, HW::Error> {
        info!("Powering down {:?}", self.size);
        self.state = PowerState::PoweringDown;

        self.finish_border(spi)?;

        self.hw.bus_idle(spi)?;
        let status = self.read_status(spi)?;
        if !status.contains(CogStatus::DC_DC_OK) {
            warn_log!("DC/DC dropped out before power down");
            return self.fault(spi, Status::PowerFailure);
        }

        let hw = &mut self.hw;
        // Latch reset on.
        hw.write_register(spi, Register::DriverLatch, 0x01)?;
        // Output enable off.
        hw.write_register(spi, Register::OutputEnable, 0x05)?;
        // Positive charge pump off, then Vcom, then all.
        hw.write_register(spi, Register::ChargePump, 0x0E)?;
        hw.write_register(spi, Register::ChargePump, 0x02)?;
        hw.write_register(spi, Register::ChargePump, 0x00)?;
        hw.write_register(spi, Register::Oscillator, 0x0D)?;

        // Internal discharge.
        hw.write_register(spi, Register::PowerSetting, 0x83)?;
        hw.delay().delay_ms(120);
        hw.write_register(spi, Register::PowerSetting, 0x00)?;

        self.power_off(spi)?;
        self.state = PowerState::Unpowered;
        Ok(self.status)
    }

    /// Removes power from the panel and bleeds off residual charge.
    ///
    /// This is the last step of [EpdG2::power_down], and the only step taken after a fault.
    pub fn power_off(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        debug!("Removing COG power");
        let hw = &mut self.hw;
        hw.reset().set_low()?;
        hw.panel_on().set_low()?;
        hw.border().set_low()?;

        // Data and clock must be low before chip select goes low.
        hw.bus_idle(spi)?;
        hw.cs().set_low()?;

        for _ in 0..DISCHARGE_PULSES {
            hw.delay().delay_ms(10);
            hw.discharge().set_high()?;
            hw.delay().delay_ms(10);
            hw.discharge().set_low()?;
        }
        Ok(())
    }

    fn fault(&mut self, spi: &mut HW::Spi, status: Status) -> Result<Status, HW::Error> {
        self.status = status;
        self.power_off(spi)?;
        self.state = PowerState::Faulted;
        Ok(status)
    }

    fn reset_sequence(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        let hw = &mut self.hw;
        hw.reset().set_low()?;
        hw.panel_on().set_low()?;
        hw.discharge().set_low()?;
        hw.border().set_low()?;
        hw.cs().set_low()?;

        hw.bus_idle(spi)?;

        hw.delay().delay_ms(5);
        hw.panel_on().set_high()?;
        hw.delay().delay_ms(10);

        hw.reset().set_high()?;
        hw.border().set_high()?;
        hw.cs().set_high()?;
        hw.delay().delay_ms(5);

        hw.reset().set_low()?;
        hw.delay().delay_ms(5);

        hw.reset().set_high()?;
        hw.delay().delay_ms(5);
        Ok(())
    }

    fn configure(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        let channel_select = self.profile.channel_select;
        let hw = &mut self.hw;
        hw.write_register(spi, Register::PowerSaving, 0x02)?;

        // The channel select bytes carry their own data header.
        hw.select_register(spi, Register::ChannelSelect)?;
        hw.send_frame(spi, channel_select)?;

        // High power mode oscillator.
        hw.write_register(spi, Register::Oscillator, 0xD1)?;
        hw.write_register(spi, Register::VoltageLevel, 0x02)?;
        hw.write_register(spi, Register::VcomLevel, 0xC2)?;
        hw.write_register(spi, Register::PowerSetting, 0x03)?;

        // Pulse the driver latch.
        hw.write_register(spi, Register::DriverLatch, 0x01)?;
        hw.write_register(spi, Register::DriverLatch, 0x00)?;

        hw.delay().delay_ms(5);
        Ok(())
    }

    /// Brings up the positive, negative and Vcom charge pumps in turn, retrying until the DC/DC
    /// converter reports ready. Returns whether it did.
    fn start_charge_pumps(&mut self, spi: &mut HW::Spi) -> Result<bool, HW::Error> {
        for _ in 0..CHARGE_PUMP_ATTEMPTS {
            debug!("Starting charge pumps");
            let hw = &mut self.hw;
            // VGH and VDH on.
            hw.write_register(spi, Register::ChargePump, 0x01)?;
            hw.delay().delay_ms(240);
            // VGL and VDL on.
            hw.write_register(spi, Register::ChargePump, 0x03)?;
            hw.delay().delay_ms(40);
            // Vcom on.
            hw.write_register(spi, Register::ChargePump, 0x0F)?;
            hw.delay().delay_ms(40);

            if self.read_status(spi)?.contains(CogStatus::DC_DC_OK) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Leaves the border in the right state before power is removed. The 2.7" panel has a
    /// border pin to pulse; the smaller panels need a dummy line with each border level instead.
    fn finish_border(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        match self.size {
            PanelSize::Epd2in7 => {
                let hw = &mut self.hw;
                hw.delay().delay_ms(25);
                hw.border().set_low()?;
                hw.delay().delay_ms(250);
                hw.border().set_high()?;
            }
            PanelSize::Epd1in44 | PanelSize::Epd2in0 => {
                for (border, settle_ms) in [(0xFF, 40), (0xAA, 200), (0x00, 25)] {
                    self.send_line(
                        spi,
                        None,
                        LineSource::Fixed(FILL_NOTHING),
                        Stage::Normal,
                        border,
                    )?;
                    self.hw.delay().delay_ms(settle_ms);
                }
            }
        }
        Ok(())
    }

    fn read_status(&mut self, spi: &mut HW::Spi) -> Result<CogStatus, HW::Error> {
        let bits = self.hw.read_register(spi, Register::Status)?;
        Ok(CogStatus::from_bits_retain(bits))
    }
}
