use crate::{
    buffer::FrameBuffer,
    compensation::{Compensation, TemperatureBand, DEFAULT_TEMPERATURE},
    log::debug,
    panel::{PanelProfile, PanelSize},
    power::{PowerState, Status},
    CogHw,
};

/// Controls one Pervasive Displays panel through its G2 COG.
///
/// The driver is used in three steps: [EpdG2::power_up], one or more of [EpdG2::update] or
/// [EpdG2::clear], then [EpdG2::power_down]. The panel should not be left powered between
/// updates.
///
/// Image data is one bit per pixel, rows of [PanelProfile::bytes_per_line] bytes, where a set bit
/// is a black pixel. See [FrameBuffer].
pub struct EpdG2<HW>
where
    HW: CogHw,
{
    pub(crate) hw: HW,
    pub(crate) size: PanelSize,
    pub(crate) profile: &'static PanelProfile,
    pub(crate) temperature: i32,
    pub(crate) compensation: Compensation,
    pub(crate) status: Status,
    pub(crate) state: PowerState,
}

impl<HW> EpdG2<HW>
where
    HW: CogHw,
{
    /// Creates a driver for a panel of the given size. The panel is assumed to be unpowered.
    pub fn new(size: PanelSize, hw: HW) -> Self {
        EpdG2 {
            hw,
            size,
            profile: size.profile(),
            temperature: DEFAULT_TEMPERATURE,
            compensation: Compensation::select(size, DEFAULT_TEMPERATURE),
            status: Status::Ok,
            state: PowerState::Unpowered,
        }
    }

    /// Selects the waveform parameters for the given ambient temperature. This takes effect from
    /// the next transition, so it can be called at any time, including while powered.
    pub fn set_temperature(&mut self, celsius: i32) {
        let band = TemperatureBand::from_celsius(celsius);
        if band != TemperatureBand::from_celsius(self.temperature) {
            debug!("Temperature band changed to {:?}", band);
        }
        self.temperature = celsius;
        self.compensation = Compensation::select(self.size, celsius);
    }

    /// The temperature last passed to [EpdG2::set_temperature].
    pub fn temperature(&self) -> i32 {
        self.temperature
    }

    /// The waveform parameters for the current temperature.
    pub fn compensation(&self) -> &Compensation {
        &self.compensation
    }

    pub fn panel_size(&self) -> PanelSize {
        self.size
    }

    pub fn profile(&self) -> &'static PanelProfile {
        self.profile
    }

    /// The result of the most recent power sequence. Once this is not [Status::Ok], the panel
    /// should not be driven until a later [EpdG2::power_up] succeeds. This is not enforced.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Where the panel is in its power cycle.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Creates a blank (all white) buffer sized for this panel.
    pub fn new_buffer<const L: usize>(&self) -> FrameBuffer<L> {
        FrameBuffer::new(self.size)
    }

    /// Releases the hardware.
    pub fn into_inner(self) -> HW {
        self.hw
    }
}
