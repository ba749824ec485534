//! This crate provides a blocking driver for Pervasive Displays e-paper panels driven by the G2
//! "COG" (chip on glass) controller: the 1.44", 2.0" and 2.7" panels.
//!
//! It is built on top of the blocking `embedded-hal` 1.0 traits. Unlike most modern e-paper
//! controllers, the G2 COG has no internal frame memory or waveform tables: the host has to sweep
//! every scan line of the panel repeatedly, with temperature-dependent timing, to move the
//! particles. That is what this crate does.
//!
//! ## Core types
//!
//! - [`CogHw`]: abstracts over the hardware needed to talk to the COG: the SPI bus, six GPIO
//!   pins, a delay and a millisecond clock. You implement this trait for your peripherals.
//! - [`EpdG2`]: the driver. It owns a [`CogHw`] bundle and exposes the power sequencer
//!   ([`EpdG2::power_up`], [`EpdG2::power_down`]) and the image transitions ([`EpdG2::update`],
//!   [`EpdG2::clear`]).
//! - [`panel::PanelSize`]: selects the panel geometry and controller channel configuration.
//! - [`compensation::Compensation`]: the temperature-compensated waveform parameters.
//!
//! Additionally, the crate provides:
//!
//! - `buffer` module: a packed 1bpp frame buffer implementing `embedded-graphics::DrawTarget`
//!   in the row layout [`EpdG2::update`] expects.
//! - `line` and `waveform` modules: the low-level line transfer protocol and the stage engine,
//!   public for experimentation with custom waveforms.
//!
//! ## Usage
//!
//! ```ignore
//! let mut epd = EpdG2::new(PanelSize::Epd2in0, hw);
//! epd.set_temperature(read_celsius());
//! if epd.power_up(&mut spi)? == Status::Ok {
//!     epd.update(&mut spi, buffer.data())?;
//! }
//! epd.power_down(&mut spi)?;
//! ```
#![no_std]

use core::error::Error as CoreError;

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as PinErrorType, InputPin, OutputPin},
    spi::{ErrorType as SpiErrorType, Phase, Polarity, SpiBus},
};

pub mod buffer;
pub mod compensation;
pub mod line;
pub mod panel;
pub mod power;
pub mod waveform;

mod epd;
mod hw;
mod log;

pub use epd::EpdG2;
pub use hw::Register;
pub use power::{PowerState, Status};

/// The COG is specified up to 12 MHz, but long panel cables are unreliable above a few MHz.
pub const RECOMMENDED_SPI_HZ: u32 = 4_000_000; // 4 MHz
/// Use this phase in conjunction with [RECOMMENDED_SPI_POLARITY] (SPI mode 0, MSB first).
pub const RECOMMENDED_SPI_PHASE: Phase = Phase::CaptureOnFirstTransition;
/// Use this polarity in conjunction with [RECOMMENDED_SPI_PHASE] (SPI mode 0, MSB first).
pub const RECOMMENDED_SPI_POLARITY: Polarity = Polarity::IdleLow;

/// Provides access to the hardware needed to control a G2 COG.
///
/// Chip select is a plain output pin rather than part of an `SpiDevice`: the COG needs a busy
/// handshake after every byte of a line transfer, all inside one chip-select frame, so the driver
/// has to own the framing. The bus itself is lent to each driver call, so it can be shared with
/// other peripherals between calls.
///
/// ```ignore
/// use core::convert::Infallible;
///
/// use embassy_rp::gpio::{Input, Output};
/// use embassy_rp::{peripherals, spi};
/// use embassy_time::{Delay, Instant};
/// use epd_pervasive::CogHw;
/// use thiserror::Error as ThisError;
///
/// #[derive(Debug, ThisError)]
/// enum Error {
///     #[error("SPI error: {0:?}")]
///     SpiError(spi::Error),
/// }
///
/// impl From<Infallible> for Error {
///     fn from(_: Infallible) -> Self {
///         unreachable!()
///     }
/// }
///
/// impl From<spi::Error> for Error {
///     fn from(e: spi::Error) -> Self {
///         Error::SpiError(e)
///     }
/// }
///
/// struct RpCogHw<'a> {
///     cs: Output<'a>,
///     panel_on: Output<'a>,
///     border: Output<'a>,
///     discharge: Output<'a>,
///     reset: Output<'a>,
///     busy: Input<'a>,
///     delay: Delay,
/// }
///
/// impl<'a> CogHw for RpCogHw<'a> {
///     type Spi = spi::Spi<'a, peripherals::SPI0, spi::Blocking>;
///     type Cs = Output<'a>;
///     type PanelOn = Output<'a>;
///     type Border = Output<'a>;
///     type Discharge = Output<'a>;
///     type Reset = Output<'a>;
///     type Busy = Input<'a>;
///     type Delay = Delay;
///     type Error = Error;
///
///     fn cs(&mut self) -> &mut Self::Cs { &mut self.cs }
///     fn panel_on(&mut self) -> &mut Self::PanelOn { &mut self.panel_on }
///     fn border(&mut self) -> &mut Self::Border { &mut self.border }
///     fn discharge(&mut self) -> &mut Self::Discharge { &mut self.discharge }
///     fn reset(&mut self) -> &mut Self::Reset { &mut self.reset }
///     fn busy(&mut self) -> &mut Self::Busy { &mut self.busy }
///     fn delay(&mut self) -> &mut Self::Delay { &mut self.delay }
///     fn now_ms(&mut self) -> u32 { Instant::now().as_millis() as u32 }
/// }
/// ```
pub trait CogHw {
    type Spi: SpiBus;
    type Cs: OutputPin;
    type PanelOn: OutputPin;
    type Border: OutputPin;
    type Discharge: OutputPin;
    type Reset: OutputPin;
    /// High while the COG is busy.
    type Busy: InputPin;
    type Delay: DelayNs;
    type Error: CoreError
        + From<<Self::Spi as SpiErrorType>::Error>
        + From<<Self::Cs as PinErrorType>::Error>
        + From<<Self::PanelOn as PinErrorType>::Error>
        + From<<Self::Border as PinErrorType>::Error>
        + From<<Self::Discharge as PinErrorType>::Error>
        + From<<Self::Reset as PinErrorType>::Error>
        + From<<Self::Busy as PinErrorType>::Error>;

    fn cs(&mut self) -> &mut Self::Cs;
    fn panel_on(&mut self) -> &mut Self::PanelOn;
    fn border(&mut self) -> &mut Self::Border;
    fn discharge(&mut self) -> &mut Self::Discharge;
    fn reset(&mut self) -> &mut Self::Reset;
    fn busy(&mut self) -> &mut Self::Busy;
    fn delay(&mut self) -> &mut Self::Delay;

    /// Milliseconds from a monotonic clock. The value is allowed to wrap around.
    fn now_ms(&mut self) -> u32;
}
