//! A simulated G2 COG that records pin and bus traffic.
//!
//! Bytes clocked out while chip select is low are collected into one [Event::Frame] per
//! chip-select frame. Reads answer with the configured COG ID or the next scripted status value.
//! Every byte on the bus and every delay advance a shared clock, so timed frames terminate.
//!
//! Busy can be made to stay high for a number of polls after reset and after each byte of a data
//! frame. Polls are then recorded as [Event::BusyPoll], and a byte sent while busy is still high
//! is recorded as [Event::Overrun].

#![allow(dead_code)]

use std::{cell::RefCell, convert::Infallible, rc::Rc};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as PinErrorType, InputPin, OutputPin},
    spi::{Error as SpiError, ErrorKind, ErrorType as SpiErrorType, SpiBus},
};
use epd_pervasive::CogHw;
use thiserror::Error as ThisError;

const HEADER_INDEX: u8 = 0x70;
const HEADER_ID: u8 = 0x71;
const HEADER_WRITE: u8 = 0x72;
const HEADER_READ: u8 = 0x73;

const DATA_START_REGISTER: u8 = 0x0A;

pub const STATUS_REGISTER: u8 = 0x0F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
    Cs,
    PanelOn,
    Border,
    Discharge,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Pin(Pin, bool),
    /// Everything clocked out during one chip-select frame.
    Frame(Vec<u8>),
    /// Bytes clocked out with chip select high.
    Idle(Vec<u8>),
    /// A read of the busy pin, with the clock at the time of the read.
    BusyPoll { busy: bool, at_ns: u64 },
    /// A byte clocked out while the COG was still busy with the previous one.
    Overrun,
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum SimError {
    #[error("simulated bus fault")]
    Bus,
}

impl SpiError for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<Infallible> for SimError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

/// Behaviour of the simulated COG.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub cog_id: u8,
    /// Values returned by successive status reads. The last one repeats.
    pub status: Vec<u8>,
    /// Simulated time per byte on the bus.
    pub byte_us: u64,
    /// Fail every bus access once this many bytes have been written.
    pub fail_after_bytes: Option<usize>,
    /// Polls for which busy stays high after reset is released.
    pub busy_after_reset: usize,
    /// Polls for which busy stays high after each byte of a data frame.
    pub busy_after_byte: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            cog_id: 0x12,
            status: vec![0xC0],
            byte_us: 100,
            fail_after_bytes: None,
            busy_after_reset: 0,
            busy_after_byte: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    config: SimConfig,
    events: Vec<Event>,
    cs_low: bool,
    pending: Vec<u8>,
    selected: Option<u8>,
    status_reads: usize,
    bytes_written: usize,
    clock_ns: u64,
    busy_polls_left: usize,
}

impl SimState {
    fn set_pin(&mut self, pin: Pin, high: bool) {
        if pin == Pin::Cs {
            if high && self.cs_low {
                let frame = std::mem::take(&mut self.pending);
                if let [HEADER_INDEX, register] = frame[..] {
                    self.selected = Some(register);
                }
                self.events.push(Event::Frame(frame));
            }
            self.cs_low = !high;
        }
        if pin == Pin::Reset && high {
            self.busy_polls_left = self.config.busy_after_reset;
        }
        self.events.push(Event::Pin(pin, high));
    }

    fn tracks_busy(&self) -> bool {
        self.config.busy_after_reset > 0 || self.config.busy_after_byte > 0
    }

    fn poll_busy(&mut self) -> bool {
        let busy = self.busy_polls_left > 0;
        if busy {
            self.busy_polls_left -= 1;
        }
        if self.tracks_busy() {
            self.events.push(Event::BusyPoll {
                busy,
                at_ns: self.clock_ns,
            });
        }
        busy
    }

    /// Bytes after `[0x72]` with data start selected are handshaken one at a time.
    fn in_data_frame(&self, bytes: &[u8]) -> bool {
        self.cs_low
            && self.selected == Some(DATA_START_REGISTER)
            && self.pending.first().or(bytes.first()) == Some(&HEADER_WRITE)
    }

    fn clock_out(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        if let Some(limit) = self.config.fail_after_bytes {
            if self.bytes_written >= limit {
                return Err(SimError::Bus);
            }
        }
        if self.busy_polls_left > 0 {
            self.events.push(Event::Overrun);
        }
        if self.in_data_frame(bytes) {
            self.busy_polls_left = self.config.busy_after_byte * bytes.len();
        }
        self.bytes_written += bytes.len();
        self.clock_ns += self.config.byte_us * 1_000 * bytes.len() as u64;
        if self.cs_low {
            self.pending.extend_from_slice(bytes);
        } else {
            self.events.push(Event::Idle(bytes.to_vec()));
        }
        Ok(())
    }

    fn respond(&mut self, header: u8) -> u8 {
        match header {
            HEADER_ID => self.config.cog_id,
            HEADER_READ if self.selected == Some(STATUS_REGISTER) => {
                let script = &self.config.status;
                let value = script[self.status_reads.min(script.len() - 1)];
                self.status_reads += 1;
                value
            }
            _ => 0x00,
        }
    }
}

/// A handle on the simulated COG, kept by the test to inspect what the driver did.
#[derive(Clone)]
pub struct Sim(Rc<RefCell<SimState>>);

impl Sim {
    pub fn new(config: SimConfig) -> Self {
        Sim(Rc::new(RefCell::new(SimState {
            config,
            ..Default::default()
        })))
    }

    /// The hardware bundle to hand to the driver, and the bus to lend it.
    pub fn hw(&self) -> (SimCog, SimSpi) {
        let pin = |pin| SimPin(self.clone(), pin);
        let cog = SimCog {
            cs: pin(Pin::Cs),
            panel_on: pin(Pin::PanelOn),
            border: pin(Pin::Border),
            discharge: pin(Pin::Discharge),
            reset: pin(Pin::Reset),
            busy: SimBusy(self.clone()),
            delay: SimDelay(self.clone()),
            sim: self.clone(),
        };
        (cog, SimSpi(self.clone()))
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    /// Number of events recorded so far, for slicing out one operation's traffic.
    pub fn mark(&self) -> usize {
        self.0.borrow().events.len()
    }

    pub fn events_since(&self, mark: usize) -> Vec<Event> {
        self.0.borrow().events[mark..].to_vec()
    }

    pub fn now_ms(&self) -> u64 {
        self.0.borrow().clock_ns / 1_000_000
    }

    /// Moves the clock to `ms`, e.g. to just before the driver's `u32` clock wraps.
    pub fn set_now_ms(&self, ms: u64) {
        self.0.borrow_mut().clock_ns = ms * 1_000_000;
    }
}

pub struct SimPin(Sim, Pin);

impl PinErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0 .0.borrow_mut().set_pin(self.1, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0 .0.borrow_mut().set_pin(self.1, true);
        Ok(())
    }
}

/// The COG busy pin. High while [SimConfig::busy_after_reset] or [SimConfig::busy_after_byte]
/// polls remain.
pub struct SimBusy(Sim);

impl PinErrorType for SimBusy {
    type Error = Infallible;
}

impl InputPin for SimBusy {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0 .0.borrow_mut().poll_busy())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|busy| !busy)
    }
}

pub struct SimDelay(Sim);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0 .0.borrow_mut().clock_ns += ns as u64;
    }
}

pub struct SimSpi(Sim);

impl SpiErrorType for SimSpi {
    type Error = SimError;
}

impl SpiBus for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let zeros = vec![0x00; words.len()];
        self.0 .0.borrow_mut().clock_out(&zeros)?;
        words.fill(0x00);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.0 .0.borrow_mut().clock_out(words)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.0 .0.borrow_mut();
        state.clock_out(write)?;
        read.fill(0x00);
        if let (Some(first), Some(&header)) = (read.get_mut(1), write.first()) {
            *first = state.respond(header);
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut state = self.0 .0.borrow_mut();
        state.clock_out(words)?;
        let header = words.first().copied();
        words.fill(0x00);
        if let (Some(header), Some(second)) = (header, words.get_mut(1)) {
            *second = state.respond(header);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct SimCog {
    cs: SimPin,
    panel_on: SimPin,
    border: SimPin,
    discharge: SimPin,
    reset: SimPin,
    busy: SimBusy,
    delay: SimDelay,
    sim: Sim,
}

impl CogHw for SimCog {
    type Spi = SimSpi;
    type Cs = SimPin;
    type PanelOn = SimPin;
    type Border = SimPin;
    type Discharge = SimPin;
    type Reset = SimPin;
    type Busy = SimBusy;
    type Delay = SimDelay;
    type Error = SimError;

    fn cs(&mut self) -> &mut Self::Cs {
        &mut self.cs
    }

    fn panel_on(&mut self) -> &mut Self::PanelOn {
        &mut self.panel_on
    }

    fn border(&mut self) -> &mut Self::Border {
        &mut self.border
    }

    fn discharge(&mut self) -> &mut Self::Discharge {
        &mut self.discharge
    }

    fn reset(&mut self) -> &mut Self::Reset {
        &mut self.reset
    }

    fn busy(&mut self) -> &mut Self::Busy {
        &mut self.busy
    }

    fn delay(&mut self) -> &mut Self::Delay {
        &mut self.delay
    }

    fn now_ms(&mut self) -> u32 {
        self.sim.now_ms() as u32
    }
}

/// The chip-select frames in `events`, in order.
pub fn frames(events: &[Event]) -> Vec<&[u8]> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Frame(bytes) => Some(bytes.as_slice()),
            _ => None,
        })
        .collect()
}

/// Single byte register writes as `(register, data)` pairs, in order.
pub fn register_writes(events: &[Event]) -> Vec<(u8, u8)> {
    frames(events)
        .windows(2)
        .filter_map(|pair| match (pair[0], pair[1]) {
            ([HEADER_INDEX, register], [HEADER_WRITE, data]) => Some((*register, *data)),
            _ => None,
        })
        .collect()
}

/// Line transfers for a panel with the given line and scan sizes.
pub fn line_frames(events: &[Event], bytes_per_line: usize, bytes_per_scan: usize) -> Vec<&[u8]> {
    let len = 2 + 2 * bytes_per_line + bytes_per_scan;
    frames(events)
        .into_iter()
        .filter(|f| f.len() == len && f[0] == HEADER_WRITE)
        .collect()
}

/// The busy pin reads in `events`, as `(busy, at_ns)`.
pub fn busy_polls(events: &[Event]) -> Vec<(bool, u64)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::BusyPoll { busy, at_ns } => Some((*busy, *at_ns)),
            _ => None,
        })
        .collect()
}

/// Number of rising edges on `pin`.
pub fn rising_edges(events: &[Event], pin: Pin) -> usize {
    events
        .iter()
        .filter(|e| **e == Event::Pin(pin, true))
        .count()
}

/// The last level driven on `pin`.
pub fn last_level(events: &[Event], pin: Pin) -> Option<bool> {
    events.iter().rev().find_map(|e| match e {
        Event::Pin(p, level) if *p == pin => Some(*level),
        _ => None,
    })
}
