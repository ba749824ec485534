//! The waveform stage engine.
//!
//! A full image transition has three stages:
//!
//! 1. An [Stage::Inverse] sweep with a constant black fill, which primes the panel.
//! 2. Timed frames alternating every line between black and white, which clears residual charge.
//! 3. A [Stage::Normal] sweep of the target image.
//!
//! Stages 1 and 3 are staggered sweeps (see [Sweep]); stage 2 is made of timed frames. All
//! parameters come from the active [crate::compensation::Compensation].

use crate::{
    line::{LineSource, BORDER_IDLE},
    log::{debug, debug_assert, warn_log},
    power::{PowerState, Status},
    CogHw, EpdG2,
};

pub use crate::line::Stage;

/// Pixel byte that drives every pixel of a line black.
pub const FILL_BLACK: u8 = 0xFF;
/// Pixel byte that drives every pixel of a line white.
pub const FILL_WHITE: u8 = 0xAA;
/// Pixel byte that leaves every pixel of a line undriven.
pub const FILL_NOTHING: u8 = 0x00;

/// What a sweep sends at one position.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepLine {
    /// A dummy transfer addressing no line, for window positions outside the panel.
    Dummy,
    /// An undriven line, sent at the start of each window on the final pass so that rows settle.
    Clear(u16),
    /// The sweep content for this line.
    Drive(u16),
}

/// The order of line transfers in a staggered sweep.
///
/// Each of the `repeat` passes slides a window of `block` lines down the panel in increments of
/// `step` lines, starting `block - step` lines above the first row and ending past the last one.
/// Limiting the driven rows to a window keeps the COG's inrush current in check, and overlapping
/// windows drive each row several times per pass.
#[derive(Debug, Clone)]
pub struct Sweep {
    lines: i32,
    repeat: i32,
    step: i32,
    block: i32,
    n: i32,
    line: i32,
    offset: i32,
}

impl Sweep {
    pub fn new(lines_per_display: u16, repeat: u16, step: u16, block: u16) -> Self {
        // A zero step would never reach the end of the panel.
        let step = step.max(1) as i32;
        let block = block as i32;
        Sweep {
            lines: lines_per_display as i32,
            repeat: repeat as i32,
            step,
            block,
            n: 0,
            line: step - block,
            offset: 0,
        }
    }
}

impl Iterator for Sweep {
    type Item = SweepLine;

    fn next(&mut self) -> Option<SweepLine> {
        loop {
            if self.n >= self.repeat {
                return None;
            }
            if self.line >= self.lines + self.step {
                self.n += 1;
                self.line = self.step - self.block;
                self.offset = 0;
                continue;
            }
            if self.offset >= self.block {
                self.line += self.step;
                self.offset = 0;
                continue;
            }

            let pos = self.line + self.offset;
            let first_in_block = self.offset == 0;
            self.offset += 1;

            // Row `lines` does not exist. Driving it would alias a real row in the scan bitmap
            // and read one line past the image, so it is a dummy line like the rest of the tail.
            return Some(if pos < 0 || pos >= self.lines {
                SweepLine::Dummy
            } else if first_in_block && self.n == self.repeat - 1 {
                SweepLine::Clear(pos as u16)
            } else {
                SweepLine::Drive(pos as u16)
            });
        }
    }
}

#[derive(Clone, Copy)]
enum SweepContent<'a> {
    Fixed(u8),
    Image(&'a [u8]),
}

impl<HW> EpdG2<HW>
where
    HW: CogHw,
{
    /// Displays `image` using the full three stage transition.
    ///
    /// `image` is packed 1bpp data, [crate::panel::PanelProfile::image_len] bytes long, where set
    /// bits are black. The panel must have been powered up with [EpdG2::power_up]; this is not
    /// checked.
    pub fn update(&mut self, spi: &mut HW::Spi, image: &[u8]) -> Result<(), HW::Error> {
        debug!("Updating display");
        let previous = self.begin_transition();
        let result = self.run_full_transition(spi, image);
        self.state = previous;
        result
    }

    /// Drives the whole panel white.
    pub fn clear(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        debug!("Clearing display");
        let previous = self.begin_transition();
        let result = self.run_clear_transition(spi);
        self.state = previous;
        result
    }

    fn run_clear_transition(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        self.run_fixed_sweep(spi, FILL_BLACK, Stage::Inverse)?;
        self.run_stage2(spi)?;
        self.run_fixed_sweep(spi, FILL_WHITE, Stage::Normal)
    }

    fn begin_transition(&mut self) -> PowerState {
        if self.status != Status::Ok {
            warn_log!("Driving panel with status {:?}", self.status);
        }
        core::mem::replace(&mut self.state, PowerState::Transitioning)
    }

    /// Runs the three transition stages without touching the power state.
    pub fn run_full_transition(
        &mut self,
        spi: &mut HW::Spi,
        image: &[u8],
    ) -> Result<(), HW::Error> {
        debug_assert!(
            image.len() == self.profile.image_len(),
            "image length must match the panel"
        );
        self.run_fixed_sweep(spi, FILL_BLACK, Stage::Inverse)?;
        self.run_stage2(spi)?;
        self.run_image_sweep(spi, image, Stage::Normal)
    }

    /// Stage 2: alternating black and white frames, each held for the compensated time.
    pub fn run_stage2(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        let compensation = self.compensation;
        for _ in 0..compensation.stage2_repeat {
            self.run_fixed_timed(spi, FILL_BLACK, compensation.stage2_t1 as u32)?;
            self.run_fixed_timed(spi, FILL_WHITE, compensation.stage2_t2 as u32)?;
        }
        Ok(())
    }

    /// Sends every line with `value` repeatedly until at least `duration_ms` have passed. At least
    /// one full frame is always sent.
    pub fn run_fixed_timed(
        &mut self,
        spi: &mut HW::Spi,
        value: u8,
        duration_ms: u32,
    ) -> Result<(), HW::Error> {
        let mut remaining = duration_ms;
        loop {
            let start = self.hw.now_ms();
            for line in 0..self.profile.lines_per_display {
                self.send_line(
                    spi,
                    Some(line),
                    LineSource::Fixed(value),
                    Stage::Normal,
                    BORDER_IDLE,
                )?;
            }
            let elapsed = self.hw.now_ms().wrapping_sub(start);
            remaining = remaining.saturating_sub(elapsed);
            if remaining == 0 {
                return Ok(());
            }
        }
    }

    /// A staggered sweep sending `value` to every line.
    pub fn run_fixed_sweep(
        &mut self,
        spi: &mut HW::Spi,
        value: u8,
        stage: Stage,
    ) -> Result<(), HW::Error> {
        self.run_sweep(spi, SweepContent::Fixed(value), stage)
    }

    /// A staggered sweep sending the lines of `image`, encoded for `stage`.
    pub fn run_image_sweep(
        &mut self,
        spi: &mut HW::Spi,
        image: &[u8],
        stage: Stage,
    ) -> Result<(), HW::Error> {
        self.run_sweep(spi, SweepContent::Image(image), stage)
    }

    /// The sweep for `stage` under the current compensation: stage 1 parameters for
    /// [Stage::Inverse], stage 3 for [Stage::Normal].
    pub fn sweep(&self, stage: Stage) -> Sweep {
        let c = &self.compensation;
        let lines = self.profile.lines_per_display;
        match stage {
            Stage::Inverse => Sweep::new(lines, c.stage1_repeat, c.stage1_step, c.stage1_block),
            Stage::Normal => Sweep::new(lines, c.stage3_repeat, c.stage3_step, c.stage3_block),
        }
    }

    fn run_sweep(
        &mut self,
        spi: &mut HW::Spi,
        content: SweepContent<'_>,
        stage: Stage,
    ) -> Result<(), HW::Error> {
        let bytes_per_line = self.profile.bytes_per_line();
        for step in self.sweep(stage) {
            match step {
                SweepLine::Dummy => self.send_line(
                    spi,
                    None,
                    LineSource::Fixed(FILL_NOTHING),
                    Stage::Normal,
                    BORDER_IDLE,
                )?,
                SweepLine::Clear(line) => self.send_line(
                    spi,
                    Some(line),
                    LineSource::Fixed(FILL_NOTHING),
                    Stage::Normal,
                    BORDER_IDLE,
                )?,
                SweepLine::Drive(line) => {
                    let source = match content {
                        SweepContent::Fixed(value) => LineSource::Fixed(value),
                        SweepContent::Image(image) => {
                            let start = line as usize * bytes_per_line;
                            image
                                .get(start..start + bytes_per_line)
                                .map_or(LineSource::Fixed(FILL_NOTHING), LineSource::Row)
                        }
                    };
                    self.send_line(spi, Some(line), source, stage, BORDER_IDLE)?
                }
            }
        }
        Ok(())
    }
}
