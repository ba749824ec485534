use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals;
use embassy_rp::spi::{self, Spi};
use embassy_time::{Delay, Instant};
use epd_pervasive::CogHw;
use rp_samples::Error;

// Define the resources needed to communicate with the display.
assign_resources::assign_resources! {
    spi_hw: SpiP {
        spi: SPI0,
        clk: PIN_2,
        tx: PIN_3,
        rx: PIN_4,
    },
    epd_hw: DisplayP {
        cs: PIN_5,
        panel_on: PIN_6,
        border: PIN_7,
        discharge: PIN_8,
        reset: PIN_9,
        busy: PIN_10,
    }
}

/// Defines the hardware to use for connecting to the display.
pub struct DisplayHw<'a> {
    cs: Output<'a>,
    panel_on: Output<'a>,
    border: Output<'a>,
    discharge: Output<'a>,
    reset: Output<'a>,
    busy: Input<'a>,
    delay: Delay,
}

impl DisplayHw<'_> {
    pub fn new(p: DisplayP) -> Self {
        // Everything starts low so the panel is unpowered until the driver powers it up.
        let cs = Output::new(p.cs, Level::Low);
        let panel_on = Output::new(p.panel_on, Level::Low);
        let border = Output::new(p.border, Level::Low);
        let discharge = Output::new(p.discharge, Level::Low);
        let reset = Output::new(p.reset, Level::Low);
        let busy = Input::new(p.busy, Pull::Down);

        Self {
            cs,
            panel_on,
            border,
            discharge,
            reset,
            busy,
            delay: Delay,
        }
    }
}

impl<'a> CogHw for DisplayHw<'a> {
    type Spi = Spi<'a, peripherals::SPI0, spi::Blocking>;

    type Cs = Output<'a>;

    type PanelOn = Output<'a>;

    type Border = Output<'a>;

    type Discharge = Output<'a>;

    type Reset = Output<'a>;

    type Busy = Input<'a>;

    type Delay = Delay;

    type Error = Error;

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
        // Truncation is fine: the driver only uses wrapping differences.
        Instant::now().as_millis() as u32
    }
}
