//! Temperature compensation of the waveform.
//!
//! The particles move more slowly in the cold, so colder panels get longer flashes and wider
//! sweep blocks. Each panel size has one row of parameters per [TemperatureBand].

use crate::panel::PanelSize;

/// Temperature used until [crate::EpdG2::set_temperature] is called.
pub const DEFAULT_TEMPERATURE: i32 = 25;

/// The three temperature ranges with distinct waveform parameters.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureBand {
    /// Below 10°C.
    Cold,
    /// 10°C to 40°C inclusive.
    Normal,
    /// Above 40°C.
    Hot,
}

impl TemperatureBand {
    pub const fn from_celsius(celsius: i32) -> Self {
        if celsius < 10 {
            TemperatureBand::Cold
        } else if celsius > 40 {
            TemperatureBand::Hot
        } else {
            TemperatureBand::Normal
        }
    }

    const fn index(&self) -> usize {
        match self {
            TemperatureBand::Cold => 0,
            TemperatureBand::Normal => 1,
            TemperatureBand::Hot => 2,
        }
    }
}

/// Waveform parameters for one panel size at one temperature band.
///
/// Stages 1 and 3 are staggered sweeps: `repeat` passes, each activating windows of `block`
/// consecutive lines that advance by `step` lines. Stage 2 alternates `t1` ms of black frames and
/// `t2` ms of white frames, `repeat` times.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compensation {
    pub stage1_repeat: u16,
    pub stage1_step: u16,
    pub stage1_block: u16,
    pub stage2_repeat: u16,
    pub stage2_t1: u16,
    pub stage2_t2: u16,
    pub stage3_repeat: u16,
    pub stage3_step: u16,
    pub stage3_block: u16,
}

impl Compensation {
    const fn new(
        stage1: (u16, u16, u16),
        stage2: (u16, u16, u16),
        stage3: (u16, u16, u16),
    ) -> Self {
        Compensation {
            stage1_repeat: stage1.0,
            stage1_step: stage1.1,
            stage1_block: stage1.2,
            stage2_repeat: stage2.0,
            stage2_t1: stage2.1,
            stage2_t2: stage2.2,
            stage3_repeat: stage3.0,
            stage3_step: stage3.1,
            stage3_block: stage3.2,
        }
    }

    /// Looks up the parameters for `size` at `celsius`.
    pub const fn select(size: PanelSize, celsius: i32) -> Self {
        Self::for_band(size, TemperatureBand::from_celsius(celsius))
    }

    pub const fn for_band(size: PanelSize, band: TemperatureBand) -> Self {
        let table = match size {
            PanelSize::Epd1in44 => &COMPENSATION_1IN44,
            PanelSize::Epd2in0 => &COMPENSATION_2IN0,
            PanelSize::Epd2in7 => &COMPENSATION_2IN7,
        };
        table[band.index()]
    }
}

const COMPENSATION_1IN44: [Compensation; 3] = [
    Compensation::new((2, 6, 42), (4, 392, 392), (2, 6, 42)),
    Compensation::new((4, 2, 16), (4, 155, 155), (4, 2, 16)),
    Compensation::new((4, 2, 16), (4, 155, 155), (4, 2, 16)),
];

const COMPENSATION_2IN0: [Compensation; 3] = [
    Compensation::new((2, 6, 42), (4, 392, 392), (2, 6, 42)),
    Compensation::new((2, 2, 48), (4, 196, 196), (2, 2, 48)),
    Compensation::new((4, 2, 48), (4, 196, 196), (4, 2, 48)),
];

const COMPENSATION_2IN7: [Compensation; 3] = [
    Compensation::new((2, 8, 64), (4, 392, 392), (2, 8, 64)),
    Compensation::new((2, 8, 64), (4, 196, 196), (2, 8, 64)),
    Compensation::new((4, 8, 64), (4, 196, 196), (4, 8, 64)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(TemperatureBand::from_celsius(i32::MIN), TemperatureBand::Cold);
        assert_eq!(TemperatureBand::from_celsius(9), TemperatureBand::Cold);
        assert_eq!(TemperatureBand::from_celsius(10), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::from_celsius(40), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::from_celsius(41), TemperatureBand::Hot);
        assert_eq!(TemperatureBand::from_celsius(i32::MAX), TemperatureBand::Hot);
    }

    #[test]
    fn test_select_matches_table() {
        let cold = Compensation::select(PanelSize::Epd2in0, -5);
        assert_eq!(cold.stage2_t1, 392);
        assert_eq!(cold.stage1_block, 42);

        let normal = Compensation::select(PanelSize::Epd2in0, 25);
        assert_eq!(normal.stage1_repeat, 2);
        assert_eq!(normal.stage3_block, 48);

        let hot = Compensation::select(PanelSize::Epd2in7, 45);
        assert_eq!(hot.stage1_repeat, 4);
        assert_eq!(hot.stage3_step, 8);
    }

    #[test]
    fn test_tables_are_well_formed() {
        for size in [PanelSize::Epd1in44, PanelSize::Epd2in0, PanelSize::Epd2in7] {
            for band in [TemperatureBand::Cold, TemperatureBand::Normal, TemperatureBand::Hot] {
                let c = Compensation::for_band(size, band);
                assert!(c.stage1_repeat >= 1 && c.stage3_repeat >= 1 && c.stage2_repeat >= 1);
                assert!(c.stage1_step >= 1 && c.stage3_step >= 1);
                // Windows must overlap or touch, otherwise rows between them are never driven.
                assert!(c.stage1_block >= c.stage1_step, "{:?} {:?}", size, band);
                assert!(c.stage3_block >= c.stage3_step, "{:?} {:?}", size, band);
            }
        }
    }
}
