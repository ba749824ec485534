#![no_std]

use core::convert::Infallible;

use embassy_rp::spi;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, defmt::Format)]
pub enum Error {
    #[error("SPI error: {0:?}")]
    SpiError(spi::Error),
}

impl From<Infallible> for Error {
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

impl From<spi::Error> for Error {
    fn from(e: spi::Error) -> Self {
        Error::SpiError(e)
    }
}
