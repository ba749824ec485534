//! This example tests the Pervasive Displays 2.0" G2 COG driver using a Raspberry Pi Pico board.

#![no_std]
#![no_main]

mod hw;

use defmt::{error, expect, info};
use embassy_executor::Spawner;
use embassy_rp::spi::{self, Spi};
use embassy_time::{Instant, Timer};
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyle};
use epd_pervasive::buffer::Epd2in0Buffer;
use epd_pervasive::panel::PanelSize;
use epd_pervasive::{
    EpdG2, Status, RECOMMENDED_SPI_HZ, RECOMMENDED_SPI_PHASE, RECOMMENDED_SPI_POLARITY,
};
use hw::*;
use {defmt_rtt as _, panic_probe as _};

/// Used until a temperature sensor is wired up.
const AMBIENT_CELSIUS: i32 = 22;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let resources = split_resources!(p);
    let mut config = spi::Config::default();
    config.frequency = RECOMMENDED_SPI_HZ;
    // embassy-rp has its own phase and polarity enums, so we have to map these.
    config.phase = match RECOMMENDED_SPI_PHASE {
        embedded_hal::spi::Phase::CaptureOnFirstTransition => spi::Phase::CaptureOnFirstTransition,
        embedded_hal::spi::Phase::CaptureOnSecondTransition => {
            spi::Phase::CaptureOnSecondTransition
        }
    };
    config.polarity = match RECOMMENDED_SPI_POLARITY {
        embedded_hal::spi::Polarity::IdleHigh => spi::Polarity::IdleHigh,
        embedded_hal::spi::Polarity::IdleLow => spi::Polarity::IdleLow,
    };

    // The COG is read back during power up, so the bus needs both directions.
    let mut spi = Spi::new_blocking(
        resources.spi_hw.spi,
        resources.spi_hw.clk,
        resources.spi_hw.tx,
        resources.spi_hw.rx,
        config,
    );
    let mut epd = EpdG2::new(PanelSize::Epd2in0, DisplayHw::new(resources.epd_hw));
    epd.set_temperature(AMBIENT_CELSIUS);

    let mut buffer: Epd2in0Buffer = epd.new_buffer();
    let mut style = TextStyle::default();
    style.alignment = Alignment::Left;
    style.baseline = Baseline::Top;
    let character_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let text = Text::with_text_style("Hello, COG!", Point::new(10, 10), character_style, style);
    text.draw(&mut buffer).unwrap();

    info!("Powering up EPD");
    let status = expect!(epd.power_up(&mut spi), "Failed to power up EPD");
    if status != Status::Ok {
        error!("EPD failed to power up: {}", status);
        return;
    }

    info!("Clearing EPD");
    expect!(epd.clear(&mut spi), "Failed to clear EPD");

    info!("Displaying text");
    let before_update = Instant::now();
    expect!(epd.update(&mut spi, buffer.data()), "Failed to display text");
    info!(
        "Text displayed in {} ms",
        (Instant::now() - before_update).as_millis()
    );

    info!("Powering down EPD");
    let status = expect!(epd.power_down(&mut spi), "Failed to power down EPD");
    if status != Status::Ok {
        error!("EPD did not power down cleanly: {}", status);
    }
    Timer::after_secs(10).await;

    info!("Drawing check buffer");
    buffer
        .fill_solid(&buffer.bounding_box(), BinaryColor::Off)
        .unwrap();
    let mut top_left = Point::new(0, 0);
    let buffer_height = buffer.bounding_box().size.height;
    let mut box_size = buffer_height / 2;
    let mut color = BinaryColor::On;
    while box_size > 2 {
        while top_left.x < buffer.bounding_box().size.width as i32 {
            buffer
                .fill_solid(
                    &Rectangle::new(top_left, Size::new(box_size, box_size)),
                    color,
                )
                .unwrap();
            color = color.invert();
            top_left.x += box_size as i32;
        }
        top_left.x = 0;
        top_left.y += box_size as i32;
        box_size /= 2;
    }

    // The panel must not stay powered between updates.
    info!("Powering up EPD");
    if expect!(epd.power_up(&mut spi), "Failed to power up EPD") == Status::Ok {
        info!("Displaying check buffer");
        expect!(
            epd.update(&mut spi, buffer.data()),
            "Failed to display check buffer"
        );
    }
    expect!(epd.power_down(&mut spi), "Failed to power down EPD");
    info!("Done");
}
