mod config;

use crate::config::Config;
use dotenv::dotenv;
use log::{debug, info};
use rgblcd::Jhd1313m1;
use rgblcd_i2c::LinuxI2cBus;
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;
use time::macros::format_description;
use time::OffsetDateTime;

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "rgblcd demo on {} (kernel {})",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );

    let mut config = Config::try_load().unwrap_or_else(|| {
        info!("Config not found. Using default");
        Config::default()
    });
    config.apply_env()?;
    debug!("{:?}", config);

    let bus = LinuxI2cBus::new(config.bus_number());
    info!("LCD @ {:?}, board {}", bus, config.board);

    let mut lcd = Jhd1313m1::new(&bus);
    lcd.start()?;

    for (slot, name) in config.glyphs.iter().enumerate() {
        let slot = u8::try_from(slot)?;
        lcd.set_custom_char_named(slot, name)?;
    }

    let [r, g, b] = config.backlight;
    lcd.set_rgb(r, g, b)?;
    lcd.clear()?;
    lcd.write(&config.message)?;

    let clock_format = format_description!("[hour]:[minute]:[second]");
    for _ in 0..config.clock_seconds {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        lcd.set_cursor(1, 8)?;
        lcd.write(&now.format(clock_format)?)?;
        sleep(Duration::from_secs(1));
    }

    lcd.close()?;
    info!("Done.");
    Ok(())
}
