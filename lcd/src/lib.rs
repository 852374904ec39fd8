//! Driver for the JHD1313M1 two-chip RGB character LCD (Grove LCD RGB Backlight).
//!
//! The module carries two I²C devices: an HD44780-compatible text controller and a PCA9633-style
//! backlight controller. See [Jhd1313m1] for the driver and [command] for the raw byte values.
pub mod command;
pub mod glyph;
mod jhd1313m1;

use rgblcd_i2c::I2cError;
use thiserror::Error;

pub use glyph::{custom_char, GlyphPattern, CUSTOM_CHARS};
pub use jhd1313m1::*;

/// Lifecycle of a [Jhd1313m1] instance.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DisplayState {
    /// Constructed, nothing opened yet. Also the state after a failed attempt to reach the display.
    #[default]
    Uninitialized,
    /// The handshake started but did not finish. Only [Jhd1313m1::start] may be called.
    Initializing,
    Ready,
    /// Endpoints released. Terminal.
    Closed,
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("display unreachable: {0}")]
    DeviceUnreachable(#[source] I2cError),
    #[error("display did not accept the function set command: {0}")]
    InitializationFailed(#[source] I2cError),
    #[error("invalid position {0}, expected 0..=31")]
    InvalidPosition(u8),
    #[error("invalid cursor row {row} column {col}, expected row 0..=1 and column 0..=15")]
    InvalidCursor { row: u8, col: u8 },
    #[error("invalid glyph slot {0}, expected 0..=7")]
    InvalidGlyphSlot(u8),
    #[error("unknown glyph {0:?}")]
    UnknownGlyph(String),
    #[error("display is not ready ({0:?})")]
    NotReady(DisplayState),
    #[error(transparent)]
    Bus(#[from] I2cError),
}

pub type LcdResult<T> = Result<T, LcdError>;
