//! Board-specific I²C bus numbering.
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Boards the display is known to be wired to.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Board {
    /// Intel Edison on the Arduino breakout. The shield header is wired to bus 6.
    #[default]
    EdisonArduino,
    /// Intel Edison on the mini breakout.
    EdisonMini,
    /// Any Raspberry Pi with the header pins 3/5 as SDA/SCL.
    RaspberryPi,
}

impl Board {
    /// Gets the `/dev/i2c-N` number the display header is wired to.
    pub fn bus(&self) -> u8 {
        match self {
            Board::EdisonArduino => 6,
            Board::EdisonMini | Board::RaspberryPi => 1,
        }
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Board::EdisonArduino => "edison-arduino",
            Board::EdisonMini => "edison-mini",
            Board::RaspberryPi => "raspberry-pi",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown board: {0}")]
pub struct UnknownBoard(pub String);

impl FromStr for Board {
    type Err = UnknownBoard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edison-arduino" | "edison" | "arduino" => Ok(Board::EdisonArduino),
            "edison-mini" => Ok(Board::EdisonMini),
            "raspberry-pi" | "rpi" => Ok(Board::RaspberryPi),
            _ => Err(UnknownBoard(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arduino_breakout_uses_bus_six() {
        assert_eq!(Board::EdisonArduino.bus(), 6);
        assert_eq!(Board::EdisonMini.bus(), 1);
        assert_eq!(Board::RaspberryPi.bus(), 1);
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("edison-arduino".parse(), Ok(Board::EdisonArduino));
        assert_eq!(" RPI ".parse(), Ok(Board::RaspberryPi));
        assert_eq!("edison-mini".parse(), Ok(Board::EdisonMini));
        assert_eq!("beaglebone".parse::<Board>(), Err(UnknownBoard("beaglebone".into())));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for board in [Board::EdisonArduino, Board::EdisonMini, Board::RaspberryPi] {
            assert_eq!(board.to_string().parse(), Ok(board));
        }
    }
}
