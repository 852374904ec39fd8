use dotenv::var;
use eyre::WrapErr;
use rgblcd_i2c::Board;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub board: Board,
    /// Overrides the board's bus number.
    pub bus: Option<u8>,
    pub backlight: [u8; 3],
    /// Text to show; `\n` starts the second line.
    pub message: String,
    /// Built-in glyph names uploaded to CGRAM slots 0, 1, ... before writing.
    pub glyphs: Vec<String>,
    /// How long to show a clock on the second line, 0 to skip it.
    pub clock_seconds: u64,
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("config.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    /// Applies `RGBLCD_BOARD` and `RGBLCD_BUS` from the environment (or `.env`).
    pub fn apply_env(&mut self) -> eyre::Result<()> {
        self.apply_overrides(var("RGBLCD_BOARD").ok(), var("RGBLCD_BUS").ok())
    }

    fn apply_overrides(&mut self, board: Option<String>, bus: Option<String>) -> eyre::Result<()> {
        if let Some(board) = board {
            self.board = board.parse()?;
        }
        if let Some(bus) = bus {
            self.bus = Some(
                bus.trim()
                    .parse()
                    .wrap_err_with(|| format!("Invalid RGBLCD_BUS {:?}", bus))?,
            );
        }
        Ok(())
    }

    pub fn bus_number(&self) -> u8 {
        self.bus.unwrap_or_else(|| self.board.bus())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            board: Board::default(),
            bus: None,
            backlight: [255, 255, 255],
            message: "Hello,\nworld!".to_string(),
            glyphs: Vec::new(),
            clock_seconds: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{ "board": "raspberry-pi" }"#).unwrap();
        assert_eq!(config.board, Board::RaspberryPi);
        assert_eq!(config.backlight, [255, 255, 255]);
        assert_eq!(config.bus_number(), 1);
    }

    #[test]
    fn parses_a_full_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "board": "edison-arduino",
                "bus": 2,
                "backlight": [40, 100, 10],
                "message": "caf\u0000\n:)",
                "glyphs": ["é"],
                "clock_seconds": 5
            }"#,
        )
        .unwrap();
        assert_eq!(config.bus_number(), 2);
        assert_eq!(config.message, "caf\u{0}\n:)");
        assert_eq!(config.glyphs, vec!["é".to_string()]);
    }

    #[test]
    fn environment_overrides_the_file() {
        let mut config = Config::default();
        assert_eq!(config.bus_number(), 6);

        config
            .apply_overrides(Some("rpi".into()), None)
            .unwrap();
        assert_eq!(config.bus_number(), 1);

        config.apply_overrides(None, Some(" 3 ".into())).unwrap();
        assert_eq!(config.bus_number(), 3);
    }

    #[test]
    fn bad_overrides_are_errors() {
        let mut config = Config::default();
        assert!(config.apply_overrides(Some("toaster".into()), None).is_err());
        assert!(config.apply_overrides(None, Some("300".into())).is_err());
    }
}
