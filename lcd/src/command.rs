//! Byte values understood by the two controllers.
//!
//! Text controller commands are HD44780 instructions; each is sent after [COMMAND_PREFIX], and
//! character/glyph bytes after [DATA_PREFIX].

/// Clears DDRAM and returns the cursor home.
pub const CLEAR_DISPLAY: u8 = 0b0000_0001;
/// Returns the cursor and any display shift home. Needs [crate::HOME_SETTLE] afterwards.
pub const RETURN_HOME: u8 = 0b0000_0010;

pub const ENTRY_MODE_SET: u8 = 0b0000_0100;
pub const ENTRY_LEFT: u8 = 0b0000_0010;
pub const ENTRY_SHIFT_DECREMENT: u8 = 0b0000_0000;

pub const DISPLAY_CONTROL: u8 = 0b0000_1000;
pub const DISPLAY_ON: u8 = 0b0000_0100;
pub const CURSOR_ON: u8 = 0b0000_0010;
pub const BLINK_ON: u8 = 0b0000_0001;

pub const CURSOR_SHIFT: u8 = 0b0001_0000;
pub const DISPLAY_MOVE: u8 = 0b0000_1000;
pub const MOVE_RIGHT: u8 = 0b0000_0100;
pub const MOVE_LEFT: u8 = 0b0000_0000;

pub const FUNCTION_SET: u8 = 0b0010_0000;
pub const TWO_LINE: u8 = 0b0000_1000;

/// Low 6 bits select the CGRAM row; glyph `n` starts at `n << 3`.
pub const SET_CGRAM_ADDRESS: u8 = 0b0100_0000;
/// Low 7 bits select the DDRAM cell.
pub const SET_DDRAM_ADDRESS: u8 = 0b1000_0000;

/// Control byte announcing an instruction.
pub const COMMAND_PREFIX: u8 = 0x80;
/// Control byte announcing data (characters or CGRAM rows).
pub const DATA_PREFIX: u8 = 0x40;

/// DDRAM address of the first cell of line 2.
pub const LINE_TWO_OFFSET: u8 = 0x40;

// Backlight controller registers.
pub const REG_MODE1: u8 = 0x00;
pub const REG_MODE2: u8 = 0x01;
pub const REG_BLUE: u8 = 0x02;
pub const REG_GREEN: u8 = 0x03;
pub const REG_RED: u8 = 0x04;
/// LED driver output state. `0xAA` puts all four outputs under individual PWM control.
pub const REG_OUTPUT: u8 = 0x08;

/// Register writes that bring the backlight controller out of reset, in order.
pub const BACKLIGHT_BRING_UP: [(u8, u8); 3] = [
    (REG_MODE1, 0x00),
    (REG_MODE2, 0x00),
    (REG_OUTPUT, 0xAA),
];
