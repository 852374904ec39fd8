use crate::command::*;
use crate::glyph::{custom_char, GlyphPattern};
use crate::{DisplayState, LcdError, LcdResult};
use log::{debug, trace, warn};
use rgblcd_i2c::{Delay, Endpoint, I2cBus, I2cError, I2cResult, ThreadDelay};
use std::time::Duration;

/// Default address of the text controller.
pub const TEXT_ADDRESS: u8 = 0x3E;
/// Default address of the backlight controller.
pub const BACKLIGHT_ADDRESS: u8 = 0x62;

/// The text controller ignores commands sent earlier than this after power-up.
pub const POWER_ON_SETTLE: Duration = Duration::from_millis(50);
/// Gap between the bring-up commands.
pub const COMMAND_SETTLE: Duration = Duration::from_micros(100);
/// Return-home is slow; the next command is corrupted if sent sooner.
pub const HOME_SETTLE: Duration = Duration::from_millis(2);
/// Waited before writing text so a preceding clear has drained.
pub const WRITE_SETTLE: Duration = Duration::from_millis(1);

/// Number of cells per line.
pub const LINE_WIDTH: u8 = 16;
/// Highest valid position; `0..16` is line 1, `16..32` line 2.
pub const MAX_POSITION: u8 = 2 * LINE_WIDTH - 1;
/// Highest CGRAM glyph slot.
pub const MAX_GLYPH_SLOT: u8 = 7;

/// Driver for the JHD1313M1 16x2 RGB-backlit LCD.
///
/// The display is two I²C devices on one bus: the text controller at [TEXT_ADDRESS] and the
/// backlight controller at [BACKLIGHT_ADDRESS]. Neither is buffered here; every call turns into
/// bus transactions right away and the chip keeps the cursor and colour.
///
/// # Lifecycle
///
/// ```text
/// Uninitialized --start--> Initializing --> Ready --close--> Closed
///       ^                       |
///       +--- unreachable -------+ (step 1 only)
/// ```
///
/// A failed [Self::start] past the point of opening the endpoints leaves the driver in
/// [DisplayState::Initializing]; call `start` again before anything else.
///
/// # Concurrency
///
/// Everything but `start` and `close` takes `&self`, so a started display can be shared between
/// threads. Exclusion is entirely the bus's job; interleaving two callers' text is not prevented.
#[derive(Debug)]
pub struct Jhd1313m1<'a> {
    bus: &'a dyn I2cBus,
    delay: &'a dyn Delay,
    text_address: u8,
    backlight_address: u8,
    text: Option<Endpoint>,
    backlight: Option<Endpoint>,
    state: DisplayState,
}

impl<'a> Jhd1313m1<'a> {
    pub fn new(bus: &'a dyn I2cBus) -> Self {
        Self::with_delay(bus, &ThreadDelay)
    }

    /// Creates a driver that waits through `delay` instead of sleeping the thread.
    pub fn with_delay(bus: &'a dyn I2cBus, delay: &'a dyn Delay) -> Self {
        Jhd1313m1 {
            bus,
            delay,
            text_address: TEXT_ADDRESS,
            backlight_address: BACKLIGHT_ADDRESS,
            text: None,
            backlight: None,
            state: DisplayState::Uninitialized,
        }
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn text_address(&self) -> u8 {
        self.text_address
    }

    pub fn backlight_address(&self) -> u8 {
        self.backlight_address
    }

    /// Brings the display into a known state: 2 lines, display on, cleared, left-to-right entry,
    /// white backlight.
    ///
    /// # Errors
    /// - [LcdError::DeviceUnreachable] if either endpoint cannot be opened. Nothing stays open and
    ///   the state is [DisplayState::Uninitialized].
    /// - [LcdError::InitializationFailed] if the function set command fails twice.
    /// - [LcdError::Bus] for any later failure; the state stays [DisplayState::Initializing].
    /// - [LcdError::NotReady] if the driver was closed.
    pub fn start(&mut self) -> LcdResult<()> {
        if self.state == DisplayState::Closed {
            return Err(LcdError::NotReady(self.state));
        }

        debug!("Starting JHD1313M1 on {:?}", self.bus);
        self.open_endpoints()?;
        self.state = DisplayState::Initializing;

        self.delay.delay(POWER_ON_SETTLE);

        // The first command after power-up is not always acknowledged.
        let function_set = FUNCTION_SET | TWO_LINE;
        if let Err(err) = self.command(function_set) {
            warn!("Function set failed ({}), retrying once", err);
            self.command(function_set)
                .map_err(LcdError::InitializationFailed)?;
        }

        self.delay.delay(COMMAND_SETTLE);
        self.command(DISPLAY_CONTROL | DISPLAY_ON)?;

        self.delay.delay(COMMAND_SETTLE);
        self.command(CLEAR_DISPLAY)?;

        self.command(ENTRY_MODE_SET | ENTRY_LEFT | ENTRY_SHIFT_DECREMENT)?;

        for (register, value) in BACKLIGHT_BRING_UP {
            self.set_register(register, value)?;
        }
        self.write_rgb(255, 255, 255)?;

        self.state = DisplayState::Ready;
        debug!("JHD1313M1 ready");
        Ok(())
    }

    /// Releases both endpoints. Calling it again does nothing.
    ///
    /// The driver is [DisplayState::Closed] afterwards even if releasing an endpoint failed.
    pub fn close(&mut self) -> LcdResult<()> {
        if self.state == DisplayState::Closed {
            return Ok(());
        }
        self.state = DisplayState::Closed;

        let released = self.release_endpoints();
        debug!("JHD1313M1 closed");
        Ok(released?)
    }

    /// Clears the display and returns the cursor home.
    pub fn clear(&self) -> LcdResult<()> {
        self.ensure_ready()?;
        Ok(self.command(CLEAR_DISPLAY)?)
    }

    /// Returns the cursor home and waits [HOME_SETTLE].
    pub fn home(&self) -> LcdResult<()> {
        self.ensure_ready()?;
        let result = self.command(RETURN_HOME);
        self.delay.delay(HOME_SETTLE);
        Ok(result?)
    }

    /// Writes text starting at the current cursor.
    ///
    /// `'\n'` moves to the start of line 2 instead of printing. Characters `'\u{0}'..='\u{7}'`
    /// display the custom glyph in that slot, other characters up to `'\u{ff}'` are sent as their
    /// code point, and anything above is replaced by `'?'`. Each character is its own transaction.
    pub fn write(&self, text: &str) -> LcdResult<()> {
        self.ensure_ready()?;
        self.delay.delay(WRITE_SETTLE);

        for c in text.chars() {
            if c == '\n' {
                self.position(LINE_WIDTH)?;
                continue;
            }
            self.data(&[encode(c)])?;
        }
        Ok(())
    }

    /// Moves the cursor to `pos`, where `0..=15` is line 1 and `16..=31` is line 2.
    ///
    /// # Errors
    /// - [LcdError::InvalidPosition] if `pos > 31`; nothing is sent.
    pub fn set_position(&self, pos: u8) -> LcdResult<()> {
        self.ensure_ready()?;
        self.position(pos)
    }

    /// Moves the cursor to `col` on `row` (both zero-based).
    ///
    /// # Errors
    /// - [LcdError::InvalidCursor] if `row > 1` or `col > 15`; nothing is sent.
    pub fn set_cursor(&self, row: u8, col: u8) -> LcdResult<()> {
        if row >= 2 || col >= LINE_WIDTH {
            return Err(LcdError::InvalidCursor { row, col });
        }
        self.set_position(row * LINE_WIDTH + col)
    }

    /// Sets the backlight colour, one register per channel in red, green, blue order.
    ///
    /// A failure aborts the remaining channels without undoing the ones already written.
    pub fn set_rgb(&self, r: u8, g: u8, b: u8) -> LcdResult<()> {
        self.ensure_ready()?;
        Ok(self.write_rgb(r, g, b)?)
    }

    /// Shifts the whole display by one cell. `true` moves the contents left.
    pub fn scroll(&self, left_to_right: bool) -> LcdResult<()> {
        self.ensure_ready()?;
        let direction = if left_to_right { MOVE_LEFT } else { MOVE_RIGHT };
        Ok(self.command(CURSOR_SHIFT | DISPLAY_MOVE | direction)?)
    }

    /// Turns the display, the underline cursor and cursor blinking on or off.
    pub fn set_display_control(
        &self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        self.ensure_ready()?;
        let mut command = DISPLAY_CONTROL;
        if display_on {
            command |= DISPLAY_ON;
        }
        if cursor_on {
            command |= CURSOR_ON;
        }
        if blink_on {
            command |= BLINK_ON;
        }
        Ok(self.command(command)?)
    }

    /// Programs CGRAM glyph `slot` with `pattern`.
    ///
    /// Write the slot number as a character (e.g. `"\u{1}"`) to show it. Leaves the controller
    /// addressing CGRAM, so position the cursor before writing text again.
    ///
    /// # Errors
    /// - [LcdError::InvalidGlyphSlot] if `slot > 7`; nothing is sent.
    pub fn set_custom_char(&self, slot: u8, pattern: &GlyphPattern) -> LcdResult<()> {
        self.ensure_ready()?;
        if slot > MAX_GLYPH_SLOT {
            return Err(LcdError::InvalidGlyphSlot(slot));
        }

        self.command(SET_CGRAM_ADDRESS | (slot << 3))?;
        Ok(self.data(pattern)?)
    }

    /// Programs `slot` with one of the [crate::CUSTOM_CHARS] patterns.
    pub fn set_custom_char_named(&self, slot: u8, name: &str) -> LcdResult<()> {
        let pattern = custom_char(name).ok_or_else(|| LcdError::UnknownGlyph(name.to_string()))?;
        self.set_custom_char(slot, pattern)
    }

    fn ensure_ready(&self) -> LcdResult<()> {
        match self.state {
            DisplayState::Ready => Ok(()),
            state => Err(LcdError::NotReady(state)),
        }
    }

    fn open_endpoints(&mut self) -> LcdResult<()> {
        let opened = self.bus.open(self.text_address).and_then(|text| {
            self.text = Some(text);
            self.bus.open(self.backlight_address)
        });

        match opened {
            Ok(backlight) => {
                self.backlight = Some(backlight);
                Ok(())
            }
            Err(err) => {
                // Endpoints from an earlier, half-finished start are released too.
                // Close failures are already logged and the open error takes precedence.
                self.release_endpoints().ok();
                self.state = DisplayState::Uninitialized;
                Err(LcdError::DeviceUnreachable(err))
            }
        }
    }

    /// Closes every endpoint still held, returning the first failure.
    fn release_endpoints(&mut self) -> I2cResult<()> {
        let mut result = Ok(());
        for endpoint in [self.text.take(), self.backlight.take()].into_iter().flatten() {
            if let Err(err) = self.bus.close(&endpoint) {
                warn!("Could not release {}: {}", endpoint, err);
                result = result.and(Err(err));
            }
        }
        result
    }

    fn position(&self, pos: u8) -> LcdResult<()> {
        if pos > MAX_POSITION {
            return Err(LcdError::InvalidPosition(pos));
        }
        Ok(self.command(SET_DDRAM_ADDRESS | ddram_address(pos))?)
    }

    fn write_rgb(&self, r: u8, g: u8, b: u8) -> I2cResult<()> {
        self.set_register(REG_RED, r)?;
        self.set_register(REG_GREEN, g)?;
        self.set_register(REG_BLUE, b)
    }

    fn set_register(&self, register: u8, value: u8) -> I2cResult<()> {
        trace!("Backlight register {:#04x} = {:#04x}", register, value);
        self.bus
            .write(&endpoint(self.backlight, self.backlight_address)?, &[register, value])
            .map(|_| ())
    }

    fn command(&self, command: u8) -> I2cResult<()> {
        trace!("Sending command: {:08b}", command);
        self.bus
            .write(&endpoint(self.text, self.text_address)?, &[COMMAND_PREFIX, command])
            .map(|_| ())
    }

    fn data(&self, data: &[u8]) -> I2cResult<()> {
        trace!("Sending data: {:02x?}", data);
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(DATA_PREFIX);
        frame.extend_from_slice(data);
        self.bus
            .write(&endpoint(self.text, self.text_address)?, &frame)
            .map(|_| ())
    }
}

fn endpoint(endpoint: Option<Endpoint>, address: u8) -> I2cResult<Endpoint> {
    endpoint.ok_or(I2cError::EndpointClosed { address })
}

/// DDRAM address of a cursor position. Line 2 starts at [LINE_TWO_OFFSET], not right after line 1.
pub fn ddram_address(pos: u8) -> u8 {
    if pos < LINE_WIDTH {
        pos
    } else {
        (pos - LINE_WIDTH) | LINE_TWO_OFFSET
    }
}

fn encode(c: char) -> u8 {
    u8::try_from(c).unwrap_or_else(|_| {
        warn!("Character {:?} has no display code, sending '?'", c);
        b'?'
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_two_starts_at_the_offset() {
        assert_eq!(ddram_address(0), 0x00);
        assert_eq!(ddram_address(15), 0x0F);
        assert_eq!(ddram_address(16), 0x40);
        assert_eq!(ddram_address(31), 0x4F);
    }

    #[test]
    fn latin1_is_sent_as_is() {
        assert_eq!(encode('a'), b'a');
        assert_eq!(encode('\u{3}'), 3);
        assert_eq!(encode('\u{ff}'), 0xFF);
        assert_eq!(encode('€'), b'?');
    }
}
