#![cfg_attr(not(test), no_std)]


pub use rtcc::{
  DateTimeAccess, NaiveDate, NaiveDateTime, Datelike, Timelike,
};

use core::fmt;

use embedded_hal::blocking::i2c::{Write, Read, WriteRead};

// Fixed i2c bus address of the device (7-bit)
const DS1307_ADDRESS: u8 = 0xD0 >> 1;

// Register addresses
const REG_SECONDS: u8 = 0x00;
const REG_MINUTES: u8 = 0x01;
const REG_HOURS: u8 = 0x02;

// Holds the current day of the week, 01 to 07.
// The chip only increments this counter at midnight and attaches no
// meaning to any particular value, so this driver stores weekday + 1
// and recomputes the weekday from the date on every read.
const REG_WEEKDAY: u8 = 0x03;

// Holds the current day of the month, in two binary coded decimal (BCD) digits.
// Values will range from 01 to 31. The chip handles leap years from 2000 to 2099.
const REG_DATE: u8 = 0x04;

// Holds the current month, in two binary coded decimal (BCD) digits.
// Values will range from 01 to 12.
const REG_MONTH: u8 = 0x05;
const REG_YEAR: u8 = 0x06;

// Controls the SQW/OUT pin: output level, square wave enable and rate.
const REG_CONTROL: u8 = 0x07;

// Battery-backed NVRAM occupies 0x08..=0x3F. The driver addresses it with
// logical offsets 0..55 so the clock registers below 0x08 stay out of reach.
const NVRAM_BASE: u8 = 0x08;

/// Usable NVRAM capacity in bytes.
pub const NVRAM_SIZE: u8 = 56;

// REG_SECONDS bit 7: oscillator halt (CH). Set to stop the clock.
const CLOCK_HALT_BIT: u8 = 1 << 7;

// REG_HOURS value bits in 24h mode; bit 6 selects 12h mode and is never set
// by this driver.
const HOURS_VALUE_MASK: u8 = 0x3F;

// REG_CONTROL bits
pub const OUTPUT_LEVEL_BIT: u8 = 1 << 7; // OUT
pub const SQUARE_WAVE_ENABLE_BIT: u8 = 1 << 4; // SQWE
const SQUARE_WAVE_RATE_MASK: u8 = 0b0000_0011; // RS1:RS0

// NVRAM logical layout:
// offset 0          clock-is-set token
// offset 1          weekday alarm enable mask, bit i = weekday i
// offsets 2..=8     alarm code per weekday, 0xFF = no alarm stored
const RAM_TIME_SET_TOKEN_OFFSET: u8 = 0;
const RAM_ALARM_BLOCK_OFFSET: u8 = 1;

// Token distinguishing "clock was explicitly initialized" from power-on garbage
const TIME_SET_TOKEN: u8 = 0xA5;

/// Stored in an alarm code slot when no alarm is set for that weekday.
pub const ALARM_CODE_UNSET: u8 = 0xFF;

// Weekday alarms are encoded as counts of 5-minute steps past 04:00.
const ALARM_BASE_HOUR: u8 = 4;
const ALARM_LAST_HOUR: u8 = 20;
const ALARM_CODES_PER_HOUR: u8 = 12;

/// Square wave output rate selection (RS1:RS0)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SquareWaveRate {
  Hz1 = 0b00,
  Hz4096 = 0b01,
  Hz8192 = 0b10,
  Hz32768 = 0b11,
}

/// A fully consistent date/time reading.
///
/// All fields are recomputed together by the named constructors; there is no
/// way to change a single field and leave the derived ones stale.
/// Supported calendar range is 2000-01-01 through 2099-12-31 for dates, and
/// `epoch_seconds` covers 2000-01-01 00:00:00 up to 2136-02-07 06:28:15
/// before wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockReading {
  pub second: u8,
  pub minute: u8,
  pub hour: u8,
  /// Day of week, 0 = Sunday .. 6 = Saturday
  pub weekday: u8,
  pub day: u8,
  pub month: u8,
  /// Full four digit year
  pub year: u16,
  /// Day number within the year, 1st of January = 1
  pub year_day: u16,
  /// Days since 2000-01-01, which has century day number 0 (a Saturday)
  pub century_day: u16,
  /// Seconds since 2000-01-01 00:00:00
  pub epoch_seconds: u32,
}

impl ClockReading {
  /// Midnight on the given calendar date.
  /// Arguments are not range checked; `month` is 1..=12 and `day` starts at 1.
  pub fn from_ymd(year: u16, month: u8, day: u8) -> Self {
    let year_day = Self::year_day_for(year, month, day);
    let century_day = Self::century_day_for(year, year_day);
    let weekday = ((century_day + 6) % 7) as u8;
    let mut reading = ClockReading {
      second: 0,
      minute: 0,
      hour: 0,
      weekday,
      day,
      month,
      year,
      year_day,
      century_day,
      epoch_seconds: 0,
    };
    reading.epoch_seconds = reading.seconds_since_2000();
    reading
  }

  /// Copy of this reading with the time of day replaced.
  /// Date fields are untouched; the flat timestamp is recomputed.
  pub fn with_hms(mut self, hour: u8, minute: u8, second: u8) -> Self {
    self.hour = hour;
    self.minute = minute;
    self.second = second;
    self.epoch_seconds = self.seconds_since_2000();
    self
  }

  /// Midnight on the day `century_day` days after 2000-01-01.
  pub fn from_century_day(century_day: u16) -> Self {
    let mut remaining = century_day;
    let mut year = 2000;
    loop {
      let days_this_year = 365 + u16::from(Self::is_leap_year(year));
      if remaining >= days_this_year {
        remaining -= days_this_year;
        year += 1;
      } else {
        break;
      }
    }
    let year_day = remaining + 1;
    let month = Self::month_for(year, year_day);
    let day = Self::day_for(year, month, year_day);
    let weekday = ((century_day + 6) % 7) as u8;
    let mut reading = ClockReading {
      second: 0,
      minute: 0,
      hour: 0,
      weekday,
      day,
      month,
      year,
      year_day,
      century_day,
      epoch_seconds: 0,
    };
    reading.epoch_seconds = reading.seconds_since_2000();
    reading
  }

  /// Reading for a flat timestamp in seconds since 2000-01-01 00:00:00.
  pub fn from_epoch_seconds(epoch_seconds: u32) -> Self {
    let mut t = epoch_seconds;
    let second = (t % 60) as u8;
    t /= 60;
    let minute = (t % 60) as u8;
    t /= 60;
    let hour = (t % 24) as u8;
    t /= 24;
    Self::from_century_day(t as u16).with_hms(hour, minute, second)
  }

  /// Gregorian leap year rule
  pub fn is_leap_year(year: u16) -> bool {
    ((year % 4 == 0) && (year % 100 != 0)) || (year % 400 == 0)
  }

  /// Parse the fixed-width strings produced by C-style `__DATE__` and
  /// `__TIME__` build macros, e.g. `"Dec 26 2009"` and `"12:34:56"`.
  /// Single digit days are space padded (`"Jul  6 2012"`).
  /// Returns `None` if either string is malformed.
  pub fn from_build_time(date: &str, time: &str) -> Option<Self> {
    let date = date.as_bytes();
    let time = time.as_bytes();
    if date.len() < 11 || time.len() < 8 {
      return None;
    }
    // Jan Feb Mar Apr May Jun Jul Aug Sep Oct Nov Dec
    let month = match (date[0], date[1], date[2]) {
      (b'J', b'a', b'n') => 1,
      (b'F', b'e', b'b') => 2,
      (b'M', b'a', b'r') => 3,
      (b'A', b'p', b'r') => 4,
      (b'M', b'a', b'y') => 5,
      (b'J', b'u', b'n') => 6,
      (b'J', b'u', b'l') => 7,
      (b'A', b'u', b'g') => 8,
      (b'S', b'e', b'p') => 9,
      (b'O', b'c', b't') => 10,
      (b'N', b'o', b'v') => 11,
      (b'D', b'e', b'c') => 12,
      _ => return None,
    };
    let day = ascii_two_digits(date[4], date[5])?;
    let year_offset = ascii_two_digits(date[9], date[10])?;
    let hour = ascii_two_digits(time[0], time[1])?;
    let minute = ascii_two_digits(time[3], time[4])?;
    let second = ascii_two_digits(time[6], time[7])?;
    if day == 0 || day > 31 || hour > 23 || minute > 59 || second > 59 {
      return None;
    }
    Some(
      Self::from_ymd(2000 + u16::from(year_offset), month, day)
        .with_hms(hour, minute, second),
    )
  }

  /// Whether this reading falls inside the Central European Summer Time
  /// window of its year: from the Sunday on or before March 30 at 02:00
  /// until the Sunday on or before October 31 at 03:00.
  pub fn is_cet_summer_time(&self) -> bool {
    let summer_start = Self::sunday_on_or_before(self.year, 3, 30).with_hms(2, 0, 0);
    let winter_start = Self::sunday_on_or_before(self.year, 10, 31).with_hms(3, 0, 0);
    summer_start.epoch_seconds <= self.epoch_seconds
      && self.epoch_seconds < winter_start.epoch_seconds
  }

  // Candidate date, backed up to the nearest Sunday in century day space
  fn sunday_on_or_before(year: u16, month: u8, day: u8) -> Self {
    let candidate = Self::from_ymd(year, month, day);
    Self::from_century_day(candidate.century_day - u16::from(candidate.weekday))
  }

  // "Robertson" day counting: treat March as the first month of a shifted
  // year so the leap day lands at the end, then correct Jan/Feb back.
  fn year_day_for(year: u16, month: u8, day: u8) -> u16 {
    let mut ydn = (u16::from(month) + 2) * 611 / 20;
    ydn += u16::from(day);
    ydn -= 91;
    if month >= 3 {
      ydn -= 2;
      ydn += u16::from(Self::is_leap_year(year));
    }
    ydn
  }

  // Days in all whole years from 2000 through year - 1, plus the year day
  fn century_day_for(year: u16, year_day: u16) -> u16 {
    let mut cdn = year_day - 1;
    let mut y = year;
    while y > 2000 {
      y -= 1;
      cdn += 365 + u16::from(Self::is_leap_year(y));
    }
    cdn
  }

  // Inverse of the Robertson formula: shift the year day as if March
  // started the year, with Jan/Feb handled by the leap correction.
  fn corrected_year_day(year: u16, year_day: u16) -> u16 {
    let leap = u16::from(Self::is_leap_year(year));
    let mut corrected = year_day;
    if corrected > 59 + leap {
      corrected += 2;
      corrected -= leap;
    }
    corrected + 91
  }

  fn month_for(year: u16, year_day: u16) -> u8 {
    (Self::corrected_year_day(year, year_day) * 20 / 611 - 2) as u8
  }

  fn day_for(year: u16, month: u8, year_day: u16) -> u8 {
    (Self::corrected_year_day(year, year_day) - (u16::from(month) + 2) * 611 / 20) as u8
  }

  fn seconds_since_2000(&self) -> u32 {
    let mut t = u32::from(self.century_day);
    t *= 24;
    t += u32::from(self.hour);
    t *= 60;
    t += u32::from(self.minute);
    t *= 60;
    t += u32::from(self.second);
    t
  }
}

impl fmt::Display for ClockReading {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
    write!(
      f,
      "{:02}:{:02}:{:02} {:02}-{:02}-{:04} {}",
      self.hour,
      self.minute,
      self.second,
      self.day,
      self.month,
      self.year,
      WEEKDAY_NAMES[usize::from(self.weekday % 7)]
    )
  }
}

fn ascii_two_digits(tens: u8, ones: u8) -> Option<u8> {
  let tens = match tens {
    b'0'..=b'9' => tens - b'0',
    b' ' => 0,
    _ => return None,
  };
  if !ones.is_ascii_digit() {
    return None;
  }
  Some(tens * 10 + (ones - b'0'))
}

/// Encode a wake-up time as a count of 5-minute steps past 04:00.
/// Accepts 04:00 through 20:59 with the minutes on a 5-minute boundary;
/// anything else is rejected.
pub fn encode_alarm_code(hour: u8, minute: u8) -> Option<u8> {
  if hour < ALARM_BASE_HOUR || hour > ALARM_LAST_HOUR || minute > 59 || minute % 5 != 0 {
    return None;
  }
  Some((hour - ALARM_BASE_HOUR) * ALARM_CODES_PER_HOUR + minute / 5)
}

/// Decode an alarm code back to (hour, minute).
pub fn decode_alarm_code(code: u8) -> (u8, u8) {
  (
    ALARM_BASE_HOUR + code / ALARM_CODES_PER_HOUR,
    (code % ALARM_CODES_PER_HOUR) * 5,
  )
}

/// In-memory image of the NVRAM alarm block: one weekday enable mask byte
/// followed by one alarm code byte per weekday.
///
/// A mask bit is set exactly when the matching code slot holds a real code;
/// the driver persists the whole block in a single bus write, so a reader
/// can never observe the mask and the codes disagreeing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmSet {
  mask: u8,
  codes: [u8; 7],
}

impl Default for AlarmSet {
  fn default() -> Self {
    AlarmSet {
      mask: 0,
      codes: [ALARM_CODE_UNSET; 7],
    }
  }
}

impl AlarmSet {
  /// Rebuild from the raw NVRAM block (mask byte first).
  pub fn from_bytes(bytes: [u8; 8]) -> Self {
    let mut codes = [0u8; 7];
    codes.copy_from_slice(&bytes[1..]);
    AlarmSet {
      mask: bytes[0] & 0x7F,
      codes,
    }
  }

  /// Raw NVRAM block image, mask byte first.
  pub fn to_bytes(&self) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[0] = self.mask;
    bytes[1..].copy_from_slice(&self.codes);
    bytes
  }

  /// Whether an alarm is stored for the given weekday (0 = Sunday)
  pub fn is_enabled(&self, weekday: u8) -> bool {
    self.mask & (1 << (weekday % 7)) != 0
  }

  /// The stored alarm code for the given weekday, if any
  pub fn code(&self, weekday: u8) -> Option<u8> {
    if !self.is_enabled(weekday) {
      return None;
    }
    let code = self.codes[usize::from(weekday % 7)];
    if code == ALARM_CODE_UNSET {
      None
    } else {
      Some(code)
    }
  }

  /// The stored alarm as (hour, minute) for the given weekday, if any
  pub fn time(&self, weekday: u8) -> Option<(u8, u8)> {
    self.code(weekday).map(decode_alarm_code)
  }

  /// Store an alarm time for the given weekday.
  /// Returns false (leaving the set unchanged) if the time is not encodable.
  pub fn set(&mut self, weekday: u8, hour: u8, minute: u8) -> bool {
    match encode_alarm_code(hour, minute) {
      Some(code) => {
        self.set_code(weekday, code);
        true
      }
      None => false,
    }
  }

  /// Store a raw alarm code, bypassing the hour/minute validation.
  pub fn set_code(&mut self, weekday: u8, code: u8) {
    let weekday = weekday % 7;
    self.mask |= 1 << weekday;
    self.codes[usize::from(weekday)] = code;
  }

  /// Remove the alarm for the given weekday: the code slot goes back to
  /// `ALARM_CODE_UNSET` and the mask bit is cleared.
  pub fn clear(&mut self, weekday: u8) {
    let weekday = weekday % 7;
    self.codes[usize::from(weekday)] = ALARM_CODE_UNSET;
    self.mask &= !(1 << weekday);
  }

  /// Remove all seven weekday alarms.
  pub fn clear_all(&mut self) {
    *self = AlarmSet::default();
  }
}

/// Per-day one-shot state for the alarm trigger evaluator.
/// Owned by the caller; zero means the alarm is armed for today.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlarmTriggerState {
  last_triggered: u32,
}

impl AlarmTriggerState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether the alarm has already fired since the last midnight poll
  pub fn has_fired_today(&self) -> bool {
    self.last_triggered != 0
  }

  /// Timestamp (seconds since 2000-01-01) of the last trigger, 0 if armed
  pub fn last_triggered(&self) -> u32 {
    self.last_triggered
  }
}

/// DS1307
/// 64 x 8 Serial Real-Time Clock with 56 bytes of battery-backed NVRAM,
/// rust no_std driver (utilizes the embedded_hal i2c interface).
///
/// Beyond plain timekeeping, the driver keeps a weekday wake-up alarm
/// schedule in the chip's NVRAM and evaluates it against clock readings.
pub struct DS1307<I2C> {
  i2c: I2C,
  mux_addr: u8,
  mux_chan: u8,
}

impl<I2C, E> DS1307<I2C>
  where
    I2C: Write<Error = E> + Read<Error = E> + WriteRead<Error = E>,
{

  /// New driver instance, assumes that there is no i2c mux
  /// sitting between the RTC and the host.
  pub fn new(i2c: I2C) -> Self {
    DS1307 {
      i2c,
      mux_addr: 0u8,
      mux_chan: 0u8
    }
  }

  /// Allows the caller to create a new driver instance with
  /// an i2c mux between the RTC and the host.
  /// - `mux_addr` : the i2c address of the mux itself
  /// - `mux_chan` : the mux channel assigned to the RTC
  pub fn new_with_mux(i2c: I2C, mux_addr: u8, mux_chan: u8) -> Self {
    DS1307 {
      i2c,
      mux_addr,
      mux_chan
    }
  }

  // Converts a binary value to BCD format
  fn bin_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
  }

  // Converts a BCD value to binary format
  fn bcd_to_bin(value: u8) -> u8 {
    ((value & 0xF0) >> 4) * 10 + (value & 0x0F)
  }

  // If using an i2c mux, tell the mux to select our channel
  fn select_mux_channel(&mut self) -> Result<(), E> {
    if self.mux_addr != 0u8 {
      self.i2c.write(self.mux_addr, &[self.mux_chan])
    }
    else {
      Ok(())
    }
  }

  fn write_register(&mut self, reg: u8, data: u8) -> Result<(), E> {
    self.select_mux_channel()?;
    self.i2c.write(DS1307_ADDRESS, &[reg, data])
  }

  fn read_register(&mut self, reg: u8) -> Result<u8, E> {
    self.select_mux_channel()?;
    let mut buf = [0];
    self.i2c.write_read(DS1307_ADDRESS, &[reg], &mut buf)?;
    Ok(buf[0])
  }

  // read a block of registers all at once
  fn read_multi_registers(&mut self, reg: u8, read_buf: &mut [u8]) -> Result<(), E> {
    self.select_mux_channel()?;
    self.i2c.write_read(DS1307_ADDRESS, &[reg], read_buf)
  }

  // set specific bits in a register:
  // all bits must be high that you wish to set
  fn set_reg_bits(&mut self, reg: u8, bits: u8) -> Result<(), E> {
    let mut reg_val = self.read_register(reg)?;
    reg_val |= bits;
    self.write_register(reg, reg_val)
  }

  // clear specific bits in a register:
  // all bits must be high that you wish to be cleared
  fn clear_reg_bits(&mut self, reg: u8, bits: u8) -> Result<(), E> {
    let mut reg_val = self.read_register(reg)?;
    reg_val &= !(bits);
    self.write_register(reg, reg_val)
  }

  // If `set` is true, set the high bits given in `bits`, otherwise clear those bits
  fn set_or_clear_reg_bits(&mut self, reg: u8, bits: u8, set: bool) -> Result<(), E> {
    if set {
      self.set_reg_bits(reg, bits)
    }
    else {
      self.clear_reg_bits(reg, bits)
    }
  }

  // Logical NVRAM offsets 0..55 map to chip addresses 0x08..=0x3F; offsets
  // beyond the capacity wrap rather than spilling into the clock registers.
  fn nvram_address(offset: u8) -> u8 {
    NVRAM_BASE + (offset % NVRAM_SIZE)
  }

  /// Check whether the device answers on the bus
  pub fn is_present(&mut self) -> bool {
    self.read_register(REG_SECONDS).is_ok()
  }

  /// Set the CH bit high to stop the oscillator, preserving the seconds value
  pub fn stop_clock(&mut self) -> Result<(), E> {
    self.set_reg_bits(REG_SECONDS, CLOCK_HALT_BIT)
  }

  /// Clear the CH bit to start the oscillator, preserving the seconds value
  pub fn start_clock(&mut self) -> Result<(), E> {
    self.clear_reg_bits(REG_SECONDS, CLOCK_HALT_BIT)
  }

  /// Whether the oscillator is currently running
  pub fn is_clock_running(&mut self) -> Result<bool, E> {
    let seconds = self.read_register(REG_SECONDS)?;
    Ok(seconds & CLOCK_HALT_BIT == 0)
  }

  /// Set time of day (hours, minutes, seconds) in binary format.
  /// Writing the seconds register also clears the CH bit, so the clock
  /// is left running.
  pub fn set_time(&mut self, hours: u8, minutes: u8, seconds: u8) -> Result<(), E> {
    self.write_register(REG_HOURS, Self::bin_to_bcd(hours) & HOURS_VALUE_MASK)?;
    self.write_register(REG_MINUTES, Self::bin_to_bcd(minutes))?;
    self.write_register(REG_SECONDS, Self::bin_to_bcd(seconds))
  }

  /// Get time of day in binary format (hours, minutes, seconds)
  pub fn get_time(&mut self) -> Result<(u8, u8, u8), E> {
    let hours = Self::bcd_to_bin(self.read_register(REG_HOURS)? & HOURS_VALUE_MASK);
    let minutes = Self::bcd_to_bin(self.read_register(REG_MINUTES)?);
    let seconds = Self::bcd_to_bin(self.read_register(REG_SECONDS)? & !CLOCK_HALT_BIT);
    Ok((hours, minutes, seconds))
  }

  /// Burst-read the seven clock registers and rebuild a fully consistent
  /// reading. The on-chip weekday byte is ignored; the weekday and every
  /// other derived field come from the calendar date.
  pub fn read_datetime(&mut self) -> Result<ClockReading, E> {
    let mut buf = [0u8; 7];
    self.read_multi_registers(REG_SECONDS, &mut buf)?;
    let second = Self::bcd_to_bin(buf[REG_SECONDS as usize] & !CLOCK_HALT_BIT);
    let minute = Self::bcd_to_bin(buf[REG_MINUTES as usize]);
    let hour = Self::bcd_to_bin(buf[REG_HOURS as usize] & HOURS_VALUE_MASK);
    // buf[REG_WEEKDAY] is ignored: the weekday comes from the date below
    let _ = buf[REG_WEEKDAY as usize];
    let day = Self::bcd_to_bin(buf[REG_DATE as usize]);
    let month = Self::bcd_to_bin(buf[REG_MONTH as usize]);
    let year = 2000 + u16::from(Self::bcd_to_bin(buf[REG_YEAR as usize]));
    Ok(ClockReading::from_ymd(year, month, day).with_hms(hour, minute, second))
  }

  /// Burst-write all seven clock registers from a reading.
  /// The weekday is stored 1-based as the chip expects, the year as its
  /// last two digits. Writing seconds clears CH, so the clock ends up
  /// running.
  pub fn write_datetime(&mut self, reading: &ClockReading) -> Result<(), E> {
    self.select_mux_channel()?;
    self.i2c.write(DS1307_ADDRESS, &[
      REG_SECONDS,
      Self::bin_to_bcd(reading.second),
      Self::bin_to_bcd(reading.minute),
      Self::bin_to_bcd(reading.hour) & HOURS_VALUE_MASK,
      Self::bin_to_bcd(reading.weekday + 1),
      Self::bin_to_bcd(reading.day),
      Self::bin_to_bcd(reading.month),
      Self::bin_to_bcd((reading.year % 100) as u8),
    ])
  }

  /// Get the current value of the control register
  pub fn control(&mut self) -> Result<u8, E> {
    self.read_register(REG_CONTROL)
  }

  /// Set the control register
  pub fn set_control(&mut self, value: u8) -> Result<(), E> {
    self.write_register(REG_CONTROL, value)
  }

  /// Enable or disable the square wave output on the SQW/OUT pin
  pub fn toggle_square_wave(&mut self, enable: bool) -> Result<(), E> {
    self.set_or_clear_reg_bits(REG_CONTROL, SQUARE_WAVE_ENABLE_BIT, enable)
  }

  /// Select the square wave output rate
  pub fn set_square_wave_rate(&mut self, rate: SquareWaveRate) -> Result<(), E> {
    let ctrl = self.read_register(REG_CONTROL)?;
    self.write_register(REG_CONTROL, (ctrl & !SQUARE_WAVE_RATE_MASK) | rate as u8)
  }

  /// Read from NVRAM starting at a logical offset (0..55)
  pub fn read_nvram(&mut self, offset: u8, read_buf: &mut [u8]) -> Result<(), E> {
    self.select_mux_channel()?;
    self.i2c.write_read(DS1307_ADDRESS, &[Self::nvram_address(offset)], read_buf)
  }

  /// Write to NVRAM starting at a logical offset (0..55).
  /// At most `NVRAM_SIZE` bytes are written, in a single bus transaction.
  pub fn write_nvram(&mut self, offset: u8, data: &[u8]) -> Result<(), E> {
    self.select_mux_channel()?;
    let mut buf = [0u8; 1 + NVRAM_SIZE as usize];
    let len = data.len().min(NVRAM_SIZE as usize);
    buf[0] = Self::nvram_address(offset);
    buf[1..=len].copy_from_slice(&data[..len]);
    self.i2c.write(DS1307_ADDRESS, &buf[..=len])
  }

  /// The entire NVRAM contents, for caller-side inspection or logging
  pub fn dump_nvram(&mut self) -> Result<[u8; NVRAM_SIZE as usize], E> {
    let mut buf = [0u8; NVRAM_SIZE as usize];
    self.read_nvram(0, &mut buf)?;
    Ok(buf)
  }

  /// Whether the clock has been explicitly initialized, as opposed to
  /// free-running from power-on defaults. The caller decides whether to
  /// (re)initialize when this reports false.
  pub fn is_time_set(&mut self) -> Result<bool, E> {
    let mut buf = [0u8; 1];
    self.read_nvram(RAM_TIME_SET_TOKEN_OFFSET, &mut buf)?;
    Ok(buf[0] == TIME_SET_TOKEN)
  }

  /// Record that the clock has been set
  pub fn mark_time_set(&mut self) -> Result<(), E> {
    self.write_nvram(RAM_TIME_SET_TOKEN_OFFSET, &[TIME_SET_TOKEN])
  }

  /// Read the persisted weekday alarm schedule
  pub fn read_alarms(&mut self) -> Result<AlarmSet, E> {
    let mut buf = [0u8; 8];
    self.read_nvram(RAM_ALARM_BLOCK_OFFSET, &mut buf)?;
    Ok(AlarmSet::from_bytes(buf))
  }

  /// Persist a weekday alarm schedule. Mask and codes go out in one bus
  /// write, so no reader can see them disagree.
  pub fn write_alarms(&mut self, alarms: &AlarmSet) -> Result<(), E> {
    self.write_nvram(RAM_ALARM_BLOCK_OFFSET, &alarms.to_bytes())
  }

  /// Store an alarm time for the given weekday (0 = Sunday).
  /// Returns `Ok(false)`, without touching the chip, if the time is outside
  /// the encodable 04:00..=20:59 range or off the 5-minute grid.
  pub fn set_alarm(&mut self, weekday: u8, hour: u8, minute: u8) -> Result<bool, E> {
    let code = match encode_alarm_code(hour, minute) {
      Some(code) => code,
      None => return Ok(false),
    };
    self.set_alarm_code(weekday, code)?;
    Ok(true)
  }

  /// Store a raw alarm code for the given weekday, bypassing the
  /// hour/minute validation.
  pub fn set_alarm_code(&mut self, weekday: u8, code: u8) -> Result<(), E> {
    let mut alarms = self.read_alarms()?;
    alarms.set_code(weekday, code);
    self.write_alarms(&alarms)
  }

  /// Remove the alarm for the given weekday
  pub fn clear_alarm(&mut self, weekday: u8) -> Result<(), E> {
    let mut alarms = self.read_alarms()?;
    alarms.clear(weekday);
    self.write_alarms(&alarms)
  }

  /// Remove all seven weekday alarms
  pub fn clear_all_alarms(&mut self) -> Result<(), E> {
    self.write_alarms(&AlarmSet::default())
  }

  /// Evaluate the stored alarm for the reading's weekday against the
  /// reading, firing at most once per day.
  ///
  /// The alarm fires on the first poll where the hour has reached the alarm
  /// hour AND the minute has reached the alarm minute; the two comparisons
  /// are independent, so within a later hour the minute must still catch up
  /// to the threshold before the alarm fires. A poll at 00:00 re-arms the
  /// state for the new day.
  pub fn check_alarm(
    &mut self,
    now: &ClockReading,
    state: &mut AlarmTriggerState,
  ) -> Result<bool, E> {
    let alarms = self.read_alarms()?;
    let (alarm_hour, alarm_minute) = match alarms.time(now.weekday) {
      Some(time) => time,
      None => return Ok(false),
    };
    let mut triggered = false;
    if state.last_triggered == 0 && now.hour >= alarm_hour && now.minute >= alarm_minute {
      state.last_triggered = now.epoch_seconds;
      triggered = true;
    }
    if now.hour == 0 && now.minute == 0 {
      state.last_triggered = 0;
    }
    Ok(triggered)
  }

  /// All-in-one clock initialization from build-time strings as produced
  /// by C-style `__DATE__` / `__TIME__` macros: stop the oscillator, load
  /// the parsed datetime, restart, and record the clock-is-set token.
  /// Returns `Ok(false)`, without touching the chip, if the strings do
  /// not parse.
  pub fn init_from_build_time(&mut self, date: &str, time: &str) -> Result<bool, E> {
    let reading = match ClockReading::from_build_time(date, time) {
      Some(reading) => reading,
      None => return Ok(false),
    };
    self.stop_clock()?;
    self.write_datetime(&reading)?;
    self.start_clock()?;
    self.mark_time_set()?;
    Ok(true)
  }

}

impl<I2C, E> DateTimeAccess for DS1307<I2C>
  where
    I2C: Write<Error = E> + Read<Error = E> + WriteRead<Error = E>,
{
  type Error = E;

  /// This chip stores a two digit year; readings are mapped into 2000..=2099.
  fn datetime(&mut self) -> Result<NaiveDateTime, Self::Error> {
    let reading = self.read_datetime()?;
    Ok(NaiveDate::from_ymd_opt(reading.year.into(), reading.month.into(), reading.day.into())
      .expect("YMD")
      .and_hms_opt(reading.hour.into(), reading.minute.into(), reading.second.into())
      .expect("HMS"))
  }

  /// This implementation assumes (but doesn't verify)
  /// that the caller is setting the RTC datetime to values within its
  /// supported range (from 2000 to 2099).
  fn set_datetime(&mut self, datetime: &NaiveDateTime) -> Result<(), Self::Error> {
    let reading = ClockReading::from_ymd(
      datetime.year() as u16,
      datetime.month() as u8,
      datetime.day() as u8,
    )
    .with_hms(
      datetime.hour() as u8,
      datetime.minute() as u8,
      datetime.second() as u8,
    );
    self.write_datetime(&reading)
  }

}
