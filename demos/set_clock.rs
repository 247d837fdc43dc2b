extern crate ds1307_rtc;

use anyhow::Result;
use chrono::Utc;
use ds1307_rtc::{DateTimeAccess, DS1307};
use linux_embedded_hal::I2cdev;

/// Example syncing the RTC to the host system clock,
/// assuming linux environment (such as Raspberry Pi 3+)
/// with a DS1307 attached to i2c1.
/// The following was tested by enabling i2c-1 on a Raspberry Pi 3+
/// using `sudo raspi-config`
/// and connecting SDA, SCL, GND, and 5V pins from rpi to the RTC

fn main() -> Result<()> {
  // Initialize the I2C device
  let i2c = I2cdev::new("/dev/i2c-1")?;
  let mut rtc = DS1307::new(i2c);

  if !rtc.is_present() {
    anyhow::bail!("no DS1307 answering on i2c-1");
  }

  if rtc.is_time_set()? {
    println!("clock was previously set, overwriting");
  }

  let sys_datetime = Utc::now().naive_utc();
  println!("sys: {}", sys_datetime);
  rtc.set_datetime(&sys_datetime)?;
  rtc.mark_time_set()?;

  let reading = rtc.read_datetime()?;
  println!("rtc: {}", reading);
  println!("CET summer time: {}", reading.is_cet_summer_time());

  Ok(())
}
