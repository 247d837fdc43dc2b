extern crate ds1307_rtc;

use ds1307_rtc::{AlarmTriggerState, DS1307};
use linux_embedded_hal::I2cdev;
use std::time::Duration;

/// Example storing a wake-up alarm for today a few minutes from now,
/// then polling until it fires.
/// Assumes a linux environment (such as Raspberry Pi 3+)
/// with a DS1307 attached to i2c1, and a clock that has already been
/// set (see the set_clock example).

fn main() {
  let i2c = I2cdev::new("/dev/i2c-1").expect("Failed to open I2C device");
  let mut rtc = DS1307::new(i2c);

  let now = rtc.read_datetime().expect("read_datetime");
  println!("now: {}", now);
  if !rtc.is_time_set().expect("is_time_set") {
    println!("warning: clock has never been set, readings may be garbage");
  }

  // next 5-minute boundary after the current minute
  let mut alarm_hour = now.hour;
  let mut alarm_minute = (now.minute / 5 + 1) * 5;
  if alarm_minute >= 60 {
    alarm_minute = 0;
    alarm_hour += 1;
  }

  let accepted = rtc
    .set_alarm(now.weekday, alarm_hour, alarm_minute)
    .expect("set_alarm");
  if !accepted {
    println!(
      "{:02}:{:02} is outside the 04:00..=20:59 alarm window",
      alarm_hour, alarm_minute
    );
    return;
  }
  println!("alarm stored for {:02}:{:02}", alarm_hour, alarm_minute);

  let mut state = AlarmTriggerState::new();
  loop {
    let reading = rtc.read_datetime().expect("read_datetime");
    if rtc.check_alarm(&reading, &mut state).expect("check_alarm") {
      println!("wake up! {}", reading);
      break;
    }
    spin_sleep::sleep(Duration::from_secs(1));
  }

  // leave the schedule the way we found it
  rtc.clear_alarm(now.weekday).expect("clear_alarm");
}
