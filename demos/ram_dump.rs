extern crate ds1307_rtc;

use ds1307_rtc::DS1307;
use linux_embedded_hal::I2cdev;

/// Example dumping the DS1307 NVRAM contents and the decoded
/// weekday alarm schedule stored there.

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn main() {
  let i2c = I2cdev::new("/dev/i2c-1").expect("Failed to open I2C device");
  let mut rtc = DS1307::new(i2c);

  println!("clock was set: {}", rtc.is_time_set().expect("is_time_set"));

  let ram = rtc.dump_nvram().expect("dump_nvram");
  for (row, chunk) in ram.chunks(8).enumerate() {
    print!("{:02x}: ", row * 8);
    for byte in chunk {
      print!("{:02x} ", byte);
    }
    println!();
  }

  let alarms = rtc.read_alarms().expect("read_alarms");
  for weekday in 0..7u8 {
    match alarms.time(weekday) {
      Some((hour, minute)) => {
        println!("{}: alarm at {:02}:{:02}", WEEKDAY_NAMES[usize::from(weekday)], hour, minute)
      }
      None => println!("{}: no alarm", WEEKDAY_NAMES[usize::from(weekday)]),
    }
  }
}
