//! Front-End Module diagnostics.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{
    Error, Result,
    config::FemAddresses,
    i2c::{
        self, Bus,
        bar::{Ms5611, to_altitude},
        eeprom::Eep24xx64,
        gpio::Pcf8574,
        motion::{FEM_ORIENTATION, ImuSimple},
        temp::Si7051,
        volt::Ina219,
    },
};

/// Current sense resistor on the FEM supply, in ohms.
pub const SHUNT_OHMS: f64 = 0.1;
/// Offset between the barometer and the antenna feed, in metres.
pub const BAR_HEIGHT_OFFSET: f64 = 0.16;

/// Input selection of the FEM RF switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SwitchMode {
    Load,
    Antenna,
    Noise,
}

impl SwitchMode {
    pub fn bits(self) -> u8 {
        match self {
            SwitchMode::Load => 0b000,
            SwitchMode::Antenna => 0b111,
            SwitchMode::Noise => 0b001,
        }
    }

    pub fn from_bits(bits: u8) -> Option<SwitchMode> {
        [SwitchMode::Load, SwitchMode::Antenna, SwitchMode::Noise]
            .into_iter()
            .find(|m| m.bits() == bits)
    }

    pub fn name(self) -> &'static str {
        match self {
            SwitchMode::Load => "load",
            SwitchMode::Antenna => "antenna",
            SwitchMode::Noise => "noise",
        }
    }
}

/// Accepts `0b...`, `0x...` or decimal.
pub fn parse_number(s: &str) -> std::result::Result<u32, String> {
    let parsed = if let Some(b) = s.strip_prefix("0b") {
        u32::from_str_radix(b, 2)
    } else if let Some(h) = s.strip_prefix("0x") {
        u32::from_str_radix(h, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

pub fn parse_byte(s: &str) -> std::result::Result<u8, String> {
    let v = parse_number(s)?;
    u8::try_from(v).map_err(|_| format!("{s} does not fit in 8 bits"))
}

const FEM_EXAMPLES: &str = "Examples:
  fem_sensor --i2c 1 --gpio
  fem_sensor --i2c 1 --gpio 0xff
  fem_sensor --i2c 1 --rom
  fem_sensor --i2c 1 --rom 'Hello world!'
  fem_sensor --i2c 1 --volt --temp --bar --imu
  fem_sensor --i2c 1 --switch noise
";

#[derive(Parser, Debug, Clone)]
#[clap(
    author,
    version,
    about = "Test FEM module over the bit-banged I2C bus of the full control breakout board",
    after_help = FEM_EXAMPLES
)]
pub struct Args {
    #[clap(
        long("i2c"),
        value_name("I2C_NAME"),
        value_parser = clap::value_parser!(u8).range(1..),
        help("number of the i2c bus")
    )]
    pub bus: u8,

    #[clap(long("baud"), value_name("I2C_BAUD_RATE"), default_value_t = 10_000)]
    pub baud: u32,

    #[clap(long("config"), value_name("TOML file with board layout overrides"))]
    pub config: Option<PathBuf>,

    #[clap(
        long("rom"),
        num_args(0..=1),
        value_name("TEXT"),
        help("test EEPROM, leave empty to read, add text to write")
    )]
    pub rom: Option<Option<String>>,

    #[clap(long("temp"), help("print temperature"))]
    pub temp: bool,

    #[clap(long("sn"), help("print ID inside temperature sensor"))]
    pub sn: bool,

    #[clap(long("volt"), help("print shunt voltage, shunt current and bus voltage"))]
    pub volt: bool,

    #[clap(long("bar"), help("print temperature, air pressure, height and calibrated height"))]
    pub bar: bool,

    #[clap(long("imu"), help("print FEM pose, theta and phi"))]
    pub imu: bool,

    #[clap(long("probe"), help("detect devices on the bus"))]
    pub probe: bool,

    #[clap(
        long("gpio"),
        num_args(0..=1),
        value_name("VALUE"),
        value_parser = parse_byte,
        conflicts_with("switch"),
        help("test GPIO, leave empty to read, add value to write")
    )]
    pub gpio: Option<Option<u8>>,

    #[clap(
        long("switch"),
        num_args(0..=1),
        value_name("MODE"),
        help("switch FEM input to antenna, noise or load, leave empty to read")
    )]
    pub switch: Option<Option<SwitchMode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Imu,
    Temp,
    SerialNumber,
    ReadSwitch,
    WriteSwitch(SwitchMode),
    ReadGpio,
    WriteGpio(u8),
    ReadRom,
    WriteRom(String),
    Bar,
    Volt,
    Probe,
}

impl Args {
    /// Requested operations in execution order.
    pub fn operations(&self) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        if self.imu {
            ops.push(Op::Imu);
        }
        if self.temp {
            ops.push(Op::Temp);
        }
        if self.sn {
            ops.push(Op::SerialNumber);
        }
        match (self.switch, self.gpio) {
            (Some(Some(mode)), _) => ops.push(Op::WriteSwitch(mode)),
            (Some(None), _) => ops.push(Op::ReadSwitch),
            (None, Some(Some(v))) => ops.push(Op::WriteGpio(v)),
            (None, Some(None)) => ops.push(Op::ReadGpio),
            (None, None) => {}
        }
        match &self.rom {
            Some(Some(text)) if !text.is_empty() => ops.push(Op::WriteRom(text.clone())),
            Some(_) => ops.push(Op::ReadRom),
            None => {}
        }
        if self.bar {
            ops.push(Op::Bar);
        }
        if self.volt {
            ops.push(Op::Volt);
        }
        if self.probe {
            ops.push(Op::Probe);
        }
        if ops.is_empty() {
            return Err(Error::InvalidArgument(
                "nothing to do, pass at least one operation flag".to_string(),
            ));
        }
        Ok(ops)
    }
}

/// Runs one operation and returns the text to print, if any.
pub fn execute<B: Bus>(bus: &mut B, addrs: &FemAddresses, op: &Op) -> Result<Option<String>> {
    let out = match op {
        Op::Imu => {
            let mut imu = ImuSimple::new(bus, addrs.imu, FEM_ORIENTATION);
            imu.init()?;
            let (theta, phi) = imu.pose()?;
            imu.power_off()?;
            Some(format!("{theta}, {phi}"))
        }
        Op::Temp => Some(Si7051::new(bus, addrs.temp).read_temp()?.to_string()),
        Op::SerialNumber => Some(Si7051::new(bus, addrs.temp).serial_number()?.to_string()),
        Op::ReadSwitch => {
            let bits = Pcf8574::new(bus, addrs.gpio).read()?;
            Some(
                SwitchMode::from_bits(bits)
                    .map_or("Unknown", SwitchMode::name)
                    .to_string(),
            )
        }
        Op::WriteSwitch(mode) => {
            Pcf8574::new(bus, addrs.gpio).write(mode.bits())?;
            None
        }
        Op::ReadGpio => Some(format!("0b{:08b}", Pcf8574::new(bus, addrs.gpio).read()?)),
        Op::WriteGpio(v) => {
            Pcf8574::new(bus, addrs.gpio).write(*v)?;
            None
        }
        Op::ReadRom => Some(Eep24xx64::new(bus, addrs.rom).read_string()?),
        Op::WriteRom(text) => {
            Eep24xx64::new(bus, addrs.rom).write_string(text)?;
            None
        }
        Op::Bar => {
            let mut bar = Ms5611::new(bus, addrs.bar);
            bar.init()?;
            let (temp, dt) = bar.read_temp_raw()?;
            let press = bar.read_press(temp, dt)?;
            let temp_c = temp as f64 / 100.0;
            let alt = to_altitude(press, temp_c);
            Some(format!(
                "{temp_c},{press},{alt},{}",
                alt - BAR_HEIGHT_OFFSET
            ))
        }
        Op::Volt => {
            let mut ina = Ina219::new(bus, addrs.ina);
            ina.init()?;
            let vshunt = ina.read_shunt()?;
            let vbus = ina.read_bus()?;
            Some(format!("{vshunt},{},{vbus}", vshunt / SHUNT_OHMS))
        }
        Op::Probe => Some(i2c::probe_table(&i2c::probe(bus))),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::mock::{MockBus, Tx};

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("fem_sensor").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn numbers_in_three_bases() {
        assert_eq!(parse_number("0b101"), Ok(5));
        assert_eq!(parse_number("0xff"), Ok(255));
        assert_eq!(parse_number("42"), Ok(42));
        assert!(parse_number("0xzz").is_err());
        assert!(parse_byte("0x100").is_err());
    }

    #[test]
    fn switch_bits_round_trip_and_unknown() {
        for mode in [SwitchMode::Load, SwitchMode::Antenna, SwitchMode::Noise] {
            assert_eq!(SwitchMode::from_bits(mode.bits()), Some(mode));
        }
        assert_eq!(SwitchMode::from_bits(0b010), None);
    }

    #[test]
    fn operations_follow_fixed_order() {
        let args = parse(&[
            "--i2c", "1", "--probe", "--volt", "--rom", "--temp", "--imu", "--gpio",
        ]);
        assert_eq!(
            args.operations().unwrap(),
            vec![Op::Imu, Op::Temp, Op::ReadGpio, Op::ReadRom, Op::Volt, Op::Probe]
        );
    }

    #[test]
    fn optional_values_select_write() {
        let args = parse(&["--i2c", "2", "--switch", "noise", "--rom", "Hello world!"]);
        assert_eq!(
            args.operations().unwrap(),
            vec![Op::WriteSwitch(SwitchMode::Noise), Op::WriteRom("Hello world!".to_string())]
        );
        let args = parse(&["--i2c", "1", "--gpio", "0b1010"]);
        assert_eq!(args.operations().unwrap(), vec![Op::WriteGpio(10)]);
        let args = parse(&["--i2c", "1", "--switch"]);
        assert_eq!(args.operations().unwrap(), vec![Op::ReadSwitch]);
    }

    #[test]
    fn gpio_and_switch_exclusive() {
        assert!(
            Args::try_parse_from(["fem_sensor", "--i2c", "1", "--gpio", "--switch"]).is_err()
        );
        assert!(Args::try_parse_from(["fem_sensor", "--i2c", "0", "--temp"]).is_err());
        assert!(Args::try_parse_from(["fem_sensor", "--temp"]).is_err());
    }

    #[test]
    fn empty_request_rejected() {
        assert!(parse(&["--i2c", "1"]).operations().is_err());
        assert!(parse(&["--i2c", "1", "--temp"]).operations().is_ok());
    }

    #[test]
    fn reads_switch_state() {
        let addrs = FemAddresses::default();
        let mut bus = MockBus::new(vec![Tx::Read(0x20, vec![0b111]), Tx::Read(0x20, vec![0b110])]);
        assert_eq!(execute(&mut bus, &addrs, &Op::ReadSwitch).unwrap().as_deref(), Some("antenna"));
        assert_eq!(execute(&mut bus, &addrs, &Op::ReadSwitch).unwrap().as_deref(), Some("Unknown"));
        bus.done();
    }

    #[test]
    fn writes_switch_and_gpio() {
        let addrs = FemAddresses::default();
        let mut bus = MockBus::new(vec![Tx::Write(0x20, vec![0b001]), Tx::Write(0x20, vec![0xff])]);
        assert_eq!(execute(&mut bus, &addrs, &Op::WriteSwitch(SwitchMode::Noise)).unwrap(), None);
        assert_eq!(execute(&mut bus, &addrs, &Op::WriteGpio(0xff)).unwrap(), None);
        bus.done();
    }

    #[test]
    fn gpio_read_is_binary() {
        let addrs = FemAddresses::default();
        let mut bus = MockBus::new(vec![Tx::Read(0x20, vec![5])]);
        assert_eq!(
            execute(&mut bus, &addrs, &Op::ReadGpio).unwrap().as_deref(),
            Some("0b00000101")
        );
    }

    #[test]
    fn volt_reports_current() {
        let addrs = FemAddresses::default();
        let mut bus = MockBus::new(vec![
            Tx::Write(0x45, vec![0x00, 0x39, 0x9f]),
            Tx::WriteRead(0x45, vec![0x01], vec![0x03, 0xe8]),
            Tx::WriteRead(0x45, vec![0x02], vec![0x00, 0x00]),
        ]);
        let line = execute(&mut bus, &addrs, &Op::Volt).unwrap().unwrap();
        let fields: Vec<f64> = line.split(',').map(|f| f.parse().unwrap()).collect();
        assert!((fields[0] - 0.01).abs() < 1e-12);
        assert!((fields[1] - 0.1).abs() < 1e-12);
        assert_eq!(fields[2], 0.0);
        bus.done();
    }
}
