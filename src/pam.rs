//! Post-Amplifier Module diagnostics.

use std::path::PathBuf;

use clap::Parser;

use crate::{
    Error, Result,
    config::PamAddresses,
    fem::{SHUNT_OHMS, parse_byte},
    i2c::{
        self, Bus,
        eeprom::Eep24xx64,
        gpio::Pcf8574,
        sn::Ds28cm00,
        volt::{Ina219, Max11644},
    },
};

/// Largest attenuation step of either pole, in dB.
pub const MAX_ATTEN_DB: u8 = 15;
/// Cable and coupler loss between detector and PAM output, in dB.
pub const DETECTOR_LOSS_DB: f64 = 9.8;

const DETECTOR_SLOPE: f64 = 27.31294863;
const DETECTOR_INTERCEPT: f64 = -55.15991678;
const DETECTOR_MAX_VOLTS: f64 = 3.3;

/// GPIO byte driving the east (high nibble) and north (low nibble) attenuators.
/// The attenuator inputs are active low.
pub fn db_to_gpio(east: u8, north: u8) -> Result<u8> {
    for (pole, db) in [("east", east), ("north", north)] {
        if db > MAX_ATTEN_DB {
            return Err(Error::OutOfRange(format!(
                "{pole} attenuation {db} dB out of range 0-{MAX_ATTEN_DB} dB"
            )));
        }
    }
    Ok(((MAX_ATTEN_DB - east) << 4) | (MAX_ATTEN_DB - north))
}

/// Inverse of [`db_to_gpio`]: (east, north) in dB.
pub fn gpio_to_db(value: u8) -> (u8, u8) {
    (MAX_ATTEN_DB - (value >> 4), MAX_ATTEN_DB - (value & 0x0f))
}

/// Power detector output voltage to dBm.
pub fn dc_to_dbm(volts: f64) -> Result<f64> {
    if !(0.0..=DETECTOR_MAX_VOLTS).contains(&volts) {
        return Err(Error::OutOfRange(format!(
            "Input value {volts} out range of 0-{DETECTOR_MAX_VOLTS}V"
        )));
    }
    Ok(volts * DETECTOR_SLOPE + DETECTOR_INTERCEPT)
}

const PAM_EXAMPLES: &str = "Examples:
  pam_sensor --i2c 1 --atten
  pam_sensor --i2c 1 --atten 7 13
  pam_sensor --i2c 1 --gpio 0xff
  pam_sensor --i2c 1 --rom 'Hello world!'
  pam_sensor --i2c 1 --volt --power --id
";

#[derive(Parser, Debug, Clone)]
#[clap(
    author,
    version,
    about = "Test PAM module over the bit-banged I2C bus of the full control breakout board",
    after_help = PAM_EXAMPLES
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

    #[clap(long("id"), help("print ID"))]
    pub id: bool,

    #[clap(long("volt"), help("print shunt voltage, shunt current and bus voltage"))]
    pub volt: bool,

    #[clap(long("power"), help("print East and North power in dBm"))]
    pub power: bool,

    #[clap(long("probe"), help("detect devices on the bus"))]
    pub probe: bool,

    #[clap(
        long("gpio"),
        num_args(0..=1),
        value_name("VALUE"),
        value_parser = parse_byte,
        conflicts_with("atten"),
        help("test GPIO, leave empty to read, add value to write")
    )]
    pub gpio: Option<Option<u8>>,

    #[clap(
        long("atten"),
        num_args(0..=2),
        value_names(["EAST", "NORTH"]),
        help("attenuation of East and North pole, 0-15 dB, leave empty to read")
    )]
    pub atten: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Id,
    ReadAtten,
    WriteAtten { east: u8, north: u8 },
    ReadGpio,
    WriteGpio(u8),
    ReadRom,
    WriteRom(String),
    Power,
    Volt,
    Probe,
}

impl Args {
    /// Requested operations in execution order.
    pub fn operations(&self) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        if self.id {
            ops.push(Op::Id);
        }
        match (self.atten.as_deref(), self.gpio) {
            (Some([]), _) => ops.push(Op::ReadAtten),
            (Some(&[east, north]), _) => ops.push(Op::WriteAtten { east, north }),
            (Some(_), _) => {
                return Err(Error::InvalidArgument(
                    "--atten takes either no value or both EAST and NORTH".to_string(),
                ));
            }
            (None, Some(Some(v))) => ops.push(Op::WriteGpio(v)),
            (None, Some(None)) => ops.push(Op::ReadGpio),
            (None, None) => {}
        }
        match &self.rom {
            Some(Some(text)) if !text.is_empty() => ops.push(Op::WriteRom(text.clone())),
            Some(_) => ops.push(Op::ReadRom),
            None => {}
        }
        if self.power {
            ops.push(Op::Power);
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
pub fn execute<B: Bus>(bus: &mut B, addrs: &PamAddresses, op: &Op) -> Result<Option<String>> {
    let out = match op {
        Op::Id => {
            let sn = Ds28cm00::new(bus, addrs.sn).read_sn()?;
            Some(format!("The id of the ID chip is: {sn:012x}"))
        }
        Op::ReadAtten => {
            let (east, north) = gpio_to_db(Pcf8574::new(bus, addrs.gpio).read()?);
            Some(format!("{east}, {north}"))
        }
        Op::WriteAtten { east, north } => {
            let value = db_to_gpio(*east, *north)?;
            Pcf8574::new(bus, addrs.gpio).write(value)?;
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
        Op::Power => {
            let mut adc = Max11644::new(bus, addrs.adc);
            adc.init()?;
            let (east, north) = adc.read_volts()?;
            let mut lines = Vec::with_capacity(2);
            for v in [east, north] {
                let dbm = dc_to_dbm(v)?;
                lines.push(format!("{v},{dbm},{}", dbm + DETECTOR_LOSS_DB));
            }
            Some(lines.join("\n"))
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
