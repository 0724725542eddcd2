//! Auto-correlation acquisition from the SNAP correlator.
//!
//! Each product is stored by the design as two half-length brams, one with the even
//! channels and one with the odd channels, holding big-endian u32 words.

use std::{io::Cursor, time::Duration};

use binrw::{BinRead, binread};
use log::info;
use ndarray::Array1;

use crate::{
    Error, Result,
    fpga::Fpga,
    poll::{ACC_COUNTER, PollPolicy, wait_for_change},
};

/// Hardware accumulation length register.
pub const ACC_LEN: &str = "acc_len";

pub const DEFAULT_NCH: usize = 1024;

pub const DEFAULT_PRODUCTS: [&str; 3] = ["aa", "bb", "cc"];

pub fn even_source(product: &str) -> String {
    format!("dir_x0_{product}_real")
}

pub fn odd_source(product: &str) -> String {
    format!("dir_x1_{product}_real")
}

#[binread]
#[br(big, import(count: usize))]
#[derive(Debug)]
struct HalfSpectrum {
    #[br(count = count)]
    words: Vec<u32>,
}

/// Decodes `count` big-endian words from the start of `raw`.
pub fn decode_words(name: &str, raw: &[u8], count: usize) -> Result<Vec<u32>> {
    if raw.len() < count * 4 {
        return Err(Error::ShortRead {
            name: name.to_string(),
            expected: count * 4,
            actual: raw.len(),
        });
    }
    let half = HalfSpectrum::read_args(&mut Cursor::new(raw), (count,))?;
    Ok(half.words)
}

/// Even output channels come from `even`, odd ones from `odd`.
pub fn interleave(even: &[u32], odd: &[u32]) -> Array1<u64> {
    even.iter()
        .zip(odd)
        .flat_map(|(&e, &o)| [e as u64, o as u64])
        .collect()
}

/// Reads one auto-correlation product of `nch` channels.
pub fn read_product<F: Fpga + ?Sized>(
    fpga: &mut F,
    product: &str,
    nch: usize,
) -> Result<Array1<u64>> {
    let half = nch / 2;
    let even_name = even_source(product);
    let odd_name = odd_source(product);
    let even = fpga.read_bytes(&even_name, nch * 2)?;
    let odd = fpga.read_bytes(&odd_name, nch * 2)?;
    Ok(interleave(
        &decode_words(&even_name, &even, half)?,
        &decode_words(&odd_name, &odd, half)?,
    ))
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Seconds per hardware accumulation, rounded to two decimals.
pub fn acc_len_seconds(acc_len: u32, nch: usize, clk_mhz: f64) -> f64 {
    round2(acc_len as f64 * (nch / 2) as f64 / (clk_mhz * 1e6))
}

/// Channel centre frequencies in MHz. The ADC samples at four times the FPGA clock.
pub fn frequency_axis(clk_mhz: f64, nch: usize) -> Array1<f64> {
    let bandwidth = clk_mhz * 4.0 / 2.0;
    Array1::from_iter((0..nch).map(|i| i as f64 * bandwidth / nch as f64))
}

/// Replaces zeros by one so the spectrum can go through a logarithm.
pub fn floor_zeros(data: &Array1<u64>) -> Array1<u64> {
    data.mapv(|x| x.max(1))
}

pub fn to_db(data: &Array1<u64>) -> Array1<f64> {
    floor_zeros(data).mapv(|x| 10.0 * (x as f64).log10())
}

#[derive(Debug, Clone)]
pub struct AccumulationParams {
    pub nch: usize,
    /// Written to [`ACC_LEN`] before acquiring when set.
    pub hard_acc_len: Option<u32>,
    pub soft_repeats: usize,
    /// Bound on counter polls per repeat, `None` waits forever.
    pub max_polls: Option<usize>,
    pub products: Vec<String>,
}

impl Default for AccumulationParams {
    fn default() -> Self {
        Self {
            nch: DEFAULT_NCH,
            hard_acc_len: None,
            soft_repeats: 1,
            max_polls: None,
            products: DEFAULT_PRODUCTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl AccumulationParams {
    pub fn validate(&self) -> Result<()> {
        if self.nch == 0 || self.nch % 2 != 0 {
            return Err(Error::InvalidArgument(format!(
                "channel count must be a positive even number, got {}",
                self.nch
            )));
        }
        if self.soft_repeats == 0 {
            return Err(Error::InvalidArgument(
                "software repeat count must be at least 1".to_string(),
            ));
        }
        if self.hard_acc_len == Some(0) {
            return Err(Error::InvalidArgument(
                "hardware accumulation length must be positive".to_string(),
            ));
        }
        if self.products.is_empty() {
            return Err(Error::InvalidArgument("no products requested".to_string()));
        }
        Ok(())
    }
}

/// Summed spectra and the timing they were taken with.
#[derive(Debug, Clone)]
pub struct AutoSpectra {
    pub freq_mhz: Array1<f64>,
    pub products: Vec<(String, Array1<u64>)>,
    pub clk_mhz: f64,
    pub acc_len: u32,
    pub acc_seconds: f64,
    pub soft_repeats: usize,
}

impl AutoSpectra {
    pub fn total_seconds(&self) -> f64 {
        round2(self.acc_seconds * self.soft_repeats as f64)
    }

    pub fn nch(&self) -> usize {
        self.freq_mhz.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    WaitForAdvance,
    ReadProducts,
    Accumulate,
}

/// Sums `soft_repeats` hardware accumulations of every requested product.
///
/// The counter is sampled every half accumulation period. If the hardware completes two
/// accumulations between samples only the later one is read.
pub fn acquire<F: Fpga + ?Sized>(fpga: &mut F, params: &AccumulationParams) -> Result<AutoSpectra> {
    params.validate()?;
    if !fpga.is_running() {
        return Err(Error::NotReady(fpga.endpoint()));
    }

    if let Some(len) = params.hard_acc_len {
        info!("Configuring accumulation period with {len}.");
        fpga.write_uint(ACC_LEN, len)?;
    }

    let clk_mhz = fpga.estimate_clock_mhz()?;
    if !(clk_mhz.is_finite() && clk_mhz > 0.0) {
        return Err(Error::OutOfRange(format!(
            "estimated FPGA clock {clk_mhz} MHz is not usable"
        )));
    }
    let acc_len = fpga.read_uint(ACC_LEN)?;
    let acc_seconds = acc_len_seconds(acc_len, params.nch, clk_mhz);
    info!("FPGA clock {clk_mhz:.2} MHz, hardware integration length: {acc_seconds} seconds.");

    let interval = Duration::try_from_secs_f64(acc_seconds / 2.0).map_err(|_| {
        Error::OutOfRange(format!(
            "accumulation period of {acc_seconds} s cannot be waited for"
        ))
    })?;
    let policy = PollPolicy {
        interval,
        max_polls: params.max_polls,
    };

    let mut totals = vec![Array1::<u64>::zeros(params.nch); params.products.len()];
    let mut latest = Vec::with_capacity(params.products.len());
    let mut baseline = fpga.read_uint(ACC_COUNTER)?;
    let mut round = 0;
    let mut stage = Stage::WaitForAdvance;

    info!("Collecting auto-correlation data...");
    while round < params.soft_repeats {
        stage = match stage {
            Stage::WaitForAdvance => {
                baseline = wait_for_change(fpga, ACC_COUNTER, baseline, &policy)?;
                Stage::ReadProducts
            }
            Stage::ReadProducts => {
                latest = params
                    .products
                    .iter()
                    .map(|p| read_product(fpga, p, params.nch))
                    .collect::<Result<Vec<_>>>()?;
                Stage::Accumulate
            }
            Stage::Accumulate => {
                for (total, spectrum) in totals.iter_mut().zip(&latest) {
                    *total += spectrum;
                }
                info!("Integration #{round}");
                round += 1;
                Stage::WaitForAdvance
            }
        };
    }

    Ok(AutoSpectra {
        freq_mhz: frequency_axis(clk_mhz, params.nch),
        products: params.products.iter().cloned().zip(totals).collect(),
        clk_mhz,
        acc_len,
        acc_seconds,
        soft_repeats: params.soft_repeats,
    })
}
