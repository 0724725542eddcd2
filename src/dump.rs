//! Plain text spectrum dumps, one row per channel: frequency followed by every product.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use chrono::Utc;

use crate::{Result, spectrum::AutoSpectra};

pub const DEFAULT_DUMP: &str = "spectrum.txt";

/// `%.18e` as printed by C, with a signed exponent of at least two digits.
pub fn sci(x: f64) -> String {
    let s = format!("{x:.18e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => s,
    }
}

pub fn write_dump<W: Write>(drain: &mut W, spectra: &AutoSpectra) -> Result<()> {
    let names = spectra
        .products
        .iter()
        .map(|(n, _)| n.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(
        drain,
        "# {} freq_mhz {names} hw_int {}s total_int {}s",
        Utc::now().to_rfc3339(),
        spectra.acc_seconds,
        spectra.total_seconds()
    )?;
    for (ich, f) in spectra.freq_mhz.iter().enumerate() {
        let mut row = sci(*f);
        for (_, data) in &spectra.products {
            row.push(' ');
            row.push_str(&sci(data[ich] as f64));
        }
        writeln!(drain, "{row}")?;
    }
    Ok(())
}

pub fn dump_to_file(path: &Path, spectra: &AutoSpectra) -> Result<()> {
    let mut outfile = BufWriter::new(File::create(path)?);
    write_dump(&mut outfile, spectra)?;
    outfile.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;

    use super::*;

    fn spectra() -> AutoSpectra {
        AutoSpectra {
            freq_mhz: Array1::from(vec![0.0, 125.0, 250.0, 375.0]),
            products: vec![
                ("aa".to_string(), Array1::from(vec![0, 10, 100, 1000])),
                ("bb".to_string(), Array1::from(vec![1, 2, 3, 4])),
                ("cc".to_string(), Array1::from(vec![u32::MAX as u64 * 3, 0, 0, 7])),
            ],
            clk_mhz: 250.0,
            acc_len: 244_140,
            acc_seconds: 0.5,
            soft_repeats: 3,
        }
    }

    #[test]
    fn matches_c_scientific_format() {
        assert_eq!(sci(0.0), "0.000000000000000000e+00");
        assert_eq!(sci(1.5), "1.500000000000000000e+00");
        assert_eq!(sci(1234.0), "1.234000000000000000e+03");
        assert_eq!(sci(0.000244140625), "2.441406250000000000e-04");
    }

    #[test]
    fn dump_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_DUMP);
        dump_to_file(&path, &spectra()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("# "));
        assert!(header.contains("freq_mhz aa bb cc"));
        assert!(header.contains("hw_int 0.5s total_int 1.5s"));

        let rows: Vec<Vec<f64>> = lines
            .map(|l| l.split(' ').map(|f| f.parse().unwrap()).collect())
            .collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], vec![125.0, 10.0, 2.0, 0.0]);
        assert_eq!(rows[0][3], u32::MAX as f64 * 3.0);
        assert_eq!(rows[3], vec![375.0, 1000.0, 4.0, 7.0]);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join(DEFAULT_DUMP);
        assert!(matches!(dump_to_file(&path, &spectra()), Err(crate::Error::Io(_))));
    }
}
