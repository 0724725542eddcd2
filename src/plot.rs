//! Rendering of summed spectra to image files or an interactive window.

use std::path::{Path, PathBuf};

use log::info;
use minifb::{Key, Window, WindowOptions};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::{
    Error, Result,
    spectrum::{AutoSpectra, floor_zeros, to_db},
};

const SIZE: (u32, u32) = (1280, 720);
const COLORS: [RGBColor; 6] = [BLUE, RED, GREEN, MAGENTA, CYAN, BLACK];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotTarget {
    /// Interactive window, closed with Escape.
    Display,
    /// Image file; `.svg` gives a vector image, anything else a bitmap.
    File(PathBuf),
}

impl PlotTarget {
    pub fn parse(s: &str) -> PlotTarget {
        if s == "display" {
            PlotTarget::Display
        } else {
            PlotTarget::File(PathBuf::from(s))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Linear,
    Db,
}

impl Scale {
    fn y_label(self) -> &'static str {
        match self {
            Scale::Linear => "auto-correlation in linear mode",
            Scale::Db => "auto-correlation in relative dB",
        }
    }
}

fn plot_err<E: std::fmt::Debug>(e: E) -> Error {
    Error::Plot(format!("{e:?}"))
}

/// Curves as drawn: zeros floored to one, then optionally converted to dB.
pub fn curves(spectra: &AutoSpectra, scale: Scale) -> Vec<(String, Vec<f64>)> {
    spectra
        .products
        .iter()
        .map(|(name, data)| {
            let values = match scale {
                Scale::Linear => floor_zeros(data).mapv(|x| x as f64).to_vec(),
                Scale::Db => to_db(data).to_vec(),
            };
            (name.clone(), values)
        })
        .collect()
}

pub fn title(spectra: &AutoSpectra) -> String {
    format!(
        "hw int {}s, total int {}s.",
        spectra.acc_seconds,
        spectra.total_seconds()
    )
}

fn value_range(curves: &[(String, Vec<f64>)]) -> (f64, f64) {
    let (lo, hi) = curves
        .iter()
        .flat_map(|(_, v)| v.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spectra: &AutoSpectra,
    scale: Scale,
) -> Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;

    let curves = curves(spectra, scale);
    let (y_min, y_max) = value_range(&curves);
    let x_max = spectra.clk_mhz * 4.0 / 2.0;

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title(spectra), ("sans-serif", 28))
        .x_label_area_size(45)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Frequency in MHz")
        .y_desc(scale.y_label())
        .draw()
        .map_err(plot_err)?;

    for (i, (name, values)) in curves.iter().enumerate() {
        let color = COLORS[i % COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                spectra.freq_mhz.iter().copied().zip(values.iter().copied()),
                &color,
            ))
            .map(|s| {
                s.label(name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            })
            .map_err(plot_err)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)
}

pub fn plot_to_file(path: &Path, spectra: &AutoSpectra, scale: Scale) -> Result<()> {
    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
    if is_svg {
        let root = SVGBackend::new(path, SIZE).into_drawing_area();
        draw(&root, spectra, scale)?;
    } else {
        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        draw(&root, spectra, scale)?;
    }
    info!("plot written to {}", path.display());
    Ok(())
}

/// Renders into a window and blocks until it is closed.
pub fn display(spectra: &AutoSpectra, scale: Scale) -> Result<()> {
    let (w, h) = (SIZE.0 as usize, SIZE.1 as usize);
    let mut rgb = vec![0u8; w * h * 3];
    {
        let root = BitMapBackend::with_buffer(&mut rgb, SIZE).into_drawing_area();
        draw(&root, spectra, scale)?;
    }
    let pixels: Vec<u32> = rgb
        .chunks_exact(3)
        .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
        .collect();

    let mut window =
        Window::new(&title(spectra), w, h, WindowOptions::default()).map_err(plot_err)?;
    window.set_target_fps(30);
    while window.is_open() && !window.is_key_down(Key::Escape) {
        window.update_with_buffer(&pixels, w, h).map_err(plot_err)?;
    }
    Ok(())
}

pub fn plot(target: &PlotTarget, spectra: &AutoSpectra, scale: Scale) -> Result<()> {
    match target {
        PlotTarget::Display => display(spectra, scale),
        PlotTarget::File(path) => plot_to_file(path, spectra, scale),
    }
}
