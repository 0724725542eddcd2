use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use hera_snap_diag::{
    config::{BoardConfig, KatcpConfig},
    dump::{DEFAULT_DUMP, dump_to_file},
    fpga::KatcpFpga,
    plot::{PlotTarget, Scale, plot},
    spectrum::{AccumulationParams, DEFAULT_NCH, acquire},
};

#[derive(Debug, Parser)]
#[clap(
    author,
    version,
    about = "Sum SNAP correlator auto-correlations over several hardware accumulations"
)]
struct Args {
    #[clap(value_name("host"), help("hostname or IP of the SNAP, optionally with :port"))]
    host: String,

    #[clap(
        short('n'),
        long("nchannel"),
        value_name("num of channels"),
        default_value_t = DEFAULT_NCH
    )]
    nch: usize,

    #[clap(long("soft"), value_name("software accumulations"), default_value_t = 1)]
    soft: usize,

    #[clap(long("hard"), value_name("hardware accumulation length"))]
    hard: Option<u32>,

    #[clap(long("max-polls"), value_name("counter polls before giving up"))]
    max_polls: Option<usize>,

    #[clap(long("linear"), help("plot in linear scale instead of dB"))]
    linear: bool,

    #[clap(
        short('p'),
        long("plot"),
        value_name("display or image file"),
        num_args(0..=1),
        default_missing_value("display")
    )]
    plot: Option<String>,

    #[clap(
        long("dump"),
        value_name("text file"),
        num_args(0..=1),
        default_missing_value(DEFAULT_DUMP)
    )]
    dump: Option<PathBuf>,

    #[clap(long("config"), value_name("TOML file with a [katcp] table"))]
    config: Option<PathBuf>,

    #[clap(long("port"), value_name("KATCP port"))]
    port: Option<u16>,

    #[clap(long("timeout"), value_name("seconds"))]
    timeout: Option<f64>,
}

fn katcp_config(args: &Args) -> anyhow::Result<KatcpConfig> {
    let mut cfg = match &args.config {
        Some(path) => BoardConfig::load(path)?.katcp,
        None => KatcpConfig::default(),
    };
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if let Some(t) = args.timeout {
        cfg.timeout_secs = t;
    }
    Ok(cfg)
}

impl Args {
    fn params(&self) -> AccumulationParams {
        AccumulationParams {
            nch: self.nch,
            hard_acc_len: self.hard,
            soft_repeats: self.soft,
            max_polls: self.max_polls,
            ..AccumulationParams::default()
        }
    }

    fn plot_target(&self) -> Option<(PlotTarget, Scale)> {
        let scale = if self.linear { Scale::Linear } else { Scale::Db };
        self.plot.as_deref().map(|t| (PlotTarget::parse(t), scale))
    }
}

pub fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let params = args.params();
    params.validate()?;

    let cfg = katcp_config(&args)?;
    info!("Connecting to server {}.", args.host);
    let mut fpga = KatcpFpga::connect(&args.host, &cfg)
        .with_context(|| format!("connecting to {}", args.host))?;

    let spectra = acquire(&mut fpga, &params).context("acquiring spectra")?;

    if let Some(path) = &args.dump {
        dump_to_file(path, &spectra).with_context(|| format!("writing {}", path.display()))?;
        info!("Spectra written to {}", path.display());
    }

    if let Some((target, scale)) = args.plot_target() {
        plot(&target, &spectra, scale).context("plotting")?;
    }
    Ok(())
}
