use anyhow::Context;
use clap::Parser;
use log::debug;

use hera_snap_diag::{
    config::BoardConfig,
    pam::{Args, execute},
    i2c::open_bus,
};

pub fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ops = args.operations()?;

    let cfg = match &args.config {
        Some(path) => BoardConfig::load(path)?,
        None => BoardConfig::default(),
    };
    let mut bus = open_bus(cfg.bus(args.bus as usize)?, args.baud)?;

    for op in &ops {
        debug!("{op:?}");
        if let Some(text) = execute(&mut bus, &cfg.pam, op).with_context(|| format!("{op:?}"))? {
            println!("{text}");
        }
    }
    Ok(())
}
