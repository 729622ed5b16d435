// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Minimal entry point wiring logger setup to the library's region
//! plumbing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;

use germ_caller_core::config::PipelineConfig;
use germ_caller_core::interval::Region;

#[derive(Debug, StructOpt)]
#[structopt(name = "germ-caller", about = "Germline small-variant calling core")]
struct Opt {
    /// Region to analyse, `contig` or `contig:start-end`.
    region: String,

    /// Optional YAML pipeline configuration.
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Increase log verbosity.
    #[structopt(short, long)]
    verbose: bool,
}

fn setup_logger(verbose: bool) -> Result<()> {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}: {}", record.level(), record.target(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("failed to initialize logger")?;
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    setup_logger(opt.verbose)?;

    let region = Region::from_str(&opt.region).context("failed to parse region")?;
    let config = match opt.config {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("failed to read {:?}", path))?;
            PipelineConfig::from_yaml(&text).context("failed to parse pipeline config")?
        }
        None => PipelineConfig::default(),
    };

    log::info!("germ-caller core configured for region {} (config: {:?})", region, config.min_variant_base_qual);
    log::warn!("this binary is a wiring stub: alignment sources, reference index parsing and VCF output are supplied by the surrounding orchestration, out of scope for this crate");

    Ok(())
}
