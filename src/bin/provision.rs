//! Builds a provisioning record image from a `key=value` text file.
//!
//! ```text
//! cargo run --features host-tools --bin provision -- provisioning.txt -o provisioning.bin
//! espflash write-bin 0x9000 provisioning.bin
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use esp32_climate_node::{
    config::CONFIG,
    constants::{PROVISIONING_FLASH_OFFSET, PROVISIONING_RECORD_MAX},
    provisioning::{self, Overrides},
};

/// esp-storage writes in 32-bit words
const FLASH_WRITE_SIZE: usize = 4;

#[derive(Debug, Parser)]
#[command(name = "provision", version)]
#[command(about = "Build a provisioning record image for the climate node")]
struct Args {
    /// Overrides, one `key=value` per line, keys as in cfg.toml
    input: PathBuf,

    /// Where to write the record image
    #[arg(short, long, default_value = "provisioning.bin")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let overrides = Overrides::parse(&text)
        .map_err(|e| anyhow!("{}: {:?}", args.input.display(), e))?;
    if overrides.is_empty() {
        warn!(
            "{} sets no field, the device keeps its compiled-in configuration",
            args.input.display()
        );
    }

    // Same check the firmware runs at boot, against this build's cfg.toml
    if let Err(e) = CONFIG.with_overrides(&overrides).validate() {
        bail!(
            "{}: the device would reject this record: {}",
            args.input.display(),
            e
        );
    }

    let record = provisioning::encode(&text, FLASH_WRITE_SIZE)
        .map_err(|e| anyhow!("{}: {:?}", args.input.display(), e))?;

    fs::write(&args.output, &record[..])
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!(
        "Wrote {} ({} of {} bytes), flash it with: espflash write-bin {:#x} {}",
        args.output.display(),
        record.len(),
        PROVISIONING_RECORD_MAX,
        PROVISIONING_FLASH_OFFSET,
        args.output.display()
    );
    Ok(())
}
